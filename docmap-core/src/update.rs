//! Atomic update operators.
//!
//! An [`UpdateExpr`] is an ordered list of `(operator, fields)` clauses. Each [`AtomicOp`]
//! has one row in a static table that pairs the remote encoding of its clause with the local
//! mutation it performs. The mapper sends the remote side to the store and, on the immediate
//! path, runs the local side against the instance so both views end up equal.
//!
//! | operator     | store name  | local effect                        |
//! |--------------|-------------|-------------------------------------|
//! | `Set`        | `$set`      | field = value                       |
//! | `Unset`      | `$unset`    | field removed                       |
//! | `Inc`        | `$inc`      | field = old + delta (absent: delta) |
//! | `Push`       | `$push`     | value appended                      |
//! | `Pull`       | `$pull`     | every equal element removed         |
//! | `AddToSet`   | `$addToSet` | value appended unless present       |
//!
//! `Push` and `AddToSet` accept `{ "$each": [..] }` to add several values at once.

use bson::{Bson, Document as BsonDocument};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// The closed set of supported atomic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicOp {
    Set,
    Unset,
    Inc,
    Push,
    Pull,
    AddToSet,
}

type RemoteEncoder = fn(&BsonDocument) -> BsonDocument;
type LocalMutator = fn(&mut BsonDocument, &str, &Bson) -> DocumentStoreResult<()>;

struct OperatorEntry {
    op: AtomicOp,
    name: &'static str,
    encode: RemoteEncoder,
    mutate: LocalMutator,
}

// Indexed by `AtomicOp as usize`.
static OPERATORS: [OperatorEntry; 6] = [
    OperatorEntry { op: AtomicOp::Set, name: "$set", encode: encode_values, mutate: set_field },
    OperatorEntry { op: AtomicOp::Unset, name: "$unset", encode: encode_unset, mutate: unset_field },
    OperatorEntry { op: AtomicOp::Inc, name: "$inc", encode: encode_values, mutate: inc_field },
    OperatorEntry { op: AtomicOp::Push, name: "$push", encode: encode_values, mutate: push_field },
    OperatorEntry { op: AtomicOp::Pull, name: "$pull", encode: encode_values, mutate: pull_field },
    OperatorEntry { op: AtomicOp::AddToSet, name: "$addToSet", encode: encode_values, mutate: add_to_set_field },
];

impl AtomicOp {
    pub const ALL: [AtomicOp; 6] = [
        AtomicOp::Set,
        AtomicOp::Unset,
        AtomicOp::Inc,
        AtomicOp::Push,
        AtomicOp::Pull,
        AtomicOp::AddToSet,
    ];

    fn entry(self) -> &'static OperatorEntry {
        &OPERATORS[self as usize]
    }

    /// The store-side operator name, e.g. `$inc`.
    pub fn name(self) -> &'static str {
        self.entry().name
    }

    /// Looks up an operator by its store-side name.
    pub fn from_name(name: &str) -> Option<Self> {
        OPERATORS
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.op)
    }

    /// Builds the single-clause update expression for this operator.
    pub fn expression(self, fields: BsonDocument) -> UpdateExpr {
        UpdateExpr::new().with(self, fields)
    }

    /// Applies this operator to `target` the way the store would.
    pub fn apply_local(self, target: &mut BsonDocument, fields: &BsonDocument) -> DocumentStoreResult<()> {
        let mutate = self.entry().mutate;

        for (field, value) in fields {
            mutate(target, field, value)?;
        }

        Ok(())
    }
}

/// An atomic update expression, built incrementally.
///
/// ```ignore
/// let update = UpdateExpr::new()
///     .set(doc! { "status": "active" })
///     .inc(doc! { "logins": 1 });
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpr {
    clauses: Vec<(AtomicOp, BsonDocument)>,
}

impl UpdateExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `fields` under `op`, merging into an existing clause for the same operator.
    pub fn with(mut self, op: AtomicOp, fields: BsonDocument) -> Self {
        match self.clauses.iter_mut().find(|(existing, _)| *existing == op) {
            Some((_, clause)) => clause.extend(fields),
            None => self.clauses.push((op, fields)),
        }
        self
    }

    pub fn set(self, fields: BsonDocument) -> Self {
        self.with(AtomicOp::Set, fields)
    }

    pub fn unset(self, fields: BsonDocument) -> Self {
        self.with(AtomicOp::Unset, fields)
    }

    pub fn inc(self, fields: BsonDocument) -> Self {
        self.with(AtomicOp::Inc, fields)
    }

    pub fn push(self, fields: BsonDocument) -> Self {
        self.with(AtomicOp::Push, fields)
    }

    pub fn pull(self, fields: BsonDocument) -> Self {
        self.with(AtomicOp::Pull, fields)
    }

    pub fn add_to_set(self, fields: BsonDocument) -> Self {
        self.with(AtomicOp::AddToSet, fields)
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.iter().all(|(_, fields)| fields.is_empty())
    }

    pub fn clauses(&self) -> impl Iterator<Item = (AtomicOp, &BsonDocument)> {
        self.clauses.iter().map(|(op, fields)| (*op, fields))
    }

    /// Encodes the expression in store syntax, e.g. `{ "$inc": { "n": 2 } }`.
    pub fn to_document(&self) -> BsonDocument {
        self.clauses
            .iter()
            .filter(|(_, fields)| !fields.is_empty())
            .map(|(op, fields)| {
                let entry = op.entry();
                (entry.name.to_string(), Bson::Document((entry.encode)(fields)))
            })
            .collect()
    }

    /// Applies every clause to `target` in order. Returns whether `target` changed.
    pub fn apply(&self, target: &mut BsonDocument) -> DocumentStoreResult<bool> {
        let before = target.clone();

        for (op, fields) in &self.clauses {
            op.apply_local(target, fields)?;
        }

        Ok(*target != before)
    }

    /// Renames every clause field equal to `from` into `to`.
    pub fn rename_field(self, from: &str, to: &str) -> Self {
        UpdateExpr {
            clauses: self
                .clauses
                .into_iter()
                .map(|(op, fields)| {
                    let fields = fields
                        .into_iter()
                        .map(|(name, value)| if name == from { (to.to_string(), value) } else { (name, value) })
                        .collect();
                    (op, fields)
                })
                .collect(),
        }
    }
}

impl From<(AtomicOp, BsonDocument)> for UpdateExpr {
    fn from((op, fields): (AtomicOp, BsonDocument)) -> Self {
        op.expression(fields)
    }
}

impl TryFrom<BsonDocument> for UpdateExpr {
    type Error = DocumentStoreError;

    /// Parses store syntax such as `doc! { "$set": { "a": 1 } }`.
    fn try_from(document: BsonDocument) -> Result<Self, Self::Error> {
        document
            .into_iter()
            .try_fold(UpdateExpr::new(), |update, (name, fields)| {
                let op = AtomicOp::from_name(&name)
                    .ok_or_else(|| DocumentStoreError::InvalidUpdate(format!("unsupported update operator '{name}'")))?;

                match fields {
                    Bson::Document(fields) => Ok(update.with(op, fields)),
                    other => Err(DocumentStoreError::InvalidUpdate(format!(
                        "operator {name} expects a document of fields, got {other}"
                    ))),
                }
            })
    }
}

/// Options for collection-level updates.
///
/// The default updates every match and never upserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Update every matching document instead of the first one.
    pub multi: bool,
    /// Insert a document seeded from the filter's equality terms when nothing matches.
    pub upsert: bool,
}

impl UpdateOptions {
    pub fn single() -> Self {
        Self { multi: false, upsert: false }
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self { multi: true, upsert: false }
    }
}

fn encode_values(fields: &BsonDocument) -> BsonDocument {
    fields.clone()
}

fn encode_unset(fields: &BsonDocument) -> BsonDocument {
    fields
        .keys()
        .map(|field| (field.clone(), Bson::String(String::new())))
        .collect()
}

fn set_field(target: &mut BsonDocument, field: &str, value: &Bson) -> DocumentStoreResult<()> {
    target.insert(field, value.clone());
    Ok(())
}

fn unset_field(target: &mut BsonDocument, field: &str, _value: &Bson) -> DocumentStoreResult<()> {
    target.remove(field);
    Ok(())
}

fn inc_field(target: &mut BsonDocument, field: &str, delta: &Bson) -> DocumentStoreResult<()> {
    let next = match target.get(field) {
        None | Some(Bson::Null) if as_f64(delta).is_some() => delta.clone(),
        Some(current) => add_numbers(current, delta)
            .ok_or_else(|| DocumentStoreError::InvalidUpdate(format!(
                "cannot apply $inc with {delta} to field '{field}' holding {current}"
            )))?,
        None => return Err(DocumentStoreError::InvalidUpdate(format!("$inc requires a numeric delta, got {delta}"))),
    };

    target.insert(field, next);
    Ok(())
}

fn push_field(target: &mut BsonDocument, field: &str, value: &Bson) -> DocumentStoreResult<()> {
    let values = each_values(value);
    array_field(target, field, "$push")?.extend(values);
    Ok(())
}

fn add_to_set_field(target: &mut BsonDocument, field: &str, value: &Bson) -> DocumentStoreResult<()> {
    let values = each_values(value);
    let array = array_field(target, field, "$addToSet")?;

    for value in values {
        if !array.iter().any(|item| values_equal(item, &value)) {
            array.push(value);
        }
    }

    Ok(())
}

fn pull_field(target: &mut BsonDocument, field: &str, value: &Bson) -> DocumentStoreResult<()> {
    match target.get_mut(field) {
        None => Ok(()),
        Some(Bson::Array(items)) => {
            items.retain(|item| !values_equal(item, value));
            Ok(())
        }
        Some(other) => Err(DocumentStoreError::InvalidUpdate(format!(
            "cannot apply $pull to non-array field '{field}' holding {other}"
        ))),
    }
}

/// Returns the array stored under `field`, creating it when absent.
fn array_field<'a>(target: &'a mut BsonDocument, field: &str, op: &str) -> DocumentStoreResult<&'a mut Vec<Bson>> {
    if matches!(target.get(field), Some(Bson::Null)) {
        target.insert(field, Bson::Array(Vec::new()));
    }

    match target
        .entry(field.to_string())
        .or_insert_with(|| Bson::Array(Vec::new()))
    {
        Bson::Array(items) => Ok(items),
        other => Err(DocumentStoreError::InvalidUpdate(format!(
            "cannot apply {op} to non-array field '{field}' holding {other}"
        ))),
    }
}

fn each_values(value: &Bson) -> Vec<Bson> {
    match value {
        Bson::Document(modifier) => match modifier.get("$each") {
            Some(Bson::Array(values)) if modifier.len() == 1 => values.clone(),
            _ => vec![value.clone()],
        },
        _ => vec![value.clone()],
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(*v as i64),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

/// Adds two numbers the way the store does: int32 widens to int64 on overflow, any double
/// makes the result a double.
fn add_numbers(current: &Bson, delta: &Bson) -> Option<Bson> {
    match (current, delta) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(
            a.checked_add(*b)
                .map(Bson::Int32)
                .unwrap_or(Bson::Int64(*a as i64 + *b as i64)),
        ),
        (Bson::Double(_), _) | (_, Bson::Double(_)) => Some(Bson::Double(as_f64(current)? + as_f64(delta)?)),
        _ => as_i64(current)?.checked_add(as_i64(delta)?).map(Bson::Int64),
    }
}

/// Value equality with numeric types compared by value, so `1`, `1i64` and `1.0` are equal.
pub fn values_equal(left: &Bson, right: &Bson) -> bool {
    match (as_i64(left), as_i64(right)) {
        (Some(a), Some(b)) => a == b,
        _ => match (as_f64(left), as_f64(right)) {
            (Some(a), Some(b)) => a == b,
            _ => left == right,
        },
    }
}
