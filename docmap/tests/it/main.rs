/*! Integration tests for docmap.
 *
 * This suite is organized as a single integration test binary. Every test runs against the
 * in-memory backend through the public API:
 * - save: Instance save, reload and delete
 * - bulk: Bulk scopes, buffering, commit and discard
 * - update: Multi-document updates and upserts
 * - remove: Filtered removal
 * - find_and_modify: Single-document select, update and remove
 * - atomic: Atomic operators on instances and their local application
 * - dyn_store: Type-erased stores and collection management
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("docmap=info".parse().unwrap()))
        .with_test_writer()
        .try_init();
}

mod atomic;
mod bulk;
mod dyn_store;
mod find_and_modify;
mod helpers;
mod remove;
mod save;
mod update;
