pub mod cancellation;
pub mod snapshot;

pub use cancellation::{CancellationRegistry, CancellationToken};
pub use snapshot::{SnapshotCache, SnapshotStore};
