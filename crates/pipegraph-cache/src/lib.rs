pub mod dirty;
pub mod error;
pub mod snapshot;

pub use dirty::{compute_dirty_set, DirtySet};
pub use error::CacheError;
pub use snapshot::{NodeSnapshot, UidSnapshot};
