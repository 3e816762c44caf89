pub mod invalidation;
pub mod keys;
pub mod state;
pub mod store;

pub use invalidation::{CacheInvalidator, EventKind, InvalidationEvent};
pub use state::AppState;
pub use store::CacheStore;
