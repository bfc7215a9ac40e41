//! Session store implementations

mod memory;
mod retry;
mod traits;

pub use memory::MemoryStore;
pub use retry::RetryStore;
pub use traits::{SessionStore, StoreOption};

#[cfg(feature = "redis-store")]
mod redis_store;

#[cfg(feature = "redis-store")]
pub use redis_store::RedisStore;
