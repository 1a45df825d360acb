pub mod lock;
pub mod memory;
pub mod token_cache;

pub use lock::DistributedLock;
pub use memory::MemoryDocumentStore;
pub use token_cache::{TokenCache, TokenFetcher};

#[cfg(any(test, feature = "testing"))]
pub use token_cache::MockTokenFetcher;
