#[macro_use]
extern crate tracing;

#[macro_use]
extern crate serde_json;

pub mod cache;
pub mod config;
pub mod error;
pub mod freshness;
pub mod mimetype;
pub mod path;
pub mod routes;
pub mod storage;


pub use cache::{CacheResult, CachedResult, ResultCache, ResultMetadata};
pub use error::CacheError;
pub use path::{normalize_path, RootPath, Variant};
pub use storage::{ObjectStore, StoredObject};
