pub mod blob_storage;
pub mod filesystem;
pub mod memory;
mod register;

pub use register::BackendConfigs;
