pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::{Config, ConnectionSettings};
pub use error::AdapterError;
pub use models::*;
pub use services::{
    ConnectionAdapter, DialectFeatures, DialectOperations, ImpalaBackend, KeyStrategy,
    MemoryEngine, SchemaEmulator, TestNamespaceLifecycle,
};
