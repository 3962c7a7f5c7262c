pub mod backend;
pub mod compiler;
pub mod connection;
pub mod creation; // Test namespace create/destroy
pub mod driver;
pub mod features;
pub mod key_generator;
pub mod literal;
pub mod operations;
pub mod schema; // Schema emulation over ADD/DROP COLUMN only
pub mod type_mapper;

pub use backend::ImpalaBackend;
pub use compiler::{CompiledQuery, QueryCompiler, SqlCompiler, StandardCompiler};
pub use connection::{ConnectionAdapter, ImpalaCursor};
pub use creation::{Confirmation, FixedAnswer, StdinConfirmation, TestNamespaceLifecycle};
pub use driver::{ConnectParams, Connection, Connector, Cursor, MemoryConnector, MemoryEngine};
pub use features::DialectFeatures;
pub use key_generator::{KeyGenerator, KeyStrategy, SequentialKeys, TruncatedUuidKeys};
pub use operations::DialectOperations;
pub use schema::{ColumnChange, SchemaEmulator};
pub use type_mapper::{ImpalaTypes, MappedType, TypeMapper};
