// Driver boundary to the engine.
//
// The adapter talks to the engine only through these traits. Wire-protocol
// clients implement them; `memory` provides an in-process engine double.
use crate::error::AdapterError;
use crate::models::Row;
use std::collections::BTreeMap;

pub mod memory;

pub use memory::{MemoryConnector, MemoryEngine};

/// Parameters handed to a [`Connector`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Directory (LDAP) principal
    pub ldap_user: Option<String>,
    pub ldap_password: Option<String>,
    /// Extra dialect options passed through to the driver
    pub options: BTreeMap<String, String>,
}

/// Opens connections to the engine
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, AdapterError>;
}

/// A live engine connection
#[async_trait::async_trait]
pub trait Connection: Send {
    async fn cursor(&mut self) -> Result<Box<dyn Cursor>, AdapterError>;

    /// Liveness check
    async fn ping(&mut self) -> Result<(), AdapterError>;

    async fn close(&mut self) -> Result<(), AdapterError>;
}

/// Statement execution handle
#[async_trait::async_trait]
pub trait Cursor: Send {
    async fn execute(&mut self, sql: &str) -> Result<(), AdapterError>;

    /// Rows produced by the last executed statement
    async fn fetch_all(&mut self) -> Result<Vec<Row>, AdapterError>;
}
