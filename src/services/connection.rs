// Connection adapter: owns the engine connection and session cursor.
//
// The engine has no transactions and no bound parameters, so this layer
// renders literals itself and treats every statement as its own unit.
use crate::config::ConnectionSettings;
use crate::error::AdapterError;
use crate::models::{Row, Value};
use crate::services::driver::{ConnectParams, Connection, Connector, Cursor};
use crate::services::literal;
use crate::services::operations::DialectOperations;
use std::sync::Arc;

/// Options the dialect has no notion of; silently dropped
const IGNORED_OPTIONS: &[&str] = &["autocommit", "isolation_level"];

/// Cursor wrapper applying literal substitution and statement cleanup
pub struct ImpalaCursor {
    inner: Box<dyn Cursor>,
}

impl ImpalaCursor {
    pub fn new(inner: Box<dyn Cursor>) -> Self {
        Self { inner }
    }

    /// Render `args` into `template`, strip one trailing `;` and execute.
    pub async fn execute(&mut self, template: &str, args: &[Value]) -> Result<(), AdapterError> {
        let sql = literal::prepare(template, args)?;
        tracing::debug!(sql = %sql, "executing statement");
        self.inner.execute(&sql).await
    }

    pub async fn fetch_all(&mut self) -> Result<Vec<Row>, AdapterError> {
        self.inner.fetch_all().await
    }
}

pub struct ConnectionAdapter {
    settings: ConnectionSettings,
    connector: Arc<dyn Connector>,
    ops: DialectOperations,
    connection: Option<Box<dyn Connection>>,
    cursor: Option<ImpalaCursor>,
}

impl ConnectionAdapter {
    pub fn new(settings: ConnectionSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            settings,
            connector,
            ops: DialectOperations,
            connection: None,
            cursor: None,
        }
    }

    /// A fresh adapter on the same server bound to the default namespace
    pub fn without_namespace(&self) -> Self {
        Self::new(self.settings.without_namespace(), self.connector.clone())
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn ops(&self) -> &DialectOperations {
        &self.ops
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        self.connector.clone()
    }

    /// Build driver parameters from the enumerated settings
    pub fn connection_params(&self) -> Result<ConnectParams, AdapterError> {
        if self.settings.name.as_deref() == Some("") {
            return Err(AdapterError::Configuration(
                "Connection settings are improperly configured. Please supply the NAME value."
                    .to_string(),
            ));
        }

        let mut options = self.settings.options.clone();
        for key in IGNORED_OPTIONS {
            if options.remove(*key).is_some() {
                tracing::debug!(option = *key, "dropping option the dialect does not support");
            }
        }

        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

        Ok(ConnectParams {
            host: non_empty(&self.settings.host),
            port: self.settings.port,
            ldap_user: non_empty(&self.settings.user),
            ldap_password: non_empty(&self.settings.password),
            options,
        })
    }

    async fn connection(&mut self) -> Result<&mut Box<dyn Connection>, AdapterError> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => {
                let params = self.connection_params()?;
                tracing::info!("Opening connection to {}", self.settings.masked());
                self.connector.connect(&params).await?
            }
        };
        Ok(self.connection.insert(connection))
    }

    /// Open a new cursor with its session bound to the configured namespace
    pub async fn create_cursor(&mut self) -> Result<ImpalaCursor, AdapterError> {
        let use_sql = self.ops.use_namespace_sql(self.settings.name.as_deref());
        let mut cursor = ImpalaCursor::new(self.connection().await?.cursor().await?);
        cursor.execute(&use_sql, &[]).await?;
        Ok(cursor)
    }

    /// The session cursor, created on first use
    pub async fn cursor(&mut self) -> Result<&mut ImpalaCursor, AdapterError> {
        let cursor = match self.cursor.take() {
            Some(cursor) => cursor,
            None => self.create_cursor().await?,
        };
        Ok(self.cursor.insert(cursor))
    }

    pub async fn execute(&mut self, template: &str, args: &[Value]) -> Result<(), AdapterError> {
        self.cursor().await?.execute(template, args).await
    }

    pub async fn fetch_all(&mut self) -> Result<Vec<Row>, AdapterError> {
        self.cursor().await?.fetch_all().await
    }

    /// Ping the engine; any failure means the connection is unusable
    pub async fn is_usable(&mut self) -> bool {
        match self.connection.as_mut() {
            Some(connection) => match connection.ping().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Connection is no longer usable: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    /// Drop cursor and connection; the next statement reconnects
    pub async fn close(&mut self) -> Result<(), AdapterError> {
        self.cursor = None;
        if let Some(mut connection) = self.connection.take() {
            connection.close().await?;
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// No effect: every statement is committed on its own.
    pub fn set_autocommit(&mut self, _autocommit: bool) {}

    /// No effect: the dialect has no transactions.
    pub fn start_transaction(&mut self) {}

    /// No effect: the dialect has no transactions.
    pub fn end_transaction(&mut self, _success: bool) {}
}
