// Ephemeral test namespaces.
//
// The engine cannot drop a namespace that still holds tables, and needs a
// moment for in-flight work on it to settle before structural changes.
use crate::config::ConnectionSettings;
use crate::error::AdapterError;
use crate::models::{NamespaceHandle, NamespaceState, Value};
use crate::services::connection::ConnectionAdapter;
use crate::services::driver::Connector;
use crate::services::schema::SchemaEmulator;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SETTLE_INTERVAL: Duration = Duration::from_secs(1);

/// Asks the operator whether an existing test namespace may be destroyed
pub trait Confirmation: Send + Sync {
    /// Returns the operator's answer; only `"yes"` confirms.
    fn ask(&self, prompt: &str) -> String;
}

/// Prompts on the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirmation;

impl Confirmation for StdinConfirmation {
    fn ask(&self, prompt: &str) -> String {
        prompt_on(prompt, &mut io::stdout(), &mut io::stdin().lock())
    }
}

/// Write `prompt` and read one answer line; any I/O failure reads as no answer
fn prompt_on(prompt: &str, output: &mut impl Write, input: &mut impl BufRead) -> String {
    // An unseen prompt cannot be answered.
    if let Err(e) = output.write_all(prompt.as_bytes()).and_then(|()| output.flush()) {
        tracing::warn!("Could not show the confirmation prompt: {}", e);
        return String::new();
    }
    let mut answer = String::new();
    if let Err(e) = input.read_line(&mut answer) {
        tracing::warn!("Could not read the confirmation answer: {}", e);
        return String::new();
    }
    answer.trim_end_matches(['\r', '\n']).to_string()
}

/// Always gives the same answer; for unattended runs
#[derive(Debug, Clone)]
pub struct FixedAnswer(pub String);

impl Confirmation for FixedAnswer {
    fn ask(&self, _prompt: &str) -> String {
        self.0.clone()
    }
}

pub struct TestNamespaceLifecycle {
    settings: ConnectionSettings,
    connector: Arc<dyn Connector>,
    schema: SchemaEmulator,
    confirmation: Box<dyn Confirmation>,
    settle_interval: Duration,
    handle: Option<NamespaceHandle>,
}

impl TestNamespaceLifecycle {
    pub fn new(
        settings: ConnectionSettings,
        connector: Arc<dyn Connector>,
        schema: SchemaEmulator,
        confirmation: Box<dyn Confirmation>,
    ) -> Self {
        Self {
            settings,
            connector,
            schema,
            confirmation,
            settle_interval: DEFAULT_SETTLE_INTERVAL,
            handle: None,
        }
    }

    pub fn with_settle_interval(mut self, interval: Duration) -> Self {
        self.settle_interval = interval;
        self
    }

    /// Explicit test name, else `test_` plus the configured namespace
    pub fn test_namespace_name(&self) -> Result<String, AdapterError> {
        if let Some(name) = self.settings.test_name.as_deref().filter(|n| !n.is_empty()) {
            return Ok(name.to_string());
        }
        match self.settings.name.as_deref() {
            Some(name) if !name.is_empty() => Ok(format!("test_{}", name)),
            _ => Err(AdapterError::Configuration(
                "Cannot derive a test namespace name without a NAME value.".to_string(),
            )),
        }
    }

    pub fn handle(&self) -> Option<&NamespaceHandle> {
        self.handle.as_ref()
    }

    /// Connection bound to the default namespace
    fn nodb_connection(&self) -> ConnectionAdapter {
        ConnectionAdapter::new(self.settings.without_namespace(), self.connector.clone())
    }

    async fn release(conn: &mut ConnectionAdapter) {
        if let Err(e) = conn.close().await {
            tracing::warn!("Failed to close namespace connection: {}", e);
        }
    }

    /// The handle tracking `name`, replacing one tracking another namespace
    fn handle_for(&mut self, name: &str) -> &mut NamespaceHandle {
        if self.handle.as_ref().map_or(true, |h| h.name != name) {
            self.handle = Some(NamespaceHandle::new(name));
        }
        self.handle.get_or_insert_with(|| NamespaceHandle::new(name))
    }

    fn transition(&mut self, name: &str, next: NamespaceState) -> Result<(), AdapterError> {
        self.handle_for(name).transition(next)
    }

    /// Create the test namespace, recovering once if it already exists.
    ///
    /// Declining recreation fails with exit code 1, a failed recreation with 2.
    /// Any earlier state of the handle is discarded: creation always starts over.
    pub async fn create(&mut self, name: &str, autoclobber: bool) -> Result<String, AdapterError> {
        self.handle_for(name).reset(NamespaceState::Absent);
        self.transition(name, NamespaceState::Creating)?;

        let mut conn = self.nodb_connection();
        let result = self.create_on(&mut conn, name, autoclobber).await;
        Self::release(&mut conn).await;

        match result {
            Ok(()) => Ok(name.to_string()),
            Err(e) => {
                self.handle_for(name).reset(NamespaceState::Absent);
                Err(e)
            }
        }
    }

    async fn create_on(
        &mut self,
        conn: &mut ConnectionAdapter,
        name: &str,
        autoclobber: bool,
    ) -> Result<(), AdapterError> {
        let create_sql = conn.ops().create_database_sql(name);

        let error = match conn.execute(&create_sql, &[]).await {
            Ok(()) => {
                self.transition(name, NamespaceState::Active)?;
                tracing::info!("Created test namespace '{}'", name);
                return Ok(());
            }
            Err(e) => e,
        };

        tracing::warn!("Got an error creating the test namespace: {}", error);

        let confirmed = autoclobber || {
            let prompt = format!(
                "Type 'yes' if you would like to try deleting the test namespace '{}', or 'no' to cancel: ",
                name
            );
            self.confirmation.ask(&prompt) == "yes"
        };

        if !confirmed {
            tracing::info!("Tests cancelled.");
            return Err(AdapterError::declined(format!(
                "Tests cancelled: test namespace '{}' already exists",
                name
            )));
        }

        tracing::info!("Destroying old test namespace '{}'...", name);
        let recreated = async {
            self.destroy_on(conn, name).await?;
            self.transition(name, NamespaceState::Creating)?;
            conn.execute(&create_sql, &[]).await
        }
        .await;

        match recreated {
            Ok(()) => {
                self.transition(name, NamespaceState::Active)?;
                tracing::info!("Recreated test namespace '{}'", name);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Got an error recreating the test namespace: {}", e);
                Err(AdapterError::recreate_failed(format!(
                    "Got an error recreating the test namespace '{}': {}",
                    name, e
                )))
            }
        }
    }

    /// Drop every table in `name`, then the namespace itself.
    ///
    /// On failure the handle returns to the state it had before.
    pub async fn destroy(&mut self, name: &str) -> Result<(), AdapterError> {
        let mut conn = self.nodb_connection();
        let result = self.destroy_on(&mut conn, name).await;
        Self::release(&mut conn).await;
        result
    }

    async fn destroy_on(&mut self, conn: &mut ConnectionAdapter, name: &str) -> Result<(), AdapterError> {
        let handle = self.handle_for(name);
        // A namespace this lifecycle is not mid-way through creating is taken to exist.
        if handle.state != NamespaceState::Creating {
            handle.reset(NamespaceState::Active);
        }
        let previous = handle.state;
        handle.transition(NamespaceState::Destroying)?;

        match self.drop_namespace(conn, name).await {
            Ok(dropped) => {
                self.transition(name, NamespaceState::Absent)?;
                tracing::info!("Destroyed test namespace '{}' ({} tables)", name, dropped);
                Ok(())
            }
            Err(e) => {
                self.handle_for(name).reset(previous);
                Err(e)
            }
        }
    }

    /// Settle, empty the namespace and drop it; returns the number of tables dropped
    async fn drop_namespace(&self, conn: &mut ConnectionAdapter, name: &str) -> Result<usize, AdapterError> {
        let ops = *conn.ops();

        tokio::time::sleep(self.settle_interval).await;

        conn.execute(&ops.use_namespace_sql(Some(name)), &[]).await?;
        conn.execute(ops.show_tables_sql(), &[]).await?;
        let tables: Vec<String> = conn
            .fetch_all()
            .await?
            .into_iter()
            .filter_map(|row| match row.into_iter().next() {
                Some(Value::Text(table)) => Some(table),
                _ => None,
            })
            .collect();

        for table in &tables {
            self.schema.drop_table(conn, table).await?;
        }

        conn.execute(&ops.use_namespace_sql(None), &[]).await?;
        conn.execute(&ops.drop_database_sql(name), &[]).await?;
        Ok(tables.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EXIT_DECLINED, EXIT_RECREATE_FAILED};
    use crate::services::driver::MemoryEngine;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records how often it was asked
    struct CountingAnswer {
        answer: String,
        asked: Arc<AtomicUsize>,
    }

    impl Confirmation for CountingAnswer {
        fn ask(&self, _prompt: &str) -> String {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }
    }

    fn lifecycle(engine: &MemoryEngine, confirmation: Box<dyn Confirmation>) -> TestNamespaceLifecycle {
        TestNamespaceLifecycle::new(
            ConnectionSettings::new("app"),
            Arc::new(engine.connector()),
            SchemaEmulator::default(),
            confirmation,
        )
        .with_settle_interval(Duration::ZERO)
    }

    fn counting(answer: &str) -> (Box<dyn Confirmation>, Arc<AtomicUsize>) {
        let asked = Arc::new(AtomicUsize::new(0));
        let confirmation = CountingAnswer {
            answer: answer.to_string(),
            asked: asked.clone(),
        };
        (Box::new(confirmation), asked)
    }

    /// Accepts nothing
    struct ClosedOutput;

    impl Write for ClosedOutput {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }
    }

    #[test]
    fn test_prompt_reads_answer_line() {
        let mut output = Vec::new();
        let mut input = io::Cursor::new(b"yes\r\n".to_vec());
        assert_eq!(prompt_on("Delete? ", &mut output, &mut input), "yes");
        assert_eq!(output, b"Delete? ");
    }

    #[test]
    fn test_prompt_that_cannot_be_shown_declines() {
        let mut input = io::Cursor::new(b"yes\n".to_vec());
        assert_eq!(prompt_on("Delete? ", &mut ClosedOutput, &mut input), "");
    }

    #[test]
    fn test_namespace_name() {
        let engine = MemoryEngine::new();
        let lc = lifecycle(&engine, Box::new(FixedAnswer("no".to_string())));
        assert_eq!(lc.test_namespace_name().unwrap(), "test_app");

        let mut settings = ConnectionSettings::new("app");
        settings.test_name = Some("ci_app".to_string());
        let lc = TestNamespaceLifecycle::new(
            settings,
            Arc::new(engine.connector()),
            SchemaEmulator::default(),
            Box::new(FixedAnswer("no".to_string())),
        );
        assert_eq!(lc.test_namespace_name().unwrap(), "ci_app");
    }

    #[tokio::test]
    async fn test_create_fresh_namespace() {
        let engine = MemoryEngine::new();
        let (confirmation, asked) = counting("no");
        let mut lc = lifecycle(&engine, confirmation);

        let name = lc.create("test_db", false).await.unwrap();
        assert_eq!(name, "test_db");
        assert!(engine.has_database("test_db"));
        assert!(lc.handle().unwrap().is_active());
        assert_eq!(asked.load(Ordering::SeqCst), 0);
        assert_eq!(engine.connections_opened(), 1);
        assert_eq!(engine.connections_closed(), 1);
    }

    #[tokio::test]
    async fn test_destroy_drops_tables_before_database() {
        let engine = MemoryEngine::new();
        engine.add_table("test_db", "t1", &[("id", "bigint")]);
        engine.add_table("test_db", "t2", &[("id", "bigint")]);
        let mut lc = lifecycle(&engine, Box::new(FixedAnswer("no".to_string())));

        lc.destroy("test_db").await.unwrap();

        assert_eq!(
            engine.statements(),
            vec![
                "USE default",
                "USE test_db",
                "SHOW TABLES",
                "DROP TABLE t1",
                "DROP TABLE t2",
                "USE default",
                "DROP DATABASE test_db",
            ]
        );
        assert!(!engine.has_database("test_db"));
        assert_eq!(lc.handle().unwrap().state, NamespaceState::Absent);
    }

    #[tokio::test]
    async fn test_autoclobber_recreates_without_prompting() {
        let engine = MemoryEngine::new();
        engine.add_table("test_db", "stale", &[("id", "bigint")]);
        let (confirmation, asked) = counting("no");
        let mut lc = lifecycle(&engine, confirmation);

        lc.create("test_db", true).await.unwrap();

        assert_eq!(asked.load(Ordering::SeqCst), 0);
        assert!(engine.has_database("test_db"));
        assert!(engine.tables("test_db").is_empty());
        let statements = engine.statements();
        let drop_db = statements.iter().position(|s| s == "DROP DATABASE test_db").unwrap();
        let drop_table = statements.iter().position(|s| s == "DROP TABLE stale").unwrap();
        assert!(drop_table < drop_db);
        assert_eq!(statements.last().map(String::as_str), Some("CREATE DATABASE test_db"));
        assert_eq!(engine.connections_opened(), 1);
        assert_eq!(engine.connections_closed(), 1);
    }

    #[tokio::test]
    async fn test_confirmed_prompt_recreates() {
        let engine = MemoryEngine::new();
        engine.add_database("test_db");
        let (confirmation, asked) = counting("yes");
        let mut lc = lifecycle(&engine, confirmation);

        lc.create("test_db", false).await.unwrap();
        assert_eq!(asked.load(Ordering::SeqCst), 1);
        assert!(lc.handle().unwrap().is_active());
    }

    #[tokio::test]
    async fn test_declined_prompt_exits_with_declined_code() {
        let engine = MemoryEngine::new();
        engine.add_table("test_db", "keep", &[("id", "bigint")]);
        let (confirmation, asked) = counting("no");
        let mut lc = lifecycle(&engine, confirmation);

        let err = lc.create("test_db", false).await.unwrap_err();
        assert_eq!(err.exit_code(), Some(EXIT_DECLINED));
        assert_eq!(asked.load(Ordering::SeqCst), 1);
        assert_eq!(engine.tables("test_db"), vec!["keep"]);
    }

    #[tokio::test]
    async fn test_anything_but_yes_declines() {
        let engine = MemoryEngine::new();
        engine.add_database("test_db");
        let mut lc = lifecycle(&engine, Box::new(FixedAnswer("YES please".to_string())));
        let err = lc.create("test_db", false).await.unwrap_err();
        assert_eq!(err.exit_code(), Some(EXIT_DECLINED));
    }

    #[tokio::test]
    async fn test_failed_recreation_exits_with_recreate_code() {
        let engine = MemoryEngine::new();
        engine.add_database("test_db");
        engine.fail_on("DROP DATABASE");
        let mut lc = lifecycle(&engine, Box::new(FixedAnswer("yes".to_string())));

        let err = lc.create("test_db", false).await.unwrap_err();
        assert_eq!(err.exit_code(), Some(EXIT_RECREATE_FAILED));
        assert_eq!(lc.handle().unwrap().state, NamespaceState::Absent);
        assert_eq!(engine.connections_opened(), engine.connections_closed());
    }

    #[tokio::test]
    async fn test_failed_second_create_exits_with_recreate_code() {
        let engine = MemoryEngine::new();
        engine.fail_on("CREATE DATABASE");
        let mut lc = lifecycle(&engine, Box::new(FixedAnswer("yes".to_string())));
        engine.add_database("test_db");

        let err = lc.create("test_db", true).await.unwrap_err();
        assert_eq!(err.exit_code(), Some(EXIT_RECREATE_FAILED));
        assert!(!engine.has_database("test_db"));
    }

    #[tokio::test]
    async fn test_create_twice_clobbers_own_namespace() {
        let engine = MemoryEngine::new();
        let mut lc = lifecycle(&engine, Box::new(FixedAnswer("no".to_string())));

        lc.create("test_db", false).await.unwrap();
        engine.clear_log();
        lc.create("test_db", true).await.unwrap();

        assert_eq!(
            engine.statements(),
            vec![
                "USE default",
                "CREATE DATABASE test_db",
                "USE test_db",
                "SHOW TABLES",
                "USE default",
                "DROP DATABASE test_db",
                "CREATE DATABASE test_db",
            ]
        );
        assert!(lc.handle().unwrap().is_active());
        assert_eq!(engine.connections_opened(), 2);
        assert_eq!(engine.connections_closed(), 2);
    }

    #[tokio::test]
    async fn test_create_twice_declined_leaves_handle_absent() {
        let engine = MemoryEngine::new();
        let mut lc = lifecycle(&engine, Box::new(FixedAnswer("no".to_string())));

        lc.create("test_db", false).await.unwrap();
        let err = lc.create("test_db", false).await.unwrap_err();

        assert_eq!(err.exit_code(), Some(EXIT_DECLINED));
        assert_eq!(lc.handle().unwrap().state, NamespaceState::Absent);
        assert!(engine.has_database("test_db"));
    }

    #[tokio::test]
    async fn test_failed_destroy_restores_state_and_allows_create() {
        let engine = MemoryEngine::new();
        let mut lc = lifecycle(&engine, Box::new(FixedAnswer("no".to_string())));

        assert!(lc.destroy("missing_db").await.is_err());
        assert_eq!(lc.handle().unwrap().state, NamespaceState::Active);

        lc.create("missing_db", false).await.unwrap();
        assert!(lc.handle().unwrap().is_active());
        assert!(engine.has_database("missing_db"));
        assert_eq!(engine.connections_opened(), 2);
        assert_eq!(engine.connections_closed(), 2);
    }

    #[tokio::test]
    async fn test_create_then_destroy_closes_connections() {
        let engine = MemoryEngine::new();
        let mut lc = lifecycle(&engine, Box::new(FixedAnswer("no".to_string())));

        lc.create("test_db", false).await.unwrap();
        lc.destroy("test_db").await.unwrap();

        assert!(!engine.has_database("test_db"));
        assert_eq!(engine.connections_opened(), 2);
        assert_eq!(engine.connections_closed(), 2);
    }

    #[tokio::test]
    async fn test_recreate_after_failed_recreate() {
        let engine = MemoryEngine::new();
        engine.add_database("test_db");
        engine.fail_once("DROP DATABASE");
        let mut lc = lifecycle(&engine, Box::new(FixedAnswer("yes".to_string())));

        let err = lc.create("test_db", false).await.unwrap_err();
        assert_eq!(err.exit_code(), Some(EXIT_RECREATE_FAILED));

        lc.create("test_db", false).await.unwrap();
        assert!(lc.handle().unwrap().is_active());
    }
}
