// In-process engine double.
//
// Understands the namespace and DDL vocabulary the adapter emits, keeps a
// catalog of databases/tables/columns, and records every statement it is
// given. DML is recorded but not evaluated. Used for dry runs and tests.
use super::{ConnectParams, Connection, Connector, Cursor};
use crate::error::AdapterError;
use crate::models::{Row, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const DEFAULT_DATABASE: &str = "default";

type Columns = Vec<(String, String)>;

#[derive(Debug)]
struct Failure {
    prefix: String,
    once: bool,
}

#[derive(Debug)]
struct EngineState {
    databases: BTreeMap<String, BTreeMap<String, Columns>>,
    log: Vec<String>,
    failures: Vec<Failure>,
    available: bool,
    connections_opened: usize,
    connections_closed: usize,
    last_params: Option<ConnectParams>,
}

impl Default for EngineState {
    fn default() -> Self {
        let mut databases = BTreeMap::new();
        databases.insert(DEFAULT_DATABASE.to_string(), BTreeMap::new());
        Self {
            databases,
            log: Vec::new(),
            failures: Vec::new(),
            available: true,
            connections_opened: 0,
            connections_closed: 0,
            last_params: None,
        }
    }
}

/// Shared handle to an in-memory engine
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    state: Arc<Mutex<EngineState>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            engine: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every statement received, in execution order
    pub fn statements(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.lock().databases.contains_key(name)
    }

    /// Seed a database directly, bypassing the statement log
    pub fn add_database(&self, name: &str) {
        self.lock()
            .databases
            .entry(name.to_string())
            .or_default();
    }

    /// Seed a table directly, bypassing the statement log
    pub fn add_table(&self, database: &str, table: &str, columns: &[(&str, &str)]) {
        let columns = columns
            .iter()
            .map(|(n, t)| (n.to_string(), t.to_string()))
            .collect();
        self.lock()
            .databases
            .entry(database.to_string())
            .or_default()
            .insert(table.to_string(), columns);
    }

    pub fn tables(&self, database: &str) -> Vec<String> {
        self.lock()
            .databases
            .get(database)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn columns(&self, database: &str, table: &str) -> Option<Vec<(String, String)>> {
        self.lock()
            .databases
            .get(database)
            .and_then(|tables| tables.get(table))
            .cloned()
    }

    /// Fail every statement starting with `prefix` (case-insensitive)
    pub fn fail_on(&self, prefix: &str) {
        self.lock().failures.push(Failure {
            prefix: prefix.to_uppercase(),
            once: false,
        });
    }

    /// Fail the next statement starting with `prefix` (case-insensitive)
    pub fn fail_once(&self, prefix: &str) {
        self.lock().failures.push(Failure {
            prefix: prefix.to_uppercase(),
            once: true,
        });
    }

    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    pub fn connections_opened(&self) -> usize {
        self.lock().connections_opened
    }

    pub fn connections_closed(&self) -> usize {
        self.lock().connections_closed
    }

    pub fn last_params(&self) -> Option<ConnectParams> {
        self.lock().last_params.clone()
    }

    fn run(&self, session: &mut String, sql: &str) -> Result<Vec<Row>, AdapterError> {
        let mut state = self.lock();
        state.log.push(sql.to_string());

        if !state.available {
            return Err(AdapterError::Engine("Connection refused".to_string()));
        }

        let upper = sql.trim().to_uppercase();
        if let Some(pos) = state.failures.iter().position(|f| upper.starts_with(&f.prefix)) {
            if state.failures[pos].once {
                state.failures.remove(pos);
            }
            return Err(AdapterError::Engine(format!("Injected failure for: {}", sql)));
        }

        if sql.trim_end().ends_with(';') {
            return Err(AdapterError::Engine(
                "AnalysisException: Syntax error: unexpected ';'".to_string(),
            ));
        }

        let words: Vec<&str> = sql.split_whitespace().collect();
        let keyword = |i: usize| words.get(i).map(|w| w.to_uppercase()).unwrap_or_default();

        match (keyword(0).as_str(), keyword(1).as_str()) {
            ("USE", _) => {
                let name = words.get(1).copied().unwrap_or_default();
                if !state.databases.contains_key(name) {
                    return Err(AdapterError::Engine(format!(
                        "AnalysisException: Database does not exist: {}",
                        name
                    )));
                }
                *session = name.to_string();
                Ok(Vec::new())
            }
            ("SHOW", "TABLES") => Ok(state
                .databases
                .get(session.as_str())
                .map(|tables| {
                    tables
                        .keys()
                        .map(|name| vec![Value::Text(name.clone())])
                        .collect()
                })
                .unwrap_or_default()),
            ("CREATE", "DATABASE") => {
                let name = words.get(2).copied().unwrap_or_default();
                if state.databases.contains_key(name) {
                    return Err(AdapterError::Engine(format!(
                        "AnalysisException: Database already exists: {}",
                        name
                    )));
                }
                state.databases.insert(name.to_string(), BTreeMap::new());
                Ok(Vec::new())
            }
            ("DROP", "DATABASE") => {
                let name = words.get(2).copied().unwrap_or_default();
                match state.databases.get(name) {
                    None => Err(AdapterError::Engine(format!(
                        "AnalysisException: Database does not exist: {}",
                        name
                    ))),
                    Some(tables) if !tables.is_empty() => Err(AdapterError::Engine(format!(
                        "AnalysisException: Cannot drop non-empty database: {}",
                        name
                    ))),
                    Some(_) => {
                        state.databases.remove(name);
                        Ok(Vec::new())
                    }
                }
            }
            ("CREATE", "TABLE") => {
                let (name, defs) = split_definition(sql, words.get(2).copied())?;
                let tables = current_tables(&mut state, session)?;
                if tables.contains_key(&name) {
                    return Err(AdapterError::Engine(format!(
                        "AnalysisException: Table already exists: {}",
                        name
                    )));
                }
                tables.insert(name, parse_columns(&defs));
                Ok(Vec::new())
            }
            ("ALTER", "TABLE") => {
                let table = words.get(2).copied().unwrap_or_default().to_string();
                let action = format!("{} {}", keyword(3), keyword(4));
                let tables = current_tables(&mut state, session)?;
                let columns = tables.get_mut(&table).ok_or_else(|| {
                    AdapterError::Engine(format!("AnalysisException: Table does not exist: {}", table))
                })?;
                match action.as_str() {
                    "ADD COLUMNS" => {
                        let (_, defs) = split_definition(sql, Some(table.as_str()))?;
                        columns.extend(parse_columns(&defs));
                        Ok(Vec::new())
                    }
                    "DROP COLUMN" => {
                        let column = words.get(5).copied().unwrap_or_default();
                        let before = columns.len();
                        columns.retain(|(name, _)| name != column);
                        if columns.len() == before {
                            return Err(AdapterError::Engine(format!(
                                "AnalysisException: Column does not exist: {}",
                                column
                            )));
                        }
                        Ok(Vec::new())
                    }
                    _ => Err(AdapterError::Engine(format!(
                        "AnalysisException: Unsupported ALTER TABLE action: {}",
                        action
                    ))),
                }
            }
            ("DROP", "TABLE") => {
                let name = words.get(2).copied().unwrap_or_default();
                let tables = current_tables(&mut state, session)?;
                if tables.remove(name).is_none() {
                    return Err(AdapterError::Engine(format!(
                        "AnalysisException: Table does not exist: {}",
                        name
                    )));
                }
                Ok(Vec::new())
            }
            // DML and anything else is accepted and only recorded
            _ => Ok(Vec::new()),
        }
    }
}

fn current_tables<'a>(
    state: &'a mut EngineState,
    session: &str,
) -> Result<&'a mut BTreeMap<String, Columns>, AdapterError> {
    state.databases.get_mut(session).ok_or_else(|| {
        AdapterError::Engine(format!("AnalysisException: Database does not exist: {}", session))
    })
}

/// Split `... <name> (<defs>)` into the table name and the parenthesised body
fn split_definition(sql: &str, name: Option<&str>) -> Result<(String, String), AdapterError> {
    let open = sql.find('(');
    let close = sql.rfind(')');
    match (open, close, name) {
        (Some(open), Some(close), Some(name)) if open < close => {
            let name = name.split('(').next().unwrap_or(name).to_string();
            Ok((name, sql[open + 1..close].to_string()))
        }
        _ => Err(AdapterError::Engine(format!(
            "AnalysisException: Syntax error in: {}",
            sql
        ))),
    }
}

/// Parse `col type, col type(p, s)` honouring nested parentheses
fn parse_columns(defs: &str) -> Columns {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in defs.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);

    parts
        .iter()
        .filter_map(|part| {
            let part = part.trim();
            let (name, ty) = part.split_once(char::is_whitespace)?;
            Some((name.to_string(), ty.trim().to_string()))
        })
        .collect()
}

/// Connector handing out connections to a [`MemoryEngine`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    engine: MemoryEngine,
}

impl MemoryConnector {
    pub fn engine(&self) -> &MemoryEngine {
        &self.engine
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, AdapterError> {
        let mut state = self.engine.lock();
        if !state.available {
            return Err(AdapterError::Engine("Connection refused".to_string()));
        }
        state.connections_opened += 1;
        state.last_params = Some(params.clone());
        drop(state);

        Ok(Box::new(MemoryConnection {
            engine: self.engine.clone(),
            closed: false,
        }))
    }
}

struct MemoryConnection {
    engine: MemoryEngine,
    closed: bool,
}

#[async_trait::async_trait]
impl Connection for MemoryConnection {
    async fn cursor(&mut self) -> Result<Box<dyn Cursor>, AdapterError> {
        if self.closed {
            return Err(AdapterError::Engine("Connection already closed".to_string()));
        }
        Ok(Box::new(MemoryCursor {
            engine: self.engine.clone(),
            session: DEFAULT_DATABASE.to_string(),
            last_rows: Vec::new(),
        }))
    }

    async fn ping(&mut self) -> Result<(), AdapterError> {
        if self.closed || !self.engine.lock().available {
            return Err(AdapterError::Engine("Ping failed: engine unavailable".to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), AdapterError> {
        if !self.closed {
            self.closed = true;
            self.engine.lock().connections_closed += 1;
        }
        Ok(())
    }
}

struct MemoryCursor {
    engine: MemoryEngine,
    session: String,
    last_rows: Vec<Row>,
}

#[async_trait::async_trait]
impl Cursor for MemoryCursor {
    async fn execute(&mut self, sql: &str) -> Result<(), AdapterError> {
        self.last_rows = self.engine.run(&mut self.session, sql)?;
        Ok(())
    }

    async fn fetch_all(&mut self) -> Result<Vec<Row>, AdapterError> {
        Ok(std::mem::take(&mut self.last_rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn cursor(engine: &MemoryEngine) -> Box<dyn Cursor> {
        let mut conn = engine.connector().connect(&ConnectParams::default()).await.unwrap();
        conn.cursor().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_alter_table() {
        let engine = MemoryEngine::new();
        let mut cur = cursor(&engine).await;

        cur.execute("CREATE TABLE prices (id bigint, amount decimal(10, 2))").await.unwrap();
        cur.execute("ALTER TABLE prices ADD COLUMNS (note string)").await.unwrap();
        assert_eq!(
            engine.columns("default", "prices").unwrap(),
            vec![
                ("id".to_string(), "bigint".to_string()),
                ("amount".to_string(), "decimal(10, 2)".to_string()),
                ("note".to_string(), "string".to_string()),
            ]
        );

        cur.execute("ALTER TABLE prices DROP COLUMN amount").await.unwrap();
        assert_eq!(engine.columns("default", "prices").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_trailing_semicolon() {
        let engine = MemoryEngine::new();
        let mut cur = cursor(&engine).await;
        assert!(cur.execute("SELECT 1;").await.is_err());
        assert!(cur.execute("SELECT 1").await.is_ok());
    }

    #[tokio::test]
    async fn test_show_tables_in_session_database() {
        let engine = MemoryEngine::new();
        engine.add_table("test_db", "t2", &[("id", "bigint")]);
        engine.add_table("test_db", "t1", &[("id", "bigint")]);
        let mut cur = cursor(&engine).await;

        cur.execute("USE test_db").await.unwrap();
        cur.execute("SHOW TABLES").await.unwrap();
        let rows = cur.fetch_all().await.unwrap();
        assert_eq!(rows, vec![vec![Value::from("t1")], vec![Value::from("t2")]]);
    }

    #[tokio::test]
    async fn test_drop_non_empty_database_fails() {
        let engine = MemoryEngine::new();
        engine.add_table("test_db", "t1", &[("id", "bigint")]);
        let mut cur = cursor(&engine).await;
        assert!(cur.execute("DROP DATABASE test_db").await.is_err());
        assert!(engine.has_database("test_db"));
    }

    #[tokio::test]
    async fn test_fail_once() {
        let engine = MemoryEngine::new();
        engine.fail_once("create database");
        let mut cur = cursor(&engine).await;
        assert!(cur.execute("CREATE DATABASE x").await.is_err());
        assert!(cur.execute("CREATE DATABASE x").await.is_ok());
    }
}
