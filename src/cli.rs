//! Command line definitions for the dry-run tool.

use anyhow::Context;
use clap::{Parser, Subcommand};
use impala_backend::services::{Confirmation, FixedAnswer, StdinConfirmation};
use impala_backend::{AdapterError, Config, ImpalaBackend, MemoryEngine, TableSpec};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the CREATE TABLE statements a JSON schema would emit
    CreateSql {
        /// File holding one table description or a list of them
        schema: PathBuf,
    },
    /// Print the statements used to flush the given tables
    FlushSql {
        #[arg(required = true)]
        tables: Vec<String>,
    },
    /// Create the test namespace, recreating it if it already exists
    CreateTestNamespace {
        /// Destroy an existing test namespace without asking
        #[arg(long)]
        noinput: bool,
        /// Start from an engine where the test namespace already exists
        #[arg(long)]
        existing: bool,
    },
}

/// Process exit code carried by a lifecycle failure anywhere in the chain
pub fn exit_code(err: &anyhow::Error) -> Option<i32> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<AdapterError>())
        .and_then(AdapterError::exit_code)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaFile {
    Many(Vec<TableSpec>),
    One(TableSpec),
}

pub fn load_schema(path: &Path) -> anyhow::Result<Vec<TableSpec>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {}", path.display()))?;
    let schema: SchemaFile = serde_json::from_str(&text)
        .with_context(|| format!("Invalid schema description in {}", path.display()))?;
    Ok(match schema {
        SchemaFile::Many(tables) => tables,
        SchemaFile::One(table) => vec![table],
    })
}

impl Command {
    /// Run against an in-memory engine and return the emitted statements
    pub async fn run(&self, config: &Config) -> anyhow::Result<Vec<String>> {
        self.run_with(config, Box::new(StdinConfirmation)).await
    }

    pub async fn run_with(
        &self,
        config: &Config,
        confirmation: Box<dyn Confirmation>,
    ) -> anyhow::Result<Vec<String>> {
        match self {
            Command::CreateSql { schema } => {
                let tables = load_schema(schema)?;
                let engine = MemoryEngine::new();
                if let Some(name) = config.database.name.as_deref() {
                    engine.add_database(name);
                }

                let mut backend = ImpalaBackend::from_config(config, Arc::new(engine.connector()));
                for table in &tables {
                    backend
                        .create_table(table)
                        .await
                        .with_context(|| format!("Failed to create table {}", table.name))?;
                }
                backend.close().await?;

                Ok(engine
                    .statements()
                    .into_iter()
                    .filter(|sql| !sql.starts_with("USE "))
                    .collect())
            }
            Command::FlushSql { tables } => {
                Ok(impala_backend::DialectOperations.sql_flush(tables))
            }
            Command::CreateTestNamespace { noinput, existing } => {
                let engine = MemoryEngine::new();
                let backend = ImpalaBackend::from_config(config, Arc::new(engine.connector()));
                let confirmation: Box<dyn Confirmation> = if *noinput {
                    Box::new(FixedAnswer("yes".to_string()))
                } else {
                    confirmation
                };

                let mut lifecycle = backend.test_lifecycle(confirmation);
                let name = lifecycle.test_namespace_name()?;
                if *existing {
                    engine.add_database(&name);
                }
                lifecycle.create(&name, *noinput).await?;

                Ok(engine
                    .statements()
                    .into_iter()
                    .filter(|sql| !sql.starts_with("USE "))
                    .collect())
            }
        }
    }
}
