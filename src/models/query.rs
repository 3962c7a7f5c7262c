use chrono::{DateTime, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::schema::{FieldSpec, TableSpec};

/// Value bound into a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Decimal literal digits, rendered unquoted
    Decimal(String),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

/// The engine has no timezone support, so aware datetimes keep their wall clock
/// and drop the offset.
impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(ts: DateTime<Tz>) -> Self {
        Value::Timestamp(ts.naive_local())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Opaque filter passed through to the emitted WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Predicate {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        let mut params = self.params;
        params.extend(other.params);
        Self {
            sql: format!("({}) AND ({})", self.sql, other.sql),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    Insert {
        fields: Vec<FieldSpec>,
        rows: Vec<Vec<Value>>,
    },
    Update {
        assignments: Vec<(FieldSpec, Value)>,
    },
    Delete,
    Select {
        columns: Vec<String>,
    },
}

/// Abstract query produced by the generic query-building layer
#[derive(Debug, Clone, PartialEq)]
pub struct AbstractQuery {
    pub table: TableSpec,
    pub kind: QueryKind,
    pub predicate: Option<Predicate>,
}

impl AbstractQuery {
    pub fn insert(table: TableSpec, fields: Vec<FieldSpec>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            table,
            kind: QueryKind::Insert { fields, rows },
            predicate: None,
        }
    }

    /// Single-row insert from (field, value) pairs
    pub fn insert_one(table: TableSpec, values: Vec<(FieldSpec, Value)>) -> Self {
        let (fields, row): (Vec<_>, Vec<_>) = values.into_iter().unzip();
        Self::insert(table, fields, vec![row])
    }

    pub fn update(table: TableSpec, assignments: Vec<(FieldSpec, Value)>) -> Self {
        Self {
            table,
            kind: QueryKind::Update { assignments },
            predicate: None,
        }
    }

    pub fn delete(table: TableSpec) -> Self {
        Self {
            table,
            kind: QueryKind::Delete,
            predicate: None,
        }
    }

    pub fn select(table: TableSpec, columns: Vec<String>) -> Self {
        Self {
            table,
            kind: QueryKind::Select { columns },
            predicate: None,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            QueryKind::Insert { .. } => "insert",
            QueryKind::Update { .. } => "update",
            QueryKind::Delete => "delete",
            QueryKind::Select { .. } => "select",
        }
    }
}

/// SQL template plus its ordered parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl CompiledStatement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Client-generated stand-in for an auto-increment key, always 18 decimal digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyntheticKey(i64);

impl SyntheticKey {
    pub const DIGITS: usize = 18;
    pub const MIN: i64 = 100_000_000_000_000_000;
    pub const MAX: i64 = 999_999_999_999_999_999;

    /// Returns None unless `value` has exactly 18 decimal digits.
    pub fn new(value: i64) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SyntheticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SyntheticKey> for Value {
    fn from(key: SyntheticKey) -> Self {
        Value::Int(key.0)
    }
}

/// Result row from the engine
pub type Row = Vec<Value>;

/// Outcome of executing an abstract query
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    /// Synthetic key of the last row inserted, never read back from the engine
    pub last_insert_id: Option<SyntheticKey>,
}
