use serde::{Deserialize, Serialize};

/// Semantic column types understood by the adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldType {
    AutoKey,
    Integer,
    BigInteger,
    SmallInteger,
    PositiveInteger,
    PositiveSmallInteger,
    Boolean,
    Float,
    Decimal { precision: u8, scale: u8 },
    Text,
    Binary,
    Date,
    Time,
    Timestamp,
    ForeignKey { to: String },
    ManyToMany(Box<ManyToManyRelation>),
    /// A field kind carried by the model that the engine cannot store.
    Legacy { name: String },
}

/// Many-to-many association backed by a junction table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManyToManyRelation {
    pub through: TableSpec,
    #[serde(default = "default_auto_created")]
    pub auto_created: bool,
}

fn default_auto_created() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            primary_key: false,
        }
    }

    /// Auto-keyed primary field
    pub fn auto_key(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::AutoKey).primary_key()
    }

    pub fn many_to_many(name: impl Into<String>, through: TableSpec) -> Self {
        Self::new(
            name,
            FieldType::ManyToMany(Box::new(ManyToManyRelation {
                through,
                auto_created: true,
            })),
        )
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn is_auto_key(&self) -> bool {
        self.primary_key && self.field_type == FieldType::AutoKey
    }

    /// Junction table the adapter is responsible for creating, if any
    pub fn auto_created_junction(&self) -> Option<&TableSpec> {
        match &self.field_type {
            FieldType::ManyToMany(relation) if relation.auto_created => Some(&relation.through),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn primary_key(&self) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.primary_key)
    }

    /// The primary field when it is an auto key
    pub fn auto_key(&self) -> Option<&FieldSpec> {
        self.primary_key().filter(|f| f.is_auto_key())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn junction_tables(&self) -> impl Iterator<Item = &TableSpec> {
        self.fields.iter().filter_map(FieldSpec::auto_created_junction)
    }
}
