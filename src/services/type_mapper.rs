use crate::models::{FieldSpec, FieldType};

/// Column type text plus an optional check-constraint for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedType {
    pub type_text: String,
    pub check_constraint: Option<String>,
}

impl MappedType {
    fn plain(type_text: impl Into<String>) -> Self {
        Self {
            type_text: type_text.into(),
            check_constraint: None,
        }
    }

    fn non_negative(type_text: impl Into<String>, column: &str) -> Self {
        Self {
            type_text: type_text.into(),
            check_constraint: Some(format!("\"{}\" >= 0", column)),
        }
    }
}

/// Maps semantic field types onto dialect column types
///
/// `None` means the dialect cannot store the field; callers skip it.
pub trait TypeMapper: Send + Sync {
    fn map_type(&self, field: &FieldSpec) -> Option<MappedType>;
}

/// Column types of the Impala dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpalaTypes;

impl TypeMapper for ImpalaTypes {
    fn map_type(&self, field: &FieldSpec) -> Option<MappedType> {
        let mapped = match &field.field_type {
            // TODO: switch to string keys once synthetic keys stop being truncated integers
            FieldType::AutoKey => MappedType::plain("bigint"),
            FieldType::Integer => MappedType::plain("int"),
            FieldType::BigInteger => MappedType::plain("bigint"),
            FieldType::SmallInteger => MappedType::plain("smallint"),
            FieldType::PositiveInteger => MappedType::non_negative("bigint", &field.name),
            FieldType::PositiveSmallInteger => MappedType::non_negative("int", &field.name),
            FieldType::Boolean => MappedType::plain("boolean"),
            FieldType::Float => MappedType::plain("float"),
            FieldType::Decimal { precision, scale } => {
                MappedType::plain(format!("decimal({}, {})", precision, scale))
            }
            FieldType::Text | FieldType::Binary => MappedType::plain("string"),
            FieldType::Date | FieldType::Time | FieldType::Timestamp => {
                MappedType::plain("timestamp")
            }
            FieldType::ForeignKey { .. } => MappedType::plain("bigint"),
            FieldType::ManyToMany(_) | FieldType::Legacy { .. } => return None,
        };
        Some(mapped)
    }
}
