use serde::{Deserialize, Serialize};

/// Capabilities of the target engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialectFeatures {
    pub supports_transactions: bool,
    pub can_return_id_from_insert: bool,
    pub supports_timezones: bool,
    pub has_real_datatype: bool,
    pub supports_nullable_unique_constraints: bool,
    pub supports_partially_nullable_unique_constraints: bool,
    /// Open connections keep serving the pre-ALTER column list
    pub connection_persists_old_columns: bool,
}

impl DialectFeatures {
    pub fn impala() -> Self {
        Self {
            supports_transactions: false,
            can_return_id_from_insert: false,
            supports_timezones: false,
            has_real_datatype: true,
            supports_nullable_unique_constraints: false,
            supports_partially_nullable_unique_constraints: false,
            connection_persists_old_columns: false,
        }
    }

    pub fn with_persisted_columns(mut self, persists: bool) -> Self {
        self.connection_persists_old_columns = persists;
        self
    }
}

impl Default for DialectFeatures {
    fn default() -> Self {
        Self::impala()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impala_features() {
        let features = DialectFeatures::default();
        assert!(!features.supports_transactions);
        assert!(!features.can_return_id_from_insert);
        assert!(!features.supports_timezones);
        assert!(!features.connection_persists_old_columns);
        assert!(features.with_persisted_columns(true).connection_persists_old_columns);
    }
}
