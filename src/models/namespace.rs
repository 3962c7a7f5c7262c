use crate::error::AdapterError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceState {
    Absent,
    Creating,
    Active,
    Destroying,
}

impl NamespaceState {
    pub fn can_transition_to(self, next: NamespaceState) -> bool {
        use NamespaceState::*;
        matches!(
            (self, next),
            (Absent, Creating)
                | (Creating, Active)
                | (Creating, Absent)
                // clobbering a namespace left behind by an earlier run
                | (Creating, Destroying)
                | (Active, Destroying)
                | (Destroying, Absent)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceHandle {
    pub name: String,
    pub state: NamespaceState,
}

impl NamespaceHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: NamespaceState::Absent,
        }
    }

    /// Move to `next`; transitions outside the lifecycle graph are rejected.
    pub fn transition(&mut self, next: NamespaceState) -> Result<(), AdapterError> {
        if !self.state.can_transition_to(next) {
            return Err(AdapterError::InvalidTransition {
                namespace: self.name.clone(),
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(namespace = %self.name, from = ?self.state, to = ?next, "namespace state change");
        self.state = next;
        Ok(())
    }

    /// Force the state, e.g. to roll back after a failed operation
    pub fn reset(&mut self, state: NamespaceState) {
        if self.state != state {
            tracing::debug!(namespace = %self.name, from = ?self.state, to = ?state, "namespace state reset");
        }
        self.state = state;
    }

    pub fn is_active(&self) -> bool {
        self.state == NamespaceState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        let mut handle = NamespaceHandle::new("test_db");
        assert_eq!(handle.state, NamespaceState::Absent);
        handle.transition(NamespaceState::Creating).unwrap();
        handle.transition(NamespaceState::Active).unwrap();
        assert!(handle.is_active());
        handle.transition(NamespaceState::Destroying).unwrap();
        handle.transition(NamespaceState::Absent).unwrap();
        assert_eq!(handle.state, NamespaceState::Absent);
    }

    #[test]
    fn test_invalid_transition_is_an_error() {
        let mut handle = NamespaceHandle::new("test_db");
        handle.transition(NamespaceState::Creating).unwrap();
        handle.transition(NamespaceState::Active).unwrap();

        let err = handle.transition(NamespaceState::Creating).unwrap_err();
        assert!(matches!(err, AdapterError::InvalidTransition { .. }));
        assert!(handle.is_active());

        handle.reset(NamespaceState::Absent);
        handle.transition(NamespaceState::Creating).unwrap();
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!NamespaceState::Absent.can_transition_to(NamespaceState::Active));
        assert!(!NamespaceState::Active.can_transition_to(NamespaceState::Creating));
        assert!(!NamespaceState::Destroying.can_transition_to(NamespaceState::Active));
    }
}
