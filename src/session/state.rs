use serde::Serialize;

/// Lifecycle of one recording session
///
/// `Active` → `Finalizing` → `Closed`. Only the caller that performs the
/// `Active` → `Finalizing` transition closes the writer and emits completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Finalizing,
    Closed,
}

impl SessionState {
    /// Whether a session in this state still belongs in the registry
    pub fn is_live(self) -> bool {
        matches!(self, Self::Active | Self::Finalizing)
    }

    pub fn accepts_data(self) -> bool {
        self == Self::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_accepts_data() {
        assert!(SessionState::Active.accepts_data());
        assert!(!SessionState::Finalizing.accepts_data());
        assert!(!SessionState::Closed.accepts_data());
    }

    #[test]
    fn test_closed_is_not_live() {
        assert!(SessionState::Finalizing.is_live());
        assert!(!SessionState::Closed.is_live());
    }
}
