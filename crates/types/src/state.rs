//! Install lifecycle state

use serde::{Deserialize, Serialize};

/// Lifecycle of the whole install
///
/// States advance in declaration order. `Error` may interrupt any
/// non-terminal state; `UuCancelling` is only reachable from `UuRunning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallState {
    #[default]
    NotStarted,
    NeedsConfirmation,
    Running,
    PostWait,
    PostRunning,
    UuRunning,
    UuCancelling,
    Done,
    Error,
}

impl InstallState {
    /// Position in the happy-path ordering
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::NeedsConfirmation => 1,
            Self::Running => 2,
            Self::PostWait => 3,
            Self::PostRunning => 4,
            Self::UuRunning => 5,
            Self::UuCancelling => 6,
            Self::Done => 7,
            Self::Error => 8,
        }
    }

    /// Whether no further transition can happen
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Whether moving from `self` to `next` respects the lifecycle ordering
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Error => true,
            Self::UuCancelling => self == Self::UuRunning,
            _ => next.ordinal() > self.ordinal(),
        }
    }
}

impl std::fmt::Display for InstallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotStarted => "NOT_STARTED",
            Self::NeedsConfirmation => "NEEDS_CONFIRMATION",
            Self::Running => "RUNNING",
            Self::PostWait => "POST_WAIT",
            Self::PostRunning => "POST_RUNNING",
            Self::UuRunning => "UU_RUNNING",
            Self::UuCancelling => "UU_CANCELLING",
            Self::Done => "DONE",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_monotonic() {
        let path = [
            InstallState::NotStarted,
            InstallState::NeedsConfirmation,
            InstallState::Running,
            InstallState::PostWait,
            InstallState::PostRunning,
            InstallState::UuRunning,
            InstallState::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
            assert!(!pair[1].can_advance_to(pair[0]), "{} -> {}", pair[1], pair[0]);
        }
    }

    #[test]
    fn cancelling_only_follows_uu_running() {
        assert!(InstallState::UuRunning.can_advance_to(InstallState::UuCancelling));
        assert!(InstallState::UuCancelling.can_advance_to(InstallState::Done));
        assert!(!InstallState::PostRunning.can_advance_to(InstallState::UuCancelling));
    }

    #[test]
    fn error_interrupts_but_is_terminal() {
        assert!(InstallState::Running.can_advance_to(InstallState::Error));
        assert!(InstallState::NotStarted.can_advance_to(InstallState::Error));
        assert!(!InstallState::Error.can_advance_to(InstallState::Done));
        assert!(!InstallState::Done.can_advance_to(InstallState::Error));
    }

    #[test]
    fn serializes_like_the_wire_names() {
        let json = serde_json::to_string(&InstallState::UuCancelling).unwrap();
        assert_eq!(json, "\"UU_CANCELLING\"");
        assert_eq!(InstallState::PostWait.to_string(), "POST_WAIT");
    }
}
