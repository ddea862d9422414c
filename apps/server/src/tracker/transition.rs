//! Execution status state machine.
//!
//! Every status change an execution goes through is decided by [`transition`].

use crate::models::{ExecutionStatus, Verdict};

/// Something an operator does to an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionEvent {
    /// Progress saved with an explicit `in_progress` target.
    Started,
    /// A step checkbox was toggled.
    StepToggled,
    /// A step was marked as failed.
    StepFailed,
    /// A final verdict was recorded.
    Verdict(Verdict),
    /// The execution was cleared.
    Reset,
}

impl ExecutionEvent {
    /// The event that moves an execution toward `target`.
    ///
    /// `not_run` has no such event: only a reset goes back.
    pub fn toward(target: ExecutionStatus) -> Option<Self> {
        match target {
            ExecutionStatus::NotRun => None,
            ExecutionStatus::InProgress => Some(Self::Started),
            terminal => terminal.verdict().map(Self::Verdict),
        }
    }
}

/// Why a transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionRejected {
    #[error("Execution result is locked as '{current}'; reset the test to run it again")]
    Locked { current: ExecutionStatus },

    #[error("An execution can only return to not_run through a reset")]
    NotRunRequiresReset,
}

/// Decide the status that follows `current` when `event` happens.
pub fn transition(
    current: ExecutionStatus,
    event: ExecutionEvent,
) -> Result<ExecutionStatus, TransitionRejected> {
    use ExecutionStatus::*;

    match (current, event) {
        (_, ExecutionEvent::Reset) => Ok(NotRun),
        (current, _) if current.is_terminal() => Err(TransitionRejected::Locked { current }),
        (
            NotRun | InProgress,
            ExecutionEvent::Started | ExecutionEvent::StepToggled | ExecutionEvent::StepFailed,
        ) => Ok(InProgress),
        (NotRun | InProgress, ExecutionEvent::Verdict(verdict)) => Ok(verdict.status()),
        (current, _) => Err(TransitionRejected::Locked { current }),
    }
}

/// Which verdicts stamp `completed_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionStamp {
    /// Only `passed` and `failed` record a completion time.
    #[default]
    PassedOrFailed,
    /// Every verdict records a completion time.
    AnyVerdict,
}

impl CompletionStamp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PassedOrFailed => "passed_or_failed",
            Self::AnyVerdict => "any_verdict",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "passed_or_failed" => Some(Self::PassedOrFailed),
            "any_verdict" => Some(Self::AnyVerdict),
            _ => None,
        }
    }

    /// Whether entering `status` sets `completed_at`.
    pub fn stamps(&self, status: ExecutionStatus) -> bool {
        match self {
            Self::PassedOrFailed => {
                matches!(status, ExecutionStatus::Passed | ExecutionStatus::Failed)
            }
            Self::AnyVerdict => status.is_terminal(),
        }
    }
}

impl std::fmt::Display for CompletionStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExecutionStatus::*;

    const VERDICTS: [Verdict; 4] = [
        Verdict::Passed,
        Verdict::Failed,
        Verdict::Blocked,
        Verdict::Skipped,
    ];

    #[test]
    fn test_step_events_start_a_run() {
        assert_eq!(transition(NotRun, ExecutionEvent::StepToggled), Ok(InProgress));
        assert_eq!(transition(NotRun, ExecutionEvent::StepFailed), Ok(InProgress));
        assert_eq!(transition(InProgress, ExecutionEvent::StepToggled), Ok(InProgress));
        assert_eq!(transition(NotRun, ExecutionEvent::Started), Ok(InProgress));
    }

    #[test]
    fn test_verdicts_from_open_states() {
        for verdict in VERDICTS {
            assert_eq!(
                transition(NotRun, ExecutionEvent::Verdict(verdict)),
                Ok(verdict.status())
            );
            assert_eq!(
                transition(InProgress, ExecutionEvent::Verdict(verdict)),
                Ok(verdict.status())
            );
        }
    }

    #[test]
    fn test_terminal_results_are_locked() {
        for locked in VERDICTS.map(|v| v.status()) {
            for verdict in VERDICTS {
                assert_eq!(
                    transition(locked, ExecutionEvent::Verdict(verdict)),
                    Err(TransitionRejected::Locked { current: locked })
                );
            }
            assert!(transition(locked, ExecutionEvent::StepToggled).is_err());
            assert!(transition(locked, ExecutionEvent::StepFailed).is_err());
            assert!(transition(locked, ExecutionEvent::Started).is_err());
        }
    }

    #[test]
    fn test_reset_always_allowed() {
        for status in [NotRun, InProgress, Passed, Failed, Blocked, Skipped] {
            assert_eq!(transition(status, ExecutionEvent::Reset), Ok(NotRun));
        }
    }

    #[test]
    fn test_event_toward_target() {
        assert_eq!(ExecutionEvent::toward(NotRun), None);
        assert_eq!(ExecutionEvent::toward(InProgress), Some(ExecutionEvent::Started));
        assert_eq!(
            ExecutionEvent::toward(Blocked),
            Some(ExecutionEvent::Verdict(Verdict::Blocked))
        );
    }

    #[test]
    fn test_completion_stamp_policies() {
        let observed = CompletionStamp::PassedOrFailed;
        assert!(observed.stamps(Passed));
        assert!(observed.stamps(Failed));
        assert!(!observed.stamps(Blocked));
        assert!(!observed.stamps(Skipped));
        assert!(!observed.stamps(InProgress));

        let all = CompletionStamp::AnyVerdict;
        assert!(all.stamps(Blocked));
        assert!(all.stamps(Skipped));
        assert!(!all.stamps(NotRun));

        assert_eq!(CompletionStamp::parse(" ANY_VERDICT"), Some(all));
        assert_eq!(CompletionStamp::parse("sometimes"), None);
    }
}
