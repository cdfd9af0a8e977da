//! Ticket status transitions
//!
//! ```text
//! open <──> in_progress <──> resolved
//!   ^                           │
//!   └───────── reopen ──────────┘
//!
//! any ──> closed (terminal)
//! ```
//!
//! The three working states move freely between each other. Nothing here
//! moves a ticket on its own; every transition is an explicit admin action.

use crate::errors::{AppError, Result};
use crate::models::TicketStatus;

impl TicketStatus {
    /// Whether an admin may move a ticket from `self` to `next`
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        use TicketStatus::*;

        match (*self, next) {
            (from, to) if from == to => false,
            (Closed, _) => false,
            (Open | InProgress | Resolved, _) => true,
        }
    }

    /// `Ok` when the move is allowed, `InvalidTransition` otherwise
    pub fn transition_to(&self, next: TicketStatus) -> Result<TicketStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TicketStatus::*;

    #[test]
    fn test_forward_path() {
        assert!(Open.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Resolved));
        assert!(Open.can_transition_to(Resolved));
    }

    #[test]
    fn test_reopen_and_close() {
        assert!(Resolved.can_transition_to(Open));
        assert!(InProgress.can_transition_to(Open));
        assert!(Resolved.can_transition_to(InProgress));
        for from in [Open, InProgress, Resolved] {
            assert!(from.can_transition_to(Closed), "{from} -> closed");
        }
    }

    #[test]
    fn test_rejected_moves() {
        assert!(!Open.can_transition_to(Open));
        assert!(!Resolved.can_transition_to(Resolved));
        assert!(!Closed.can_transition_to(Open));
        assert!(!Closed.can_transition_to(InProgress));
        assert!(!Closed.can_transition_to(Closed));
    }

    #[test]
    fn test_transition_error() {
        let err = Closed.transition_to(Open).unwrap_err();
        match err {
            AppError::InvalidTransition { from, to } => {
                assert_eq!(from, "closed");
                assert_eq!(to, "open");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(tokio_test::assert_ok!(Open.transition_to(InProgress)), InProgress);
        assert_eq!(tokio_test::assert_ok!(Resolved.transition_to(InProgress)), InProgress);
        tokio_test::assert_err!(InProgress.transition_to(InProgress));
    }
}
