//! Moderation state machine for promotions and coupons.
//!
//! A submission starts out `pending` and is decided exactly once:
//!
//! ```text
//! pending --approve--> approved
//! pending --reject---> rejected
//! ```
//!
//! Decisions are final. There is no path back to `pending`.

use thiserror::Error;

use crate::models::ModerationStatus;

/// A moderator's verdict on a pending submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("this item has already been {0}")]
    AlreadyDecided(ModerationStatus),
    #[error("a rejection reason is required")]
    MissingReason,
    #[error("moderated items cannot be returned to {0}")]
    NotATarget(ModerationStatus),
}

impl Decision {
    /// Builds a rejection, trimming the reason and refusing a blank one.
    pub fn reject(reason: &str) -> Result<Self, TransitionError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TransitionError::MissingReason);
        }
        Ok(Self::Reject {
            reason: reason.to_string(),
        })
    }

    /// Maps a requested status (as sent in a generic update) to a decision.
    pub fn for_status(
        status: ModerationStatus,
        reason: Option<&str>,
    ) -> Result<Self, TransitionError> {
        match status {
            ModerationStatus::Approved => Ok(Self::Approve),
            ModerationStatus::Rejected => Self::reject(reason.unwrap_or_default()),
            other => Err(TransitionError::NotATarget(other)),
        }
    }

    pub fn target_status(&self) -> ModerationStatus {
        match self {
            Self::Approve => ModerationStatus::Approved,
            Self::Reject { .. } => ModerationStatus::Rejected,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Approve => None,
            Self::Reject { reason } => Some(reason),
        }
    }
}

impl ModerationStatus {
    /// Applies `decision` to an item currently in `self`.
    pub fn apply(self, decision: &Decision) -> Result<ModerationStatus, TransitionError> {
        match self {
            ModerationStatus::Pending => Ok(decision.target_status()),
            decided => Err(TransitionError::AlreadyDecided(decided)),
        }
    }
}
