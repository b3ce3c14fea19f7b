//! Four-level sequential sign-off, driven by an explicit transition table.

mod chain;

pub use chain::{
    apply_batch, next_state, ApprovalAction, ApprovalChain, ApprovalEvent, ApprovalLevel,
    ApprovalRequest, ApprovalState, BatchItemOutcome, BatchItem, Decision, RequestId,
    MIN_REJECTION_COMMENT_CHARS,
};

use crate::workflows::evaluation360::domain::EmployeeId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApprovalError {
    #[error("request is no longer pending (state: {state})")]
    NotPending { state: ApprovalState },
    #[error("request is pending at level {expected}, not level {actual}")]
    LevelMismatch {
        expected: ApprovalLevel,
        actual: ApprovalLevel,
    },
    #[error("{actor} is not the approver for level {level}")]
    WrongApprover {
        level: ApprovalLevel,
        actor: EmployeeId,
    },
    #[error("rejections require a comment of at least {min} characters")]
    CommentRequired { min: usize },
    #[error("unknown approval request {0}")]
    UnknownRequest(RequestId),
}
