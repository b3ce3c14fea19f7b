use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ApprovalError;
use crate::workflows::evaluation360::domain::EmployeeId;

pub const MIN_REJECTION_COMMENT_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalLevel {
    Leader,
    Specialist,
    HrManager,
    Director,
}

impl ApprovalLevel {
    pub const fn ordered() -> [Self; 4] {
        [Self::Leader, Self::Specialist, Self::HrManager, Self::Director]
    }

    pub const fn number(self) -> u8 {
        match self {
            Self::Leader => 1,
            Self::Specialist => 2,
            Self::HrManager => 3,
            Self::Director => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Leader => "leader",
            Self::Specialist => "specialist",
            Self::HrManager => "hr_manager",
            Self::Director => "director",
        }
    }
}

impl fmt::Display for ApprovalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ApprovalState {
    Pending { level: ApprovalLevel },
    Approved,
    Rejected { level: ApprovalLevel },
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending { level } => write!(f, "pending at level {level}"),
            Self::Approved => f.write_str("approved"),
            Self::Rejected { level } => write!(f, "rejected at level {level}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Approve,
    Reject,
}

use ApprovalAction::{Approve, Reject};
use ApprovalLevel::{Director, HrManager, Leader, Specialist};

const TRANSITIONS: [(ApprovalLevel, ApprovalAction, ApprovalState); 8] = [
    (Leader, Approve, ApprovalState::Pending { level: Specialist }),
    (Leader, Reject, ApprovalState::Rejected { level: Leader }),
    (Specialist, Approve, ApprovalState::Pending { level: HrManager }),
    (Specialist, Reject, ApprovalState::Rejected { level: Specialist }),
    (HrManager, Approve, ApprovalState::Pending { level: Director }),
    (HrManager, Reject, ApprovalState::Rejected { level: HrManager }),
    (Director, Approve, ApprovalState::Approved),
    (Director, Reject, ApprovalState::Rejected { level: Director }),
];

/// Look up the successor state. Terminal states have no entries.
pub fn next_state(current: ApprovalState, action: ApprovalAction) -> Option<ApprovalState> {
    let ApprovalState::Pending { level } = current else {
        return None;
    };
    TRANSITIONS
        .iter()
        .find(|(from, on, _)| *from == level && *on == action)
        .map(|(_, _, to)| *to)
}

/// Designated approver per level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalChain {
    pub leader: EmployeeId,
    pub specialist: EmployeeId,
    pub hr_manager: EmployeeId,
    pub director: EmployeeId,
}

impl ApprovalChain {
    pub fn approver_for(&self, level: ApprovalLevel) -> &EmployeeId {
        match level {
            Leader => &self.leader,
            Specialist => &self.specialist,
            HrManager => &self.hr_manager,
            Director => &self.director,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub level: ApprovalLevel,
    pub action: ApprovalAction,
    pub actor: EmployeeId,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    pub level: ApprovalLevel,
    pub action: ApprovalAction,
    pub actor: EmployeeId,
    pub comment: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub chain: ApprovalChain,
    pub state: ApprovalState,
    pub history: Vec<ApprovalEvent>,
}

impl ApprovalRequest {
    pub fn submit(id: RequestId, chain: ApprovalChain) -> Self {
        Self {
            id,
            chain,
            state: ApprovalState::Pending { level: Leader },
            history: Vec::new(),
        }
    }

    /// Apply a decision. Nothing changes unless every check passes.
    pub fn decide(
        &mut self,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<ApprovalState, ApprovalError> {
        let ApprovalState::Pending { level } = self.state else {
            return Err(ApprovalError::NotPending { state: self.state });
        };
        if decision.level != level {
            return Err(ApprovalError::LevelMismatch {
                expected: level,
                actual: decision.level,
            });
        }
        if &decision.actor != self.chain.approver_for(level) {
            return Err(ApprovalError::WrongApprover {
                level,
                actor: decision.actor,
            });
        }

        let comment = decision
            .comment
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        if decision.action == Reject
            && comment
                .as_ref()
                .map_or(true, |text| text.chars().count() < MIN_REJECTION_COMMENT_CHARS)
        {
            return Err(ApprovalError::CommentRequired {
                min: MIN_REJECTION_COMMENT_CHARS,
            });
        }

        let next = next_state(self.state, decision.action)
            .ok_or(ApprovalError::NotPending { state: self.state })?;
        self.history.push(ApprovalEvent {
            level,
            action: decision.action,
            actor: decision.actor,
            comment,
            at: now,
        });
        self.state = next;
        info!(request_id = %self.id, state = %next, "approval decision applied");
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub request_id: RequestId,
    pub decision: Decision,
}

/// Per-item result of a batch; failures never roll back other items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItemOutcome {
    pub request_id: RequestId,
    pub state: Option<ApprovalState>,
    pub error: Option<String>,
}

pub fn apply_batch(
    requests: &mut BTreeMap<RequestId, ApprovalRequest>,
    items: Vec<BatchItem>,
    now: DateTime<Utc>,
) -> Vec<BatchItemOutcome> {
    items
        .into_iter()
        .map(|item| {
            let result = match requests.get_mut(&item.request_id) {
                Some(request) => request.decide(item.decision, now),
                None => Err(ApprovalError::UnknownRequest(item.request_id.clone())),
            };
            match result {
                Ok(state) => BatchItemOutcome {
                    request_id: item.request_id,
                    state: Some(state),
                    error: None,
                },
                Err(err) => {
                    warn!(request_id = %item.request_id, error = %err, "batch approval item failed");
                    BatchItemOutcome {
                        request_id: item.request_id,
                        state: None,
                        error: Some(err.to_string()),
                    }
                }
            }
        })
        .collect()
}
