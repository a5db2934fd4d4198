use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::CandidateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotField {
    Candidates,
    Owner,
    VotingOpen,
}

impl fmt::Display for SnapshotField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Candidates => "candidates",
            Self::Owner => "owner",
            Self::VotingOpen => "voting_open",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Vote,
    Close,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vote => "vote",
            Self::Close => "close",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("wallet session is not connected")]
    Disconnected,
    #[error("candidate {id} is not among the {known} known candidates")]
    UnknownCandidate { id: CandidateId, known: usize },
    #[error("connected identity is not the ledger owner")]
    NotAdmin,
    #[error("voting is already closed")]
    VotingClosed,
    #[error("voting phase has not been observed yet")]
    PhaseUnknown,
    #[error("another action is already in flight")]
    ActionInFlight,
}

/// Everything the core surfaces to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("failed to read {field}: {cause}")]
    ReadFailure { field: SnapshotField, cause: String },
    #[error("{kind} action failed: {cause}")]
    ActionFailure { kind: ActionKind, cause: String },
    #[error("precondition violated: {0}")]
    PreconditionViolation(#[from] Precondition),
}

impl CoreError {
    pub fn read(field: SnapshotField, cause: impl fmt::Display) -> Self {
        Self::ReadFailure {
            field,
            cause: cause.to_string(),
        }
    }

    pub fn action(kind: ActionKind, cause: impl fmt::Display) -> Self {
        Self::ActionFailure {
            kind,
            cause: cause.to_string(),
        }
    }
}

/// A ledger payload did not have the shape the core expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected {expected}, got {actual}")]
    UnexpectedType {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("value `{0}` does not fit an unsigned 64-bit integer")]
    OutOfRange(String),
    #[error("identity must not be empty")]
    EmptyIdentity,
    #[error("candidate {index}: {source}")]
    Candidate {
        index: usize,
        #[source]
        source: Box<DecodeError>,
    },
}
