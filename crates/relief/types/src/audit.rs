//! Admin action audit records
//!
//! Every privileged mutation appends exactly one of these. Records are
//! insert-only; nothing in the engine updates or deletes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ActorId;

/// The privileged operations that must leave an audit trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminActionKind {
    VerifyNgo,
    RevokeNgoVerification,
    ActivateNgo,
    DeactivateNgo,
    BlacklistNgo,
    RemoveBlacklist,
    InitiateAdminTransfer,
    AcceptAdminTransfer,
    CancelAdminTransfer,
    AddManager,
    RemoveManager,
    UpdatePlatformConfig,
    PausePlatform,
    UnpausePlatform,
    AddAllowedAsset,
    RemoveAllowedAsset,
    CreateDisaster,
    UpdateDisaster,
    CloseDisaster,
    ReviewFlaggedBeneficiary,
}

/// One entry in the append-only admin audit log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdminAction {
    pub kind: AdminActionKind,
    /// Identifier of the affected entity, rendered as text.
    pub target: String,
    pub actor: ActorId,
    pub reason: Option<String>,
    /// Free-form context, e.g. the new value of an updated field.
    pub metadata: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AdminAction {
    pub fn new(
        kind: AdminActionKind,
        target: impl Into<String>,
        actor: ActorId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            target: target.into(),
            actor,
            reason: None,
            metadata: None,
            timestamp,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}
