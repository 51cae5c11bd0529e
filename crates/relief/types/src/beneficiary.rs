//! Beneficiary records and the verification state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorId, DisasterId};

/// Verification lifecycle of a beneficiary.
///
/// Pending -> Verified via threshold approvals; Pending -> Flagged via a
/// field agent flag; Flagged -> Pending or Rejected via admin review.
/// Verified and Rejected are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Pending,
    Verified,
    Flagged,
    Rejected,
}

/// A person registered for aid under a specific disaster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub authority: ActorId,
    pub disaster: DisasterId,
    pub name: String,

    // Uniqueness of both is enforced per disaster through index records.
    pub phone_number: String,
    pub national_id: String,

    pub family_size: u8,
    pub damage_severity: u8,
    pub age: u8,

    pub registered_by: ActorId,
    pub status: VerificationStatus,

    /// Distinct field agents that have approved, in approval order.
    pub approvals: Vec<ActorId>,
    pub verified_at: Option<DateTime<Utc>>,

    pub flagged_reason: Option<String>,
    pub flagged_by: Option<ActorId>,
    pub flagged_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,

    pub total_received: u64,

    pub registered_at: DateTime<Utc>,
}

impl Beneficiary {
    pub fn has_approved(&self, agent: &ActorId) -> bool {
        self.approvals.contains(agent)
    }

    pub fn is_verified(&self) -> bool {
        self.status == VerificationStatus::Verified
    }
}
