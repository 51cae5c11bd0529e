//! NGO and field agent records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ActorId;

/// A relief organization registered on the platform.
///
/// Verification and blacklisting are independent axes: a verified NGO can be
/// blacklisted (verification is revoked at the same time), and an unverified
/// NGO can operate within the tighter unverified limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ngo {
    pub authority: ActorId,
    pub name: String,
    pub registration_number: String,
    pub contact_email: String,

    pub is_verified: bool,
    pub verified_by: Option<ActorId>,
    pub verified_at: Option<DateTime<Utc>>,

    pub is_active: bool,

    pub is_blacklisted: bool,
    pub blacklist_reason: Option<String>,
    pub blacklisted_by: Option<ActorId>,
    pub blacklisted_at: Option<DateTime<Utc>>,

    pub pools_created: u32,
    pub field_agents: u32,
    pub beneficiaries_registered: u32,

    pub registered_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Ngo {
    /// Whether the NGO may perform any operation at all.
    pub fn is_operational(&self) -> bool {
        self.is_active && !self.is_blacklisted
    }
}

/// A field agent employed by an NGO to register and verify beneficiaries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldAgent {
    pub authority: ActorId,
    pub ngo: ActorId,
    pub name: String,

    pub is_active: bool,

    pub verifications: u32,
    pub registrations: u32,
    pub flags_raised: u32,

    pub notes: String,

    pub registered_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
}
