//! Platform configuration record
//!
//! Singleton record holding governance roles, fee schedule, verification
//! consensus parameters, resource limits, donation bounds, the allowed asset
//! list, and platform-wide counters.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorId, AssetId};

/// Maximum number of managers the admin may appoint.
pub const MAX_MANAGERS: usize = 10;

/// Maximum number of assets in the allowed list, primary included.
pub const MAX_ALLOWED_ASSETS: usize = 10;

/// Maximum number of items accepted by a batch operation.
pub const MAX_BATCH_SIZE: usize = 20;

/// Maximum length of names (platform, disaster, pool, NGO, person).
pub const MAX_NAME_LEN: usize = 50;

/// Maximum length of free-form reasons (flags, blacklists, reviews).
pub const MAX_REASON_LEN: usize = 500;

/// Maximum length of a donation message.
pub const MAX_MESSAGE_LEN: usize = 500;

/// Platform fee cap, in basis points (10%).
pub const MAX_FEE_BPS: u16 = 1000;

/// Default lifetime of a pending admin transfer, in seconds (7 days).
pub const DEFAULT_TRANSFER_TIMEOUT_SECS: i64 = 7 * 24 * 60 * 60;

/// The platform's singleton configuration and counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: String,
    pub admin: ActorId,
    pub managers: Vec<ActorId>,

    // Two-phase admin transfer. Both fields are set together on initiate
    // and cleared together on accept or cancel.
    pub pending_admin: Option<ActorId>,
    pub transfer_initiated_at: Option<DateTime<Utc>>,
    pub transfer_timeout_secs: i64,

    // Fee schedule, basis points of the gross donation amount.
    pub base_fee_bps: u16,
    pub unverified_ngo_fee_bps: u16,
    pub verified_ngo_fee_bps: u16,
    pub fee_recipient: ActorId,

    // Verification consensus parameters.
    pub verification_threshold: u8,
    pub max_verifiers: u8,

    // Resource limits by NGO verification status.
    pub unverified_pool_limit: u32,
    pub verified_pool_limit: u32,
    pub unverified_beneficiary_limit: u32,
    pub verified_beneficiary_limit: u32,

    // Donation bounds, gross amount in base units.
    pub min_donation: u64,
    pub max_donation: u64,

    pub is_paused: bool,

    // Asset governance. `primary_asset` is always in `allowed_assets` and
    // can never be removed.
    pub primary_asset: AssetId,
    pub allowed_assets: Vec<AssetId>,

    // Platform-wide counters, updated alongside the operations they count.
    pub total_disasters: u32,
    pub total_beneficiaries: u32,
    pub total_verified_beneficiaries: u32,
    pub total_ngos: u32,
    pub total_field_agents: u32,
    pub total_pools: u32,
    pub total_donated: u64,
    pub total_aid_distributed: u64,
    pub total_fees_collected: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlatformConfig {
    pub fn is_admin(&self, actor: &ActorId) -> bool {
        &self.admin == actor
    }

    pub fn is_manager(&self, actor: &ActorId) -> bool {
        self.managers.contains(actor)
    }

    pub fn is_admin_or_manager(&self, actor: &ActorId) -> bool {
        self.is_admin(actor) || self.is_manager(actor)
    }

    /// Pool creation limit for an NGO by verification status.
    pub fn pool_limit(&self, ngo_verified: bool) -> u32 {
        if ngo_verified {
            self.verified_pool_limit
        } else {
            self.unverified_pool_limit
        }
    }

    /// Beneficiary registration limit for an NGO by verification status.
    pub fn beneficiary_limit(&self, ngo_verified: bool) -> u32 {
        if ngo_verified {
            self.verified_beneficiary_limit
        } else {
            self.unverified_beneficiary_limit
        }
    }

    /// Fee rate applied to donations routed through an NGO.
    pub fn ngo_fee_bps(&self, ngo_verified: bool) -> u16 {
        if ngo_verified {
            self.verified_ngo_fee_bps
        } else {
            self.unverified_ngo_fee_bps
        }
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::seconds(self.transfer_timeout_secs)
    }

    pub fn is_asset_allowed(&self, asset: &AssetId) -> bool {
        self.allowed_assets.contains(asset)
    }
}
