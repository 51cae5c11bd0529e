//! Fund pools, registrations, and distributions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorId, AssetId, Beneficiary, DisasterId, PoolId};

/// Days a beneficiary has to claim an allocation before the pool authority
/// may reclaim the unclaimed remainder.
pub const RECLAIM_WINDOW_DAYS: i64 = 90;

/// How a pool's balance is weighted across registered beneficiaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionStrategy {
    /// Every beneficiary gets the same weight.
    Equal,
    /// Weight equals the beneficiary's household size.
    WeightedByFamilySize,
    /// Weight equals the beneficiary's damage severity score.
    WeightedByDamageSeverity,
    /// Milestone-gated release. Weight is uniform; the gating schedule is
    /// managed outside the pool itself.
    Milestone,
}

impl DistributionStrategy {
    /// Allocation weight of a beneficiary under this strategy. Always >= 1
    /// so a registered beneficiary can never be allocated nothing.
    pub fn weight_for(&self, beneficiary: &Beneficiary) -> u64 {
        match self {
            DistributionStrategy::Equal => 1,
            DistributionStrategy::WeightedByFamilySize => {
                u64::from(beneficiary.family_size).max(1)
            }
            DistributionStrategy::WeightedByDamageSeverity => {
                u64::from(beneficiary.damage_severity).max(1)
            }
            DistributionStrategy::Milestone => 1,
        }
    }
}

/// A pot of donated funds attached to one disaster, distributed to
/// registered beneficiaries by weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FundPool {
    pub id: PoolId,
    pub disaster: DisasterId,
    pub name: String,
    /// Authority of the NGO that created the pool.
    pub authority: ActorId,
    pub asset: AssetId,
    pub strategy: DistributionStrategy,

    // Split of each allocation. Always sum to 100.
    pub immediate_pct: u8,
    pub locked_pct: u8,
    /// Delay before the locked share unlocks, measured from allocation.
    pub time_lock_secs: Option<i64>,

    // Eligibility floor applied at registration.
    pub min_family_size: Option<u8>,
    pub min_damage_severity: Option<u8>,

    /// Once locked, no further registrations; `total_weight` is frozen and
    /// allocations may begin.
    pub registration_locked: bool,
    pub total_weight: u64,

    pub total_deposited: u64,
    pub total_distributed: u64,
    pub total_claimed: u64,

    pub registered_beneficiaries: u32,
    pub donor_count: u32,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl FundPool {
    /// Funds deposited but not yet allocated out.
    pub fn available(&self) -> u64 {
        self.total_deposited.saturating_sub(self.total_distributed)
    }
}

/// Membership of a beneficiary in a pool, with the weight captured at
/// registration time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolRegistration {
    pub disaster: DisasterId,
    pub pool: PoolId,
    pub beneficiary: ActorId,
    pub weight: u64,
    pub is_distributed: bool,
    pub registered_at: DateTime<Utc>,
}

/// An allocation of pool funds to one beneficiary, split into an immediate
/// share and a time-locked share.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub beneficiary: ActorId,
    pub disaster: DisasterId,
    pub pool: PoolId,

    pub amount_allocated: u64,
    pub amount_immediate: u64,
    pub amount_locked: u64,
    pub amount_claimed: u64,
    pub weight: u64,

    /// When the locked share becomes claimable. `None` when there is no
    /// locked share.
    pub unlock_at: Option<DateTime<Utc>>,
    pub claim_deadline: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub locked_claimed_at: Option<DateTime<Utc>>,
    pub reclaimed_at: Option<DateTime<Utc>>,
    pub is_fully_claimed: bool,
}

impl Distribution {
    pub fn unclaimed(&self) -> u64 {
        self.amount_allocated.saturating_sub(self.amount_claimed)
    }
}
