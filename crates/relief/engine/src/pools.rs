//! Fund pools: creation, beneficiary registration, and the registration
//! lock that freezes total weight before any distribution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use relief_store::{Record, RecordKey};
use relief_types::{
    ActorId, AssetId, DisasterId, DistributionStrategy, FundPool, PoolId, PoolRegistration,
    ReliefError, ReliefResult,
};

use crate::{
    ensure_not_paused, load_beneficiary, load_disaster, load_ngo, load_platform, load_pool,
    validate_name, ReliefEngine,
};

/// Parameters for a new fund pool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolParams {
    pub id: PoolId,
    pub disaster: DisasterId,
    pub name: String,
    pub asset: AssetId,
    pub strategy: DistributionStrategy,
    /// Percent of each allocation paid immediately on claim.
    pub immediate_pct: u8,
    /// Percent held behind the time lock. Together with `immediate_pct`
    /// this must sum to 100.
    pub locked_pct: u8,
    pub time_lock_secs: Option<i64>,
    pub min_family_size: Option<u8>,
    pub min_damage_severity: Option<u8>,
}

impl PoolParams {
    fn validate(&self) -> ReliefResult<()> {
        validate_name("pool name", &self.name)?;
        if u16::from(self.immediate_pct) + u16::from(self.locked_pct) != 100 {
            return Err(ReliefError::InvalidDistributionPercentages {
                immediate: self.immediate_pct,
                locked: self.locked_pct,
            });
        }
        if self.locked_pct > 0 {
            match self.time_lock_secs {
                Some(secs) if secs > 0 => {}
                _ => {
                    return Err(ReliefError::InvalidInput(
                        "a locked share requires a positive time lock".into(),
                    ))
                }
            }
        }
        if let Some(min) = self.min_family_size {
            if min == 0 {
                return Err(ReliefError::InvalidFamilySize(min));
            }
        }
        if let Some(min) = self.min_damage_severity {
            if !(1..=10).contains(&min) {
                return Err(ReliefError::InvalidDamageSeverity(min));
            }
        }
        Ok(())
    }
}

impl ReliefEngine {
    /// Create a fund pool under an active disaster. The creating NGO must
    /// be operational and under its pool limit.
    pub fn create_pool(
        &mut self,
        ngo_authority: &ActorId,
        params: PoolParams,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        params.validate()?;

        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;
        if !platform.is_asset_allowed(&params.asset) {
            return Err(ReliefError::AssetNotAllowed(params.asset));
        }

        let mut ngo = load_ngo(&tx, ngo_authority)?;
        if ngo.is_blacklisted {
            return Err(ReliefError::NgoBlacklisted(ngo_authority.clone()));
        }
        if !ngo.is_active {
            return Err(ReliefError::NgoNotActive(ngo_authority.clone()));
        }
        let limit = platform.pool_limit(ngo.is_verified);
        if ngo.pools_created >= limit {
            return Err(ReliefError::PoolLimitReached(limit));
        }

        let mut disaster = load_disaster(&tx, &params.disaster)?;
        if !disaster.is_active {
            return Err(ReliefError::DisasterNotActive(params.disaster.clone()));
        }
        disaster.updated_at = now;
        tx.update(
            RecordKey::Disaster(params.disaster.clone()),
            Record::Disaster(disaster),
        )?;

        let pool = FundPool {
            id: params.id.clone(),
            disaster: params.disaster.clone(),
            name: params.name,
            authority: ngo_authority.clone(),
            asset: params.asset,
            strategy: params.strategy,
            immediate_pct: params.immediate_pct,
            locked_pct: params.locked_pct,
            time_lock_secs: params.time_lock_secs,
            min_family_size: params.min_family_size,
            min_damage_severity: params.min_damage_severity,
            registration_locked: false,
            total_weight: 0,
            total_deposited: 0,
            total_distributed: 0,
            total_claimed: 0,
            registered_beneficiaries: 0,
            donor_count: 0,
            is_active: true,
            created_at: now,
            locked_at: None,
            closed_at: None,
        };
        tx.create(
            RecordKey::Pool(params.disaster.clone(), params.id.clone()),
            Record::Pool(pool),
        )?;

        ngo.pools_created = ngo.pools_created.saturating_add(1);
        ngo.last_activity_at = now;
        tx.update(RecordKey::Ngo(ngo_authority.clone()), Record::Ngo(ngo))?;

        platform.total_pools = platform.total_pools.saturating_add(1);
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        self.store.commit(tx)?;

        info!(pool = %params.id, disaster = %params.disaster, ngo = %ngo_authority, "pool created");
        Ok(())
    }

    /// Register a verified beneficiary into a pool. Only the pool's
    /// authority may register, and only while registration is open. The
    /// beneficiary's weight under the pool strategy is captured here and
    /// never recomputed.
    pub fn register_for_pool(
        &mut self,
        authority: &ActorId,
        disaster: &DisasterId,
        pool_id: &PoolId,
        beneficiary: &ActorId,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let mut pool = load_pool(&tx, disaster, pool_id)?;
        if &pool.authority != authority {
            return Err(ReliefError::UnauthorizedModification(authority.clone()));
        }
        if !pool.is_active {
            return Err(ReliefError::PoolNotActive(pool_id.clone()));
        }
        if pool.registration_locked {
            return Err(ReliefError::RegistrationPhaseLocked(pool_id.clone()));
        }

        let record = load_beneficiary(&tx, beneficiary, disaster)?;
        if !record.is_verified() {
            return Err(ReliefError::BeneficiaryNotVerified(beneficiary.clone()));
        }
        if let Some(min) = pool.min_family_size {
            if record.family_size < min {
                return Err(ReliefError::InvalidEligibilityCriteria);
            }
        }
        if let Some(min) = pool.min_damage_severity {
            if record.damage_severity < min {
                return Err(ReliefError::InvalidEligibilityCriteria);
            }
        }

        let weight = pool.strategy.weight_for(&record);
        let registration = PoolRegistration {
            disaster: disaster.clone(),
            pool: pool_id.clone(),
            beneficiary: beneficiary.clone(),
            weight,
            is_distributed: false,
            registered_at: now,
        };
        tx.create(
            RecordKey::PoolRegistration(disaster.clone(), pool_id.clone(), beneficiary.clone()),
            Record::PoolRegistration(registration),
        )?;

        pool.total_weight = pool
            .total_weight
            .checked_add(weight)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        pool.registered_beneficiaries = pool.registered_beneficiaries.saturating_add(1);
        tx.update(
            RecordKey::Pool(disaster.clone(), pool_id.clone()),
            Record::Pool(pool),
        )?;
        self.store.commit(tx)?;

        info!(pool = %pool_id, beneficiary = %beneficiary, weight, "beneficiary registered for pool");
        Ok(())
    }

    /// Adjust a pool's name or eligibility floors. Only the pool authority,
    /// and only while registration is still open, so already-registered
    /// beneficiaries were all screened against some published floor.
    pub fn update_pool_config(
        &mut self,
        authority: &ActorId,
        disaster: &DisasterId,
        pool_id: &PoolId,
        name: Option<&str>,
        min_family_size: Option<u8>,
        min_damage_severity: Option<u8>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let mut pool = load_pool(&tx, disaster, pool_id)?;
        if &pool.authority != authority {
            return Err(ReliefError::UnauthorizedModification(authority.clone()));
        }
        if !pool.is_active {
            return Err(ReliefError::PoolNotActive(pool_id.clone()));
        }
        if pool.registration_locked {
            return Err(ReliefError::RegistrationPhaseLocked(pool_id.clone()));
        }

        if let Some(name) = name {
            validate_name("pool name", name)?;
            pool.name = name.to_string();
        }
        if let Some(min) = min_family_size {
            if min == 0 {
                return Err(ReliefError::InvalidFamilySize(min));
            }
            pool.min_family_size = Some(min);
        }
        if let Some(min) = min_damage_severity {
            if !(1..=10).contains(&min) {
                return Err(ReliefError::InvalidDamageSeverity(min));
            }
            pool.min_damage_severity = Some(min);
        }
        tx.update(
            RecordKey::Pool(disaster.clone(), pool_id.clone()),
            Record::Pool(pool),
        )?;
        self.store.commit(tx)?;

        info!(pool = %pool_id, "pool configuration updated");
        Ok(())
    }

    /// Close the registration phase, freezing the pool's total weight so
    /// allocations can be computed against it.
    pub fn lock_pool_registrations(
        &mut self,
        authority: &ActorId,
        disaster: &DisasterId,
        pool_id: &PoolId,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let mut pool = load_pool(&tx, disaster, pool_id)?;
        if &pool.authority != authority {
            return Err(ReliefError::UnauthorizedModification(authority.clone()));
        }
        if !pool.is_active {
            return Err(ReliefError::PoolNotActive(pool_id.clone()));
        }
        if pool.registration_locked {
            return Err(ReliefError::RegistrationPhaseLocked(pool_id.clone()));
        }
        if pool.registered_beneficiaries == 0 {
            return Err(ReliefError::NoBeneficiariesRegistered(pool_id.clone()));
        }

        pool.registration_locked = true;
        pool.locked_at = Some(now);
        tx.update(
            RecordKey::Pool(disaster.clone(), pool_id.clone()),
            Record::Pool(pool),
        )?;
        self.store.commit(tx)?;

        info!(pool = %pool_id, "pool registrations locked");
        Ok(())
    }

    /// Deactivate a pool. Existing distributions stay claimable; no new
    /// donations, registrations, or allocations. Pool authority or admin.
    pub fn close_pool(
        &mut self,
        actor: &ActorId,
        disaster: &DisasterId,
        pool_id: &PoolId,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;

        let mut pool = load_pool(&tx, disaster, pool_id)?;
        if &pool.authority != actor && !platform.is_admin(actor) {
            return Err(ReliefError::UnauthorizedModification(actor.clone()));
        }
        if !pool.is_active {
            return Err(ReliefError::PoolNotActive(pool_id.clone()));
        }

        pool.is_active = false;
        pool.closed_at = Some(now);
        tx.update(
            RecordKey::Pool(disaster.clone(), pool_id.clone()),
            Record::Pool(pool),
        )?;
        self.store.commit(tx)?;

        info!(pool = %pool_id, actor = %actor, "pool closed");
        Ok(())
    }
}
