//! Weighted distribution, time-locked claims, and reclaim of expired
//! allocations
//!
//! Allocation happens only after the pool's registration phase is locked,
//! so every beneficiary's share is a pure function of the frozen total
//! weight: floor(total_deposited * weight / total_weight). The immediate
//! share is claimable at once; the locked share unlocks after the pool's
//! time lock. Allocations left unclaimed past the claim deadline can be
//! reclaimed into the pool by its authority.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use relief_store::{Record, RecordKey};
use relief_types::{
    ActorId, DisasterId, Distribution, PoolId, ReliefError, ReliefResult, MAX_BATCH_SIZE,
    RECLAIM_WINDOW_DAYS,
};

use crate::{
    ensure_not_paused, load_beneficiary, load_disaster, load_distribution, load_platform,
    load_pool, load_registration, ReliefEngine,
};

/// floor(deposited * weight / total_weight), in u128 to avoid overflow.
fn allocation_for(deposited: u64, weight: u64, total_weight: u64) -> u64 {
    (u128::from(deposited) * u128::from(weight) / u128::from(total_weight)) as u64
}

impl ReliefEngine {
    /// Allocate a registered beneficiary's share of a locked pool. Only
    /// the pool authority may distribute; each registration is distributed
    /// at most once.
    pub fn distribute_to_beneficiary(
        &mut self,
        authority: &ActorId,
        disaster: &DisasterId,
        pool_id: &PoolId,
        beneficiary: &ActorId,
        now: DateTime<Utc>,
    ) -> ReliefResult<u64> {
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
        if !pool.registration_locked {
            return Err(ReliefError::PoolRegistrationNotLocked(pool_id.clone()));
        }
        if pool.total_deposited == 0 {
            return Err(ReliefError::InsufficientPoolFunds(pool_id.clone()));
        }

        let mut registration = load_registration(&tx, disaster, pool_id, beneficiary)?;
        if registration.is_distributed {
            return Err(ReliefError::AlreadyDistributed(beneficiary.clone()));
        }

        let allocated = allocation_for(pool.total_deposited, registration.weight, pool.total_weight);
        if allocated == 0 {
            return Err(ReliefError::InsufficientPoolFunds(pool_id.clone()));
        }
        let immediate = (u128::from(allocated) * u128::from(pool.immediate_pct) / 100) as u64;
        let locked = allocated - immediate;
        let unlock_at = if locked > 0 {
            // Validated at pool creation: a locked share implies a lock.
            pool.time_lock_secs.map(|secs| now + Duration::seconds(secs))
        } else {
            None
        };

        let distribution = Distribution {
            beneficiary: beneficiary.clone(),
            disaster: disaster.clone(),
            pool: pool_id.clone(),
            amount_allocated: allocated,
            amount_immediate: immediate,
            amount_locked: locked,
            amount_claimed: 0,
            weight: registration.weight,
            unlock_at,
            claim_deadline: now + Duration::days(RECLAIM_WINDOW_DAYS),
            created_at: now,
            claimed_at: None,
            locked_claimed_at: None,
            reclaimed_at: None,
            is_fully_claimed: false,
        };
        tx.create(
            RecordKey::Distribution(disaster.clone(), pool_id.clone(), beneficiary.clone()),
            Record::Distribution(distribution),
        )?;

        registration.is_distributed = true;
        tx.update(
            RecordKey::PoolRegistration(disaster.clone(), pool_id.clone(), beneficiary.clone()),
            Record::PoolRegistration(registration),
        )?;

        pool.total_distributed = pool
            .total_distributed
            .checked_add(allocated)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        tx.update(
            RecordKey::Pool(disaster.clone(), pool_id.clone()),
            Record::Pool(pool),
        )?;
        self.store.commit(tx)?;

        info!(pool = %pool_id, beneficiary = %beneficiary, allocated, immediate, locked, "distribution created");
        Ok(allocated)
    }

    /// Allocate to up to `MAX_BATCH_SIZE` beneficiaries in one call. Items
    /// validate and commit independently; outcomes are returned in order.
    pub fn distribute_batch(
        &mut self,
        authority: &ActorId,
        disaster: &DisasterId,
        pool_id: &PoolId,
        beneficiaries: &[ActorId],
        now: DateTime<Utc>,
    ) -> ReliefResult<Vec<(ActorId, ReliefResult<u64>)>> {
        if beneficiaries.len() > MAX_BATCH_SIZE {
            return Err(ReliefError::BatchSizeTooLarge {
                len: beneficiaries.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        let mut outcomes = Vec::with_capacity(beneficiaries.len());
        for beneficiary in beneficiaries {
            let outcome =
                self.distribute_to_beneficiary(authority, disaster, pool_id, beneficiary, now);
            outcomes.push((beneficiary.clone(), outcome));
        }
        Ok(outcomes)
    }

    /// Claim whatever is currently payable on a distribution: the
    /// immediate share on first claim, plus the locked share once the time
    /// lock has elapsed. Returns the amount paid out now.
    pub fn claim_distribution(
        &mut self,
        beneficiary: &ActorId,
        disaster: &DisasterId,
        pool_id: &PoolId,
        now: DateTime<Utc>,
    ) -> ReliefResult<u64> {
        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let mut distribution = load_distribution(&tx, disaster, pool_id, beneficiary)?;
        if distribution.reclaimed_at.is_some() {
            return Err(ReliefError::DistributionAlreadyReclaimed);
        }
        if now > distribution.claim_deadline {
            return Err(ReliefError::ClaimDeadlinePassed);
        }

        let mut payable: u64 = 0;
        if distribution.claimed_at.is_none() && distribution.amount_immediate > 0 {
            payable += distribution.amount_immediate;
            distribution.claimed_at = Some(now);
        }
        let lock_open = distribution.unlock_at.map_or(false, |at| now >= at);
        if distribution.locked_claimed_at.is_none() && distribution.amount_locked > 0 && lock_open {
            payable += distribution.amount_locked;
            distribution.locked_claimed_at = Some(now);
        }
        if payable == 0 {
            return Err(ReliefError::DistributionAlreadyClaimed);
        }

        distribution.amount_claimed = distribution
            .amount_claimed
            .checked_add(payable)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        distribution.is_fully_claimed =
            distribution.amount_claimed == distribution.amount_allocated;
        tx.update(
            RecordKey::Distribution(disaster.clone(), pool_id.clone(), beneficiary.clone()),
            Record::Distribution(distribution),
        )?;

        let mut record = load_beneficiary(&tx, beneficiary, disaster)?;
        record.total_received = record
            .total_received
            .checked_add(payable)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        tx.update(
            RecordKey::Beneficiary(beneficiary.clone(), disaster.clone()),
            Record::Beneficiary(record),
        )?;

        let mut pool = load_pool(&tx, disaster, pool_id)?;
        pool.total_claimed = pool
            .total_claimed
            .checked_add(payable)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        tx.update(
            RecordKey::Pool(disaster.clone(), pool_id.clone()),
            Record::Pool(pool),
        )?;

        let mut event = load_disaster(&tx, disaster)?;
        event.total_aid_distributed = event
            .total_aid_distributed
            .checked_add(payable)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        event.updated_at = now;
        tx.update(RecordKey::Disaster(disaster.clone()), Record::Disaster(event))?;

        let mut platform = platform;
        platform.total_aid_distributed = platform
            .total_aid_distributed
            .checked_add(payable)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        self.store.commit(tx)?;

        info!(beneficiary = %beneficiary, pool = %pool_id, payable, "distribution claimed");
        Ok(payable)
    }

    /// Return the unclaimed remainder of an expired distribution to its
    /// pool. Only the pool authority, and only after the claim deadline.
    pub fn reclaim_expired_distribution(
        &mut self,
        authority: &ActorId,
        disaster: &DisasterId,
        pool_id: &PoolId,
        beneficiary: &ActorId,
        now: DateTime<Utc>,
    ) -> ReliefResult<u64> {
        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let mut pool = load_pool(&tx, disaster, pool_id)?;
        if &pool.authority != authority {
            return Err(ReliefError::UnauthorizedModification(authority.clone()));
        }

        let mut distribution = load_distribution(&tx, disaster, pool_id, beneficiary)?;
        if distribution.reclaimed_at.is_some() {
            return Err(ReliefError::DistributionAlreadyReclaimed);
        }
        if distribution.is_fully_claimed {
            return Err(ReliefError::DistributionAlreadyClaimed);
        }
        if now <= distribution.claim_deadline {
            return Err(ReliefError::DistributionNotExpired);
        }

        let unclaimed = distribution.unclaimed();
        distribution.reclaimed_at = Some(now);
        tx.update(
            RecordKey::Distribution(disaster.clone(), pool_id.clone(), beneficiary.clone()),
            Record::Distribution(distribution),
        )?;

        // Returned funds become distributable again.
        pool.total_distributed = pool
            .total_distributed
            .checked_sub(unclaimed)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        tx.update(
            RecordKey::Pool(disaster.clone(), pool_id.clone()),
            Record::Pool(pool),
        )?;
        self.store.commit(tx)?;

        info!(pool = %pool_id, beneficiary = %beneficiary, unclaimed, "expired distribution reclaimed");
        Ok(unclaimed)
    }
}
