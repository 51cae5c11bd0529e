//! Donations and fee charging
//!
//! Donors give either directly to a verified beneficiary (base fee) or
//! into a fund pool (fee tiered by the pool NGO's verification status).
//! Every donation writes an immutable receipt record.

use chrono::{DateTime, Utc};
use tracing::info;

use relief_store::{Record, RecordKey};
use relief_types::{
    ActorId, AssetId, DisasterId, DonationId, DonationRecord, DonationTarget, PlatformConfig,
    PoolId, ReliefError, ReliefResult, MAX_MESSAGE_LEN,
};

use crate::{
    ensure_not_paused, load_beneficiary, load_disaster, load_ngo, load_platform, load_pool,
    validate_text, ReliefEngine,
};

/// Fee in base units: floor(amount * bps / 10_000). Computed in u128 so
/// the multiply can never overflow.
pub(crate) fn fee_for(amount: u64, bps: u16) -> u64 {
    (u128::from(amount) * u128::from(bps) / 10_000) as u64
}

fn validate_donation(
    platform: &PlatformConfig,
    asset: &AssetId,
    amount: u64,
    message: Option<&str>,
) -> ReliefResult<()> {
    ensure_not_paused(platform)?;
    if !platform.is_asset_allowed(asset) {
        return Err(ReliefError::AssetNotAllowed(asset.clone()));
    }
    if amount < platform.min_donation {
        return Err(ReliefError::DonationBelowMinimum {
            amount,
            min: platform.min_donation,
        });
    }
    if amount > platform.max_donation {
        return Err(ReliefError::DonationAboveMaximum {
            amount,
            max: platform.max_donation,
        });
    }
    if let Some(message) = message {
        validate_text("message", message, MAX_MESSAGE_LEN)?;
    }
    Ok(())
}

impl ReliefEngine {
    /// Donate directly to a verified beneficiary. The base platform fee
    /// applies; the net amount is credited to the beneficiary immediately.
    #[allow(clippy::too_many_arguments)]
    pub fn donate_to_beneficiary(
        &mut self,
        donor: &ActorId,
        disaster: &DisasterId,
        beneficiary: &ActorId,
        asset: &AssetId,
        amount: u64,
        is_anonymous: bool,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> ReliefResult<DonationId> {
        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        validate_donation(&platform, asset, amount, message)?;

        let mut event = load_disaster(&tx, disaster)?;
        if !event.is_active {
            return Err(ReliefError::DisasterNotActive(disaster.clone()));
        }

        let mut record = load_beneficiary(&tx, beneficiary, disaster)?;
        if !record.is_verified() {
            return Err(ReliefError::BeneficiaryNotVerified(beneficiary.clone()));
        }

        let fee = fee_for(amount, platform.base_fee_bps);
        let net = amount
            .checked_sub(fee)
            .ok_or(ReliefError::ArithmeticOverflow)?;

        record.total_received = record
            .total_received
            .checked_add(net)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        tx.update(
            RecordKey::Beneficiary(beneficiary.clone(), disaster.clone()),
            Record::Beneficiary(record),
        )?;

        // Direct donations reach the beneficiary at once, so the aid
        // counters move here rather than at claim time.
        event.total_aid_distributed = event
            .total_aid_distributed
            .checked_add(net)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        event.updated_at = now;
        tx.update(RecordKey::Disaster(disaster.clone()), Record::Disaster(event))?;

        platform.total_donated = platform
            .total_donated
            .checked_add(amount)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        platform.total_fees_collected = platform
            .total_fees_collected
            .checked_add(fee)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        platform.total_aid_distributed = platform
            .total_aid_distributed
            .checked_add(net)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;

        let id = DonationId::generate();
        let donation = DonationRecord {
            id: id.clone(),
            donor: donor.clone(),
            target: DonationTarget::Beneficiary(beneficiary.clone()),
            disaster: disaster.clone(),
            asset: asset.clone(),
            amount,
            fee_charged: fee,
            net_amount: net,
            is_anonymous,
            message: message.map(str::to_string),
            donated_at: now,
        };
        tx.create(RecordKey::Donation(id.clone()), Record::Donation(donation))?;
        self.store.commit(tx)?;

        info!(donor = %donor, beneficiary = %beneficiary, amount, fee, "direct donation");
        Ok(id)
    }

    /// Donate into a fund pool. The fee tier follows the pool NGO's
    /// verification status; the net amount is deposited into the pool.
    #[allow(clippy::too_many_arguments)]
    pub fn donate_to_pool(
        &mut self,
        donor: &ActorId,
        disaster: &DisasterId,
        pool_id: &PoolId,
        asset: &AssetId,
        amount: u64,
        is_anonymous: bool,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> ReliefResult<DonationId> {
        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        validate_donation(&platform, asset, amount, message)?;

        let event = load_disaster(&tx, disaster)?;
        if !event.is_active {
            return Err(ReliefError::DisasterNotActive(disaster.clone()));
        }

        let mut pool = load_pool(&tx, disaster, pool_id)?;
        if !pool.is_active {
            return Err(ReliefError::PoolNotActive(pool_id.clone()));
        }
        if asset != &pool.asset {
            return Err(ReliefError::AssetNotAllowed(asset.clone()));
        }

        let ngo = load_ngo(&tx, &pool.authority)?;
        if !ngo.is_operational() {
            return Err(ReliefError::NgoNotActive(ngo.authority.clone()));
        }
        let fee = fee_for(amount, platform.ngo_fee_bps(ngo.is_verified));
        let net = amount
            .checked_sub(fee)
            .ok_or(ReliefError::ArithmeticOverflow)?;

        pool.total_deposited = pool
            .total_deposited
            .checked_add(net)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        pool.donor_count = pool.donor_count.saturating_add(1);
        tx.update(
            RecordKey::Pool(disaster.clone(), pool_id.clone()),
            Record::Pool(pool),
        )?;

        platform.total_donated = platform
            .total_donated
            .checked_add(amount)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        platform.total_fees_collected = platform
            .total_fees_collected
            .checked_add(fee)
            .ok_or(ReliefError::ArithmeticOverflow)?;
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;

        let id = DonationId::generate();
        let donation = DonationRecord {
            id: id.clone(),
            donor: donor.clone(),
            target: DonationTarget::Pool(pool_id.clone()),
            disaster: disaster.clone(),
            asset: asset.clone(),
            amount,
            fee_charged: fee,
            net_amount: net,
            is_anonymous,
            message: message.map(str::to_string),
            donated_at: now,
        };
        tx.create(RecordKey::Donation(id.clone()), Record::Donation(donation))?;
        self.store.commit(tx)?;

        info!(donor = %donor, pool = %pool_id, amount, fee, "pool donation");
        Ok(id)
    }
}
