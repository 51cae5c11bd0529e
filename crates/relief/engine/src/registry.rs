//! Platform registry: initialization, configuration, pause, allowed assets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use relief_store::{Record, RecordKey};
use relief_types::{
    ActorId, AdminAction, AdminActionKind, AssetId, PlatformConfig, ReliefError, ReliefResult,
    DEFAULT_TRANSFER_TIMEOUT_SECS, MAX_ALLOWED_ASSETS, MAX_FEE_BPS,
};

use crate::{ensure_not_paused, load_platform, log_admin_action, validate_name, ReliefEngine};

/// Everything the platform needs at creation. Limits and NGO fee tiers
/// start at their defaults and are tuned through `update_platform_config`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformParams {
    pub name: String,
    pub admin: ActorId,
    pub fee_recipient: ActorId,
    pub primary_asset: AssetId,
    pub base_fee_bps: u16,
    pub min_donation: u64,
    pub max_donation: u64,
    pub verification_threshold: u8,
    pub max_verifiers: u8,
}

/// Partial configuration update. `None` fields are left untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub base_fee_bps: Option<u16>,
    pub unverified_ngo_fee_bps: Option<u16>,
    pub verified_ngo_fee_bps: Option<u16>,
    pub fee_recipient: Option<ActorId>,
    pub min_donation: Option<u64>,
    pub max_donation: Option<u64>,
    pub verification_threshold: Option<u8>,
    pub max_verifiers: Option<u8>,
    pub unverified_pool_limit: Option<u32>,
    pub verified_pool_limit: Option<u32>,
    pub unverified_beneficiary_limit: Option<u32>,
    pub verified_beneficiary_limit: Option<u32>,
    pub transfer_timeout_secs: Option<i64>,
}

fn validate_fee(bps: u16) -> ReliefResult<()> {
    if bps > MAX_FEE_BPS {
        return Err(ReliefError::InvalidPlatformFee(bps));
    }
    Ok(())
}

fn validate_consensus(threshold: u8, max_verifiers: u8) -> ReliefResult<()> {
    if threshold == 0 || threshold > max_verifiers {
        return Err(ReliefError::VerificationThresholdNotMet);
    }
    Ok(())
}

fn validate_donation_bounds(min: u64, max: u64) -> ReliefResult<()> {
    if min == 0 || min > max {
        return Err(ReliefError::InvalidInput(
            "donation bounds require 0 < min <= max".into(),
        ));
    }
    Ok(())
}

impl ReliefEngine {
    /// Create the singleton platform record. Fails when one already exists.
    pub fn initialize_platform(
        &mut self,
        params: PlatformParams,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        validate_name("platform name", &params.name)?;
        validate_fee(params.base_fee_bps)?;
        validate_consensus(params.verification_threshold, params.max_verifiers)?;
        validate_donation_bounds(params.min_donation, params.max_donation)?;

        let platform = PlatformConfig {
            name: params.name,
            admin: params.admin.clone(),
            managers: Vec::new(),
            pending_admin: None,
            transfer_initiated_at: None,
            transfer_timeout_secs: DEFAULT_TRANSFER_TIMEOUT_SECS,
            base_fee_bps: params.base_fee_bps,
            unverified_ngo_fee_bps: 300,
            verified_ngo_fee_bps: 150,
            fee_recipient: params.fee_recipient,
            verification_threshold: params.verification_threshold,
            max_verifiers: params.max_verifiers,
            unverified_pool_limit: 5,
            verified_pool_limit: 10,
            unverified_beneficiary_limit: 50,
            verified_beneficiary_limit: 100,
            min_donation: params.min_donation,
            max_donation: params.max_donation,
            is_paused: false,
            primary_asset: params.primary_asset.clone(),
            allowed_assets: vec![params.primary_asset],
            total_disasters: 0,
            total_beneficiaries: 0,
            total_verified_beneficiaries: 0,
            total_ngos: 0,
            total_field_agents: 0,
            total_pools: 0,
            total_donated: 0,
            total_aid_distributed: 0,
            total_fees_collected: 0,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin();
        tx.create(RecordKey::Platform, Record::Platform(platform))?;
        self.store.commit(tx)?;

        info!(admin = %params.admin, "platform initialized");
        Ok(())
    }

    /// Apply a partial configuration update. Admin only; audited.
    pub fn update_platform_config(
        &mut self,
        actor: &ActorId,
        update: ConfigUpdate,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        if !platform.is_admin(actor) {
            return Err(ReliefError::UnauthorizedAdmin(actor.clone()));
        }

        let mut changed = Vec::new();
        if let Some(bps) = update.base_fee_bps {
            validate_fee(bps)?;
            platform.base_fee_bps = bps;
            changed.push("base_fee_bps");
        }
        if let Some(bps) = update.unverified_ngo_fee_bps {
            validate_fee(bps)?;
            platform.unverified_ngo_fee_bps = bps;
            changed.push("unverified_ngo_fee_bps");
        }
        if let Some(bps) = update.verified_ngo_fee_bps {
            validate_fee(bps)?;
            platform.verified_ngo_fee_bps = bps;
            changed.push("verified_ngo_fee_bps");
        }
        if let Some(recipient) = update.fee_recipient {
            platform.fee_recipient = recipient;
            changed.push("fee_recipient");
        }
        if update.min_donation.is_some() || update.max_donation.is_some() {
            let min = update.min_donation.unwrap_or(platform.min_donation);
            let max = update.max_donation.unwrap_or(platform.max_donation);
            validate_donation_bounds(min, max)?;
            platform.min_donation = min;
            platform.max_donation = max;
            changed.push("donation_bounds");
        }
        if update.verification_threshold.is_some() || update.max_verifiers.is_some() {
            let threshold = update
                .verification_threshold
                .unwrap_or(platform.verification_threshold);
            let max_verifiers = update.max_verifiers.unwrap_or(platform.max_verifiers);
            validate_consensus(threshold, max_verifiers)?;
            platform.verification_threshold = threshold;
            platform.max_verifiers = max_verifiers;
            changed.push("consensus");
        }
        if let Some(limit) = update.unverified_pool_limit {
            platform.unverified_pool_limit = limit;
            changed.push("unverified_pool_limit");
        }
        if let Some(limit) = update.verified_pool_limit {
            platform.verified_pool_limit = limit;
            changed.push("verified_pool_limit");
        }
        if let Some(limit) = update.unverified_beneficiary_limit {
            platform.unverified_beneficiary_limit = limit;
            changed.push("unverified_beneficiary_limit");
        }
        if let Some(limit) = update.verified_beneficiary_limit {
            platform.verified_beneficiary_limit = limit;
            changed.push("verified_beneficiary_limit");
        }
        if let Some(secs) = update.transfer_timeout_secs {
            if secs <= 0 {
                return Err(ReliefError::InvalidInput(
                    "transfer timeout must be positive".into(),
                ));
            }
            platform.transfer_timeout_secs = secs;
            changed.push("transfer_timeout_secs");
        }
        if changed.is_empty() {
            return Err(ReliefError::InvalidInput("empty configuration update".into()));
        }

        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(AdminActionKind::UpdatePlatformConfig, "platform", actor.clone(), now)
                .with_metadata(changed.join(",")),
        )?;
        self.store.commit(tx)?;

        info!(actor = %actor, fields = changed.len(), "platform configuration updated");
        Ok(())
    }

    /// Halt all state-changing activity. Admin only; audited.
    pub fn pause_platform(
        &mut self,
        actor: &ActorId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        if !platform.is_admin(actor) {
            return Err(ReliefError::UnauthorizedAdmin(actor.clone()));
        }
        if platform.is_paused {
            return Err(ReliefError::PlatformPaused);
        }
        if reason.trim().is_empty() {
            return Err(ReliefError::ReasonRequired);
        }

        platform.is_paused = true;
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(AdminActionKind::PausePlatform, "platform", actor.clone(), now)
                .with_reason(reason),
        )?;
        self.store.commit(tx)?;

        warn!(actor = %actor, reason, "platform paused");
        Ok(())
    }

    /// Resume activity after a pause. Admin only; audited.
    pub fn unpause_platform(&mut self, actor: &ActorId, now: DateTime<Utc>) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        if !platform.is_admin(actor) {
            return Err(ReliefError::UnauthorizedAdmin(actor.clone()));
        }
        if !platform.is_paused {
            return Err(ReliefError::InvalidInput("platform is not paused".into()));
        }

        platform.is_paused = false;
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(AdminActionKind::UnpausePlatform, "platform", actor.clone(), now),
        )?;
        self.store.commit(tx)?;

        info!(actor = %actor, "platform unpaused");
        Ok(())
    }

    /// Add an asset to the allowed list. Admin or manager; audited.
    pub fn add_allowed_asset(
        &mut self,
        actor: &ActorId,
        asset: AssetId,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        if !platform.is_admin_or_manager(actor) {
            return Err(ReliefError::UnauthorizedAdminOrManager(actor.clone()));
        }
        ensure_not_paused(&platform)?;
        if platform.allowed_assets.contains(&asset) {
            return Err(ReliefError::AssetAlreadyAllowed(asset));
        }
        if platform.allowed_assets.len() >= MAX_ALLOWED_ASSETS {
            return Err(ReliefError::MaxAllowedAssetsReached(MAX_ALLOWED_ASSETS));
        }

        platform.allowed_assets.push(asset.clone());
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(
                AdminActionKind::AddAllowedAsset,
                asset.to_string(),
                actor.clone(),
                now,
            ),
        )?;
        self.store.commit(tx)?;

        info!(actor = %actor, asset = %asset, "asset allowed");
        Ok(())
    }

    /// Remove an asset from the allowed list. The primary asset can never
    /// be removed. Admin or manager; audited.
    pub fn remove_allowed_asset(
        &mut self,
        actor: &ActorId,
        asset: &AssetId,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        if !platform.is_admin_or_manager(actor) {
            return Err(ReliefError::UnauthorizedAdminOrManager(actor.clone()));
        }
        ensure_not_paused(&platform)?;
        if asset == &platform.primary_asset {
            return Err(ReliefError::CannotRemovePrimaryAsset);
        }
        let Some(pos) = platform.allowed_assets.iter().position(|a| a == asset) else {
            return Err(ReliefError::AssetNotInAllowedList(asset.clone()));
        };

        platform.allowed_assets.remove(pos);
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(
                AdminActionKind::RemoveAllowedAsset,
                asset.to_string(),
                actor.clone(),
                now,
            ),
        )?;
        self.store.commit(tx)?;

        info!(actor = %actor, asset = %asset, "asset removed from allowed list");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use chrono::Duration;

    #[test]
    fn initialize_creates_singleton() {
        let engine = engine();
        assert!(engine.store().contains(&RecordKey::Platform));

        let mut engine = engine;
        let err = engine
            .initialize_platform(default_params(), now())
            .unwrap_err();
        assert!(matches!(err, ReliefError::RecordAlreadyExists(_)));
    }

    #[test]
    fn initialize_rejects_bad_consensus() {
        let mut engine = ReliefEngine::new();
        let mut params = default_params();
        params.verification_threshold = 6;
        params.max_verifiers = 5;
        let err = engine.initialize_platform(params, now()).unwrap_err();
        assert!(matches!(err, ReliefError::VerificationThresholdNotMet));
    }

    #[test]
    fn initialize_rejects_excessive_fee() {
        let mut engine = ReliefEngine::new();
        let mut params = default_params();
        params.base_fee_bps = 1001;
        let err = engine.initialize_platform(params, now()).unwrap_err();
        assert!(matches!(err, ReliefError::InvalidPlatformFee(1001)));
    }

    #[test]
    fn config_update_is_admin_only_and_audited() {
        let mut engine = engine();
        let update = ConfigUpdate {
            base_fee_bps: Some(200),
            ..Default::default()
        };

        let err = engine
            .update_platform_config(&actor("mallory"), update.clone(), now())
            .unwrap_err();
        assert!(matches!(err, ReliefError::UnauthorizedAdmin(_)));

        engine
            .update_platform_config(&admin(), update, now() + Duration::seconds(1))
            .unwrap();
        let actions = engine.admin_actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, relief_types::AdminActionKind::UpdatePlatformConfig);
    }

    #[test]
    fn config_update_validates_combined_consensus() {
        let mut engine = engine();
        // Raising the threshold above the current max verifier count must
        // fail even though the threshold alone is a valid number.
        let err = engine
            .update_platform_config(
                &admin(),
                ConfigUpdate {
                    verification_threshold: Some(7),
                    ..Default::default()
                },
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, ReliefError::VerificationThresholdNotMet));
    }

    #[test]
    fn pause_blocks_and_unpause_restores() {
        let mut engine = engine();
        engine
            .pause_platform(&admin(), "incident response", now())
            .unwrap();

        let err = engine
            .add_allowed_asset(&admin(), usdc(), now() + Duration::seconds(1))
            .unwrap_err();
        assert!(matches!(err, ReliefError::PlatformPaused));

        engine
            .unpause_platform(&admin(), now() + Duration::seconds(2))
            .unwrap();
        let err = engine
            .add_allowed_asset(&admin(), usdc(), now() + Duration::seconds(3))
            .unwrap_err();
        // Back in business; the primary asset is simply already allowed.
        assert!(matches!(err, ReliefError::AssetAlreadyAllowed(_)));
    }

    #[test]
    fn pause_requires_reason() {
        let mut engine = engine();
        let err = engine.pause_platform(&admin(), "  ", now()).unwrap_err();
        assert!(matches!(err, ReliefError::ReasonRequired));
    }

    #[test]
    fn primary_asset_cannot_be_removed() {
        let mut engine = engine();
        let err = engine
            .remove_allowed_asset(&admin(), &usdc(), now())
            .unwrap_err();
        assert!(matches!(err, ReliefError::CannotRemovePrimaryAsset));
    }

    #[test]
    fn asset_list_is_bounded() {
        let mut engine = engine();
        let mut at = now();
        for i in 1..relief_types::MAX_ALLOWED_ASSETS {
            at += Duration::seconds(1);
            engine
                .add_allowed_asset(&admin(), relief_types::AssetId::new(format!("asset-{i}")), at)
                .unwrap();
        }
        let err = engine
            .add_allowed_asset(
                &admin(),
                relief_types::AssetId::new("one-too-many"),
                at + Duration::seconds(1),
            )
            .unwrap_err();
        assert!(matches!(err, ReliefError::MaxAllowedAssetsReached(_)));
    }
}
