//! Governance: managers, two-phase admin transfer, NGO oversight
//!
//! Every operation here is privileged and appends an audit entry in the
//! same commit as the mutation it records.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use relief_store::{Record, RecordKey, Transaction};
use relief_types::{
    ActorId, AdminAction, AdminActionKind, Ngo, PlatformConfig, ReliefError, ReliefResult,
    MAX_BATCH_SIZE, MAX_MANAGERS, MAX_REASON_LEN,
};

use crate::{
    ensure_not_paused, load_ngo, load_platform, log_admin_action, validate_text, ReliefEngine,
};

fn ensure_admin(platform: &PlatformConfig, actor: &ActorId) -> ReliefResult<()> {
    if !platform.is_admin(actor) {
        return Err(ReliefError::UnauthorizedAdmin(actor.clone()));
    }
    Ok(())
}

fn ensure_admin_or_manager(platform: &PlatformConfig, actor: &ActorId) -> ReliefResult<()> {
    if !platform.is_admin_or_manager(actor) {
        return Err(ReliefError::UnauthorizedAdminOrManager(actor.clone()));
    }
    Ok(())
}

/// Whether a pending transfer initiated at `initiated_at` is still live.
fn transfer_live(platform: &PlatformConfig, initiated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now <= initiated_at + platform.transfer_timeout()
}

impl ReliefEngine {
    /// Appoint a manager. Managers can verify NGOs and review flagged
    /// beneficiaries but cannot change configuration or roles.
    pub fn add_manager(
        &mut self,
        actor: &ActorId,
        manager: ActorId,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        ensure_admin(&platform, actor)?;
        if manager == platform.admin {
            return Err(ReliefError::CannotAddAdminAsManager);
        }
        if platform.is_manager(&manager) {
            return Err(ReliefError::ManagerAlreadyExists(manager));
        }
        if platform.managers.len() >= MAX_MANAGERS {
            return Err(ReliefError::MaxManagersReached(MAX_MANAGERS));
        }

        platform.managers.push(manager.clone());
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(AdminActionKind::AddManager, manager.to_string(), actor.clone(), now),
        )?;
        self.store.commit(tx)?;

        info!(actor = %actor, manager = %manager, "manager added");
        Ok(())
    }

    pub fn remove_manager(
        &mut self,
        actor: &ActorId,
        manager: &ActorId,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        ensure_admin(&platform, actor)?;
        let Some(pos) = platform.managers.iter().position(|m| m == manager) else {
            return Err(ReliefError::ManagerNotFound(manager.clone()));
        };

        platform.managers.remove(pos);
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(
                AdminActionKind::RemoveManager,
                manager.to_string(),
                actor.clone(),
                now,
            ),
        )?;
        self.store.commit(tx)?;

        info!(actor = %actor, manager = %manager, "manager removed");
        Ok(())
    }

    /// Begin a two-phase admin handover. An expired pending transfer is
    /// treated as vacated and may be re-initiated.
    pub fn initiate_admin_transfer(
        &mut self,
        actor: &ActorId,
        new_admin: ActorId,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        ensure_admin(&platform, actor)?;
        if new_admin == platform.admin {
            return Err(ReliefError::InvalidInput(
                "new admin must differ from the current admin".into(),
            ));
        }
        if let (Some(_), Some(initiated_at)) =
            (&platform.pending_admin, platform.transfer_initiated_at)
        {
            if transfer_live(&platform, initiated_at, now) {
                return Err(ReliefError::TransferAlreadyPending);
            }
        }

        platform.pending_admin = Some(new_admin.clone());
        platform.transfer_initiated_at = Some(now);
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(
                AdminActionKind::InitiateAdminTransfer,
                new_admin.to_string(),
                actor.clone(),
                now,
            ),
        )?;
        self.store.commit(tx)?;

        info!(actor = %actor, new_admin = %new_admin, "admin transfer initiated");
        Ok(())
    }

    /// Complete the handover. Only the pending admin may accept, and only
    /// within the transfer timeout.
    pub fn accept_admin_transfer(&mut self, actor: &ActorId, now: DateTime<Utc>) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        let (Some(pending), Some(initiated_at)) = (
            platform.pending_admin.clone(),
            platform.transfer_initiated_at,
        ) else {
            return Err(ReliefError::NoTransferPending);
        };
        if &pending != actor {
            return Err(ReliefError::NotPendingAdmin(actor.clone()));
        }
        if !transfer_live(&platform, initiated_at, now) {
            return Err(ReliefError::TransferExpired);
        }

        let previous = platform.admin.clone();
        platform.admin = pending;
        // The new admin may have been a manager; the two roles are disjoint.
        platform.managers.retain(|m| m != actor);
        platform.pending_admin = None;
        platform.transfer_initiated_at = None;
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(
                AdminActionKind::AcceptAdminTransfer,
                previous.to_string(),
                actor.clone(),
                now,
            ),
        )?;
        self.store.commit(tx)?;

        info!(previous = %previous, new_admin = %actor, "admin transfer accepted");
        Ok(())
    }

    pub fn cancel_admin_transfer(&mut self, actor: &ActorId, now: DateTime<Utc>) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        ensure_admin(&platform, actor)?;
        let Some(pending) = platform.pending_admin.take() else {
            return Err(ReliefError::NoTransferPending);
        };

        platform.transfer_initiated_at = None;
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(
                AdminActionKind::CancelAdminTransfer,
                pending.to_string(),
                actor.clone(),
                now,
            ),
        )?;
        self.store.commit(tx)?;

        info!(actor = %actor, cancelled = %pending, "admin transfer cancelled");
        Ok(())
    }

    /// Mark an NGO as verified, unlocking the higher limits and the lower
    /// fee tier. Admin or manager; audited.
    pub fn verify_ngo(
        &mut self,
        actor: &ActorId,
        ngo: &ActorId,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_admin_or_manager(&platform, actor)?;
        ensure_not_paused(&platform)?;
        verify_ngo_in_tx(&mut tx, actor, ngo, now)?;
        log_admin_action(
            &mut tx,
            AdminAction::new(AdminActionKind::VerifyNgo, ngo.to_string(), actor.clone(), now),
        )?;
        self.store.commit(tx)?;

        info!(actor = %actor, ngo = %ngo, "ngo verified");
        Ok(())
    }

    /// Verify up to `MAX_BATCH_SIZE` NGOs in one call. Items validate and
    /// commit independently; the outcome of each is returned in order. One
    /// audit entry covers the batch.
    pub fn batch_verify_ngos(
        &mut self,
        actor: &ActorId,
        ngos: &[ActorId],
        now: DateTime<Utc>,
    ) -> ReliefResult<Vec<(ActorId, ReliefResult<()>)>> {
        if ngos.len() > MAX_BATCH_SIZE {
            return Err(ReliefError::BatchSizeTooLarge {
                len: ngos.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        {
            let tx = self.store.begin();
            let platform = load_platform(&tx)?;
            ensure_admin_or_manager(&platform, actor)?;
            ensure_not_paused(&platform)?;
        }

        let mut outcomes = Vec::with_capacity(ngos.len());
        let mut verified = Vec::new();
        for ngo in ngos {
            let mut tx = self.store.begin();
            let outcome = verify_ngo_in_tx(&mut tx, actor, ngo, now)
                .and_then(|()| self.store.commit(tx));
            if outcome.is_ok() {
                verified.push(ngo.to_string());
            }
            outcomes.push((ngo.clone(), outcome));
        }

        let mut tx = self.store.begin();
        log_admin_action(
            &mut tx,
            AdminAction::new(AdminActionKind::VerifyNgo, "batch", actor.clone(), now)
                .with_metadata(format!(
                    "requested={} verified=[{}]",
                    ngos.len(),
                    verified.join(",")
                )),
        )?;
        self.store.commit(tx)?;

        info!(actor = %actor, requested = ngos.len(), verified = verified.len(), "batch ngo verification");
        Ok(outcomes)
    }

    /// Revoke an NGO's verified status. Admin or manager; reason required.
    pub fn revoke_ngo_verification(
        &mut self,
        actor: &ActorId,
        ngo: &ActorId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_admin_or_manager(&platform, actor)?;
        if reason.trim().is_empty() {
            return Err(ReliefError::ReasonRequired);
        }
        validate_text("reason", reason, MAX_REASON_LEN)?;

        let mut record = load_ngo(&tx, ngo)?;
        if !record.is_verified {
            return Err(ReliefError::NgoNotVerified(ngo.clone()));
        }
        record.is_verified = false;
        record.verified_by = None;
        record.verified_at = None;
        record.last_activity_at = now;
        tx.update(RecordKey::Ngo(ngo.clone()), Record::Ngo(record))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(
                AdminActionKind::RevokeNgoVerification,
                ngo.to_string(),
                actor.clone(),
                now,
            )
            .with_reason(reason),
        )?;
        self.store.commit(tx)?;

        warn!(actor = %actor, ngo = %ngo, "ngo verification revoked");
        Ok(())
    }

    /// Blacklist an NGO, revoking its verification and halting all of its
    /// operations. Admin only; reason required.
    pub fn blacklist_ngo(
        &mut self,
        actor: &ActorId,
        ngo: &ActorId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_admin(&platform, actor)?;
        if reason.trim().is_empty() {
            return Err(ReliefError::ReasonRequired);
        }
        validate_text("reason", reason, MAX_REASON_LEN)?;

        let mut record = load_ngo(&tx, ngo)?;
        if record.is_blacklisted {
            return Err(ReliefError::NgoBlacklisted(ngo.clone()));
        }
        record.is_blacklisted = true;
        record.blacklist_reason = Some(reason.to_string());
        record.blacklisted_by = Some(actor.clone());
        record.blacklisted_at = Some(now);
        // Quarantine: the NGO stays inactive even after the blacklist is
        // lifted, until an explicit reactivation.
        record.is_active = false;
        record.is_verified = false;
        record.verified_by = None;
        record.verified_at = None;
        record.last_activity_at = now;
        tx.update(RecordKey::Ngo(ngo.clone()), Record::Ngo(record))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(AdminActionKind::BlacklistNgo, ngo.to_string(), actor.clone(), now)
                .with_reason(reason),
        )?;
        self.store.commit(tx)?;

        warn!(actor = %actor, ngo = %ngo, reason, "ngo blacklisted");
        Ok(())
    }

    /// Lift a blacklist. Verification is not restored; the NGO must be
    /// re-verified separately. Admin only.
    pub fn remove_blacklist(
        &mut self,
        actor: &ActorId,
        ngo: &ActorId,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_admin(&platform, actor)?;

        let mut record = load_ngo(&tx, ngo)?;
        if !record.is_blacklisted {
            return Err(ReliefError::NgoNotBlacklisted(ngo.clone()));
        }
        record.is_blacklisted = false;
        record.blacklist_reason = None;
        record.blacklisted_by = None;
        record.blacklisted_at = None;
        record.last_activity_at = now;
        tx.update(RecordKey::Ngo(ngo.clone()), Record::Ngo(record))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(
                AdminActionKind::RemoveBlacklist,
                ngo.to_string(),
                actor.clone(),
                now,
            ),
        )?;
        self.store.commit(tx)?;

        info!(actor = %actor, ngo = %ngo, "ngo blacklist removed");
        Ok(())
    }

    /// Toggle an NGO's active flag. Admin or manager; audited.
    pub fn set_ngo_active(
        &mut self,
        actor: &ActorId,
        ngo: &ActorId,
        active: bool,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_admin_or_manager(&platform, actor)?;
        set_ngo_status_in_tx(&mut tx, ngo, active, now)?;
        log_admin_action(
            &mut tx,
            AdminAction::new(status_kind(active), ngo.to_string(), actor.clone(), now),
        )?;
        self.store.commit(tx)?;

        info!(actor = %actor, ngo = %ngo, active, "ngo active flag changed");
        Ok(())
    }

    /// Set the active flag on up to `MAX_BATCH_SIZE` NGOs in one call.
    /// Items validate and commit independently; the outcome of each is
    /// returned in order. One audit entry covers the batch.
    pub fn batch_update_ngo_status(
        &mut self,
        actor: &ActorId,
        ngos: &[ActorId],
        active: bool,
        now: DateTime<Utc>,
    ) -> ReliefResult<Vec<(ActorId, ReliefResult<()>)>> {
        if ngos.len() > MAX_BATCH_SIZE {
            return Err(ReliefError::BatchSizeTooLarge {
                len: ngos.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        {
            let tx = self.store.begin();
            let platform = load_platform(&tx)?;
            ensure_admin_or_manager(&platform, actor)?;
            ensure_not_paused(&platform)?;
        }

        let mut outcomes = Vec::with_capacity(ngos.len());
        let mut updated = Vec::new();
        for ngo in ngos {
            let mut tx = self.store.begin();
            let outcome = set_ngo_status_in_tx(&mut tx, ngo, active, now)
                .and_then(|()| self.store.commit(tx));
            if outcome.is_ok() {
                updated.push(ngo.to_string());
            }
            outcomes.push((ngo.clone(), outcome));
        }

        let mut tx = self.store.begin();
        log_admin_action(
            &mut tx,
            AdminAction::new(status_kind(active), "batch", actor.clone(), now).with_metadata(
                format!("requested={} updated=[{}]", ngos.len(), updated.join(",")),
            ),
        )?;
        self.store.commit(tx)?;

        info!(actor = %actor, requested = ngos.len(), updated = updated.len(), active, "batch ngo status update");
        Ok(outcomes)
    }
}

fn status_kind(active: bool) -> AdminActionKind {
    if active {
        AdminActionKind::ActivateNgo
    } else {
        AdminActionKind::DeactivateNgo
    }
}

/// Shared status step used by both the single and the batch path. The
/// caller has already authorized the actor.
fn set_ngo_status_in_tx(
    tx: &mut Transaction,
    ngo: &ActorId,
    active: bool,
    now: DateTime<Utc>,
) -> ReliefResult<()> {
    let mut record = load_ngo(tx, ngo)?;
    if record.is_active == active {
        return Err(ReliefError::InvalidInput(format!(
            "ngo is already {}",
            if active { "active" } else { "inactive" }
        )));
    }
    record.is_active = active;
    record.last_activity_at = now;
    tx.update(RecordKey::Ngo(ngo.clone()), Record::Ngo(record))
}

/// Shared verify step used by both the single and the batch path. The
/// caller has already authorized the actor.
fn verify_ngo_in_tx(
    tx: &mut Transaction,
    actor: &ActorId,
    ngo: &ActorId,
    now: DateTime<Utc>,
) -> ReliefResult<()> {
    let mut record: Ngo = load_ngo(tx, ngo)?;
    if record.is_blacklisted {
        return Err(ReliefError::NgoBlacklisted(ngo.clone()));
    }
    if !record.is_active {
        return Err(ReliefError::NgoNotActive(ngo.clone()));
    }
    if record.is_verified {
        return Err(ReliefError::NgoAlreadyVerified(ngo.clone()));
    }
    record.is_verified = true;
    record.verified_by = Some(actor.clone());
    record.verified_at = Some(now);
    record.last_activity_at = now;
    tx.update(RecordKey::Ngo(ngo.clone()), Record::Ngo(record))
}
