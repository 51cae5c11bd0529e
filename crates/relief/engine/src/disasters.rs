//! Disaster declaration and lifecycle

use chrono::{DateTime, Utc};
use tracing::info;

use relief_store::{Record, RecordKey};
use relief_types::{
    ActorId, AdminAction, AdminActionKind, DisasterEvent, DisasterId, GeoLocation, ReliefError,
    ReliefResult,
};

use crate::{
    ensure_not_paused, load_disaster, load_ngo, load_platform, log_admin_action, validate_name,
    ReliefEngine,
};

fn validate_severity(severity: u8) -> ReliefResult<()> {
    if !(1..=10).contains(&severity) {
        return Err(ReliefError::InvalidSeverity(severity));
    }
    Ok(())
}

impl ReliefEngine {
    /// Declare a disaster. Allowed for the platform admin, managers, and
    /// operational verified NGOs; audited either way.
    pub fn declare_disaster(
        &mut self,
        actor: &ActorId,
        id: DisasterId,
        name: &str,
        severity: u8,
        location: GeoLocation,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        validate_name("disaster name", name)?;
        validate_severity(severity)?;
        location.validate()?;

        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        if !platform.is_admin_or_manager(actor) {
            let ngo = load_ngo(&tx, actor)
                .map_err(|_| ReliefError::UnauthorizedDisasterCreation(actor.clone()))?;
            if !ngo.is_operational() || !ngo.is_verified {
                return Err(ReliefError::UnauthorizedDisasterCreation(actor.clone()));
            }
        }

        let disaster = DisasterEvent {
            name: name.to_string(),
            severity,
            location,
            is_active: true,
            authority: actor.clone(),
            total_beneficiaries: 0,
            verified_beneficiaries: 0,
            total_aid_distributed: 0,
            declared_at: now,
            updated_at: now,
        };
        tx.create(RecordKey::Disaster(id.clone()), Record::Disaster(disaster))?;

        platform.total_disasters = platform.total_disasters.saturating_add(1);
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(AdminActionKind::CreateDisaster, id.to_string(), actor.clone(), now)
                .with_metadata(format!("severity={severity}")),
        )?;
        self.store.commit(tx)?;

        info!(disaster = %id, severity, actor = %actor, "disaster declared");
        Ok(())
    }

    /// Adjust a disaster's severity as the situation develops. Admin or
    /// the declaring authority; audited.
    pub fn update_disaster_severity(
        &mut self,
        actor: &ActorId,
        id: &DisasterId,
        severity: u8,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        validate_severity(severity)?;

        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let mut disaster = load_disaster(&tx, id)?;
        if !platform.is_admin(actor) && &disaster.authority != actor {
            return Err(ReliefError::UnauthorizedModification(actor.clone()));
        }
        if !disaster.is_active {
            return Err(ReliefError::DisasterNotActive(id.clone()));
        }

        let previous = disaster.severity;
        disaster.severity = severity;
        disaster.updated_at = now;
        tx.update(RecordKey::Disaster(id.clone()), Record::Disaster(disaster))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(AdminActionKind::UpdateDisaster, id.to_string(), actor.clone(), now)
                .with_metadata(format!("severity {previous} -> {severity}")),
        )?;
        self.store.commit(tx)?;

        info!(disaster = %id, previous, severity, "disaster severity updated");
        Ok(())
    }

    /// Close a disaster. No further registrations or pools under it;
    /// existing distributions remain claimable. Admin or the declaring
    /// authority; audited.
    pub fn close_disaster(
        &mut self,
        actor: &ActorId,
        id: &DisasterId,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;

        let mut disaster = load_disaster(&tx, id)?;
        if !platform.is_admin(actor) && &disaster.authority != actor {
            return Err(ReliefError::UnauthorizedModification(actor.clone()));
        }
        if !disaster.is_active {
            return Err(ReliefError::DisasterNotActive(id.clone()));
        }

        disaster.is_active = false;
        disaster.updated_at = now;
        tx.update(RecordKey::Disaster(id.clone()), Record::Disaster(disaster))?;
        log_admin_action(
            &mut tx,
            AdminAction::new(AdminActionKind::CloseDisaster, id.to_string(), actor.clone(), now),
        )?;
        self.store.commit(tx)?;

        info!(disaster = %id, actor = %actor, "disaster closed");
        Ok(())
    }
}
