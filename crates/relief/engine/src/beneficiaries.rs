//! Beneficiary registration
//!
//! Field agents register beneficiaries under an active disaster. Phone
//! number and national id are unique per disaster, enforced through index
//! records created in the same commit as the beneficiary itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use relief_store::{Record, RecordKey};
use relief_types::{
    ActorId, Beneficiary, DisasterId, ReliefError, ReliefResult, VerificationStatus,
};

use crate::{
    ensure_not_paused, load_agent, load_beneficiary, load_disaster, load_ngo, load_platform,
    validate_name, ReliefEngine,
};

/// Registration details for one beneficiary, as collected in the field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BeneficiaryIntake {
    pub authority: ActorId,
    pub disaster: DisasterId,
    pub name: String,
    pub phone_number: String,
    pub national_id: String,
    pub family_size: u8,
    pub damage_severity: u8,
    pub age: u8,
}

/// Corrections to an intake record. Phone number and national id back the
/// per-disaster uniqueness indexes and stay fixed once registered.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BeneficiaryUpdate {
    pub name: Option<String>,
    pub family_size: Option<u8>,
    pub damage_severity: Option<u8>,
    pub age: Option<u8>,
}

impl BeneficiaryUpdate {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.family_size.is_none()
            && self.damage_severity.is_none()
            && self.age.is_none()
    }
}

impl BeneficiaryIntake {
    fn validate(&self) -> ReliefResult<()> {
        validate_name("beneficiary name", &self.name)?;
        validate_name("phone number", &self.phone_number)?;
        validate_name("national id", &self.national_id)?;
        if !(1..=50).contains(&self.family_size) {
            return Err(ReliefError::InvalidFamilySize(self.family_size));
        }
        if !(1..=10).contains(&self.damage_severity) {
            return Err(ReliefError::InvalidDamageSeverity(self.damage_severity));
        }
        if self.age > 150 {
            return Err(ReliefError::InvalidAge(self.age));
        }
        Ok(())
    }
}

impl ReliefEngine {
    /// Register a beneficiary through an active field agent. The new
    /// record starts in `Pending` and must collect threshold approvals
    /// before receiving funds.
    pub fn register_beneficiary(
        &mut self,
        agent_authority: &ActorId,
        intake: BeneficiaryIntake,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        intake.validate()?;

        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let mut agent = load_agent(&tx, agent_authority)?;
        if !agent.is_active {
            return Err(ReliefError::FieldAgentNotActive(agent_authority.clone()));
        }
        let mut ngo = load_ngo(&tx, &agent.ngo)?;
        if ngo.is_blacklisted {
            return Err(ReliefError::NgoBlacklisted(ngo.authority.clone()));
        }
        if !ngo.is_active {
            return Err(ReliefError::NgoNotActive(ngo.authority.clone()));
        }
        if ngo.beneficiaries_registered >= platform.beneficiary_limit(ngo.is_verified) {
            return Err(ReliefError::BeneficiaryLimitReached(
                platform.beneficiary_limit(ngo.is_verified),
            ));
        }

        let mut disaster = load_disaster(&tx, &intake.disaster)?;
        if !disaster.is_active {
            return Err(ReliefError::DisasterNotActive(intake.disaster.clone()));
        }

        let phone_key =
            RecordKey::PhoneIndex(intake.disaster.clone(), intake.phone_number.clone());
        if tx.exists(&phone_key) {
            return Err(ReliefError::DuplicatePhoneNumber(intake.phone_number));
        }
        let nid_key =
            RecordKey::NationalIdIndex(intake.disaster.clone(), intake.national_id.clone());
        if tx.exists(&nid_key) {
            return Err(ReliefError::DuplicateNationalId(intake.national_id));
        }

        let beneficiary = Beneficiary {
            authority: intake.authority.clone(),
            disaster: intake.disaster.clone(),
            name: intake.name,
            phone_number: intake.phone_number,
            national_id: intake.national_id,
            family_size: intake.family_size,
            damage_severity: intake.damage_severity,
            age: intake.age,
            registered_by: agent_authority.clone(),
            status: VerificationStatus::Pending,
            approvals: Vec::new(),
            verified_at: None,
            flagged_reason: None,
            flagged_by: None,
            flagged_at: None,
            review_notes: None,
            total_received: 0,
            registered_at: now,
        };
        tx.create(
            RecordKey::Beneficiary(intake.authority.clone(), intake.disaster.clone()),
            Record::Beneficiary(beneficiary),
        )?;
        tx.create(phone_key, Record::PhoneIndex(intake.authority.clone()))?;
        tx.create(nid_key, Record::NationalIdIndex(intake.authority.clone()))?;

        agent.registrations = agent.registrations.saturating_add(1);
        agent.last_activity_at = now;
        tx.update(
            RecordKey::FieldAgent(agent_authority.clone()),
            Record::FieldAgent(agent),
        )?;

        ngo.beneficiaries_registered = ngo.beneficiaries_registered.saturating_add(1);
        ngo.last_activity_at = now;
        let ngo_key = RecordKey::Ngo(ngo.authority.clone());
        tx.update(ngo_key, Record::Ngo(ngo))?;

        disaster.total_beneficiaries = disaster.total_beneficiaries.saturating_add(1);
        disaster.updated_at = now;
        tx.update(
            RecordKey::Disaster(intake.disaster.clone()),
            Record::Disaster(disaster),
        )?;

        platform.total_beneficiaries = platform.total_beneficiaries.saturating_add(1);
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        self.store.commit(tx)?;

        info!(
            beneficiary = %intake.authority,
            disaster = %intake.disaster,
            agent = %agent_authority,
            "beneficiary registered"
        );
        Ok(())
    }

    /// Correct an intake record. Only the agent who registered the
    /// beneficiary may update it, and a flagged record is frozen until
    /// a reviewer resolves the flag.
    pub fn update_beneficiary(
        &mut self,
        agent_authority: &ActorId,
        beneficiary: &ActorId,
        disaster: &DisasterId,
        update: BeneficiaryUpdate,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        if update.is_empty() {
            return Err(ReliefError::InvalidInput(
                "update contains no fields".into(),
            ));
        }

        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let mut agent = load_agent(&tx, agent_authority)?;
        if !agent.is_active {
            return Err(ReliefError::FieldAgentNotActive(agent_authority.clone()));
        }

        let mut record = load_beneficiary(&tx, beneficiary, disaster)?;
        if &record.registered_by != agent_authority {
            return Err(ReliefError::UnauthorizedModification(
                agent_authority.clone(),
            ));
        }
        if record.status == VerificationStatus::Flagged {
            return Err(ReliefError::BeneficiaryFlagged(beneficiary.clone()));
        }

        if let Some(name) = update.name {
            validate_name("beneficiary name", &name)?;
            record.name = name;
        }
        if let Some(family_size) = update.family_size {
            if !(1..=50).contains(&family_size) {
                return Err(ReliefError::InvalidFamilySize(family_size));
            }
            record.family_size = family_size;
        }
        if let Some(damage_severity) = update.damage_severity {
            if !(1..=10).contains(&damage_severity) {
                return Err(ReliefError::InvalidDamageSeverity(damage_severity));
            }
            record.damage_severity = damage_severity;
        }
        if let Some(age) = update.age {
            if age > 150 {
                return Err(ReliefError::InvalidAge(age));
            }
            record.age = age;
        }

        tx.update(
            RecordKey::Beneficiary(beneficiary.clone(), disaster.clone()),
            Record::Beneficiary(record),
        )?;

        agent.last_activity_at = now;
        tx.update(
            RecordKey::FieldAgent(agent_authority.clone()),
            Record::FieldAgent(agent),
        )?;
        self.store.commit(tx)?;

        info!(
            beneficiary = %beneficiary,
            disaster = %disaster,
            agent = %agent_authority,
            "beneficiary record updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use chrono::Duration;

    #[test]
    fn registration_creates_pending_record_and_counters() {
        let mut engine = engine_with_ngo();
        engine
            .register_beneficiary(&actor("agent-1"), intake("ben-1", "555-0001", "nid-1"), now())
            .unwrap();

        let tx = engine.store().begin();
        let b = crate::load_beneficiary(&tx, &actor("ben-1"), &disaster_id()).unwrap();
        assert_eq!(b.status, VerificationStatus::Pending);
        assert!(b.approvals.is_empty());

        assert_eq!(crate::load_platform(&tx).unwrap().total_beneficiaries, 1);
        assert_eq!(
            crate::load_disaster(&tx, &disaster_id()).unwrap().total_beneficiaries,
            1
        );
        assert_eq!(crate::load_ngo(&tx, &actor("ngo-1")).unwrap().beneficiaries_registered, 1);
        assert_eq!(crate::load_agent(&tx, &actor("agent-1")).unwrap().registrations, 1);
    }

    #[test]
    fn duplicate_phone_rejected_per_disaster() {
        let mut engine = engine_with_ngo();
        engine
            .register_beneficiary(&actor("agent-1"), intake("ben-1", "555-0001", "nid-1"), now())
            .unwrap();
        let err = engine
            .register_beneficiary(
                &actor("agent-1"),
                intake("ben-2", "555-0001", "nid-2"),
                now() + Duration::seconds(1),
            )
            .unwrap_err();
        assert!(matches!(err, ReliefError::DuplicatePhoneNumber(_)));
    }

    #[test]
    fn duplicate_national_id_rejected_per_disaster() {
        let mut engine = engine_with_ngo();
        engine
            .register_beneficiary(&actor("agent-1"), intake("ben-1", "555-0001", "nid-1"), now())
            .unwrap();
        let err = engine
            .register_beneficiary(
                &actor("agent-1"),
                intake("ben-2", "555-0002", "nid-1"),
                now() + Duration::seconds(1),
            )
            .unwrap_err();
        assert!(matches!(err, ReliefError::DuplicateNationalId(_)));
    }

    #[test]
    fn demographics_are_validated() {
        let mut engine = engine_with_ngo();

        let mut bad = intake("ben-1", "555-0001", "nid-1");
        bad.family_size = 0;
        let err = engine
            .register_beneficiary(&actor("agent-1"), bad, now())
            .unwrap_err();
        assert!(matches!(err, ReliefError::InvalidFamilySize(0)));

        let mut bad = intake("ben-1", "555-0001", "nid-1");
        bad.damage_severity = 11;
        let err = engine
            .register_beneficiary(&actor("agent-1"), bad, now())
            .unwrap_err();
        assert!(matches!(err, ReliefError::InvalidDamageSeverity(11)));

        let mut bad = intake("ben-1", "555-0001", "nid-1");
        bad.age = 151;
        let err = engine
            .register_beneficiary(&actor("agent-1"), bad, now())
            .unwrap_err();
        assert!(matches!(err, ReliefError::InvalidAge(151)));
    }

    #[test]
    fn intake_form_parses_from_json() {
        let mut engine = engine_with_ngo();
        let form: BeneficiaryIntake = serde_json::from_str(
            r#"{
                "authority": "ben-1",
                "disaster": "flood-2024",
                "name": "Rahim Uddin",
                "phone_number": "555-0001",
                "national_id": "nid-1",
                "family_size": 6,
                "damage_severity": 8,
                "age": 52
            }"#,
        )
        .unwrap();
        engine.register_beneficiary(&actor("agent-1"), form, now()).unwrap();

        let tx = engine.store().begin();
        let b = crate::load_beneficiary(&tx, &actor("ben-1"), &disaster_id()).unwrap();
        assert_eq!(b.name, "Rahim Uddin");
        assert_eq!(b.family_size, 6);
    }

    #[test]
    fn inactive_agent_cannot_register() {
        let mut engine = engine_with_ngo();
        engine
            .set_field_agent_status(&actor("ngo-1"), &actor("agent-1"), false, now())
            .unwrap();
        let err = engine
            .register_beneficiary(
                &actor("agent-1"),
                intake("ben-1", "555-0001", "nid-1"),
                now() + Duration::seconds(1),
            )
            .unwrap_err();
        assert!(matches!(err, ReliefError::FieldAgentNotActive(_)));
    }

    #[test]
    fn unverified_ngo_hits_its_limit() {
        let mut engine = engine_with_ngo();
        // Tighten the limit so the test stays small.
        engine
            .update_platform_config(
                &admin(),
                crate::ConfigUpdate {
                    unverified_beneficiary_limit: Some(2),
                    ..Default::default()
                },
                now() + Duration::seconds(20),
            )
            .unwrap();

        for i in 0..2 {
            engine
                .register_beneficiary(
                    &actor("agent-1"),
                    intake(&format!("ben-{i}"), &format!("555-{i}"), &format!("nid-{i}")),
                    now() + Duration::seconds(i),
                )
                .unwrap();
        }
        let err = engine
            .register_beneficiary(
                &actor("agent-1"),
                intake("ben-over", "555-over", "nid-over"),
                now() + Duration::seconds(10),
            )
            .unwrap_err();
        assert!(matches!(err, ReliefError::BeneficiaryLimitReached(2)));

        // Verification lifts the NGO onto the higher limit.
        engine
            .verify_ngo(&admin(), &actor("ngo-1"), now() + Duration::seconds(11))
            .unwrap();
        engine
            .register_beneficiary(
                &actor("agent-1"),
                intake("ben-over", "555-over", "nid-over"),
                now() + Duration::seconds(12),
            )
            .unwrap();
    }

    #[test]
    fn registering_agent_corrects_the_record() {
        let mut engine = engine_with_ngo();
        engine
            .register_beneficiary(&actor("agent-1"), intake("ben-1", "555-0001", "nid-1"), now())
            .unwrap();
        engine
            .update_beneficiary(
                &actor("agent-1"),
                &actor("ben-1"),
                &disaster_id(),
                BeneficiaryUpdate {
                    name: Some("Corrected Name".into()),
                    family_size: Some(9),
                    ..Default::default()
                },
                now() + Duration::seconds(1),
            )
            .unwrap();

        let tx = engine.store().begin();
        let b = crate::load_beneficiary(&tx, &actor("ben-1"), &disaster_id()).unwrap();
        assert_eq!(b.name, "Corrected Name");
        assert_eq!(b.family_size, 9);
        // Untouched fields keep their intake values.
        assert_eq!(b.damage_severity, 6);
        assert_eq!(b.age, 35);
    }

    #[test]
    fn only_the_registering_agent_may_update() {
        let mut engine = engine_with_ngo();
        engine
            .register_beneficiary(&actor("agent-1"), intake("ben-1", "555-0001", "nid-1"), now())
            .unwrap();
        engine
            .register_field_agent(&actor("ngo-1"), actor("agent-2"), "Agent Two", now())
            .unwrap();
        let err = engine
            .update_beneficiary(
                &actor("agent-2"),
                &actor("ben-1"),
                &disaster_id(),
                BeneficiaryUpdate {
                    age: Some(41),
                    ..Default::default()
                },
                now() + Duration::seconds(1),
            )
            .unwrap_err();
        assert!(matches!(err, ReliefError::UnauthorizedModification(_)));
    }

    #[test]
    fn flagged_record_is_frozen_until_reviewed() {
        let mut engine = engine_with_ngo();
        engine
            .register_beneficiary(&actor("agent-1"), intake("ben-1", "555-0001", "nid-1"), now())
            .unwrap();
        engine
            .flag_beneficiary(
                &actor("agent-1"),
                &actor("ben-1"),
                &disaster_id(),
                "id mismatch",
                now() + Duration::seconds(1),
            )
            .unwrap();
        let err = engine
            .update_beneficiary(
                &actor("agent-1"),
                &actor("ben-1"),
                &disaster_id(),
                BeneficiaryUpdate {
                    name: Some("New Name".into()),
                    ..Default::default()
                },
                now() + Duration::seconds(2),
            )
            .unwrap_err();
        assert!(matches!(err, ReliefError::BeneficiaryFlagged(_)));
    }

    #[test]
    fn empty_and_out_of_range_updates_rejected() {
        let mut engine = engine_with_ngo();
        engine
            .register_beneficiary(&actor("agent-1"), intake("ben-1", "555-0001", "nid-1"), now())
            .unwrap();

        let err = engine
            .update_beneficiary(
                &actor("agent-1"),
                &actor("ben-1"),
                &disaster_id(),
                BeneficiaryUpdate::default(),
                now() + Duration::seconds(1),
            )
            .unwrap_err();
        assert!(matches!(err, ReliefError::InvalidInput(_)));

        let err = engine
            .update_beneficiary(
                &actor("agent-1"),
                &actor("ben-1"),
                &disaster_id(),
                BeneficiaryUpdate {
                    damage_severity: Some(11),
                    ..Default::default()
                },
                now() + Duration::seconds(1),
            )
            .unwrap_err();
        assert!(matches!(err, ReliefError::InvalidDamageSeverity(11)));
    }

    #[test]
    fn closed_disaster_rejects_registration() {
        let mut engine = engine_with_ngo();
        engine
            .close_disaster(&admin(), &disaster_id(), now() + Duration::seconds(1))
            .unwrap();
        let err = engine
            .register_beneficiary(
                &actor("agent-1"),
                intake("ben-1", "555-0001", "nid-1"),
                now() + Duration::seconds(1),
            )
            .unwrap_err();
        assert!(matches!(err, ReliefError::DisasterNotActive(_)));
    }
}
