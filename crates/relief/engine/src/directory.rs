//! NGO and field-agent directory
//!
//! Self-service registration for NGOs and management of their field
//! agents. None of these are privileged, so none of them write audit
//! entries; platform counters are kept in the same commit.

use chrono::{DateTime, Utc};
use tracing::info;

use relief_store::{Record, RecordKey};
use relief_types::{ActorId, FieldAgent, Ngo, ReliefError, ReliefResult};

use crate::{ensure_not_paused, load_agent, load_ngo, load_platform, validate_name, ReliefEngine};

impl ReliefEngine {
    /// Register a new NGO under its own authority. NGOs start unverified,
    /// active, and unblacklisted.
    pub fn register_ngo(
        &mut self,
        authority: ActorId,
        name: &str,
        registration_number: &str,
        contact_email: &str,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        validate_name("ngo name", name)?;
        validate_name("registration number", registration_number)?;
        validate_name("contact email", contact_email)?;

        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let ngo = Ngo {
            authority: authority.clone(),
            name: name.to_string(),
            registration_number: registration_number.to_string(),
            contact_email: contact_email.to_string(),
            is_verified: false,
            verified_by: None,
            verified_at: None,
            is_active: true,
            is_blacklisted: false,
            blacklist_reason: None,
            blacklisted_by: None,
            blacklisted_at: None,
            pools_created: 0,
            field_agents: 0,
            beneficiaries_registered: 0,
            registered_at: now,
            last_activity_at: now,
        };
        tx.create(RecordKey::Ngo(authority.clone()), Record::Ngo(ngo))?;

        platform.total_ngos = platform.total_ngos.saturating_add(1);
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        self.store.commit(tx)?;

        info!(ngo = %authority, name, "ngo registered");
        Ok(())
    }

    /// Update an NGO's contact details. Only its own authority may do so.
    pub fn update_ngo_contact(
        &mut self,
        authority: &ActorId,
        contact_email: &str,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        validate_name("contact email", contact_email)?;

        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let mut ngo = load_ngo(&tx, authority)?;
        if &ngo.authority != authority {
            return Err(ReliefError::UnauthorizedNgo(authority.clone()));
        }
        if !ngo.is_operational() {
            return Err(ReliefError::NgoNotActive(authority.clone()));
        }
        ngo.contact_email = contact_email.to_string();
        ngo.last_activity_at = now;
        tx.update(RecordKey::Ngo(authority.clone()), Record::Ngo(ngo))?;
        self.store.commit(tx)?;
        Ok(())
    }

    /// Register a field agent under an operational NGO. Agents start
    /// active.
    pub fn register_field_agent(
        &mut self,
        ngo_authority: &ActorId,
        agent_authority: ActorId,
        name: &str,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        validate_name("agent name", name)?;

        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let mut ngo = load_ngo(&tx, ngo_authority)?;
        if ngo.is_blacklisted {
            return Err(ReliefError::NgoBlacklisted(ngo_authority.clone()));
        }
        if !ngo.is_active {
            return Err(ReliefError::NgoNotActive(ngo_authority.clone()));
        }

        let agent = FieldAgent {
            authority: agent_authority.clone(),
            ngo: ngo_authority.clone(),
            name: name.to_string(),
            is_active: true,
            verifications: 0,
            registrations: 0,
            flags_raised: 0,
            notes: String::new(),
            registered_at: now,
            activated_at: Some(now),
            deactivated_at: None,
            last_activity_at: now,
        };
        tx.create(
            RecordKey::FieldAgent(agent_authority.clone()),
            Record::FieldAgent(agent),
        )?;

        ngo.field_agents = ngo.field_agents.saturating_add(1);
        ngo.last_activity_at = now;
        tx.update(RecordKey::Ngo(ngo_authority.clone()), Record::Ngo(ngo))?;

        platform.total_field_agents = platform.total_field_agents.saturating_add(1);
        platform.updated_at = now;
        tx.update(RecordKey::Platform, Record::Platform(platform))?;
        self.store.commit(tx)?;

        info!(ngo = %ngo_authority, agent = %agent_authority, "field agent registered");
        Ok(())
    }

    /// Activate or deactivate a field agent. Only the employing NGO's
    /// authority may do so.
    pub fn set_field_agent_status(
        &mut self,
        ngo_authority: &ActorId,
        agent_authority: &ActorId,
        active: bool,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let ngo = load_ngo(&tx, ngo_authority)?;
        if !ngo.is_operational() {
            return Err(ReliefError::NgoNotActive(ngo_authority.clone()));
        }

        let mut agent = load_agent(&tx, agent_authority)?;
        if &agent.ngo != ngo_authority {
            return Err(ReliefError::UnauthorizedModification(ngo_authority.clone()));
        }
        if agent.is_active == active {
            return Err(ReliefError::InvalidInput(format!(
                "agent is already {}",
                if active { "active" } else { "inactive" }
            )));
        }
        agent.is_active = active;
        if active {
            agent.activated_at = Some(now);
        } else {
            agent.deactivated_at = Some(now);
        }
        agent.last_activity_at = now;
        tx.update(
            RecordKey::FieldAgent(agent_authority.clone()),
            Record::FieldAgent(agent),
        )?;
        self.store.commit(tx)?;

        info!(ngo = %ngo_authority, agent = %agent_authority, active, "field agent status changed");
        Ok(())
    }

    /// Correct an agent's name or replace their operational notes. Only
    /// the employing NGO's authority may do so.
    pub fn update_field_agent(
        &mut self,
        ngo_authority: &ActorId,
        agent_authority: &ActorId,
        name: Option<&str>,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        if name.is_none() && notes.is_none() {
            return Err(ReliefError::InvalidInput(
                "update contains no fields".into(),
            ));
        }

        let mut tx = self.store.begin();
        let ngo = load_ngo(&tx, ngo_authority)?;
        if !ngo.is_operational() {
            return Err(ReliefError::NgoNotActive(ngo_authority.clone()));
        }
        let mut agent = load_agent(&tx, agent_authority)?;
        if &agent.ngo != ngo_authority {
            return Err(ReliefError::UnauthorizedModification(ngo_authority.clone()));
        }
        if let Some(name) = name {
            validate_name("agent name", name)?;
            agent.name = name.to_string();
        }
        if let Some(notes) = notes {
            crate::validate_text("notes", notes, relief_types::MAX_REASON_LEN)?;
            agent.notes = notes.to_string();
        }
        agent.last_activity_at = now;
        tx.update(
            RecordKey::FieldAgent(agent_authority.clone()),
            Record::FieldAgent(agent),
        )?;
        self.store.commit(tx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use chrono::Duration;

    #[test]
    fn register_ngo_updates_counters() {
        let mut engine = engine();
        engine
            .register_ngo(actor("ngo-1"), "Shelter Now", "REG-1", "a@b.org", now())
            .unwrap();

        let tx = engine.store().begin();
        let platform = crate::load_platform(&tx).unwrap();
        assert_eq!(platform.total_ngos, 1);

        let ngo = crate::load_ngo(&tx, &actor("ngo-1")).unwrap();
        assert!(ngo.is_active);
        assert!(!ngo.is_verified);
    }

    #[test]
    fn duplicate_ngo_registration_rejected() {
        let mut engine = engine();
        engine
            .register_ngo(actor("ngo-1"), "Shelter Now", "REG-1", "a@b.org", now())
            .unwrap();
        let err = engine
            .register_ngo(actor("ngo-1"), "Shelter Again", "REG-2", "a@b.org", now())
            .unwrap_err();
        assert!(matches!(err, ReliefError::RecordAlreadyExists(_)));
    }

    #[test]
    fn ngo_name_is_validated() {
        let mut engine = engine();
        let err = engine
            .register_ngo(actor("ngo-1"), "", "REG-1", "a@b.org", now())
            .unwrap_err();
        assert!(matches!(err, ReliefError::InvalidInput(_)));

        let long = "x".repeat(relief_types::MAX_NAME_LEN + 1);
        let err = engine
            .register_ngo(actor("ngo-1"), &long, "REG-1", "a@b.org", now())
            .unwrap_err();
        assert!(matches!(err, ReliefError::StringTooLong { .. }));
    }

    #[test]
    fn blacklisted_ngo_cannot_add_agents() {
        let mut engine = engine();
        engine
            .register_ngo(actor("ngo-1"), "Shelter Now", "REG-1", "a@b.org", now())
            .unwrap();
        engine
            .blacklist_ngo(&admin(), &actor("ngo-1"), "fraud", now() + Duration::seconds(1))
            .unwrap();

        let err = engine
            .register_field_agent(
                &actor("ngo-1"),
                actor("agent-1"),
                "Amina",
                now() + Duration::seconds(2),
            )
            .unwrap_err();
        assert!(matches!(err, ReliefError::NgoBlacklisted(_)));
    }

    #[test]
    fn agent_status_is_owner_gated() {
        let mut engine = engine();
        for ngo in ["ngo-1", "ngo-2"] {
            engine
                .register_ngo(actor(ngo), ngo, "REG-1", "a@b.org", now())
                .unwrap();
        }
        engine
            .register_field_agent(&actor("ngo-1"), actor("agent-1"), "Amina", now())
            .unwrap();

        let err = engine
            .set_field_agent_status(&actor("ngo-2"), &actor("agent-1"), false, now())
            .unwrap_err();
        assert!(matches!(err, ReliefError::UnauthorizedModification(_)));

        engine
            .set_field_agent_status(&actor("ngo-1"), &actor("agent-1"), false, now())
            .unwrap();
        let tx = engine.store().begin();
        let agent = crate::load_agent(&tx, &actor("agent-1")).unwrap();
        assert!(!agent.is_active);
        assert!(agent.deactivated_at.is_some());
    }

    #[test]
    fn agent_name_and_notes_are_owner_corrected() {
        let mut engine = engine();
        engine
            .register_ngo(actor("ngo-1"), "Shelter Now", "REG-1", "a@b.org", now())
            .unwrap();
        engine
            .register_field_agent(&actor("ngo-1"), actor("agent-1"), "Amina", now())
            .unwrap();

        let err = engine
            .update_field_agent(&actor("ngo-1"), &actor("agent-1"), None, None, now())
            .unwrap_err();
        assert!(matches!(err, ReliefError::InvalidInput(_)));

        engine
            .update_field_agent(
                &actor("ngo-1"),
                &actor("agent-1"),
                Some("Amina Rahman"),
                Some("covers the northern district"),
                now() + Duration::seconds(1),
            )
            .unwrap();

        let tx = engine.store().begin();
        let agent = crate::load_agent(&tx, &actor("agent-1")).unwrap();
        assert_eq!(agent.name, "Amina Rahman");
        assert_eq!(agent.notes, "covers the northern district");
    }

    #[test]
    fn paused_platform_blocks_registration() {
        let mut engine = engine();
        engine.pause_platform(&admin(), "maintenance", now()).unwrap();
        let err = engine
            .register_ngo(actor("ngo-1"), "Shelter Now", "REG-1", "a@b.org", now())
            .unwrap_err();
        assert!(matches!(err, ReliefError::PlatformPaused));
    }
}
