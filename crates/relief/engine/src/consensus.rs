//! Multi-party beneficiary verification
//!
//! Distinct active field agents submit approvals; the approval that reaches
//! the platform threshold flips the beneficiary to `Verified` in the same
//! commit. Agents can instead flag a beneficiary for admin review, which
//! either returns them to `Pending` or rejects them for good.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use relief_store::{Record, RecordKey};
use relief_types::{
    ActorId, AdminAction, AdminActionKind, DisasterId, ReliefError, ReliefResult,
    VerificationStatus, MAX_REASON_LEN,
};

use crate::{
    ensure_not_paused, load_agent, load_beneficiary, load_disaster, load_ngo, load_platform,
    log_admin_action, validate_text, ReliefEngine,
};

/// Result of one approval submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Approval recorded; more are needed.
    Recorded { approvals: u8, threshold: u8 },
    /// This approval met the threshold and the beneficiary is now verified.
    Verified { approvals: u8 },
}

impl ReliefEngine {
    /// Submit one verification approval from an active field agent.
    pub fn submit_approval(
        &mut self,
        agent_authority: &ActorId,
        beneficiary: &ActorId,
        disaster: &DisasterId,
        now: DateTime<Utc>,
    ) -> ReliefResult<ApprovalOutcome> {
        let mut tx = self.store.begin();
        let mut platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let mut agent = load_agent(&tx, agent_authority)?;
        if !agent.is_active {
            return Err(ReliefError::FieldAgentNotActive(agent_authority.clone()));
        }
        let ngo = load_ngo(&tx, &agent.ngo)?;
        if !ngo.is_operational() {
            return Err(ReliefError::NgoNotActive(ngo.authority.clone()));
        }

        let mut event = load_disaster(&tx, disaster)?;
        if !event.is_active {
            return Err(ReliefError::DisasterNotActive(disaster.clone()));
        }

        let mut record = load_beneficiary(&tx, beneficiary, disaster)?;
        match record.status {
            VerificationStatus::Verified => {
                return Err(ReliefError::AlreadyVerified(beneficiary.clone()))
            }
            VerificationStatus::Flagged => {
                return Err(ReliefError::BeneficiaryFlagged(beneficiary.clone()))
            }
            VerificationStatus::Rejected => {
                return Err(ReliefError::BeneficiaryRejected(beneficiary.clone()))
            }
            VerificationStatus::Pending => {}
        }
        if record.has_approved(agent_authority) {
            return Err(ReliefError::DuplicateApproval(agent_authority.clone()));
        }
        if record.approvals.len() >= usize::from(platform.max_verifiers) {
            return Err(ReliefError::MaxVerifiersReached(platform.max_verifiers));
        }

        record.approvals.push(agent_authority.clone());
        let approvals = record.approvals.len() as u8;
        let threshold = platform.verification_threshold;
        let outcome = if approvals >= threshold {
            record.status = VerificationStatus::Verified;
            record.verified_at = Some(now);

            event.verified_beneficiaries = event.verified_beneficiaries.saturating_add(1);
            event.updated_at = now;
            tx.update(RecordKey::Disaster(disaster.clone()), Record::Disaster(event))?;

            platform.total_verified_beneficiaries =
                platform.total_verified_beneficiaries.saturating_add(1);
            platform.updated_at = now;
            tx.update(RecordKey::Platform, Record::Platform(platform))?;

            ApprovalOutcome::Verified { approvals }
        } else {
            ApprovalOutcome::Recorded { approvals, threshold }
        };
        tx.update(
            RecordKey::Beneficiary(beneficiary.clone(), disaster.clone()),
            Record::Beneficiary(record),
        )?;

        agent.verifications = agent.verifications.saturating_add(1);
        agent.last_activity_at = now;
        tx.update(
            RecordKey::FieldAgent(agent_authority.clone()),
            Record::FieldAgent(agent),
        )?;
        self.store.commit(tx)?;

        match outcome {
            ApprovalOutcome::Verified { approvals } => {
                info!(beneficiary = %beneficiary, approvals, "beneficiary verified");
            }
            ApprovalOutcome::Recorded { approvals, threshold } => {
                info!(beneficiary = %beneficiary, approvals, threshold, "approval recorded");
            }
        }
        Ok(outcome)
    }

    /// Flag a pending beneficiary for admin review. The flag freezes the
    /// approval process until reviewed.
    pub fn flag_beneficiary(
        &mut self,
        agent_authority: &ActorId,
        beneficiary: &ActorId,
        disaster: &DisasterId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        if reason.trim().is_empty() {
            return Err(ReliefError::ReasonRequired);
        }
        validate_text("reason", reason, MAX_REASON_LEN)?;

        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        ensure_not_paused(&platform)?;

        let mut agent = load_agent(&tx, agent_authority)?;
        if !agent.is_active {
            return Err(ReliefError::FieldAgentNotActive(agent_authority.clone()));
        }
        let ngo = load_ngo(&tx, &agent.ngo)?;
        if !ngo.is_operational() {
            return Err(ReliefError::NgoNotActive(ngo.authority.clone()));
        }

        let mut record = load_beneficiary(&tx, beneficiary, disaster)?;
        match record.status {
            VerificationStatus::Verified => {
                return Err(ReliefError::AlreadyVerified(beneficiary.clone()))
            }
            VerificationStatus::Flagged => {
                return Err(ReliefError::BeneficiaryFlagged(beneficiary.clone()))
            }
            VerificationStatus::Rejected => {
                return Err(ReliefError::BeneficiaryRejected(beneficiary.clone()))
            }
            VerificationStatus::Pending => {}
        }

        record.status = VerificationStatus::Flagged;
        record.flagged_reason = Some(reason.to_string());
        record.flagged_by = Some(agent_authority.clone());
        record.flagged_at = Some(now);
        tx.update(
            RecordKey::Beneficiary(beneficiary.clone(), disaster.clone()),
            Record::Beneficiary(record),
        )?;

        agent.flags_raised = agent.flags_raised.saturating_add(1);
        agent.last_activity_at = now;
        tx.update(
            RecordKey::FieldAgent(agent_authority.clone()),
            Record::FieldAgent(agent),
        )?;
        self.store.commit(tx)?;

        warn!(beneficiary = %beneficiary, agent = %agent_authority, reason, "beneficiary flagged");
        Ok(())
    }

    /// Resolve a flag. `clear = true` returns the beneficiary to `Pending`
    /// with their approvals intact; `clear = false` rejects them
    /// permanently. Admin or manager; audited.
    pub fn review_flagged_beneficiary(
        &mut self,
        actor: &ActorId,
        beneficiary: &ActorId,
        disaster: &DisasterId,
        clear: bool,
        notes: &str,
        now: DateTime<Utc>,
    ) -> ReliefResult<()> {
        validate_text("review notes", notes, MAX_REASON_LEN)?;

        let mut tx = self.store.begin();
        let platform = load_platform(&tx)?;
        if !platform.is_admin_or_manager(actor) {
            return Err(ReliefError::UnauthorizedAdminOrManager(actor.clone()));
        }

        let mut record = load_beneficiary(&tx, beneficiary, disaster)?;
        if record.status != VerificationStatus::Flagged {
            return Err(ReliefError::BeneficiaryNotFlagged(beneficiary.clone()));
        }

        record.status = if clear {
            VerificationStatus::Pending
        } else {
            VerificationStatus::Rejected
        };
        if clear {
            record.flagged_reason = None;
            record.flagged_by = None;
            record.flagged_at = None;
        }
        record.review_notes = Some(notes.to_string());
        tx.update(
            RecordKey::Beneficiary(beneficiary.clone(), disaster.clone()),
            Record::Beneficiary(record),
        )?;
        log_admin_action(
            &mut tx,
            AdminAction::new(
                AdminActionKind::ReviewFlaggedBeneficiary,
                beneficiary.to_string(),
                actor.clone(),
                now,
            )
            .with_metadata(if clear { "cleared" } else { "rejected" }),
        )?;
        self.store.commit(tx)?;

        info!(beneficiary = %beneficiary, actor = %actor, clear, "flag reviewed");
        Ok(())
    }
}
