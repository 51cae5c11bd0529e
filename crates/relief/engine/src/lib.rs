//! Verification & distribution engine
//!
//! `ReliefEngine` drives every operation against a [`LedgerStore`]: platform
//! governance, the NGO and field-agent directory, disaster declaration,
//! beneficiary registration and multi-party verification, fund pools,
//! weighted time-locked distribution, and fee-charging donations.
//!
//! Every operation follows the same shape: begin a transaction, authorize,
//! validate, stage the mutations (including the audit entry for privileged
//! ones), and commit once. Time never comes from a clock; callers supply
//! `now` and the engine evaluates deadlines lazily against it.

pub mod beneficiaries;
pub mod consensus;
pub mod directory;
pub mod disasters;
pub mod distribution;
pub mod donations;
pub mod governance;
pub mod pools;
pub mod registry;

pub use consensus::ApprovalOutcome;
pub use registry::{ConfigUpdate, PlatformParams};

use relief_store::{LedgerStore, Record, RecordKey, Transaction};
use relief_types::{
    ActorId, AdminAction, Beneficiary, DisasterEvent, DisasterId, Distribution, FieldAgent,
    FundPool, Ngo, PlatformConfig, PoolId, PoolRegistration, ReliefError, ReliefResult,
    MAX_NAME_LEN,
};

/// The engine. Owns the ledger; all mutations go through its operations.
#[derive(Default)]
pub struct ReliefEngine {
    store: LedgerStore,
}

impl ReliefEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Read-only view of the underlying ledger.
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// All audit entries, newest first. The log is insert-only; this is the
    /// only read surface over it.
    pub fn admin_actions(&self) -> Vec<AdminAction> {
        let mut actions: Vec<AdminAction> = self
            .store
            .iter()
            .filter_map(|(_, v)| match &v.record {
                Record::AdminAction(a) => Some(a.clone()),
                _ => None,
            })
            .collect();
        actions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        actions
    }
}

// Typed loaders. A key of one shape always holds the matching record
// variant; a mismatch means the store was populated outside the engine, so
// it is reported as a missing record rather than panicking.

pub(crate) fn load_platform(tx: &Transaction) -> ReliefResult<PlatformConfig> {
    match tx.read(&RecordKey::Platform)? {
        Record::Platform(p) => Ok(p),
        _ => Err(ReliefError::RecordNotFound(RecordKey::Platform.to_string())),
    }
}

pub(crate) fn load_ngo(tx: &Transaction, authority: &ActorId) -> ReliefResult<Ngo> {
    let key = RecordKey::Ngo(authority.clone());
    match tx.read(&key)? {
        Record::Ngo(n) => Ok(n),
        _ => Err(ReliefError::RecordNotFound(key.to_string())),
    }
}

pub(crate) fn load_agent(tx: &Transaction, authority: &ActorId) -> ReliefResult<FieldAgent> {
    let key = RecordKey::FieldAgent(authority.clone());
    match tx.read(&key)? {
        Record::FieldAgent(a) => Ok(a),
        _ => Err(ReliefError::RecordNotFound(key.to_string())),
    }
}

pub(crate) fn load_disaster(tx: &Transaction, id: &DisasterId) -> ReliefResult<DisasterEvent> {
    let key = RecordKey::Disaster(id.clone());
    match tx.read(&key)? {
        Record::Disaster(d) => Ok(d),
        _ => Err(ReliefError::RecordNotFound(key.to_string())),
    }
}

pub(crate) fn load_beneficiary(
    tx: &Transaction,
    beneficiary: &ActorId,
    disaster: &DisasterId,
) -> ReliefResult<Beneficiary> {
    let key = RecordKey::Beneficiary(beneficiary.clone(), disaster.clone());
    match tx.read(&key)? {
        Record::Beneficiary(b) => Ok(b),
        _ => Err(ReliefError::RecordNotFound(key.to_string())),
    }
}

pub(crate) fn load_pool(
    tx: &Transaction,
    disaster: &DisasterId,
    pool: &PoolId,
) -> ReliefResult<FundPool> {
    let key = RecordKey::Pool(disaster.clone(), pool.clone());
    match tx.read(&key)? {
        Record::Pool(p) => Ok(p),
        _ => Err(ReliefError::RecordNotFound(key.to_string())),
    }
}

pub(crate) fn load_registration(
    tx: &Transaction,
    disaster: &DisasterId,
    pool: &PoolId,
    beneficiary: &ActorId,
) -> ReliefResult<PoolRegistration> {
    let key = RecordKey::PoolRegistration(disaster.clone(), pool.clone(), beneficiary.clone());
    match tx.read(&key) {
        Ok(Record::PoolRegistration(r)) => Ok(r),
        Ok(_) | Err(ReliefError::RecordNotFound(_)) => {
            Err(ReliefError::BeneficiaryNotRegisteredForPool(
                beneficiary.clone(),
            ))
        }
        Err(e) => Err(e),
    }
}

pub(crate) fn load_distribution(
    tx: &Transaction,
    disaster: &DisasterId,
    pool: &PoolId,
    beneficiary: &ActorId,
) -> ReliefResult<Distribution> {
    let key = RecordKey::Distribution(disaster.clone(), pool.clone(), beneficiary.clone());
    match tx.read(&key)? {
        Record::Distribution(d) => Ok(d),
        _ => Err(ReliefError::RecordNotFound(key.to_string())),
    }
}

/// Append one audit entry for a privileged mutation. The key is derived
/// from (actor, unix second), so the log can never be rewritten, only
/// extended.
pub(crate) fn log_admin_action(tx: &mut Transaction, action: AdminAction) -> ReliefResult<()> {
    let key = RecordKey::AdminAction(action.actor.clone(), action.timestamp.timestamp());
    tx.create(key, Record::AdminAction(action))
}

/// Names must be non-empty and fit the shared length cap.
pub(crate) fn validate_name(field: &'static str, value: &str) -> ReliefResult<()> {
    if value.trim().is_empty() {
        return Err(ReliefError::InvalidInput(format!("{field} is required")));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(ReliefError::StringTooLong {
            field,
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

pub(crate) fn validate_text(field: &'static str, value: &str, max: usize) -> ReliefResult<()> {
    if value.len() > max {
        return Err(ReliefError::StringTooLong { field, max });
    }
    Ok(())
}

/// Reject all activity while the platform is paused.
pub(crate) fn ensure_not_paused(platform: &PlatformConfig) -> ReliefResult<()> {
    if platform.is_paused {
        return Err(ReliefError::PlatformPaused);
    }
    Ok(())
}
