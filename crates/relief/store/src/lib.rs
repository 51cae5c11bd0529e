//! Keyed, versioned record store
//!
//! All engine state lives in a single map of typed records addressed by
//! `RecordKey`. Keys are derived purely from stable identifiers, so any two
//! parties derive the same key for the same entity. Every record carries a
//! version; mutations go through a `Transaction` begun from a snapshot of
//! the store and committed back all-or-nothing. A commit is rejected when
//! any record it read has been rewritten since the snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use relief_types::{
    ActorId, AdminAction, Beneficiary, DisasterEvent, DisasterId, Distribution, DonationId,
    DonationRecord, FieldAgent, FundPool, Ngo, PlatformConfig, PoolId, PoolRegistration,
    ReliefError, ReliefResult,
};

/// Address of a record. Derivable by anyone holding the entity's stable
/// identifiers; no lookup table required.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKey {
    /// The singleton platform configuration.
    Platform,
    /// An NGO, keyed by its authority.
    Ngo(ActorId),
    /// A field agent, keyed by its authority.
    FieldAgent(ActorId),
    Disaster(DisasterId),
    /// A beneficiary is scoped to one disaster.
    Beneficiary(ActorId, DisasterId),
    /// Per-disaster uniqueness index over phone numbers.
    PhoneIndex(DisasterId, String),
    /// Per-disaster uniqueness index over national ids.
    NationalIdIndex(DisasterId, String),
    Pool(DisasterId, PoolId),
    PoolRegistration(DisasterId, PoolId, ActorId),
    Distribution(DisasterId, PoolId, ActorId),
    Donation(DonationId),
    /// One audit entry per (actor, unix timestamp). Two privileged actions
    /// by the same actor in the same second collide and the second commit
    /// fails, which is intentional.
    AdminAction(ActorId, i64),
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKey::Platform => write!(f, "platform"),
            RecordKey::Ngo(a) => write!(f, "ngo/{a}"),
            RecordKey::FieldAgent(a) => write!(f, "agent/{a}"),
            RecordKey::Disaster(d) => write!(f, "disaster/{d}"),
            RecordKey::Beneficiary(a, d) => write!(f, "beneficiary/{d}/{a}"),
            RecordKey::PhoneIndex(d, p) => write!(f, "phone/{d}/{p}"),
            RecordKey::NationalIdIndex(d, n) => write!(f, "national-id/{d}/{n}"),
            RecordKey::Pool(d, p) => write!(f, "pool/{d}/{p}"),
            RecordKey::PoolRegistration(d, p, a) => write!(f, "registration/{d}/{p}/{a}"),
            RecordKey::Distribution(d, p, a) => write!(f, "distribution/{d}/{p}/{a}"),
            RecordKey::Donation(id) => write!(f, "donation/{id}"),
            RecordKey::AdminAction(a, ts) => write!(f, "admin-action/{a}/{ts}"),
        }
    }
}

/// A typed record. One variant per entity the engine persists; the index
/// variants store the owning beneficiary's id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Platform(PlatformConfig),
    Ngo(Ngo),
    FieldAgent(FieldAgent),
    Disaster(DisasterEvent),
    Beneficiary(Beneficiary),
    PhoneIndex(ActorId),
    NationalIdIndex(ActorId),
    Pool(FundPool),
    PoolRegistration(PoolRegistration),
    Distribution(Distribution),
    Donation(DonationRecord),
    AdminAction(AdminAction),
}

/// A stored record together with its optimistic-concurrency version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Versioned {
    pub version: u64,
    pub record: Record,
}

/// The full ledger state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LedgerStore {
    records: HashMap<RecordKey, Versioned>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Versioned> {
        self.records.get(key)
    }

    pub fn version(&self, key: &RecordKey) -> Option<u64> {
        self.records.get(key).map(|v| v.version)
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over all stored records. Used for reporting and audit-log
    /// scans; ordering is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &Versioned)> {
        self.records.iter()
    }

    /// Start a transaction against a snapshot of the current state.
    pub fn begin(&self) -> Transaction {
        Transaction {
            snapshot: self.records.clone(),
            staged: Vec::new(),
        }
    }

    /// Validate and apply a transaction. Creates fail when the key exists;
    /// updates fail when the stored version moved past the one the
    /// transaction staged against. On any failure nothing is written.
    pub fn commit(&mut self, tx: Transaction) -> ReliefResult<()> {
        for (key, staged) in &tx.staged {
            match staged {
                Staged::Create(_) => {
                    if self.contains(key) {
                        return Err(ReliefError::RecordAlreadyExists(key.to_string()));
                    }
                }
                Staged::Update { expected, .. } => match self.version(key) {
                    Some(current) if current == *expected => {}
                    Some(_) => return Err(ReliefError::VersionConflict(key.to_string())),
                    None => return Err(ReliefError::RecordNotFound(key.to_string())),
                },
            }
        }
        for (key, staged) in tx.staged {
            match staged {
                Staged::Create(record) => {
                    self.records.insert(key, Versioned { version: 1, record });
                }
                Staged::Update { expected, record } => {
                    self.records.insert(
                        key,
                        Versioned {
                            version: expected + 1,
                            record,
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

enum Staged {
    Create(Record),
    Update { expected: u64, record: Record },
}

/// Staged mutations against a snapshot of a `LedgerStore`.
///
/// Reads see staged writes. Nothing touches the store until
/// `LedgerStore::commit`; dropping the transaction discards it.
pub struct Transaction {
    snapshot: HashMap<RecordKey, Versioned>,
    staged: Vec<(RecordKey, Staged)>,
}

impl Transaction {
    fn staged_record(&self, key: &RecordKey) -> Option<&Record> {
        self.staged
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, s)| match s {
                Staged::Create(r) => r,
                Staged::Update { record, .. } => record,
            })
    }

    /// Read a record, preferring any staged write for the same key.
    pub fn read(&self, key: &RecordKey) -> ReliefResult<Record> {
        self.read_opt(key)
            .ok_or_else(|| ReliefError::RecordNotFound(key.to_string()))
    }

    /// Read a record if present.
    pub fn read_opt(&self, key: &RecordKey) -> Option<Record> {
        if let Some(record) = self.staged_record(key) {
            return Some(record.clone());
        }
        self.snapshot.get(key).map(|v| v.record.clone())
    }

    pub fn exists(&self, key: &RecordKey) -> bool {
        self.staged_record(key).is_some() || self.snapshot.contains_key(key)
    }

    /// Stage creation of a new record. Fails immediately when the key
    /// already exists in the snapshot or in this transaction; the commit
    /// re-checks against the live store.
    pub fn create(&mut self, key: RecordKey, record: Record) -> ReliefResult<()> {
        if self.exists(&key) {
            return Err(ReliefError::RecordAlreadyExists(key.to_string()));
        }
        self.staged.push((key, Staged::Create(record)));
        Ok(())
    }

    /// Stage an update of an existing record. The snapshot version is
    /// captured here and re-checked at commit.
    pub fn update(&mut self, key: RecordKey, record: Record) -> ReliefResult<()> {
        if let Some(pos) = self.staged.iter().position(|(k, _)| *k == key) {
            // Collapse repeated writes to one staged entry, keeping the
            // original create/expected-version semantics.
            let staged = match &self.staged[pos].1 {
                Staged::Create(_) => Staged::Create(record),
                Staged::Update { expected, .. } => Staged::Update {
                    expected: *expected,
                    record,
                },
            };
            self.staged[pos].1 = staged;
            return Ok(());
        }
        let expected = self
            .snapshot
            .get(&key)
            .map(|v| v.version)
            .ok_or_else(|| ReliefError::RecordNotFound(key.to_string()))?;
        self.staged.push((key, Staged::Update { expected, record }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(s: &str) -> ActorId {
        ActorId::new(s)
    }

    fn index_record(name: &str) -> Record {
        Record::PhoneIndex(actor(name))
    }

    fn key(phone: &str) -> RecordKey {
        RecordKey::PhoneIndex(DisasterId::new("d1"), phone.into())
    }

    #[test]
    fn create_then_read() {
        let mut store = LedgerStore::new();
        let k = key("555");

        let mut tx = store.begin();
        tx.create(k.clone(), index_record("ben")).unwrap();
        // Visible inside the transaction before commit.
        assert!(tx.exists(&k));
        store.commit(tx).unwrap();

        assert_eq!(store.version(&k), Some(1));
    }

    #[test]
    fn duplicate_create_rejected() {
        let mut store = LedgerStore::new();
        let k = key("555");

        let mut tx = store.begin();
        tx.create(k.clone(), index_record("a")).unwrap();
        store.commit(tx).unwrap();

        let mut tx = store.begin();
        let err = tx.create(k, index_record("b")).unwrap_err();
        assert!(matches!(err, ReliefError::RecordAlreadyExists(_)));
    }

    #[test]
    fn racing_creates_fail_at_commit() {
        let mut store = LedgerStore::new();
        let k = key("555");

        let mut t1 = store.begin();
        let mut t2 = store.begin();
        t1.create(k.clone(), index_record("a")).unwrap();
        t2.create(k.clone(), index_record("b")).unwrap();

        store.commit(t1).unwrap();
        let err = store.commit(t2).unwrap_err();
        assert!(matches!(err, ReliefError::RecordAlreadyExists(_)));
        assert_eq!(
            store.get(&k).map(|v| v.record.clone()),
            Some(index_record("a"))
        );
    }

    #[test]
    fn update_bumps_version() {
        let mut store = LedgerStore::new();
        let k = key("555");

        let mut tx = store.begin();
        tx.create(k.clone(), index_record("a")).unwrap();
        store.commit(tx).unwrap();

        let mut tx = store.begin();
        tx.update(k.clone(), index_record("b")).unwrap();
        store.commit(tx).unwrap();

        assert_eq!(store.version(&k), Some(2));
        assert_eq!(
            store.get(&k).map(|v| v.record.clone()),
            Some(index_record("b"))
        );
    }

    #[test]
    fn stale_update_is_a_version_conflict() {
        let mut store = LedgerStore::new();
        let k = key("555");

        let mut tx = store.begin();
        tx.create(k.clone(), index_record("a")).unwrap();
        store.commit(tx).unwrap();

        let mut t1 = store.begin();
        let mut t2 = store.begin();
        t1.update(k.clone(), index_record("b")).unwrap();
        t2.update(k.clone(), index_record("c")).unwrap();

        store.commit(t1).unwrap();
        let err = store.commit(t2).unwrap_err();
        assert!(matches!(err, ReliefError::VersionConflict(_)));
        // First writer's value survives.
        assert_eq!(
            store.get(&k).map(|v| v.record.clone()),
            Some(index_record("b"))
        );
    }

    #[test]
    fn conflicting_commit_applies_nothing() {
        let mut store = LedgerStore::new();
        let k1 = key("1");
        let k2 = key("2");

        let mut tx = store.begin();
        tx.create(k1.clone(), index_record("a")).unwrap();
        store.commit(tx).unwrap();

        let mut stale = store.begin();
        stale.update(k1.clone(), index_record("b")).unwrap();
        stale.create(k2.clone(), index_record("c")).unwrap();

        // Move k1 forward under the stale transaction.
        let mut tx = store.begin();
        tx.update(k1.clone(), index_record("x")).unwrap();
        store.commit(tx).unwrap();

        let err = store.commit(stale).unwrap_err();
        assert!(matches!(err, ReliefError::VersionConflict(_)));
        // The create in the failed transaction must not have landed.
        assert!(!store.contains(&k2));
    }

    #[test]
    fn uncommitted_transaction_writes_nothing() {
        let store = LedgerStore::new();
        let k = key("555");

        let mut tx = store.begin();
        tx.create(k.clone(), index_record("a")).unwrap();
        drop(tx);

        assert!(!store.contains(&k));
    }

    #[test]
    fn repeated_update_in_one_transaction_collapses() {
        let mut store = LedgerStore::new();
        let k = key("555");

        let mut tx = store.begin();
        tx.create(k.clone(), index_record("a")).unwrap();
        store.commit(tx).unwrap();

        let mut tx = store.begin();
        tx.update(k.clone(), index_record("b")).unwrap();
        tx.update(k.clone(), index_record("c")).unwrap();
        store.commit(tx).unwrap();

        // One version bump for the whole transaction.
        assert_eq!(store.version(&k), Some(2));
        assert_eq!(
            store.get(&k).map(|v| v.record.clone()),
            Some(index_record("c"))
        );
    }
}
