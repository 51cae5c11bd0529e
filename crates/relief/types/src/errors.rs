//! Error taxonomy for the Relief Ledger
//!
//! Grouped the way callers must react: validation and authorization failures
//! are terminal for the request; state-machine violations require re-reading
//! state; version conflicts are safe to retry after a fresh read.

use crate::{ActorId, AssetId, DisasterId, PoolId};

/// Errors that can occur in Relief Ledger operations
#[derive(Debug, thiserror::Error)]
pub enum ReliefError {
    // --- Validation ---
    #[error("Invalid disaster severity {0} (must be 1-10)")]
    InvalidSeverity(u8),

    #[error("Invalid coordinates: lat {lat}, lon {lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },

    #[error("Invalid family size {0} (must be 1-50)")]
    InvalidFamilySize(u8),

    #[error("Invalid damage severity {0} (must be 1-10)")]
    InvalidDamageSeverity(u8),

    #[error("Invalid age {0} (must be 0-150)")]
    InvalidAge(u8),

    #[error("A non-empty reason is required")]
    ReasonRequired,

    #[error("Field {field} exceeds maximum length of {max}")]
    StringTooLong { field: &'static str, max: usize },

    #[error("Invalid platform fee {0}bps (must be <= 1000)")]
    InvalidPlatformFee(u16),

    #[error("Verification threshold must be positive and not exceed max verifiers")]
    VerificationThresholdNotMet,

    #[error("Distribution percentages must sum to 100 (immediate {immediate}, locked {locked})")]
    InvalidDistributionPercentages { immediate: u8, locked: u8 },

    #[error("Beneficiary does not meet pool eligibility criteria")]
    InvalidEligibilityCriteria,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Authorization ---
    #[error("Only the platform admin can perform this action: {0}")]
    UnauthorizedAdmin(ActorId),

    #[error("Only the platform admin or a manager can perform this action: {0}")]
    UnauthorizedAdminOrManager(ActorId),

    #[error("Only the owning NGO authority can perform this action: {0}")]
    UnauthorizedNgo(ActorId),

    #[error("Unauthorized to modify this resource: {0}")]
    UnauthorizedModification(ActorId),

    #[error("Only the admin or a verified NGO can create disasters: {0}")]
    UnauthorizedDisasterCreation(ActorId),

    #[error("Only the pending admin can accept the transfer: {0}")]
    NotPendingAdmin(ActorId),

    // --- State machine ---
    #[error("Platform is paused")]
    PlatformPaused,

    #[error("Disaster is not active: {0}")]
    DisasterNotActive(DisasterId),

    #[error("Pool is not active: {0}")]
    PoolNotActive(PoolId),

    #[error("NGO is not active: {0}")]
    NgoNotActive(ActorId),

    #[error("NGO is blacklisted: {0}")]
    NgoBlacklisted(ActorId),

    #[error("NGO is not blacklisted: {0}")]
    NgoNotBlacklisted(ActorId),

    #[error("NGO is already verified: {0}")]
    NgoAlreadyVerified(ActorId),

    #[error("NGO is not verified: {0}")]
    NgoNotVerified(ActorId),

    #[error("Field agent is not active: {0}")]
    FieldAgentNotActive(ActorId),

    #[error("Beneficiary is already verified: {0}")]
    AlreadyVerified(ActorId),

    #[error("Beneficiary is flagged and requires admin review: {0}")]
    BeneficiaryFlagged(ActorId),

    #[error("Beneficiary was rejected and cannot be verified: {0}")]
    BeneficiaryRejected(ActorId),

    #[error("Approver has already approved this beneficiary: {0}")]
    DuplicateApproval(ActorId),

    #[error("Maximum number of verifier approvals ({0}) reached")]
    MaxVerifiersReached(u8),

    #[error("Beneficiary is not verified: {0}")]
    BeneficiaryNotVerified(ActorId),

    #[error("Beneficiary is not flagged: {0}")]
    BeneficiaryNotFlagged(ActorId),

    #[error("Pool registration phase is locked: {0}")]
    RegistrationPhaseLocked(PoolId),

    #[error("Pool registration must be locked before distribution: {0}")]
    PoolRegistrationNotLocked(PoolId),

    #[error("Pool has no registered beneficiaries: {0}")]
    NoBeneficiariesRegistered(PoolId),

    #[error("Beneficiary is not registered for this pool: {0}")]
    BeneficiaryNotRegisteredForPool(ActorId),

    #[error("Funds were already distributed to this beneficiary: {0}")]
    AlreadyDistributed(ActorId),

    #[error("Nothing claimable on this distribution right now")]
    DistributionAlreadyClaimed,

    #[error("The claim deadline for this distribution has passed")]
    ClaimDeadlinePassed,

    #[error("Pool has no funds available to distribute: {0}")]
    InsufficientPoolFunds(PoolId),

    #[error("Distribution claim deadline has not passed yet")]
    DistributionNotExpired,

    #[error("Distribution was already reclaimed")]
    DistributionAlreadyReclaimed,

    #[error("An admin transfer is already pending")]
    TransferAlreadyPending,

    #[error("No admin transfer is pending")]
    NoTransferPending,

    #[error("The pending admin transfer has expired")]
    TransferExpired,

    // --- Donations and assets ---
    #[error("Donation {amount} below minimum {min}")]
    DonationBelowMinimum { amount: u64, min: u64 },

    #[error("Donation {amount} above maximum {max}")]
    DonationAboveMaximum { amount: u64, max: u64 },

    #[error("Asset is not allowed: {0}")]
    AssetNotAllowed(AssetId),

    #[error("Asset is already in the allowed list: {0}")]
    AssetAlreadyAllowed(AssetId),

    #[error("Asset is not in the allowed list: {0}")]
    AssetNotInAllowedList(AssetId),

    #[error("The primary asset cannot be removed")]
    CannotRemovePrimaryAsset,

    #[error("Maximum number of allowed assets ({0}) reached")]
    MaxAllowedAssetsReached(usize),

    // --- Managers ---
    #[error("Manager already exists: {0}")]
    ManagerAlreadyExists(ActorId),

    #[error("Manager not found: {0}")]
    ManagerNotFound(ActorId),

    #[error("Maximum number of managers ({0}) reached")]
    MaxManagersReached(usize),

    #[error("The admin cannot be added as a manager")]
    CannotAddAdminAsManager,

    // --- Resource limits ---
    #[error("NGO has reached its pool creation limit of {0}")]
    PoolLimitReached(u32),

    #[error("NGO has reached its beneficiary registration limit of {0}")]
    BeneficiaryLimitReached(u32),

    #[error("Batch of {len} exceeds maximum size of {max}")]
    BatchSizeTooLarge { len: usize, max: usize },

    // --- Uniqueness ---
    #[error("Phone number already registered for this disaster: {0}")]
    DuplicatePhoneNumber(String),

    #[error("National id already registered for this disaster: {0}")]
    DuplicateNationalId(String),

    // --- Store ---
    #[error("Record already exists: {0}")]
    RecordAlreadyExists(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Version conflict on {0}; re-read and retry")]
    VersionConflict(String),

    // --- Arithmetic ---
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
}

impl ReliefError {
    /// Whether the caller may retry the operation unchanged after a fresh
    /// read. Only optimistic-concurrency conflicts qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReliefError::VersionConflict(_))
    }
}

/// Result type alias for relief operations
pub type ReliefResult<T> = Result<T, ReliefError>;
