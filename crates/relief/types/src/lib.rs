//! Relief Ledger domain types
//!
//! Plain-data records for the verification and distribution engine:
//! platform configuration, NGOs and field agents, disasters, beneficiaries,
//! fund pools, donations, and the admin audit log, plus the shared error
//! taxonomy and identifier newtypes.

pub mod audit;
pub mod beneficiary;
pub mod disaster;
pub mod donation;
pub mod errors;
pub mod ids;
pub mod org;
pub mod platform;
pub mod pool;

pub use audit::{AdminAction, AdminActionKind};
pub use beneficiary::{Beneficiary, VerificationStatus};
pub use disaster::{DisasterEvent, GeoLocation};
pub use donation::{DonationRecord, DonationTarget};
pub use errors::{ReliefError, ReliefResult};
pub use ids::{ActorId, AssetId, DisasterId, DonationId, PoolId};
pub use org::{FieldAgent, Ngo};
pub use platform::{
    PlatformConfig, DEFAULT_TRANSFER_TIMEOUT_SECS, MAX_ALLOWED_ASSETS, MAX_BATCH_SIZE,
    MAX_FEE_BPS, MAX_MANAGERS, MAX_MESSAGE_LEN, MAX_NAME_LEN, MAX_REASON_LEN,
};
pub use pool::{
    Distribution, DistributionStrategy, FundPool, PoolRegistration, RECLAIM_WINDOW_DAYS,
};
