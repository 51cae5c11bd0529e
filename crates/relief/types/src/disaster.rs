//! Disaster event records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorId, ReliefError, ReliefResult};

/// Geographic location of a disaster's epicenter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    pub fn validate(&self) -> ReliefResult<()> {
        if !(-90.0..=90.0).contains(&self.latitude)
            || !(-180.0..=180.0).contains(&self.longitude)
            || self.latitude.is_nan()
            || self.longitude.is_nan()
        {
            return Err(ReliefError::InvalidCoordinates {
                lat: self.latitude,
                lon: self.longitude,
            });
        }
        Ok(())
    }
}

/// A declared disaster under which beneficiaries and pools are scoped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisasterEvent {
    pub name: String,
    /// 1 (minor) through 10 (catastrophic).
    pub severity: u8,
    pub location: GeoLocation,
    pub is_active: bool,
    /// The admin or verified NGO authority that declared the disaster.
    pub authority: ActorId,

    pub total_beneficiaries: u32,
    pub verified_beneficiaries: u32,
    pub total_aid_distributed: u64,

    pub declared_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
