//! Rental tiers, resource kinds, actors, and pricing.
//!
//! These are the shared vocabulary of the lane protocol; every other module
//! in this crate speaks in terms of them.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Cents, DbId};

/// Length of one rental block in hours (initial check-in and each renewal).
pub const DEFAULT_RENTAL_BLOCK_HOURS: i64 = 6;

// ---------------------------------------------------------------------------
// Rental tier
// ---------------------------------------------------------------------------

/// Rental category a customer can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RentalTier {
    Locker,
    Standard,
    Double,
    Special,
}

impl RentalTier {
    pub const ALL: [RentalTier; 4] = [
        RentalTier::Locker,
        RentalTier::Standard,
        RentalTier::Double,
        RentalTier::Special,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locker => "LOCKER",
            Self::Standard => "STANDARD",
            Self::Double => "DOUBLE",
            Self::Special => "SPECIAL",
        }
    }

    /// Parse a tier string as stored in the database.
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "LOCKER" => Ok(Self::Locker),
            "STANDARD" => Ok(Self::Standard),
            "DOUBLE" => Ok(Self::Double),
            "SPECIAL" => Ok(Self::Special),
            _ => Err(CoreError::Validation(format!(
                "Invalid rental tier '{s}'. Must be one of: LOCKER, STANDARD, DOUBLE, SPECIAL"
            ))),
        }
    }

    /// The kind of physical resource that serves this tier.
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Locker => ResourceType::Locker,
            _ => ResourceType::Room,
        }
    }

    /// Price of one rental block for this tier.
    pub fn block_price(&self) -> Cents {
        match self {
            Self::Locker => Cents::dollars(24),
            Self::Standard => Cents::dollars(30),
            Self::Double => Cents::dollars(40),
            Self::Special => Cents::dollars(50),
        }
    }
}

impl std::fmt::Display for RentalTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Resource type / status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Room,
    Locker,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Room => "room",
            Self::Locker => "locker",
        }
    }

    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "room" => Ok(Self::Room),
            "locker" => Ok(Self::Locker),
            _ => Err(CoreError::Validation(format!(
                "Invalid resource type '{s}'. Must be one of: room, locker"
            ))),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Housekeeping / occupancy status of a room or locker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    Clean,
    Cleaning,
    Dirty,
    Occupied,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "CLEAN",
            Self::Cleaning => "CLEANING",
            Self::Dirty => "DIRTY",
            Self::Occupied => "OCCUPIED",
        }
    }

    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "CLEAN" => Ok(Self::Clean),
            "CLEANING" => Ok(Self::Cleaning),
            "DIRTY" => Ok(Self::Dirty),
            "OCCUPIED" => Ok(Self::Occupied),
            _ => Err(CoreError::Validation(format!(
                "Invalid resource status '{s}'. Must be one of: CLEAN, CLEANING, DIRTY, OCCUPIED"
            ))),
        }
    }
}

/// Identifies a single room or locker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub resource_type: ResourceType,
    pub resource_id: DbId,
}

impl ResourceRef {
    pub fn room(id: DbId) -> Self {
        Self {
            resource_type: ResourceType::Room,
            resource_id: id,
        }
    }

    pub fn locker(id: DbId) -> Self {
        Self {
            resource_type: ResourceType::Locker,
            resource_id: id,
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.resource_type, self.resource_id)
    }
}

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

/// The two parties of the selection handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    Employee,
    Customer,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "EMPLOYEE",
            Self::Customer => "CUSTOMER",
        }
    }
}
