use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Highest package number a mailroom hands out. Numbers run 1..=MAX_PACKAGE_NUMBER.
pub const MAX_PACKAGE_NUMBER: u16 = 999;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(String);

impl OrganizationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MailroomId(String);

impl MailroomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MailroomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(Uuid);

impl PackageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PackageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Package lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageStatus {
    Waiting,
    Retrieved,
    Resolved,
    Failed,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Waiting => "WAITING",
            PackageStatus::Retrieved => "RETRIEVED",
            PackageStatus::Resolved => "RESOLVED",
            PackageStatus::Failed => "FAILED",
        }
    }

    /// Entering this status returns the package number to the pool.
    pub fn releases_number(&self) -> bool {
        match self {
            PackageStatus::Waiting => false,
            PackageStatus::Retrieved | PackageStatus::Resolved | PackageStatus::Failed => true,
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PackageStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WAITING" => Ok(PackageStatus::Waiting),
            "RETRIEVED" => Ok(PackageStatus::Retrieved),
            "RESOLVED" => Ok(PackageStatus::Resolved),
            "FAILED" => Ok(PackageStatus::Failed),
            other => Err(format!("unknown package status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub number: u16,
    pub available: bool,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotState {
    pub number: u16,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub mailroom: MailroomId,
    pub total: usize,
    pub in_use: usize,
    pub available: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<SlotState>,
}

/// Registration request handed to the engine by the request layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPackage {
    pub mailroom_id: MailroomId,
    pub resident_id: String,
    pub staff_id: String,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub organization_id: OrganizationId,
    pub mailroom_id: MailroomId,
    pub number: u16,
    pub status: PackageStatus,
    pub resident_id: String,
    pub provider: Option<String>,
    pub staff_id: String,
    pub pickup_staff_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub retrieved_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    /// Who closed the package as FAILED.
    #[serde(default)]
    pub failed_by: Option<String>,
    /// Optimistic-concurrency counter; bumped on every committed transition.
    pub version: u64,
    pub number_released: bool,
}

impl Package {
    /// Latest lifecycle timestamp recorded on this package.
    pub fn last_stamp(&self) -> DateTime<Utc> {
        [self.retrieved_at, self.resolved_at, self.failed_at]
            .into_iter()
            .flatten()
            .fold(self.created_at, |latest, ts| latest.max(ts))
    }

    /// Whether the package still holds its number.
    pub fn is_active(&self) -> bool {
        !self.number_released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("retrieved".parse::<PackageStatus>(), Ok(PackageStatus::Retrieved));
        assert_eq!(PackageStatus::Failed.to_string(), "FAILED");
        assert!("lost".parse::<PackageStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_upper_case() {
        let json = serde_json::to_string(&PackageStatus::Waiting).unwrap();
        assert_eq!(json, "\"WAITING\"");
    }

    #[test]
    fn test_releasing_statuses() {
        assert!(!PackageStatus::Waiting.releases_number());
        assert!(PackageStatus::Retrieved.releases_number());
        assert!(PackageStatus::Resolved.releases_number());
        assert!(PackageStatus::Failed.releases_number());
    }
}
