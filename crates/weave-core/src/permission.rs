//! Access-control types.

use crate::ids::GroupName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered permission scale. The discriminants are the integer levels
/// used by the flat document's `permissions` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PermissionLevel {
    Read = 4,
    ReadExecute = 5,
    ReadWriteExecute = 7,
}

impl PermissionLevel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PermissionLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(PermissionLevel::Read),
            5 => Ok(PermissionLevel::ReadExecute),
            7 => Ok(PermissionLevel::ReadWriteExecute),
            other => Err(format!(
                "unknown permission level {other} (expected 4, 5 or 7)"
            )),
        }
    }
}

impl From<PermissionLevel> for u8 {
    fn from(level: PermissionLevel) -> Self {
        level.as_u8()
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionLevel::Read => write!(f, "read"),
            PermissionLevel::ReadExecute => write!(f, "read-execute"),
            PermissionLevel::ReadWriteExecute => write!(f, "read-write-execute"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub group: GroupName,
    pub level: PermissionLevel,
}

impl PermissionEntry {
    pub fn new(group: impl Into<String>, level: PermissionLevel) -> Self {
        Self {
            group: GroupName::new(group),
            level,
        }
    }
}

/// Where a resolved access-control list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclSource {
    /// Reset to the project's default groups.
    Inherited,
    /// Taken verbatim from the imported document.
    Explicit,
}
