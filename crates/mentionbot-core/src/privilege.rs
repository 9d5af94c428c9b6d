//! Bot command privilege tiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RecordError, RecordResult};

/// Ordered trust tiers used to gate commands.
///
/// Variants are declared in ascending order so the derived `Ord` agrees with
/// the numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
#[repr(u32)]
pub enum PrivilegeLevel {
    NoPrivilege = 0,
    Restricted1 = 1000,
    Restricted2 = 2000,
    Newbie = 3000,
    Normal = 4000,
    Regular = 5000,
    Trusted = 6000,
    Moderator = 7000,
    Admin = 8000,
    ServerOwner = 9000,
    BotOwner = 9001,
}

impl PrivilegeLevel {
    /// Every level, lowest first.
    pub const ALL: [Self; 11] = [
        Self::NoPrivilege,
        Self::Restricted1,
        Self::Restricted2,
        Self::Newbie,
        Self::Normal,
        Self::Regular,
        Self::Trusted,
        Self::Moderator,
        Self::Admin,
        Self::ServerOwner,
        Self::BotOwner,
    ];

    /// The lowest level, used for unrestricted commands.
    pub const fn lowest() -> Self {
        Self::NoPrivilege
    }

    /// The integer value stored in settings documents.
    pub const fn value(self) -> u32 {
        self as u32
    }

    /// Human-readable name shown to users.
    pub const fn common_name(self) -> &'static str {
        match self {
            Self::NoPrivilege => "No Privileges",
            Self::Restricted1 => "Restricted1",
            Self::Restricted2 => "Restricted2",
            Self::Newbie => "Newbie",
            Self::Normal => "Normal",
            Self::Regular => "Regular",
            Self::Trusted => "Trusted",
            Self::Moderator => "Moderator",
            Self::Admin => "Admin",
            Self::ServerOwner => "Server Owner",
            Self::BotOwner => "Literally God",
        }
    }

    /// Looks a level up by its common name, ignoring case and surrounding
    /// whitespace.
    pub fn from_common_name(name: &str) -> RecordResult<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.common_name().eq_ignore_ascii_case(name))
            .ok_or_else(|| RecordError::DoesNotExist(name.to_string()))
    }

    /// Rounds `value` down to the nearest tier.
    ///
    /// Negative values become [`NoPrivilege`](Self::NoPrivilege); values above
    /// [`BotOwner`](Self::BotOwner) are rejected.
    pub fn from_value_rounddown(value: i64) -> RecordResult<Self> {
        if value > i64::from(Self::BotOwner.value()) {
            return Err(RecordError::OutOfRange(value));
        }
        Ok(Self::ALL
            .into_iter()
            .rev()
            .find(|level| i64::from(level.value()) <= value)
            .unwrap_or(Self::NoPrivilege))
    }
}

impl From<PrivilegeLevel> for u32 {
    fn from(level: PrivilegeLevel) -> Self {
        level.value()
    }
}

impl TryFrom<u32> for PrivilegeLevel {
    type Error = RecordError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_value_rounddown(i64::from(value))
    }
}

impl fmt::Display for PrivilegeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.common_name())
    }
}
