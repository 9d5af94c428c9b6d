//! Per-server privilege resolution.
//!
//! Resolution order for a member:
//!
//! 1. The bot owner is always [`PrivilegeLevel::BotOwner`].
//! 2. The server owner is always [`PrivilegeLevel::ServerOwner`].
//! 3. A personal override wins over roles.
//! 4. Otherwise roles decide. Any role mapped *below* the default demotes the
//!    member to the lowest such level, and demotion beats promotion. Failing
//!    that, the highest role at or above the default applies. Members with no
//!    mapped roles get the default.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use mentionbot_core::{Member, PrivilegeLevel, RecordError, RecordResult};

/// Stored form of the privilege tables, keyed by role name and user ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeSettings {
    #[serde(rename = "role privileges", default)]
    pub role_privileges: BTreeMap<String, i64>,
    #[serde(rename = "user privileges", default)]
    pub user_privileges: BTreeMap<String, i64>,
}

#[derive(Debug, Clone)]
pub struct PrivilegeManager {
    botowner_id: String,
    serverowner_id: String,
    default_level: PrivilegeLevel,
    role_privileges: BTreeMap<String, PrivilegeLevel>,
    user_privileges: BTreeMap<String, PrivilegeLevel>,
}

impl PrivilegeManager {
    pub fn new(botowner_id: impl Into<String>, serverowner_id: impl Into<String>) -> Self {
        Self {
            botowner_id: botowner_id.into(),
            serverowner_id: serverowner_id.into(),
            default_level: PrivilegeLevel::Normal,
            role_privileges: BTreeMap::new(),
            user_privileges: BTreeMap::new(),
        }
    }

    pub fn default_level(&self) -> PrivilegeLevel {
        self.default_level
    }

    /// The server owner can change hands; the instance refreshes it.
    pub fn set_serverowner(&mut self, serverowner_id: impl Into<String>) {
        self.serverowner_id = serverowner_id.into();
    }

    pub fn privilege_level(&self, member: &Member) -> PrivilegeLevel {
        let user_id = member.id();
        if user_id == self.botowner_id {
            return PrivilegeLevel::BotOwner;
        }
        if user_id == self.serverowner_id {
            return PrivilegeLevel::ServerOwner;
        }
        if let Some(&level) = self.user_privileges.get(user_id) {
            return level;
        }

        let default = self.default_level;
        let mut lowest = default;
        let mut highest: Option<PrivilegeLevel> = None;
        for role in &member.roles {
            let Some(&level) = self.role_privileges.get(&role.name) else {
                continue;
            };
            if level < default {
                lowest = lowest.min(level);
            } else {
                highest = Some(highest.map_or(level, |h| h.max(level)));
            }
        }

        if lowest < default {
            lowest
        } else {
            highest.unwrap_or(default)
        }
    }

    /// Sets or, with `None`, removes the level mapped to a role name.
    pub fn assign_role_privileges(
        &mut self,
        role_name: &str,
        level: Option<PrivilegeLevel>,
    ) -> RecordResult<()> {
        Self::assign(&mut self.role_privileges, role_name, level)
    }

    /// Sets or, with `None`, removes a user's personal override.
    pub fn assign_user_privileges(
        &mut self,
        user_id: &str,
        level: Option<PrivilegeLevel>,
    ) -> RecordResult<()> {
        Self::assign(&mut self.user_privileges, user_id, level)
    }

    fn assign(
        table: &mut BTreeMap<String, PrivilegeLevel>,
        key: &str,
        level: Option<PrivilegeLevel>,
    ) -> RecordResult<()> {
        match level {
            Some(level) => {
                table.insert(key.to_string(), level);
                Ok(())
            }
            None => table
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| RecordError::NoRecordExists(key.to_string())),
        }
    }

    /// Role name to level mappings.
    pub fn role_privileges(&self) -> Vec<(&str, PrivilegeLevel)> {
        self.role_privileges
            .iter()
            .map(|(k, &v)| (k.as_str(), v))
            .collect()
    }

    /// User ID to level overrides.
    pub fn user_privileges(&self) -> Vec<(&str, PrivilegeLevel)> {
        self.user_privileges
            .iter()
            .map(|(k, &v)| (k.as_str(), v))
            .collect()
    }

    pub fn to_settings(&self) -> PrivilegeSettings {
        let convert = |table: &BTreeMap<String, PrivilegeLevel>| {
            table
                .iter()
                .map(|(k, v)| (k.clone(), i64::from(v.value())))
                .collect()
        };
        PrivilegeSettings {
            role_privileges: convert(&self.role_privileges),
            user_privileges: convert(&self.user_privileges),
        }
    }

    /// Replaces both tables from stored settings.
    ///
    /// Values are rounded down to a tier. Values that are out of range, or
    /// that would grant an owner level, are skipped with a warning.
    pub fn apply_settings(&mut self, settings: &PrivilegeSettings) {
        self.role_privileges = Self::parse_table("role", &settings.role_privileges);
        self.user_privileges = Self::parse_table("user", &settings.user_privileges);
    }

    fn parse_table(kind: &str, raw: &BTreeMap<String, i64>) -> BTreeMap<String, PrivilegeLevel> {
        raw.iter()
            .filter_map(|(key, &value)| {
                match PrivilegeLevel::from_value_rounddown(value) {
                    Ok(level) if level < PrivilegeLevel::ServerOwner => {
                        Some((key.clone(), level))
                    }
                    Ok(level) => {
                        warn!(kind, key = %key, %level, "Stored privilege grants an owner level, skipped");
                        None
                    }
                    Err(err) => {
                        warn!(kind, key = %key, value, error = %err, "Invalid stored privilege, skipped");
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentionbot_core::{Role, User};

    fn member(id: &str, roles: &[&str]) -> Member {
        Member::new(User::new(id, format!("user{id}")))
            .with_roles(roles.iter().map(|r| Role::new(format!("r-{r}"), *r)))
    }

    fn manager() -> PrivilegeManager {
        let mut m = PrivilegeManager::new("1", "2");
        m.assign_role_privileges("Mods", Some(PrivilegeLevel::Moderator))
            .unwrap();
        m.assign_role_privileges("Trusted", Some(PrivilegeLevel::Trusted))
            .unwrap();
        m.assign_role_privileges("Muted", Some(PrivilegeLevel::NoPrivilege))
            .unwrap();
        m.assign_role_privileges("Newbies", Some(PrivilegeLevel::Newbie))
            .unwrap();
        m
    }

    #[test]
    fn test_owners_always_win() {
        let mut m = manager();
        m.assign_user_privileges("1", Some(PrivilegeLevel::Normal))
            .unwrap();
        assert_eq!(m.privilege_level(&member("1", &["Muted"])), PrivilegeLevel::BotOwner);
        assert_eq!(m.privilege_level(&member("2", &["Muted"])), PrivilegeLevel::ServerOwner);
    }

    #[test]
    fn test_demotion_beats_promotion() {
        let m = manager();
        assert_eq!(
            m.privilege_level(&member("5", &["Mods", "Muted"])),
            PrivilegeLevel::NoPrivilege
        );
        assert_eq!(
            m.privilege_level(&member("5", &["Newbies", "Mods"])),
            PrivilegeLevel::Newbie
        );
        assert_eq!(
            m.privilege_level(&member("5", &["Newbies", "Muted"])),
            PrivilegeLevel::NoPrivilege
        );
    }

    #[test]
    fn test_highest_promotion_and_default() {
        let m = manager();
        assert_eq!(
            m.privilege_level(&member("5", &["Trusted", "Mods"])),
            PrivilegeLevel::Moderator
        );
        assert_eq!(m.privilege_level(&member("5", &["Unmapped"])), PrivilegeLevel::Normal);
        assert_eq!(m.privilege_level(&member("5", &[])), PrivilegeLevel::Normal);
    }

    #[test]
    fn test_user_override_beats_roles() {
        let mut m = manager();
        m.assign_user_privileges("5", Some(PrivilegeLevel::Regular))
            .unwrap();
        assert_eq!(
            m.privilege_level(&member("5", &["Muted"])),
            PrivilegeLevel::Regular
        );
    }

    #[test]
    fn test_remove_missing_override() {
        let mut m = manager();
        assert_eq!(
            m.assign_user_privileges("9", None),
            Err(RecordError::NoRecordExists("9".to_string()))
        );
        m.assign_role_privileges("Mods", None).unwrap();
        assert_eq!(m.role_privileges().len(), 3);
    }

    #[test]
    fn test_settings_roundtrip_rejects_bad_values() {
        let m = manager();
        let mut settings = m.to_settings();
        assert_eq!(settings.role_privileges.get("Mods"), Some(&7000));

        settings.user_privileges.insert("7".into(), 6500);
        settings.user_privileges.insert("8".into(), 9000);
        settings.user_privileges.insert("9".into(), 12_000);

        let mut restored = PrivilegeManager::new("1", "2");
        restored.apply_settings(&settings);
        assert_eq!(restored.role_privileges(), m.role_privileges());
        assert_eq!(restored.user_privileges(), vec![("7", PrivilegeLevel::Trusted)]);

        let json = serde_json::to_value(&settings).unwrap();
        assert!(json.get("role privileges").is_some());
        assert!(json.get("user privileges").is_some());
    }
}
