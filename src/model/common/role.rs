use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Roles a user can hold. A user may hold several at once.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May cast ballots.
    Voter,
    /// May view the user list and ban plain voters.
    Inspector,
    /// May manage the election and lower-privileged users.
    Admin,
    /// Unrestricted, apart from never acting on themselves.
    Developer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Voter, Role::Inspector, Role::Admin, Role::Developer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voter => "voter",
            Self::Inspector => "inspector",
            Self::Admin => "admin",
            Self::Developer => "developer",
        }
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown role: {0}")]
pub struct UnknownRoleError(pub String);

impl FromStr for Role {
    type Err = UnknownRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| UnknownRoleError(s.to_string()))
    }
}

/// The set of roles held by a single user, in the order they were granted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles(Vec<Role>);

impl Roles {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut result = Self::default();
        for role in roles {
            if !result.has(role) {
                result.0.push(role);
            }
        }
        result
    }

    pub fn has(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// Admins and developers may manage the election.
    pub fn is_admin(&self) -> bool {
        self.has(Role::Admin) || self.has(Role::Developer)
    }

    /// Holds at least one role above plain voter.
    pub fn is_privileged(&self) -> bool {
        self.has(Role::Inspector) || self.is_admin()
    }

    /// Add the role if absent, remove it if present.
    /// Returns whether the role is held afterwards.
    pub fn toggle(&mut self, role: Role) -> bool {
        if self.has(role) {
            self.0.retain(|r| *r != role);
            false
        } else {
            self.0.push(role);
            true
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roles() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" inspector ".parse::<Role>(), Ok(Role::Inspector));
        assert_eq!(
            "overlord".parse::<Role>(),
            Err(UnknownRoleError("overlord".to_string()))
        );
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut roles = Roles::new([Role::Voter]);
        assert!(!roles.is_privileged());
        assert!(roles.toggle(Role::Inspector));
        assert!(roles.is_privileged());
        assert!(!roles.is_admin());
        assert!(!roles.toggle(Role::Inspector));
        assert_eq!(roles, Roles::new([Role::Voter]));
    }

    #[test]
    fn developer_counts_as_admin() {
        assert!(Roles::new([Role::Developer]).is_admin());
        assert!(!Roles::new([Role::Voter, Role::Voter]).is_admin());
        assert_eq!(Roles::new([Role::Voter, Role::Voter]).iter().count(), 1);
    }

    #[test]
    fn serialises_as_lowercase_list() {
        let roles = Roles::new([Role::Voter, Role::Admin]);
        let json = rocket::serde::json::serde_json::to_string(&roles).unwrap();
        assert_eq!(json, r#"["voter","admin"]"#);
    }
}
