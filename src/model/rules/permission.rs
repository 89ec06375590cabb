use rocket::http::Status;
use thiserror::Error;

use crate::model::{
    common::role::{Role, Roles},
    db::user::User,
};

/// Privilege tiers, lowest first. A user acts at the tier of their highest role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Voter,
    Inspector,
    Admin,
    Developer,
}

impl From<&Roles> for Tier {
    fn from(roles: &Roles) -> Self {
        if roles.has(Role::Developer) {
            Self::Developer
        } else if roles.has(Role::Admin) {
            Self::Admin
        } else if roles.has(Role::Inspector) {
            Self::Inspector
        } else {
            Self::Voter
        }
    }
}

/// Something one user does to another.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UserAction {
    ToggleBan,
    ToggleRole(Role),
}

/// Why a user action was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Denial {
    #[error("You cannot ban yourself.")]
    SelfBan,
    #[error("You cannot modify your own roles.")]
    SelfRoles,
    #[error("Insufficient privileges.")]
    Insufficient,
    #[error("Inspectors cannot ban privileged users.")]
    InspectorBan,
    #[error("Cannot ban a superior or peer admin.")]
    PeerBan,
    #[error("Only Developers can assign Admin role.")]
    AdminRoleReserved,
    #[error("Only Developers can assign Developer role.")]
    DeveloperRoleReserved,
    #[error("Cannot modify a Developer account.")]
    DeveloperTarget,
    #[error("Cannot modify a peer admin.")]
    PeerAdmin,
}

impl Denial {
    pub fn status(&self) -> Status {
        match self {
            Self::SelfBan | Self::SelfRoles => Status::BadRequest,
            _ => Status::Forbidden,
        }
    }
}

/// Decide whether `actor` may perform `action` on `target`.
///
/// Roles are taken from the stored users, never from the token, so that a
/// revoked role takes effect immediately.
pub fn authorize(actor: &User, target: &User, action: UserAction) -> Result<(), Denial> {
    let actor_tier = Tier::from(&actor.roles);
    let target_tier = Tier::from(&target.roles);
    let is_self = actor.id == target.id;

    match action {
        UserAction::ToggleBan => {
            if actor_tier < Tier::Inspector {
                return Err(Denial::Insufficient);
            }
            if is_self {
                return Err(Denial::SelfBan);
            }
            match actor_tier {
                Tier::Developer => Ok(()),
                Tier::Admin if target_tier >= Tier::Admin => Err(Denial::PeerBan),
                Tier::Inspector if target_tier >= Tier::Inspector => Err(Denial::InspectorBan),
                _ => Ok(()),
            }
        }
        UserAction::ToggleRole(role) => {
            if actor_tier < Tier::Admin {
                return Err(Denial::Insufficient);
            }
            if is_self {
                return Err(Denial::SelfRoles);
            }
            if actor_tier == Tier::Developer {
                return Ok(());
            }
            match role {
                Role::Admin => return Err(Denial::AdminRoleReserved),
                Role::Developer => return Err(Denial::DeveloperRoleReserved),
                Role::Voter | Role::Inspector => {}
            }
            match target_tier {
                Tier::Developer => Err(Denial::DeveloperTarget),
                Tier::Admin => Err(Denial::PeerAdmin),
                _ => Ok(()),
            }
        }
    }
}
