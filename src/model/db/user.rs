use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        id::Id,
        role::{Role, Roles},
    },
    store::JsonDocument,
};

/// Core user account data, as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCore {
    pub username: String,
    #[serde(default)]
    pub email: String,
    /// Argon2 encoded hash. Accounts without one cannot sign in with a password.
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub roles: Roles,
    #[serde(default)]
    pub banned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        match &self.password_hash {
            // A malformed hash can never match.
            Some(hash) => argon2::verify_encoded(hash, password.as_ref()).unwrap_or(false),
            None => false,
        }
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A stored user, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl User {
    pub fn new(user: NewUser) -> Self {
        Self { id: Id::new(), user }
    }

    /// Name shown in the activity feed and as the last voter.
    pub fn display_name(&self) -> String {
        if !self.username.is_empty() {
            self.username.clone()
        } else if !self.email.is_empty() {
            self.email.clone()
        } else {
            self.id.to_string()
        }
    }
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// All user accounts, stored as one document.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserList {
    #[serde(default)]
    pub users: Vec<User>,
}

impl JsonDocument for UserList {
    const FILE_NAME: &'static str = "users.json";
}

impl UserList {
    pub fn find(&self, id: &Id) -> Option<&User> {
        self.users.iter().find(|u| &u.id == id)
    }

    pub fn find_mut(&mut self, id: &Id) -> Option<&mut User> {
        self.users.iter_mut().find(|u| &u.id == id)
    }

    /// Find a user by username or email, ignoring case and surrounding whitespace.
    pub fn find_by_identifier(&self, identifier: &str) -> Option<&User> {
        let target = identifier.trim().to_lowercase();
        if target.is_empty() {
            return None;
        }
        self.users.iter().find(|u| {
            u.username.to_lowercase() == target || u.email.to_lowercase() == target
        })
    }

    /// Is the email used by anyone other than `except`?
    pub fn email_taken(&self, email: &str, except: Option<&Id>) -> bool {
        let target = email.trim().to_lowercase();
        self.users
            .iter()
            .filter(|u| Some(&u.id) != except)
            .any(|u| !u.email.is_empty() && u.email.to_lowercase() == target)
    }

    pub fn student_id_taken(&self, student_id: &str) -> bool {
        let target = student_id.trim().to_lowercase();
        self.users.iter().any(|u| {
            u.student_id
                .as_deref()
                .map_or(false, |s| s.to_lowercase() == target)
        })
    }

    /// Does anyone hold the admin or developer role?
    pub fn has_admin(&self) -> bool {
        self.users.iter().any(|u| u.roles.is_admin())
    }
}

/// Build the account created on first launch.
pub fn default_admin(username: &str, password_hash: String) -> NewUser {
    let now = Utc::now();
    NewUser {
        username: username.to_string(),
        email: String::new(),
        password_hash: Some(password_hash),
        department: None,
        year: None,
        student_id: None,
        roles: Roles::new([Role::Voter, Role::Admin, Role::Developer]),
        banned: false,
        created_at: now,
        updated_at: now,
    }
}
