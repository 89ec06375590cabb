use argon2::Config;
use chrono::Utc;
use rand::Rng;
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        api::user::UserProfile,
        common::role::{Role, Roles},
        db::user::NewUser,
    },
};

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    Ok(argon2::hash_encoded(
        password.as_bytes(),
        &salt,
        &Config::default(),
    )?)
}

/// Reject passwords below the minimum length.
pub fn check_password_length(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }
    Ok(())
}

/// Registration details, received from a user. These are never stored
/// directly, since the password is in plaintext.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
}

impl TryFrom<SignUpRequest> for NewUser {
    type Error = Error;

    /// Validate the request and hash the password. New accounts are plain voters.
    fn try_from(request: SignUpRequest) -> Result<Self> {
        let (username, email, password) = match (
            non_blank(request.username),
            non_blank(request.email),
            request.password.filter(|p| !p.is_empty()),
        ) {
            (Some(username), Some(email), Some(password)) => (username, email, password),
            _ => {
                return Err(Error::bad_request(
                    "Username, email, and password are required.",
                ))
            }
        };
        let department = non_blank(request.department)
            .ok_or_else(|| Error::bad_request("Department is required."))?;
        let student_id = non_blank(request.student_id)
            .ok_or_else(|| Error::bad_request("Student ID is required."))?;
        check_password_length(&password)?;

        let now = Utc::now();
        Ok(Self {
            username,
            email,
            password_hash: Some(hash_password(&password)?),
            department: Some(department),
            year: non_blank(request.year),
            student_id: Some(student_id),
            roles: Roles::new([Role::Voter]),
            banned: false,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl SignInRequest {
    /// The identifier and password, or a 400 if either is missing.
    pub fn parts(&self) -> Result<(&str, &str)> {
        match (self.identifier.as_deref(), self.password.as_deref()) {
            (Some(identifier), Some(password))
                if !identifier.trim().is_empty() && !password.is_empty() =>
            {
                Ok((identifier, password))
            }
            _ => Err(Error::Status(
                Status::BadRequest,
                "Identifier and password are required.".to_string(),
            )),
        }
    }
}

/// Returned on sign-up and sign-in. The token is also set as a cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
