use std::marker::PhantomData;
use std::ops::Deref;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        common::{id::Id, role::Roles},
        db::user::{User, UserList},
        store::Store,
    },
};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// Message recorded by a request guard that rejected the request, picked up by
/// the error catchers.
#[derive(Debug, Clone, Default)]
pub struct GuardRejection(pub Option<String>);

/// A level of access required by a route.
pub trait Clearance: Send + Sync + 'static {
    /// Shown when a signed-in user lacks the required roles.
    const DENIED: &'static str;

    fn admits(roles: &Roles) -> bool;
}

/// Any signed-in user who is not banned.
pub struct Voter;

/// Inspectors, admins and developers.
pub struct Staff;

/// Admins and developers.
pub struct Admin;

impl Clearance for Voter {
    const DENIED: &'static str = "Authentication required.";

    fn admits(_roles: &Roles) -> bool {
        true
    }
}

impl Clearance for Staff {
    const DENIED: &'static str = "Insufficient privileges.";

    fn admits(roles: &Roles) -> bool {
        roles.is_privileged()
    }
}

impl Clearance for Admin {
    const DENIED: &'static str = "Admin privileges required.";

    fn admits(roles: &Roles) -> bool {
        roles.is_admin()
    }
}

/// A verified caller: the token was valid, and the stored user it names is not
/// banned and currently holds the roles required by `C`.
///
/// The user is a snapshot taken when the request arrived.
pub struct AuthToken<C> {
    user: User,
    phantom: PhantomData<C>,
}

impl<C> AuthToken<C> {
    pub fn id(&self) -> &Id {
        &self.user.id
    }

    pub fn into_user(self) -> User {
        self.user
    }
}

impl<C> Deref for AuthToken<C> {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

/// Token claims: the user ID plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    sub: Id,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// Sign a token for the given user.
pub fn issue_token(user_id: &Id, config: &Config) -> Result<String> {
    let claims = Claims {
        sub: user_id.clone(),
        expire_at: Utc::now() + config.auth_ttl(),
    };
    Ok(jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret()),
    )?)
}

/// Wrap a token in the session cookie.
pub fn token_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build((AUTH_TOKEN_COOKIE, token))
        .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .build()
}

/// Check a token's signature and expiry, returning the user ID it names.
pub fn verify_token(token: &str, config: &Config) -> Result<Id> {
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret()),
        &Validation::default(),
    )?;
    Ok(data.claims.sub)
}

/// The raw token, from the `Authorization: Bearer` header or the cookie.
fn raw_token(req: &Request<'_>) -> Option<String> {
    let header = req
        .headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());
    header.or_else(|| {
        req.cookies()
            .get(AUTH_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
    })
}

/// Reject the request, recording why for the catcher.
fn reject<T>(req: &Request<'_>, status: Status, message: &str) -> Outcome<T, Error> {
    req.local_cache(|| GuardRejection(Some(message.to_string())));
    Outcome::Error((status, Error::Status(status, message.to_string())))
}

#[rocket::async_trait]
impl<'r, C> FromRequest<'r> for AuthToken<C>
where
    C: Clearance,
{
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.rocket().state::<Config>() {
            Some(config) => config,
            None => {
                error!("Config is not managed");
                return reject(req, Status::InternalServerError, "Internal server error.");
            }
        };

        let token = match raw_token(req) {
            Some(token) => token,
            None => return reject(req, Status::Unauthorized, "Authentication required."),
        };

        let user_id = match verify_token(&token, config) {
            Ok(id) => id,
            Err(e) => {
                debug!("Token verification failed: {e}");
                return reject(req, Status::Unauthorized, "Invalid or expired token.");
            }
        };

        // Look the user up on every request so bans and role changes apply at once.
        let users = match req.rocket().state::<Store<UserList>>() {
            Some(users) => users,
            None => {
                error!("User store is not managed");
                return reject(req, Status::InternalServerError, "Internal server error.");
            }
        };
        let user = match users.read().await.find(&user_id) {
            Some(user) => user.clone(),
            None => return reject(req, Status::Unauthorized, "User not found."),
        };

        if user.banned {
            return reject(
                req,
                Status::Forbidden,
                "Account is banned. Contact administration.",
            );
        }
        if !C::admits(&user.roles) {
            return reject(req, Status::Forbidden, C::DENIED);
        }

        Outcome::Success(Self {
            user,
            phantom: PhantomData,
        })
    }
}
