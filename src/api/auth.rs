use chrono::Utc;
use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{
                check_password_length, hash_password, issue_token, token_cookie, AuthResponse,
                AuthToken, SignInRequest, SignUpRequest, Voter, AUTH_TOKEN_COOKIE,
            },
            user::{ProfileResponse, ProfileUpdate, UserProfile, UserResponse},
        },
        db::user::{NewUser, User, UserList},
        store::Store,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![sign_up, sign_in, sign_out, me, get_profile, update_profile]
}

#[post("/sign-up", data = "<request>", format = "json")]
async fn sign_up(
    cookies: &CookieJar<'_>,
    request: Json<SignUpRequest>,
    users: Store<UserList>,
    config: &State<Config>,
) -> Result<(Status, Json<AuthResponse>)> {
    // Hash before taking the lock.
    let new_user = NewUser::try_from(request.into_inner())?;

    let mut list = users.write().await;
    if list.find_by_identifier(&new_user.username).is_some()
        || list.find_by_identifier(&new_user.email).is_some()
    {
        return Err(Error::Status(
            Status::Conflict,
            "An account with that username or email already exists.".to_string(),
        ));
    }
    if let Some(student_id) = &new_user.student_id {
        if list.student_id_taken(student_id) {
            return Err(Error::Status(
                Status::Conflict,
                "This Student ID is already registered.".to_string(),
            ));
        }
    }
    let user = User::new(new_user);
    list.users.push(user.clone());
    list.commit().await?;
    info!("Registered user '{}'", user.username);

    let token = issue_token(&user.id, config)?;
    cookies.add(token_cookie(token.clone(), config));
    Ok((
        Status::Created,
        Json(AuthResponse {
            user: (&user).into(),
            token,
        }),
    ))
}

#[post("/sign-in", data = "<request>", format = "json")]
async fn sign_in(
    cookies: &CookieJar<'_>,
    request: Json<SignInRequest>,
    users: Store<UserList>,
    config: &State<Config>,
) -> Result<Json<AuthResponse>> {
    let (identifier, password) = request.parts()?;
    let found = users.read().await.find_by_identifier(identifier).cloned();
    // Verify once the store lock is released.
    let user = found
        .filter(|user| user.verify_password(password))
        .ok_or_else(|| {
            Error::Status(Status::Unauthorized, "Invalid credentials.".to_string())
        })?;
    if user.banned {
        return Err(Error::Status(
            Status::Forbidden,
            "Account is banned. Contact administration.".to_string(),
        ));
    }

    let token = issue_token(&user.id, config)?;
    cookies.add(token_cookie(token.clone(), config));
    Ok(Json(AuthResponse {
        user: (&user).into(),
        token,
    }))
}

#[delete("/auth")]
fn sign_out(cookies: &CookieJar<'_>) -> Status {
    cookies.remove(AUTH_TOKEN_COOKIE);
    Status::Ok
}

#[get("/me")]
fn me(token: AuthToken<Voter>) -> Json<UserResponse> {
    Json(UserResponse {
        user: (&*token).into(),
    })
}

#[get("/profile")]
fn get_profile(token: AuthToken<Voter>) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        message: None,
        profile: (&*token).into(),
    })
}

#[put("/profile", data = "<update>", format = "json")]
async fn update_profile(
    token: AuthToken<Voter>,
    update: Json<ProfileUpdate>,
    users: Store<UserList>,
) -> Result<Json<ProfileResponse>> {
    let update = update.into_inner();

    let new_hash = match update.new_password.filter(|p| !p.is_empty()) {
        Some(new_password) => {
            let current = update
                .current_password
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    Error::bad_request("Current password is required to set a new password.")
                })?;
            if !token.verify_password(current) {
                return Err(Error::Status(
                    Status::Unauthorized,
                    "Current password is incorrect.".to_string(),
                ));
            }
            check_password_length(&new_password)?;
            Some(hash_password(&new_password)?)
        }
        None => None,
    };
    let new_email = update
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty() && *e != token.email);

    let mut list = users.write().await;
    if let Some(email) = &new_email {
        if list.email_taken(email, Some(token.id())) {
            return Err(Error::Status(
                Status::Conflict,
                "This email is already in use.".to_string(),
            ));
        }
    }
    let user = list
        .find_mut(token.id())
        .ok_or_else(|| Error::not_found("User"))?;
    if new_email.is_none() && new_hash.is_none() {
        return Ok(Json(ProfileResponse {
            message: Some("No changes made.".to_string()),
            profile: (&*user).into(),
        }));
    }
    if let Some(email) = new_email {
        user.email = email;
    }
    if new_hash.is_some() {
        user.password_hash = new_hash;
    }
    user.updated_at = Utc::now();
    let profile = UserProfile::from(&*user);
    list.commit().await?;

    Ok(Json(ProfileResponse {
        message: Some("Profile updated successfully.".to_string()),
        profile,
    }))
}
