use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::{error::ErrorMessage, model::api::auth::GuardRejection};

mod admin;
mod auth;
mod election;
mod public;
mod users;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(auth::routes());
    routes.extend(election::routes());
    routes.extend(public::routes());
    routes.extend(users::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Every failure without a handler-provided body still answers with `{message}`.
/// Guard rejections carry their own reason, anything else gets the status text.
#[catch(default)]
fn default_catcher(status: Status, req: &Request) -> (Status, Json<ErrorMessage>) {
    let message = match &req.local_cache(GuardRejection::default).0 {
        Some(reason) => reason.clone(),
        None => status.reason().unwrap_or("Unknown error").to_string(),
    };
    (status, Json(ErrorMessage { message }))
}
