#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

use config::{ConfigFairing, StorageFairing};
use logging::LoggerFairing;
use model::db::closer::VotingCloserFairing;

/// Build the server from `Rocket.toml` and the environment.
pub fn build() -> Rocket<Build> {
    assemble(rocket::build())
}

/// Mount everything onto `rocket`. Fairing order matters: storage needs the
/// config, and the voting closer needs storage.
fn assemble(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StorageFairing)
        .attach(VotingCloserFairing)
}

/// A fresh, unique data directory for one test.
#[cfg(test)]
fn test_data_dir() -> std::path::PathBuf {
    let random: u64 = rand::random();
    std::env::temp_dir().join(format!("univote-test-{random:016x}"))
}

#[cfg(test)]
fn rocket_for_data_dir(data_dir: &std::path::Path) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("data_dir", data_dir))
        .merge(("jwt_secret", "test-jwt-secret"))
        .merge(("default_admin_username", "test-root"))
        .merge(("default_admin_password", "test-root-password"));
    assemble(rocket::custom(figment))
}

/// Add an example user with the given roles and sign the client in as them.
#[cfg(test)]
async fn test_login(
    client: &rocket::local::asynchronous::Client,
    username: &str,
    roles: &[model::common::role::Role],
) -> model::db::user::User {
    use rocket::{
        http::{ContentType, Status},
        serde::json::json,
    };

    use model::{
        db::user::{examples::EXAMPLE_PASSWORD, User, UserList},
        store::Store,
    };

    let users = client
        .rocket()
        .state::<Store<UserList>>()
        .expect("user store is managed");
    let user = User::example(username, roles);
    let mut list = users.write().await;
    list.users.push(user.clone());
    list.commit().await.unwrap();

    let response = client
        .post("/sign-in")
        .header(ContentType::JSON)
        .body(json!({ "identifier": username, "password": EXAMPLE_PASSWORD }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok, "test login failed");
    user
}
