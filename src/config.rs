use std::path::{Path, PathBuf};

use chrono::Duration;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    error::Result,
    model::{
        api::auth::hash_password,
        db::{
            archive::ArchiveIndex,
            election::ElectionData,
            user::{default_admin, User, UserList},
        },
        store::Store,
    },
};

/// Server settings read from the Rocket figment (`Rocket.toml` plus `ROCKET_*`
/// overrides). Managed, so handlers can take `&State<Config>`.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    data_dir: PathBuf,
    auth_ttl: u32,
    // secrets
    jwt_secret: String,
    #[serde(default)]
    receipt_secret: Option<String>,
}

impl Config {
    /// Directory holding all persisted JSON documents.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Valid lifetime of auth tokens in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Key for receipt verification codes. Codes are unkeyed hashes when unset.
    pub fn receipt_secret(&self) -> Option<&[u8]> {
        self.receipt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::as_bytes)
    }
}

/// Extracts [`Config`] at ignition and manages it. A bad figment aborts
/// ignition after printing the extraction error.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        Ok(rocket.manage(config))
    }
}

/// Credentials for the account created on first launch.
#[derive(Deserialize)]
struct DefaultAdminConfig {
    default_admin_username: String,
    // secrets
    default_admin_password: String,
}

/// A fairing that opens the JSON stores under the data directory, performs
/// any setup necessary, and places a `Store` for each document into managed
/// state. Must be attached after `ConfigFairing`.
pub struct StorageFairing;

#[rocket::async_trait]
impl Fairing for StorageFairing {
    fn info(&self) -> Info {
        Info {
            name: "JSON Storage",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let data_dir = match rocket.state::<Config>() {
            Some(config) => config.data_dir().to_path_buf(),
            None => {
                error!("Config was not available when opening storage");
                return Err(rocket);
            }
        };
        let admin_config = match rocket.figment().extract::<DefaultAdminConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load default admin config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Opening storage in {}...", data_dir.display());

        let stores = async {
            let election = Store::<ElectionData>::open(&data_dir).await?;
            let users = Store::<UserList>::open(&data_dir).await?;
            let archive = Store::<ArchiveIndex>::open(&data_dir).await?;
            ensure_admin_exists(&users, &admin_config).await?;
            Result::Ok((election, users, archive))
        };
        let (election, users, archive) = match stores.await {
            Ok(stores) => stores,
            Err(e) => {
                error!("Failed to open storage: {e}");
                return Err(rocket);
            }
        };
        info!("...storage online!");

        // Manage the state.
        rocket = rocket.manage(election).manage(users).manage(archive);
        Ok(rocket)
    }
}

/// Create the default admin if nobody holds the admin or developer role.
async fn ensure_admin_exists(users: &Store<UserList>, config: &DefaultAdminConfig) -> Result<()> {
    let mut list = users.write().await;
    if list.has_admin() {
        return Ok(());
    }
    let password_hash = hash_password(&config.default_admin_password)?;
    let admin = User::new(default_admin(&config.default_admin_username, password_hash));
    warn!(
        "No admin account found, created '{}' with the configured default password",
        admin.username
    );
    list.users.push(admin);
    list.commit().await
}
