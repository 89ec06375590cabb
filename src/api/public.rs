use rocket::{serde::json::Json, Route};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{
        db::archive::{is_archive_id, ArchiveIndex, ArchivedElection},
        store::Store,
    },
};

pub fn routes() -> Vec<Route> {
    routes![health, version, history, archived_election]
}

#[derive(Debug, Serialize, Deserialize)]
struct Health {
    status: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Version {
    version: String,
}

#[get("/health")]
fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

#[get("/api/version")]
fn version() -> Json<Version> {
    Json(Version {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[get("/elections/history")]
async fn history(archive: Store<ArchiveIndex>) -> Json<ArchiveIndex> {
    let index = archive.read().await.clone();
    Json(index.newest_first())
}

#[get("/elections/history/<archive_id>")]
async fn archived_election(
    archive_id: &str,
    archive: Store<ArchiveIndex>,
) -> Result<Json<ArchivedElection>> {
    if !is_archive_id(archive_id) {
        return Err(Error::not_found("Archived election"));
    }
    archive
        .read_attachment(&format!("{archive_id}.json"))
        .await?
        .map(Json)
        .ok_or_else(|| Error::not_found("Archived election"))
}
