use chrono::{TimeZone, Utc};
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Admin, AuthToken},
            election::{
                ArchiveRequest, ArchiveResponse, CandidateResponse, CandidateSpec,
                DeletedResponse, MetaUpdate, PhaseRequest, PositionResponse, PositionSpec,
                ScheduleUpdate, SnapshotResponse, VoteCountRequest,
            },
        },
        common::{
            election::{PhaseAction, UnknownPhaseAction},
            id::Id,
        },
        db::{
            archive::{ArchiveIndex, ArchivedElection},
            closer::VotingCloser,
            election::{Candidate, ElectionData, Position},
        },
        store::Store,
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        create_position,
        delete_position,
        create_candidate,
        update_candidate,
        delete_candidate,
        set_vote_count,
        update_meta,
        update_schedule,
        change_phase,
        archive_election,
    ]
}

#[post("/positions", data = "<spec>", format = "json")]
async fn create_position(
    _token: AuthToken<Admin>,
    spec: Json<PositionSpec>,
    election: Store<ElectionData>,
) -> Result<(Status, Json<PositionResponse>)> {
    let spec = spec.into_inner();
    let title = non_blank(spec.title)
        .ok_or_else(|| Error::bad_request("Position title is required."))?;
    let position = Position {
        id: Id::new(),
        title,
        order: spec.order.unwrap_or(0),
        max_votes: spec.max_votes.filter(|&m| m > 0).unwrap_or(1),
    };

    let mut data = election.write().await;
    data.positions.push(position.clone());
    let snapshot = data.snapshot();
    data.commit().await?;
    info!("Created position '{}'", position.title);

    Ok((Status::Created, Json(PositionResponse { position, snapshot })))
}

#[delete("/positions/<position_id>")]
async fn delete_position(
    _token: AuthToken<Admin>,
    position_id: Id,
    election: Store<ElectionData>,
) -> Result<Json<DeletedResponse>> {
    let mut data = election.write().await;
    let removed = data
        .remove_position(&position_id)
        .ok_or_else(|| Error::not_found("Position"))?;
    let snapshot = data.snapshot();
    data.commit().await?;
    info!("Deleted position '{}'", removed.title);

    Ok(Json(DeletedResponse {
        message: "Position deleted.".to_string(),
        snapshot,
    }))
}

#[post("/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    _token: AuthToken<Admin>,
    spec: Json<CandidateSpec>,
    election: Store<ElectionData>,
) -> Result<(Status, Json<CandidateResponse>)> {
    let spec = spec.into_inner();
    let name = non_blank(spec.name)
        .ok_or_else(|| Error::bad_request("Candidate name is required."))?;

    let mut data = election.write().await;
    let position_id = match spec.position_id.flatten() {
        Some(requested) => checked_position(&data, &requested)?,
        None => None,
    };
    let now = Utc::now().timestamp_millis();
    let candidate = Candidate {
        id: Id::new(),
        position_id,
        name,
        tagline: trimmed(spec.tagline),
        manifesto: trimmed(spec.manifesto),
        image_uri: trimmed(spec.image_uri),
        vote_count: 0,
        created_at: now,
        updated_at: now,
    };
    data.candidates.push(candidate.clone());
    let snapshot = data.snapshot();
    data.commit().await?;
    info!("Created candidate '{}'", candidate.name);

    Ok((
        Status::Created,
        Json(CandidateResponse {
            candidate,
            snapshot,
        }),
    ))
}

#[put("/candidates/<candidate_id>", data = "<spec>", format = "json")]
async fn update_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    spec: Json<CandidateSpec>,
    election: Store<ElectionData>,
) -> Result<Json<CandidateResponse>> {
    let spec = spec.into_inner();
    let mut data = election.write().await;
    let index = data
        .candidates
        .iter()
        .position(|c| c.id == candidate_id)
        .ok_or_else(|| Error::not_found("Candidate"))?;

    // Outer `None` leaves the position alone, `Some(None)` clears it.
    let position_id = match spec.position_id {
        Some(Some(requested)) => checked_position(&data, &requested)?.map(Some),
        Some(None) => Some(None),
        None => None,
    };

    let candidate = &mut data.candidates[index];
    if let Some(position_id) = position_id {
        candidate.position_id = position_id;
    }
    if let Some(name) = non_blank(spec.name) {
        candidate.name = name;
    }
    if let Some(tagline) = spec.tagline {
        candidate.tagline = tagline.trim().to_string();
    }
    if let Some(manifesto) = spec.manifesto {
        candidate.manifesto = manifesto.trim().to_string();
    }
    if let Some(image_uri) = spec.image_uri {
        candidate.image_uri = image_uri.trim().to_string();
    }
    candidate.updated_at = Utc::now().timestamp_millis();
    let candidate = candidate.clone();
    let snapshot = data.snapshot();
    data.commit().await?;

    Ok(Json(CandidateResponse {
        candidate,
        snapshot,
    }))
}

#[delete("/candidates/<candidate_id>")]
async fn delete_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    election: Store<ElectionData>,
) -> Result<Json<DeletedResponse>> {
    let mut data = election.write().await;
    let removed = data
        .remove_candidate(&candidate_id)
        .ok_or_else(|| Error::not_found("Candidate"))?;
    let snapshot = data.snapshot();
    data.commit().await?;
    info!("Deleted candidate '{}' and their votes", removed.name);

    Ok(Json(DeletedResponse {
        message: "Candidate deleted.".to_string(),
        snapshot,
    }))
}

/// Overwrite the cached count only. The vote log is not touched.
#[post("/candidates/<candidate_id>/vote-count", data = "<request>", format = "json")]
async fn set_vote_count(
    token: AuthToken<Admin>,
    candidate_id: Id,
    request: Json<VoteCountRequest>,
    election: Store<ElectionData>,
) -> Result<Json<CandidateResponse>> {
    let new_count = request
        .new_count
        .and_then(|count| u64::try_from(count).ok())
        .ok_or_else(|| Error::bad_request("Vote count must be a non-negative number."))?;

    let mut data = election.write().await;
    let candidate = data
        .candidate_mut(&candidate_id)
        .ok_or_else(|| Error::not_found("Candidate"))?;
    candidate.vote_count = new_count;
    candidate.updated_at = Utc::now().timestamp_millis();
    let candidate = candidate.clone();
    let snapshot = data.snapshot();
    data.commit().await?;
    warn!(
        "Vote count of '{}' overridden to {new_count} by '{}'",
        candidate.name, token.username
    );

    Ok(Json(CandidateResponse {
        candidate,
        snapshot,
    }))
}

#[patch("/election/meta", data = "<update>", format = "json")]
async fn update_meta(
    _token: AuthToken<Admin>,
    update: Json<MetaUpdate>,
    election: Store<ElectionData>,
) -> Result<Json<SnapshotResponse>> {
    let update = update.into_inner();
    let mut data = election.write().await;
    let meta = &mut data.election;
    if let Some(title) = update.title {
        meta.title = title.trim().to_string();
    }
    if let Some(description) = update.description {
        meta.description = description.trim().to_string();
    }
    if let Some(banner_image) = update.banner_image {
        meta.banner_image = banner_image.trim().to_string();
    }
    if let Some(eligibility) = update.eligibility {
        meta.eligibility = eligibility;
    }
    let snapshot = data.snapshot();
    data.commit().await?;

    Ok(Json(SnapshotResponse { snapshot }))
}

#[patch("/election/schedule", data = "<update>", format = "json")]
async fn update_schedule(
    _token: AuthToken<Admin>,
    update: Json<ScheduleUpdate>,
    election: Store<ElectionData>,
    closer: &State<VotingCloser>,
) -> Result<Json<SnapshotResponse>> {
    let starts_at = update.voting_starts_at.unwrap_or(0);
    let ends_at = update.voting_ends_at.unwrap_or(0);
    if !representable(starts_at) || !representable(ends_at) {
        return Err(Error::bad_request("Voting times are out of range."));
    }
    if starts_at != 0 && ends_at != 0 && ends_at <= starts_at {
        return Err(Error::bad_request(
            "Voting end time must be after the start time.",
        ));
    }

    let mut data = election.write().await;
    data.election.voting_starts_at = starts_at;
    data.election.voting_ends_at = ends_at;
    let updated = data.election.clone();
    let snapshot = data.snapshot();
    data.commit().await?;
    closer.schedule(election.clone(), &updated).await;

    Ok(Json(SnapshotResponse { snapshot }))
}

#[post("/election/phase", data = "<request>", format = "json")]
async fn change_phase(
    token: AuthToken<Admin>,
    request: Json<PhaseRequest>,
    election: Store<ElectionData>,
    closer: &State<VotingCloser>,
) -> Result<Json<SnapshotResponse>> {
    let action: PhaseAction = request
        .action
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| Error::bad_request("Phase action is required."))?
        .parse()
        .map_err(|e: UnknownPhaseAction| Error::bad_request(e.to_string()))?;

    let mut data = election.write().await;
    data.apply_phase_action(action, Utc::now())?;
    let updated = data.election.clone();
    let snapshot = data.snapshot();
    data.commit().await?;
    closer.schedule(election.clone(), &updated).await;
    info!(
        "Phase action {action:?} by '{}', election is now {}",
        token.username, updated.phase
    );

    Ok(Json(SnapshotResponse { snapshot }))
}

#[post("/elections/archive", data = "<request>", format = "json")]
async fn archive_election(
    _token: AuthToken<Admin>,
    request: Json<ArchiveRequest>,
    election: Store<ElectionData>,
    archive: Store<ArchiveIndex>,
) -> Result<Json<ArchiveResponse>> {
    let request = request.into_inner();
    let archived = {
        let data = election.read().await;
        ArchivedElection::new(&data, request.title, request.description, Utc::now())
    };

    let mut index = archive.write().await;
    archive
        .write_attachment(&archived.file_name(), &archived)
        .await?;
    index.elections.push(archived.entry());
    index.last_updated = Some(archived.archived_at);
    index.commit().await?;
    info!(
        "Archived election '{}' as {}",
        archived.title, archived.id
    );

    Ok(Json(ArchiveResponse {
        message: "Election archived successfully".to_string(),
        archive_id: archived.id,
        archived_at: archived.archived_at,
    }))
}

/// Trimmed, or `None` if blank.
/// A schedule bound the closer can turn into an instant, one second past it included.
fn representable(timestamp: i64) -> bool {
    timestamp
        .checked_add(1)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .is_some()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Resolve a requested position. Blank means the general pool.
fn checked_position(data: &ElectionData, requested: &str) -> Result<Option<Id>> {
    match requested.parse::<Id>() {
        Err(_) => Ok(None),
        Ok(id) if data.position(&id).is_some() => Ok(Some(id)),
        Ok(_) => Err(Error::bad_request("Invalid position ID.")),
    }
}
