use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{
    api::receipt::Receipt,
    common::{
        election::{Eligibility, Phase},
        id::Id,
    },
    db::election::{Candidate, Position},
};

/// Aggregated election state returned by most election endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSnapshot {
    pub title: String,
    pub description: String,
    pub banner_image: String,
    pub phase: Phase,
    pub candidate_count: usize,
    /// Sum of the cached candidate counts.
    pub total_votes: u64,
    pub voting_starts_at: i64,
    pub voting_ends_at: i64,
    pub last_vote_at: i64,
    pub last_voter: Option<String>,
    pub eligibility: Eligibility,
    /// Sorted by `order`, then title.
    pub positions: Vec<Position>,
}

/// One entry in the recent-votes feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub id: Id,
    pub candidate_id: Option<Id>,
    pub candidate_name: Option<String>,
    pub voter_id: Id,
    pub voter_name: String,
    /// Unix milliseconds.
    pub timestamp: i64,
}

impl ActivityItem {
    /// Hide who the vote was for.
    pub fn redact(self) -> Self {
        Self {
            candidate_id: None,
            candidate_name: None,
            ..self
        }
    }
}

/// Full election view, as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionView {
    pub snapshot: ElectionSnapshot,
    pub candidates: Vec<Candidate>,
    pub leader: Option<Candidate>,
    pub activity: Vec<ActivityItem>,
    /// Positions the viewer has voted in. `null` is the general pool.
    pub voted_positions: Vec<Option<Id>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot: ElectionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionsResponse {
    pub positions: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionResponse {
    pub position: Position,
    pub snapshot: ElectionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub candidate: Candidate,
    pub snapshot: ElectionSnapshot,
}

/// Response to a deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub message: String,
    pub snapshot: ElectionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResponse {
    pub snapshot: ElectionSnapshot,
    pub candidate: Candidate,
    pub receipt: Receipt,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PhaseRequest {
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(default)]
    pub candidate_id: Option<String>,
}

impl VoteRequest {
    /// The requested candidate, if one was named.
    pub fn candidate_id(&self) -> Option<Id> {
        self.candidate_id.as_deref().and_then(|id| id.parse().ok())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSpec {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub max_votes: Option<u32>,
}

/// Candidate fields sent by an admin. For updates, absent fields are left
/// unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub manifesto: Option<String>,
    #[serde(default)]
    pub image_uri: Option<String>,
    /// Outer `None`: not sent. `Some(None)`: explicitly `null`, clearing the position.
    #[serde(default, deserialize_with = "explicit_null")]
    pub position_id: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCountRequest {
    #[serde(default)]
    pub new_count: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub banner_image: Option<String>,
    #[serde(default)]
    pub eligibility: Option<Eligibility>,
}

/// New voting window. Missing or zero times clear that bound.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    #[serde(default)]
    pub voting_starts_at: Option<i64>,
    #[serde(default)]
    pub voting_ends_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArchiveRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResponse {
    pub message: String,
    pub archive_id: String,
    pub archived_at: i64,
}

fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
