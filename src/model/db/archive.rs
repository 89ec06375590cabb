use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    db::election::{Candidate, Election, ElectionData, Vote},
    store::JsonDocument,
};

const NO_VOTES: &str = "No votes";

/// Index of every archived election.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveIndex {
    #[serde(default)]
    pub elections: Vec<ArchiveEntry>,
    /// Unix milliseconds of the most recent archive.
    #[serde(default)]
    pub last_updated: Option<i64>,
}

impl JsonDocument for ArchiveIndex {
    const FILE_NAME: &'static str = "archive/election-index.json";
}

impl ArchiveIndex {
    /// Entries sorted newest first.
    pub fn newest_first(mut self) -> Self {
        self.elections
            .sort_by(|a, b| b.archived_at.cmp(&a.archived_at));
        self
    }
}

/// Summary line for one archived election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    pub id: String,
    pub title: String,
    pub archived_at: i64,
    pub total_votes: u64,
    pub winner: String,
}

/// A frozen copy of a finished election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedElection {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Unix milliseconds.
    pub archived_at: i64,
    pub election: Election,
    /// Candidates with counts recomputed from the vote log.
    pub candidates: Vec<Candidate>,
    pub votes: Vec<Vote>,
    pub stats: ArchiveStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveStats {
    pub total_votes: u64,
    pub winner_name: String,
    pub winner_votes: u64,
}

impl ArchivedElection {
    /// Freeze the given election. Title and description default to the
    /// election's own.
    pub fn new(
        data: &ElectionData,
        title: Option<String>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let archived_at = now.timestamp_millis();
        let id = archive_id(archived_at);

        let mut recounted = data.clone();
        for candidate in recounted.candidates.iter_mut() {
            candidate.vote_count = data
                .votes
                .iter()
                .filter(|v| v.candidate_id == candidate.id)
                .count() as u64;
        }
        let (winner_name, winner_votes) = match recounted.leader() {
            Some(leader) if leader.vote_count > 0 => (leader.name.clone(), leader.vote_count),
            _ => (NO_VOTES.to_string(), 0),
        };

        Self {
            id,
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| data.election.title.clone()),
            description: description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| data.election.description.clone()),
            archived_at,
            election: data.election.clone(),
            candidates: recounted.candidates,
            votes: data.votes.clone(),
            stats: ArchiveStats {
                total_votes: data.votes.len() as u64,
                winner_name,
                winner_votes,
            },
        }
    }

    /// File name of this archive, relative to the archive directory.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.id)
    }

    pub fn entry(&self) -> ArchiveEntry {
        ArchiveEntry {
            id: self.id.clone(),
            title: self.title.clone(),
            archived_at: self.archived_at,
            total_votes: self.stats.total_votes,
            winner: self.stats.winner_name.clone(),
        }
    }
}

/// Archive IDs are derived from the archive time.
pub fn archive_id(archived_at_millis: i64) -> String {
    format!("election-{archived_at_millis}")
}

/// Is `id` shaped like an archive ID? Anything else must never reach the filesystem.
pub fn is_archive_id(id: &str) -> bool {
    id.strip_prefix("election-")
        .map_or(false, |millis| !millis.is_empty() && millis.chars().all(|c| c.is_ascii_digit()))
}
