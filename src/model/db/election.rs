use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        election::{Eligibility, Phase},
        id::Id,
    },
    store::JsonDocument,
};

/// Everything about the current election, stored as one document.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionData {
    #[serde(default)]
    pub election: Election,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Append-only log of cast votes.
    #[serde(default)]
    pub votes: Vec<Vote>,
}

impl JsonDocument for ElectionData {
    const FILE_NAME: &'static str = "data.json";
}

impl ElectionData {
    pub fn candidate(&self, id: &Id) -> Option<&Candidate> {
        self.candidates.iter().find(|c| &c.id == id)
    }

    pub fn candidate_mut(&mut self, id: &Id) -> Option<&mut Candidate> {
        self.candidates.iter_mut().find(|c| &c.id == id)
    }

    pub fn position(&self, id: &Id) -> Option<&Position> {
        self.positions.iter().find(|p| &p.id == id)
    }

    pub fn vote(&self, id: &Id) -> Option<&Vote> {
        self.votes.iter().find(|v| &v.id == id)
    }

    /// Remove a position, moving its candidates into the general pool.
    /// Votes and counts are left untouched.
    pub fn remove_position(&mut self, id: &Id) -> Option<Position> {
        let index = self.positions.iter().position(|p| &p.id == id)?;
        let removed = self.positions.remove(index);
        for candidate in self.candidates.iter_mut() {
            if candidate.position_id.as_ref() == Some(id) {
                candidate.position_id = None;
            }
        }
        Some(removed)
    }

    /// Remove a candidate along with every vote cast for them.
    pub fn remove_candidate(&mut self, id: &Id) -> Option<Candidate> {
        let index = self.candidates.iter().position(|c| &c.id == id)?;
        let removed = self.candidates.remove(index);
        self.votes.retain(|v| &v.candidate_id != id);
        Some(removed)
    }
}

/// The singleton election record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Election {
    pub title: String,
    pub description: String,
    pub banner_image: String,
    pub phase: Phase,
    /// Unix seconds, 0 when unset.
    pub voting_starts_at: i64,
    /// Unix seconds, 0 when unset.
    pub voting_ends_at: i64,
    /// Unix seconds of the most recent vote, 0 when none.
    pub last_vote_at: i64,
    /// Display name of the most recent voter.
    pub last_voter: Option<String>,
    pub eligibility: Eligibility,
}

impl Default for Election {
    fn default() -> Self {
        Self {
            title: "University Election".to_string(),
            description: "Cast your vote for the next student council.".to_string(),
            banner_image: String::new(),
            phase: Phase::Draft,
            voting_starts_at: 0,
            voting_ends_at: 0,
            last_vote_at: 0,
            last_voter: None,
            eligibility: Eligibility::default(),
        }
    }
}

impl Election {
    /// Has the scheduled opening time not been reached yet?
    pub fn before_window(&self, now: DateTime<Utc>) -> bool {
        self.voting_starts_at != 0 && now.timestamp() < self.voting_starts_at
    }

    /// Has the scheduled closing time passed?
    pub fn after_window(&self, now: DateTime<Utc>) -> bool {
        self.voting_ends_at != 0 && now.timestamp() > self.voting_ends_at
    }
}

/// An electable role, e.g. President.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default = "default_max_votes")]
    pub max_votes: u32,
}

fn default_max_votes() -> u32 {
    1
}

/// A person standing for a position, or for the general pool when
/// `position_id` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: Id,
    #[serde(default)]
    pub position_id: Option<Id>,
    pub name: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub manifesto: String,
    #[serde(default)]
    pub image_uri: String,
    /// Cached number of votes referencing this candidate.
    #[serde(default)]
    pub vote_count: u64,
    /// Unix milliseconds.
    #[serde(default)]
    pub created_at: i64,
    /// Unix milliseconds.
    #[serde(default)]
    pub updated_at: i64,
}

/// A single cast vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: Id,
    pub user_id: Id,
    pub candidate_id: Id,
    /// Unix milliseconds.
    pub created_at: i64,
}
