use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    common::{
        election::{Ineligible, Phase},
        id::Id,
    },
    db::{
        election::{ElectionData, Vote},
        user::User,
    },
};

/// Why a ballot was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteRejection {
    #[error("Candidate ID is required.")]
    MissingCandidate,
    #[error("Candidate not found.")]
    UnknownCandidate,
    #[error(transparent)]
    Ineligible(#[from] Ineligible),
    #[error("Voting is not currently open.")]
    NotOpen,
    #[error("Voting has not started yet.")]
    NotStarted,
    #[error("Voting window has closed.")]
    WindowClosed,
    #[error("You have already voted for {0}.")]
    AlreadyVoted(String),
}

impl VoteRejection {
    /// Did producing this rejection change the election? The caller must
    /// persist the data even though the ballot failed.
    pub fn mutated_state(&self) -> bool {
        matches!(self, Self::WindowClosed)
    }
}

impl ElectionData {
    /// Cast a ballot for `candidate_id` on behalf of `voter` at time `now`.
    ///
    /// The checks run in a fixed order and the first failure wins. A ballot
    /// arriving after the scheduled end moves the election to `Ended` before
    /// being rejected, see [`VoteRejection::mutated_state`].
    pub fn cast_vote(
        &mut self,
        voter: &User,
        candidate_id: Option<&Id>,
        now: DateTime<Utc>,
    ) -> Result<Vote, VoteRejection> {
        let candidate_id = candidate_id.ok_or(VoteRejection::MissingCandidate)?;
        let position_id = self
            .candidate(candidate_id)
            .ok_or(VoteRejection::UnknownCandidate)?
            .position_id
            .clone();

        self.election
            .eligibility
            .check(voter.department.as_deref(), voter.year.as_deref())?;

        if self.election.phase != Phase::Voting {
            return Err(VoteRejection::NotOpen);
        }
        if self.election.before_window(now) {
            return Err(VoteRejection::NotStarted);
        }
        if self.expire_if_due(now) {
            return Err(VoteRejection::WindowClosed);
        }

        if self.has_voted_for_position(&voter.id, position_id.as_ref()) {
            let title = position_id
                .as_ref()
                .and_then(|id| self.position(id))
                .map_or_else(|| "this election".to_string(), |p| p.title.clone());
            return Err(VoteRejection::AlreadyVoted(title));
        }

        let vote = Vote {
            id: Id::new(),
            user_id: voter.id.clone(),
            candidate_id: candidate_id.clone(),
            created_at: now.timestamp_millis(),
        };
        self.votes.push(vote.clone());
        if let Some(candidate) = self.candidate_mut(candidate_id) {
            candidate.vote_count += 1;
            candidate.updated_at = now.timestamp_millis();
        }
        self.election.last_vote_at = now.timestamp();
        self.election.last_voter = Some(voter.display_name());

        Ok(vote)
    }

    /// Has the user already voted for a candidate in the given position?
    /// `None` is the general pool, which counts as its own position.
    ///
    /// Votes whose candidate no longer exists do not count towards any position.
    pub fn has_voted_for_position(&self, user_id: &Id, position_id: Option<&Id>) -> bool {
        self.votes_by(user_id)
            .filter_map(|v| self.candidate(&v.candidate_id))
            .any(|c| c.position_id.as_ref() == position_id)
    }

    /// Positions the user has voted in, in voting order, without repeats.
    pub fn voted_positions(&self, user_id: &Id) -> Vec<Option<Id>> {
        let mut positions: Vec<Option<Id>> = Vec::new();
        for candidate in self
            .votes_by(user_id)
            .filter_map(|v| self.candidate(&v.candidate_id))
        {
            if !positions.contains(&candidate.position_id) {
                positions.push(candidate.position_id.clone());
            }
        }
        positions
    }

    fn votes_by<'a>(&'a self, user_id: &'a Id) -> impl Iterator<Item = &'a Vote> + 'a {
        self.votes.iter().filter(move |v| &v.user_id == user_id)
    }
}
