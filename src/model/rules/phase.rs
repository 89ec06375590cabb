use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    common::election::{Phase, PhaseAction},
    db::election::ElectionData,
};

/// Why a phase transition was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhaseError {
    #[error("Voting has already started.")]
    AlreadyStarted,
    #[error("At least one candidate is required before starting.")]
    NoCandidates,
    #[error("Voting start time has not been reached yet.")]
    StartTimeNotReached,
    #[error("Voting is not active.")]
    NotActive,
}

impl ElectionData {
    /// Apply an admin phase action at time `now`.
    ///
    /// On error the data is left untouched.
    pub fn apply_phase_action(
        &mut self,
        action: PhaseAction,
        now: DateTime<Utc>,
    ) -> Result<(), PhaseError> {
        let election = &mut self.election;
        match action {
            PhaseAction::Start => {
                if election.phase != Phase::Draft {
                    return Err(PhaseError::AlreadyStarted);
                }
                if self.candidates.is_empty() {
                    return Err(PhaseError::NoCandidates);
                }
                if election.before_window(now) {
                    return Err(PhaseError::StartTimeNotReached);
                }
                election.phase = Phase::Voting;
            }
            PhaseAction::Close => {
                if election.phase != Phase::Voting {
                    return Err(PhaseError::NotActive);
                }
                election.phase = Phase::Ended;
            }
            PhaseAction::Refresh => {
                self.expire_if_due(now);
            }
            PhaseAction::Reset => self.reset(now),
        }
        Ok(())
    }

    /// End voting if the schedule has run out. Returns whether the phase changed.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        let election = &mut self.election;
        if election.phase == Phase::Voting && election.after_window(now) {
            election.phase = Phase::Ended;
            true
        } else {
            false
        }
    }

    /// Return to a pristine draft: no schedule, no votes, zero counts.
    fn reset(&mut self, now: DateTime<Utc>) {
        let election = &mut self.election;
        election.phase = Phase::Draft;
        election.voting_starts_at = 0;
        election.voting_ends_at = 0;
        election.last_vote_at = 0;
        election.last_voter = None;
        self.votes.clear();
        let now_millis = now.timestamp_millis();
        for candidate in self.candidates.iter_mut() {
            candidate.vote_count = 0;
            candidate.updated_at = now_millis;
        }
    }
}
