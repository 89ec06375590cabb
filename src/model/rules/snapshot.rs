use std::cmp::Ordering;

use crate::model::{
    api::election::{ActivityItem, ElectionSnapshot, ElectionView},
    db::{
        election::{Candidate, ElectionData},
        user::{User, UserList},
    },
};

/// Number of votes shown in the activity feed.
pub const ACTIVITY_LENGTH: usize = 25;

impl ElectionData {
    /// Sum of the cached candidate counts.
    pub fn total_votes(&self) -> u64 {
        self.candidates.iter().map(|c| c.vote_count).sum()
    }

    /// The candidate with the most votes. Ties go to the lowest ID.
    pub fn leader(&self) -> Option<&Candidate> {
        self.candidates.iter().max_by(|a, b| {
            a.vote_count
                .cmp(&b.vote_count)
                .then_with(|| b.id.cmp(&a.id))
        })
    }

    pub fn snapshot(&self) -> ElectionSnapshot {
        let election = &self.election;
        let mut positions = self.positions.clone();
        positions.sort_by(|a, b| match a.order.cmp(&b.order) {
            Ordering::Equal => a.title.cmp(&b.title),
            other => other,
        });
        ElectionSnapshot {
            title: election.title.clone(),
            description: election.description.clone(),
            banner_image: election.banner_image.clone(),
            phase: election.phase,
            candidate_count: self.candidates.len(),
            total_votes: self.total_votes(),
            voting_starts_at: election.voting_starts_at,
            voting_ends_at: election.voting_ends_at,
            last_vote_at: election.last_vote_at,
            last_voter: election.last_voter.clone(),
            eligibility: election.eligibility.clone(),
            positions,
        }
    }

    /// The most recent votes, newest first, with full attribution.
    pub fn activity(&self, users: &UserList) -> Vec<ActivityItem> {
        let mut votes: Vec<_> = self.votes.iter().collect();
        votes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        votes
            .into_iter()
            .take(ACTIVITY_LENGTH)
            .map(|vote| ActivityItem {
                id: vote.id.clone(),
                candidate_id: Some(vote.candidate_id.clone()),
                candidate_name: Some(
                    self.candidate(&vote.candidate_id)
                        .map_or_else(|| "Candidate".to_string(), |c| c.name.clone()),
                ),
                voter_id: vote.user_id.clone(),
                voter_name: users
                    .find(&vote.user_id)
                    .map_or_else(|| "Anonymous".to_string(), User::display_name),
                timestamp: vote.created_at,
            })
            .collect()
    }

    /// Everything a client needs to render the election.
    ///
    /// Only admins and developers see who each recent vote was for.
    pub fn view(&self, users: &UserList, viewer: Option<&User>) -> ElectionView {
        let attributed = viewer.map_or(false, |v| v.roles.is_admin());
        let activity = self
            .activity(users)
            .into_iter()
            .map(|item| if attributed { item } else { item.redact() })
            .collect();
        ElectionView {
            snapshot: self.snapshot(),
            candidates: self.candidates.clone(),
            leader: self.leader().cloned(),
            activity,
            voted_positions: viewer
                .map(|v| self.voted_positions(&v.id))
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::model::{
        common::{election::PhaseAction, id::Id, role::Role},
        db::election::Position,
    };

    fn voting_data() -> ElectionData {
        let mut data = ElectionData::example();
        data.apply_phase_action(PhaseAction::Start, Utc::now())
            .unwrap();
        data
    }

    #[test]
    fn leader_breaks_ties_by_lowest_id() {
        let mut data = ElectionData::default();
        assert!(data.leader().is_none());

        let mut b = Candidate::example("B", None);
        b.id = Id::from("b");
        b.vote_count = 3;
        let mut a = Candidate::example("A", None);
        a.id = Id::from("a");
        a.vote_count = 3;
        let mut c = Candidate::example("C", None);
        c.id = Id::from("c");
        c.vote_count = 1;
        data.candidates = vec![b, a, c];
        assert_eq!(data.leader().unwrap().name, "A");

        data.candidate_mut(&Id::from("c")).unwrap().vote_count = 4;
        assert_eq!(data.leader().unwrap().name, "C");
        assert_eq!(data.total_votes(), 10);
    }

    #[test]
    fn snapshot_sorts_positions() {
        let mut data = ElectionData::example();
        data.positions.push(Position::example("Treasurer", 1));
        data.positions.push(Position::example("Auditor", 0));
        let titles: Vec<_> = data
            .snapshot()
            .positions
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["Auditor", "President", "Treasurer", "VP"]);
        assert_eq!(data.snapshot().candidate_count, 4);
    }

    #[test]
    fn activity_is_newest_first_and_bounded() {
        let mut data = voting_data();
        let d = data.candidate_named("D").id.clone();
        let start = Utc::now();
        let voters: Vec<_> = (0..30)
            .map(|i| User::example(&format!("v{i}"), &[Role::Voter]))
            .collect();
        for (i, voter) in voters.iter().enumerate() {
            data.cast_vote(voter, Some(&d), start + Duration::seconds(i as i64))
                .unwrap();
        }
        let users = UserList { users: voters };
        let activity = data.activity(&users);
        assert_eq!(activity.len(), ACTIVITY_LENGTH);
        assert_eq!(activity[0].voter_name, "v29");
        assert!(activity
            .windows(2)
            .all(|w| w[0].timestamp >= w[1].timestamp));
        assert_eq!(activity[0].candidate_name.as_deref(), Some("D"));
    }

    #[test]
    fn view_redacts_for_non_admins() {
        let mut data = voting_data();
        let a = data.candidate_named("A").id.clone();
        let alice = User::example("alice", &[Role::Voter]);
        data.cast_vote(&alice, Some(&a), Utc::now()).unwrap();
        let users = UserList {
            users: vec![alice.clone()],
        };

        let inspector = User::example("ivy", &[Role::Voter, Role::Inspector]);
        for viewer in [None, Some(&alice), Some(&inspector)] {
            let view = data.view(&users, viewer);
            assert_eq!(view.activity.len(), 1);
            assert_eq!(view.activity[0].candidate_id, None);
            assert_eq!(view.activity[0].candidate_name, None);
            assert_eq!(view.activity[0].voter_name, "alice");
        }

        for roles in [&[Role::Admin][..], &[Role::Developer][..]] {
            let staff = User::example("staff", roles);
            let view = data.view(&users, Some(&staff));
            assert_eq!(view.activity[0].candidate_id, Some(a.clone()));
            assert_eq!(view.activity[0].candidate_name.as_deref(), Some("A"));
            assert!(view.voted_positions.is_empty());
        }

        let own = data.view(&users, Some(&alice));
        assert_eq!(
            own.voted_positions,
            vec![data.candidate_named("A").position_id.clone()]
        );
        assert_eq!(own.leader.unwrap().id, a);
        assert!(data.view(&users, None).voted_positions.is_empty());
    }

    #[test]
    fn unknown_voter_is_anonymous() {
        let mut data = voting_data();
        let a = data.candidate_named("A").id.clone();
        let ghost = User::example("ghost", &[Role::Voter]);
        data.cast_vote(&ghost, Some(&a), Utc::now()).unwrap();
        let activity = data.activity(&UserList::default());
        assert_eq!(activity[0].voter_name, "Anonymous");
    }
}
