use chrono::Utc;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    logging::RequestId,
    model::{
        api::{
            auth::{AuthToken, Voter},
            election::{ElectionView, PositionsResponse, VoteRequest, VoteResponse},
            receipt::{verification_code, Receipt, VerifiedVote, VerifyRequest, VerifyResponse},
        },
        common::id::Id,
        db::{closer::VotingCloser, election::ElectionData, user::UserList},
        store::Store,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![get_election, get_positions, cast_vote, verify_receipt]
}

#[get("/election")]
async fn get_election(
    token: Option<AuthToken<Voter>>,
    election: Store<ElectionData>,
    users: Store<UserList>,
) -> Json<ElectionView> {
    let viewer = token.map(AuthToken::into_user);
    let data = election.read().await;
    let list = users.read().await;
    Json(data.view(&list, viewer.as_ref()))
}

#[get("/positions")]
async fn get_positions(election: Store<ElectionData>) -> Json<PositionsResponse> {
    let positions = election.read().await.snapshot().positions;
    Json(PositionsResponse { positions })
}

#[post("/votes", data = "<request>", format = "json")]
async fn cast_vote(
    token: AuthToken<Voter>,
    request: Json<VoteRequest>,
    request_id: &RequestId,
    election: Store<ElectionData>,
    closer: &State<VotingCloser>,
    config: &State<Config>,
) -> Result<(Status, Json<VoteResponse>)> {
    let candidate_id = request.candidate_id();
    let mut data = election.write().await;

    let vote = match data.cast_vote(&token, candidate_id.as_ref(), Utc::now()) {
        Ok(vote) => vote,
        Err(rejection) => {
            if rejection.mutated_state() {
                let ended = data.election.clone();
                data.commit().await?;
                closer.schedule(election.clone(), &ended).await;
                info!("req{request_id}: late ballot closed the election");
            }
            return Err(rejection.into());
        }
    };

    let candidate = data
        .candidate(&vote.candidate_id)
        .cloned()
        .ok_or_else(|| Error::not_found("Candidate"))?;
    let snapshot = data.snapshot();
    data.commit().await?;
    debug!("req{request_id}: vote {} recorded", vote.id);

    let receipt = Receipt::issue(&vote, &candidate, config.receipt_secret())?;
    Ok((
        Status::Created,
        Json(VoteResponse {
            snapshot,
            candidate,
            receipt,
        }),
    ))
}

#[post("/verify-receipt", data = "<request>", format = "json")]
async fn verify_receipt(
    request: Json<VerifyRequest>,
    election: Store<ElectionData>,
    config: &State<Config>,
) -> Result<(Status, Json<VerifyResponse>)> {
    let (code, vote_id) = match (
        request.verification_code.as_deref().map(str::trim),
        request.vote_id.as_deref().and_then(|id| id.parse::<Id>().ok()),
    ) {
        (Some(code), Some(vote_id)) if !code.is_empty() => (code, vote_id),
        _ => {
            return Err(Error::bad_request(
                "Verification code and vote ID are required.",
            ))
        }
    };

    let data = election.read().await;
    let Some(vote) = data.vote(&vote_id) else {
        return Ok((
            Status::NotFound,
            Json(VerifyResponse::invalid("Vote not found.")),
        ));
    };

    let expected = verification_code(vote, config.receipt_secret());
    if !expected.eq_ignore_ascii_case(code) {
        return Ok((
            Status::Ok,
            Json(VerifyResponse::invalid("Invalid verification code.")),
        ));
    }
    let candidate_name = data
        .candidate(&vote.candidate_id)
        .map_or_else(|| "Unknown".to_string(), |c| c.name.clone());
    Ok((
        Status::Ok,
        Json(VerifyResponse::valid(VerifiedVote {
            candidate_name,
            timestamp: vote.created_at,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType,
        local::asynchronous::{Client, LocalResponse},
        serde::json::{json, serde_json},
    };

    use crate::{
        error::ErrorMessage,
        model::{
            api::receipt::ReceiptData,
            common::{
                election::{Eligibility, Phase, PhaseAction},
                role::Role,
            },
            db::user::User,
        },
    };

    use super::*;

    /// Fill the store with the President/VP example and open voting.
    async fn open_voting(election: &Store<ElectionData>) -> ElectionData {
        let mut data = election.write().await;
        *data = ElectionData::example();
        data.apply_phase_action(PhaseAction::Start, Utc::now())
            .unwrap();
        let snapshot = data.clone();
        data.commit().await.unwrap();
        snapshot
    }

    #[backend_test(voter)]
    async fn one_vote_per_position(client: Client, election: Store<ElectionData>) {
        let data = open_voting(&election).await;
        let a = data.candidate_named("A").id.clone();
        let b = data.candidate_named("B").id.clone();
        let c = data.candidate_named("C").id.clone();
        let d = data.candidate_named("D").id.clone();

        let response = vote_expect_status(&client, Some(&a), Status::Created).await;
        let body: VoteResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(body.candidate.vote_count, 1);
        assert_eq!(body.snapshot.total_votes, 1);
        assert_eq!(body.snapshot.last_voter.as_deref(), Some("test-voter"));
        assert_eq!(body.receipt.data.candidate_name, "A");
        assert!(body.receipt.qr_code.starts_with("data:image/svg+xml;base64,"));

        let response = vote_expect_status(&client, Some(&b), Status::Conflict).await;
        assert_eq!(
            message_of(response).await,
            "You have already voted for President."
        );

        vote_expect_status(&client, Some(&c), Status::Created).await;
        vote_expect_status(&client, Some(&d), Status::Created).await;
        let response = vote_expect_status(&client, Some(&d), Status::Conflict).await;
        assert_eq!(
            message_of(response).await,
            "You have already voted for this election."
        );

        {
            let stored = election.read().await;
            assert_eq!(stored.votes.len(), 3);
            assert_eq!(stored.total_votes(), 3);
            assert_eq!(stored.candidate_named("B").vote_count, 0);
        }

        let view = get_view(&client).await;
        assert_eq!(view.voted_positions.len(), 3);
        assert!(view.voted_positions.contains(&None));
    }

    #[backend_test(voter)]
    async fn concurrent_ballots_for_one_position(client: Client, election: Store<ElectionData>) {
        let data = open_voting(&election).await;
        let a = data.candidate_named("A").id.clone();
        let b = data.candidate_named("B").id.clone();

        let ballot = |candidate_id: &Id| {
            client
                .post(uri!(cast_vote))
                .header(ContentType::JSON)
                .body(json!({ "candidateId": candidate_id }).to_string())
                .dispatch()
        };
        let (first, second) = rocket::tokio::join!(ballot(&a), ballot(&b));
        let statuses = [first.status(), second.status()];
        assert_eq!(statuses.iter().filter(|s| **s == Status::Created).count(), 1);
        assert_eq!(statuses.iter().filter(|s| **s == Status::Conflict).count(), 1);

        let stored = election.read().await;
        assert_eq!(stored.votes.len(), 1);
        assert_eq!(stored.total_votes(), 1);
    }

    #[backend_test(voter)]
    async fn ballot_validation(client: Client, election: Store<ElectionData>) {
        let data = ElectionData::example();
        let a = data.candidate_named("A").id.clone();
        {
            let mut stored = election.write().await;
            *stored = data;
            stored.commit().await.unwrap();
        }

        // Still a draft.
        let response = vote_expect_status(&client, Some(&a), Status::BadRequest).await;
        assert_eq!(message_of(response).await, "Voting is not currently open.");

        vote_expect_status(&client, None, Status::BadRequest).await;
        vote_expect_status(&client, Some(&Id::new()), Status::NotFound).await;

        {
            let mut stored = election.write().await;
            stored.election.phase = Phase::Voting;
            stored.election.voting_starts_at = Utc::now().timestamp() + 3600;
            stored.commit().await.unwrap();
        }
        let response = vote_expect_status(&client, Some(&a), Status::BadRequest).await;
        assert_eq!(message_of(response).await, "Voting has not started yet.");
        assert!(election.read().await.votes.is_empty());
    }

    #[backend_test(voter)]
    async fn eligibility_by_department(
        client: Client,
        election: Store<ElectionData>,
        users: Store<UserList>,
    ) {
        let data = open_voting(&election).await;
        let a = data.candidate_named("A").id.clone();
        {
            let mut stored = election.write().await;
            stored.election.eligibility = Eligibility {
                departments: vec!["ECE".to_string()],
                years: vec![],
            };
            stored.commit().await.unwrap();
        }

        // The signed in voter studies CS.
        let response = vote_expect_status(&client, Some(&a), Status::Forbidden).await;
        assert_eq!(message_of(response).await, "Voting is restricted to: ECE");

        {
            let mut list = users.write().await;
            let me = list
                .users
                .iter_mut()
                .find(|u| u.username == "test-voter")
                .unwrap();
            me.department = Some("ECE".to_string());
            me.year = Some("4".to_string());
            list.commit().await.unwrap();
        }
        vote_expect_status(&client, Some(&a), Status::Created).await;
    }

    #[backend_test(voter)]
    async fn late_ballot_ends_voting(client: Client, election: Store<ElectionData>) {
        let data = open_voting(&election).await;
        let a = data.candidate_named("A").id.clone();
        {
            let mut stored = election.write().await;
            stored.election.voting_ends_at = Utc::now().timestamp() - 10;
            stored.commit().await.unwrap();
        }

        let response = vote_expect_status(&client, Some(&a), Status::BadRequest).await;
        assert_eq!(message_of(response).await, "Voting window has closed.");
        assert_eq!(get_view(&client).await.snapshot.phase, Phase::Ended);

        let response = vote_expect_status(&client, Some(&a), Status::BadRequest).await;
        assert_eq!(message_of(response).await, "Voting is not currently open.");
        assert!(election.read().await.votes.is_empty());
    }

    #[backend_test]
    async fn anonymous_and_banned_cannot_vote(
        client: Client,
        election: Store<ElectionData>,
        users: Store<UserList>,
    ) {
        let data = open_voting(&election).await;
        let a = data.candidate_named("A").id.clone();
        vote_expect_status(&client, Some(&a), Status::Unauthorized).await;

        crate::test_login(&client, "mallory", &[Role::Voter]).await;
        {
            let mut list = users.write().await;
            let mallory = list
                .users
                .iter_mut()
                .find(|u| u.username == "mallory")
                .unwrap();
            mallory.banned = true;
            list.commit().await.unwrap();
        }
        let response = vote_expect_status(&client, Some(&a), Status::Forbidden).await;
        assert_eq!(
            message_of(response).await,
            "Account is banned. Contact administration."
        );
        assert!(election.read().await.votes.is_empty());
    }

    #[backend_test(voter)]
    async fn receipt_verification(client: Client, election: Store<ElectionData>) {
        let data = open_voting(&election).await;
        let c = data.candidate_named("C").id.clone();
        let response = vote_expect_status(&client, Some(&c), Status::Created).await;
        let body: VoteResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        let ReceiptData {
            vote_id,
            verification_code: code,
            timestamp,
            ..
        } = body.receipt.data;

        let (status, result) = verify(
            &client,
            json!({ "verificationCode": code, "voteId": vote_id }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(
            result,
            VerifyResponse::valid(VerifiedVote {
                candidate_name: "C".to_string(),
                timestamp,
            })
        );

        let lower = code.to_lowercase();
        let (_, result) = verify(
            &client,
            json!({ "verificationCode": lower, "voteId": vote_id }),
        )
        .await;
        assert!(result.valid);

        let mut mutated = code.clone().into_bytes();
        mutated[0] = if mutated[0] == b'0' { b'1' } else { b'0' };
        let mutated = String::from_utf8(mutated).unwrap();
        let (status, result) = verify(
            &client,
            json!({ "verificationCode": mutated, "voteId": vote_id }),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert_eq!(result, VerifyResponse::invalid("Invalid verification code."));

        let (status, result) = verify(
            &client,
            json!({ "verificationCode": code, "voteId": "nope" }),
        )
        .await;
        assert_eq!(status, Status::NotFound);
        assert!(!result.valid);

        let response = client
            .post(uri!(verify_receipt))
            .header(ContentType::JSON)
            .body(json!({ "voteId": vote_id }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[backend_test]
    async fn activity_is_redacted_for_non_admins(
        client: Client,
        election: Store<ElectionData>,
        users: Store<UserList>,
    ) {
        let data = open_voting(&election).await;
        let a = data.candidate_named("A").id.clone();
        let voter = User::example("vic", &[Role::Voter]);
        {
            let mut stored = election.write().await;
            stored.cast_vote(&voter, Some(&a), Utc::now()).unwrap();
            stored.commit().await.unwrap();
            let mut list = users.write().await;
            list.users.push(voter);
            list.commit().await.unwrap();
        }

        // Anonymous.
        let view = get_view(&client).await;
        assert_eq!(view.activity.len(), 1);
        assert_eq!(view.activity[0].voter_name, "vic");
        assert_eq!(view.activity[0].candidate_id, None);
        assert_eq!(view.activity[0].candidate_name, None);
        assert!(view.voted_positions.is_empty());
        assert_eq!(view.leader.map(|l| l.name), Some("A".to_string()));

        crate::test_login(&client, "ivy", &[Role::Voter, Role::Inspector]).await;
        let view = get_view(&client).await;
        assert_eq!(view.activity[0].candidate_name, None);

        crate::test_login(&client, "ada", &[Role::Voter, Role::Admin]).await;
        let view = get_view(&client).await;
        assert_eq!(view.activity[0].candidate_id, Some(a));
        assert_eq!(view.activity[0].candidate_name.as_deref(), Some("A"));
    }

    #[backend_test]
    async fn positions_are_sorted(client: Client, election: Store<ElectionData>) {
        {
            let mut data = election.write().await;
            *data = ElectionData::example();
            data.positions[0].order = 5;
            data.commit().await.unwrap();
        }
        let response = client.get(uri!(get_positions)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body: PositionsResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        let titles: Vec<_> = body.positions.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["VP", "President"]);
    }

    async fn vote_expect_status<'c>(
        client: &'c Client,
        candidate_id: Option<&Id>,
        status: Status,
    ) -> LocalResponse<'c> {
        let response = client
            .post(uri!(cast_vote))
            .header(ContentType::JSON)
            .body(json!({ "candidateId": candidate_id }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), status);
        response
    }

    async fn verify(client: &Client, body: serde_json::Value) -> (Status, VerifyResponse) {
        let response = client
            .post(uri!(verify_receipt))
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await;
        let status = response.status();
        let body = response.into_string().await.unwrap();
        (status, serde_json::from_str(&body).unwrap())
    }

    async fn get_view(client: &Client) -> ElectionView {
        let response = client.get(uri!(get_election)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    async fn message_of(response: LocalResponse<'_>) -> String {
        let body = response.into_string().await.unwrap();
        serde_json::from_str::<ErrorMessage>(&body).unwrap().message
    }
}
