use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{Admin, AuthToken, Staff},
            user::{
                BanState, ModerationResponse, RoleState, ToggleRoleRequest, UserProfile,
                UsersResponse,
            },
        },
        common::{
            id::Id,
            role::{Role, UnknownRoleError},
        },
        db::user::UserList,
        rules::{authorize, UserAction},
        store::Store,
    },
};

pub fn routes() -> Vec<Route> {
    routes![get_users, toggle_ban, toggle_role]
}

#[get("/users")]
async fn get_users(_token: AuthToken<Staff>, users: Store<UserList>) -> Json<UsersResponse> {
    let list = users.read().await;
    Json(UsersResponse {
        users: list.users.iter().map(UserProfile::from).collect(),
    })
}

#[post("/users/<user_id>/toggle-ban")]
async fn toggle_ban(
    token: AuthToken<Staff>,
    user_id: Id,
    users: Store<UserList>,
) -> Result<Json<ModerationResponse<BanState>>> {
    let mut list = users.write().await;
    let target = list
        .find_mut(&user_id)
        .ok_or_else(|| Error::not_found("User"))?;
    authorize(&token, target, UserAction::ToggleBan)?;

    target.banned = !target.banned;
    target.updated_at = Utc::now();
    let state = BanState {
        id: target.id.clone(),
        banned: target.banned,
    };
    list.commit().await?;

    let message = if state.banned {
        "User banned."
    } else {
        "User unbanned."
    };
    info!("{} '{}' by '{}'", message, user_id, token.username);
    Ok(Json(ModerationResponse {
        message: message.to_string(),
        user: state,
    }))
}

#[post("/users/<user_id>/toggle-role", data = "<request>", format = "json")]
async fn toggle_role(
    token: AuthToken<Admin>,
    user_id: Id,
    request: Json<ToggleRoleRequest>,
    users: Store<UserList>,
) -> Result<Json<ModerationResponse<RoleState>>> {
    let role: Role = request
        .role
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| Error::bad_request("Role is required."))?
        .parse()
        .map_err(|e: UnknownRoleError| Error::bad_request(e.to_string()))?;

    let mut list = users.write().await;
    let target = list
        .find_mut(&user_id)
        .ok_or_else(|| Error::not_found("User"))?;
    authorize(&token, target, UserAction::ToggleRole(role))?;

    let granted = target.roles.toggle(role);
    target.updated_at = Utc::now();
    let state = RoleState {
        id: target.id.clone(),
        roles: target.roles.clone(),
    };
    list.commit().await?;

    info!(
        "Role {role} {} '{}' by '{}'",
        if granted { "granted to" } else { "revoked from" },
        user_id,
        token.username
    );
    Ok(Json(ModerationResponse {
        message: "User roles updated.".to_string(),
        user: state,
    }))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{json, serde_json},
    };

    use crate::model::{common::role::Roles, db::user::User};

    use super::*;

    async fn insert(users: &Store<UserList>, username: &str, roles: &[Role]) -> Id {
        let user = User::example(username, roles);
        let id = user.id.clone();
        let mut list = users.write().await;
        list.users.push(user);
        list.commit().await.unwrap();
        id
    }

    async fn own_id(users: &Store<UserList>, username: &str) -> Id {
        users
            .read()
            .await
            .find_by_identifier(username)
            .unwrap()
            .id
            .clone()
    }

    #[backend_test(inspector)]
    async fn inspector_bans_only_voters(client: Client, users: Store<UserList>) {
        let voter = insert(&users, "vic", &[Role::Voter]).await;
        let admin = insert(&users, "ada", &[Role::Voter, Role::Admin]).await;

        let response = client.post(uri!(toggle_ban(&admin))).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);
        assert!(!users.read().await.find(&admin).unwrap().banned);

        let response = client.post(uri!(toggle_ban(&voter))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body: ModerationResponse<BanState> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(body.message, "User banned.");
        assert!(body.user.banned);
        assert!(users.read().await.find(&voter).unwrap().banned);

        // And back again.
        let response = client.post(uri!(toggle_ban(&voter))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert!(!users.read().await.find(&voter).unwrap().banned);

        // Not themselves.
        let me = own_id(&users, "test-inspector").await;
        let response = client.post(uri!(toggle_ban(&me))).dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client.post(uri!(toggle_ban(&Id::new()))).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        // Inspectors may list users, but not change roles.
        let response = client.get(uri!(get_users)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body: UsersResponse =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(body.users.len(), 4);
        toggle_role_expect_status(&client, &voter, "inspector", Status::Forbidden).await;
    }

    #[backend_test(developer)]
    async fn developer_bans_admin(client: Client, users: Store<UserList>) {
        let admin = insert(&users, "ada", &[Role::Voter, Role::Admin]).await;
        let response = client.post(uri!(toggle_ban(&admin))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert!(users.read().await.find(&admin).unwrap().banned);
    }

    #[backend_test(voter)]
    async fn voters_cannot_moderate(client: Client, users: Store<UserList>) {
        let other = insert(&users, "vic", &[Role::Voter]).await;
        let response = client.post(uri!(toggle_ban(&other))).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);
        let response = client.get(uri!(get_users)).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[backend_test]
    async fn anonymous_cannot_list_users(client: Client) {
        let response = client.get(uri!(get_users)).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[backend_test(admin)]
    async fn admin_role_toggles(client: Client, users: Store<UserList>) {
        let voter = insert(&users, "vic", &[Role::Voter]).await;
        let developer = insert(&users, "dev", &[Role::Voter, Role::Developer]).await;

        let response = toggle_role_expect_status(&client, &voter, "inspector", Status::Ok).await;
        let body: ModerationResponse<RoleState> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(body.user.roles, Roles::new([Role::Voter, Role::Inspector]));
        assert!(users.read().await.find(&voter).unwrap().roles.has(Role::Inspector));

        toggle_role_expect_status(&client, &voter, "admin", Status::Forbidden).await;
        toggle_role_expect_status(&client, &developer, "inspector", Status::Forbidden).await;
        toggle_role_expect_status(&client, &voter, "wizard", Status::BadRequest).await;

        let me = own_id(&users, "test-admin").await;
        toggle_role_expect_status(&client, &me, "inspector", Status::BadRequest).await;

        // Missing role.
        let response = client
            .post(uri!(toggle_role(&voter)))
            .header(ContentType::JSON)
            .body(json!({}).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[backend_test(developer)]
    async fn developer_grants_admin(client: Client, users: Store<UserList>) {
        let voter = insert(&users, "vic", &[Role::Voter]).await;
        toggle_role_expect_status(&client, &voter, "Admin", Status::Ok).await;
        assert!(users.read().await.find(&voter).unwrap().roles.is_admin());
        toggle_role_expect_status(&client, &voter, "admin", Status::Ok).await;
        assert!(!users.read().await.find(&voter).unwrap().roles.is_admin());
    }

    async fn toggle_role_expect_status<'c>(
        client: &'c Client,
        user_id: &Id,
        role: &str,
        status: Status,
    ) -> rocket::local::asynchronous::LocalResponse<'c> {
        let response = client
            .post(uri!(toggle_role(user_id)))
            .header(ContentType::JSON)
            .body(json!({ "role": role }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), status);
        response
    }
}
