use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::Json,
    routes::read_form,
};
use axum::extract::{Multipart, State, multipart::MultipartRejection};
use axum_extra::routing::{RouterExt, TypedPath};
use corkboard_common::model::{
    account::{Account, AccountSummary},
    auth::{SessionIssuer, SessionToken},
};
use corkboard_db::accounts::CredentialStore;
use corkboard_media::{MediaBridge, MediaFolder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(signup)
        .typed_post(login)
        .typed_post(upload_profile_pic)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct SessionResponse {
    token: SessionToken,
    user: AccountSummary,
}

fn start_session(sessions: &SessionIssuer, account: &Account) -> Result<Json<SessionResponse>> {
    let token = sessions.issue(account.id)?;

    Ok(Json(SessionResponse {
        token,
        user: AccountSummary::from(account),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/signup", rejection(ServerError))]
struct SignupPath();

#[derive(Deserialize)]
struct SignupRequest {
    name: String,
    email: String,
    password: String,
}

async fn signup(
    SignupPath(): SignupPath,
    State(credentials): State<CredentialStore>,
    State(sessions): State<Arc<SessionIssuer>>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<SessionResponse>> {
    let account = credentials
        .register(&request.name, request.email, request.password)
        .await?;

    start_session(&sessions, &account)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login", rejection(ServerError))]
struct LoginPath();

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    LoginPath(): LoginPath,
    State(credentials): State<CredentialStore>,
    State(sessions): State<Arc<SessionIssuer>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let account = credentials
        .authenticate(request.email, request.password)
        .await?;

    start_session(&sessions, &account)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/uploadProfilePic", rejection(ServerError))]
struct UploadProfilePicPath();

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ProfilePicResponse {
    msg: &'static str,
    url: String,
}

async fn upload_profile_pic(
    UploadProfilePicPath(): UploadProfilePicPath,
    user: AuthenticatedUser,
    State(credentials): State<CredentialStore>,
    State(media): State<MediaBridge>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProfilePicResponse>> {
    let upload = read_form(multipart?, "profilePic")
        .await?
        .file
        .ok_or(ServerError::NoFileUploaded)?;

    let url = media.upload(upload, MediaFolder::ProfilePictures).await?;
    credentials.set_avatar(user.account_id(), &url).await?;

    Ok(Json(ProfilePicResponse {
        msg: "Profile picture updated",
        url,
    }))
}
