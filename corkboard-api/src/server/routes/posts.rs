use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Json, Message},
    routes::read_form,
};
use axum::extract::{Multipart, State, multipart::MultipartRejection};
use axum_extra::routing::{RouterExt, TypedPath};
use corkboard_common::model::{Id, feed::FeedPost, post::PostMarker};
use corkboard_db::{feed::FeedAssembler, posts::PostStore};
use corkboard_media::{MediaBridge, MediaFolder};
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_put(edit_post)
        .typed_delete(delete_post)
        .typed_put(toggle_like)
        .typed_post(add_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

async fn list_posts(
    PostsPath(): PostsPath,
    State(posts): State<PostStore>,
    State(feed): State<FeedAssembler>,
) -> Result<Json<Vec<FeedPost>>> {
    let posts = posts.list().await?;

    Ok(Json(feed.assemble(posts).await?))
}

/// Multipart form with a `text` field and an optional `image` file. The image
/// is uploaded first; if that fails, no post is created.
async fn create_post(
    PostsPath(): PostsPath,
    user: AuthenticatedUser,
    State(posts): State<PostStore>,
    State(feed): State<FeedAssembler>,
    State(media): State<MediaBridge>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<FeedPost>> {
    let form = read_form(multipart?, "image").await?;

    let image = match form.file {
        Some(upload) => Some(media.upload(upload, MediaFolder::PostImages).await?),
        None => None,
    };

    let post = posts
        .create(user.account_id(), form.text.unwrap_or_default(), image)
        .await?;

    Ok(Json(feed.assemble_one(post).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

#[derive(Deserialize)]
struct EditPostRequest {
    text: Option<String>,
}

async fn edit_post(
    PostPath { id }: PostPath,
    user: AuthenticatedUser,
    State(posts): State<PostStore>,
    State(feed): State<FeedAssembler>,
    Json(request): Json<EditPostRequest>,
) -> Result<Json<FeedPost>> {
    let post = posts.edit(id, user.account_id(), request.text).await?;

    Ok(Json(feed.assemble_one(post).await?))
}

async fn delete_post(
    PostPath { id }: PostPath,
    user: AuthenticatedUser,
    State(posts): State<PostStore>,
) -> Result<Json<Message>> {
    posts.delete(id, user.account_id()).await?;

    Ok(Message::reply("Post removed"))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/like/{id}", rejection(ServerError))]
struct LikePath {
    id: Id<PostMarker>,
}

async fn toggle_like(
    LikePath { id }: LikePath,
    user: AuthenticatedUser,
    State(posts): State<PostStore>,
    State(feed): State<FeedAssembler>,
) -> Result<Json<FeedPost>> {
    let post = posts.toggle_like(id, user.account_id()).await?;

    Ok(Json(feed.assemble_one(post).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/comment/{id}", rejection(ServerError))]
struct CommentPath {
    id: Id<PostMarker>,
}

#[derive(Deserialize)]
struct CommentRequest {
    text: String,
}

async fn add_comment(
    CommentPath { id }: CommentPath,
    user: AuthenticatedUser,
    State(posts): State<PostStore>,
    State(feed): State<FeedAssembler>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<FeedPost>> {
    let post = posts
        .add_comment(id, user.account_id(), request.text)
        .await?;

    Ok(Json(feed.assemble_one(post).await?))
}
