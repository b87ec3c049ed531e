//! Persistence for accounts and posts, and the stores built on top of it.
//!
//! [`Database`] is the storage seam with two backends: [`client::DbClient`]
//! (PostgreSQL) and [`memory::MemoryDb`]. The rules of the domain live in the
//! stores ([`accounts::CredentialStore`], [`posts::PostStore`]) and in
//! [`feed::FeedAssembler`], which work against either backend.

pub mod accounts;
pub mod client;
pub mod feed;
pub mod memory;
pub mod posts;
mod record;

use async_trait::async_trait;
use corkboard_common::model::{
    Id, ModelValidationError,
    account::{Account, AccountMarker, Email, Profile},
    post::{Comment, Post, PostMarker},
};
use std::fmt::Debug;
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An account with this email already exists")]
    DuplicateEmail,
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Storage primitives.
///
/// Every post mutation is atomic per post: concurrent calls on one post behave
/// as if run one after another, so no like or comment is lost. Mutations return
/// `None` when the post does not exist.
#[async_trait]
pub trait Database: Debug + Send + Sync {
    /// Fails with [`DbError::DuplicateEmail`] if the email is taken, even when
    /// racing another insert of the same email.
    async fn insert_account(&self, account: &Account) -> Result<()>;

    async fn fetch_account(&self, account_id: Id<AccountMarker>) -> Result<Option<Account>>;

    async fn fetch_account_by_email(&self, email: &Email) -> Result<Option<Account>>;

    /// Unknown ids are skipped.
    async fn fetch_profiles(&self, account_ids: &[Id<AccountMarker>]) -> Result<Vec<Profile>>;

    async fn update_avatar(
        &self,
        account_id: Id<AccountMarker>,
        avatar: &str,
    ) -> Result<Option<Account>>;

    async fn insert_post(&self, post: &Post) -> Result<()>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    /// Newest first, ties broken by id.
    async fn fetch_posts(&self) -> Result<Vec<Post>>;

    /// Replaces the text only. Callers validate the new content beforehand.
    async fn update_post_text(&self, post_id: Id<PostMarker>, text: &str) -> Result<Option<Post>>;

    /// Returns whether a post was removed.
    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;

    async fn toggle_like(
        &self,
        post_id: Id<PostMarker>,
        account_id: Id<AccountMarker>,
    ) -> Result<Option<Post>>;

    async fn prepend_comment(
        &self,
        post_id: Id<PostMarker>,
        comment: &Comment,
    ) -> Result<Option<Post>>;
}

/// Newest first; the id breaks ties between posts created in the same instant.
pub(crate) fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_unstable_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
