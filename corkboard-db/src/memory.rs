use crate::{Database, DbError, Result, sort_newest_first};
use async_trait::async_trait;
use corkboard_common::model::{
    Id,
    account::{Account, AccountMarker, Email, Profile},
    post::{Comment, Post, PostMarker},
};
use dashmap::{DashMap, mapref::entry::Entry};

/// In-process backend, used when no database is configured and in tests.
///
/// Each post is mutated while holding its map shard's write lock, which makes
/// every post mutation atomic. The email index plays the part of a unique
/// constraint.
#[derive(Debug, Default)]
pub struct MemoryDb {
    accounts: DashMap<Id<AccountMarker>, Account>,
    account_ids_by_email: DashMap<Email, Id<AccountMarker>>,
    posts: DashMap<Id<PostMarker>, Post>,
}

impl MemoryDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn modify_post(
        &self,
        post_id: Id<PostMarker>,
        modify: impl FnOnce(&mut Post),
    ) -> Option<Post> {
        let mut post = self.posts.get_mut(&post_id)?;
        modify(&mut post);
        Some(post.clone())
    }
}

#[async_trait]
impl Database for MemoryDb {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        match self.account_ids_by_email.entry(account.email.clone()) {
            Entry::Occupied(_) => Err(DbError::DuplicateEmail),
            Entry::Vacant(entry) => {
                // Stored before the email is indexed, so lookups by email never dangle.
                self.accounts.insert(account.id, account.clone());
                entry.insert(account.id);
                Ok(())
            }
        }
    }

    async fn fetch_account(&self, account_id: Id<AccountMarker>) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .get(&account_id)
            .map(|account| account.clone()))
    }

    async fn fetch_account_by_email(&self, email: &Email) -> Result<Option<Account>> {
        let Some(account_id) = self.account_ids_by_email.get(email).map(|id| *id) else {
            return Ok(None);
        };
        self.fetch_account(account_id).await
    }

    async fn fetch_profiles(&self, account_ids: &[Id<AccountMarker>]) -> Result<Vec<Profile>> {
        Ok(account_ids
            .iter()
            .filter_map(|id| self.accounts.get(id))
            .map(|account| Profile::from(&*account))
            .collect())
    }

    async fn update_avatar(
        &self,
        account_id: Id<AccountMarker>,
        avatar: &str,
    ) -> Result<Option<Account>> {
        Ok(self.accounts.get_mut(&account_id).map(|mut account| {
            account.avatar = Some(avatar.to_owned());
            account.clone()
        }))
    }

    async fn insert_post(&self, post: &Post) -> Result<()> {
        self.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        Ok(self.posts.get(&post_id).map(|post| post.clone()))
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self.posts.iter().map(|post| post.clone()).collect();
        sort_newest_first(&mut posts);
        Ok(posts)
    }

    async fn update_post_text(&self, post_id: Id<PostMarker>, text: &str) -> Result<Option<Post>> {
        let mut updated = Ok(());
        let post = self.modify_post(post_id, |post| {
            updated = post
                .content
                .with_text(text.to_owned())
                .map(|content| post.content = content);
        });
        updated.map_err(|err| DbError::Data(err.into()))?;
        Ok(post)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        Ok(self.posts.remove(&post_id).is_some())
    }

    async fn toggle_like(
        &self,
        post_id: Id<PostMarker>,
        account_id: Id<AccountMarker>,
    ) -> Result<Option<Post>> {
        Ok(self.modify_post(post_id, |post| {
            post.toggle_like(account_id);
        }))
    }

    async fn prepend_comment(
        &self,
        post_id: Id<PostMarker>,
        comment: &Comment,
    ) -> Result<Option<Post>> {
        Ok(self.modify_post(post_id, |post| post.prepend_comment(comment.clone())))
    }
}
