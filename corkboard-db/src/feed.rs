use crate::{DbError, accounts::CredentialStore};
use corkboard_common::model::{
    Id,
    account::{AccountMarker, Profile},
    feed::{FeedComment, FeedPost},
    post::Post,
};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Turns stored posts into [`FeedPost`]s with author and commenter profiles filled in.
#[derive(Clone, Debug)]
pub struct FeedAssembler {
    credentials: CredentialStore,
}

impl FeedAssembler {
    #[must_use]
    pub fn new(credentials: CredentialStore) -> Self {
        Self { credentials }
    }

    /// Keeps the order of `posts`. All profiles are looked up in one batch.
    pub async fn assemble(&self, posts: Vec<Post>) -> Result<Vec<FeedPost>, DbError> {
        let profiles = self
            .credentials
            .profiles(&referenced_accounts(&posts))
            .await?;

        Ok(posts
            .into_iter()
            .map(|post| feed_post(post, &profiles))
            .collect())
    }

    pub async fn assemble_one(&self, post: Post) -> Result<FeedPost, DbError> {
        let profiles = self
            .credentials
            .profiles(&referenced_accounts(std::slice::from_ref(&post)))
            .await?;

        Ok(feed_post(post, &profiles))
    }
}

/// Authors and commenters, deduplicated.
fn referenced_accounts(posts: &[Post]) -> Vec<Id<AccountMarker>> {
    posts
        .iter()
        .flat_map(|post| {
            std::iter::once(post.author).chain(post.comments.iter().map(|comment| comment.author))
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn resolve(
    profiles: &HashMap<Id<AccountMarker>, Profile>,
    account: Id<AccountMarker>,
) -> Option<Profile> {
    let profile = profiles.get(&account).cloned();
    if profile.is_none() {
        warn!(%account, "Account referenced by a post does not exist");
    }
    profile
}

fn feed_post(post: Post, profiles: &HashMap<Id<AccountMarker>, Profile>) -> FeedPost {
    FeedPost {
        id: post.id,
        user: resolve(profiles, post.author),
        text: post.content.text().to_owned(),
        image: post.content.image().map(ToOwned::to_owned),
        likes: post.likes,
        comments: post
            .comments
            .into_iter()
            .map(|comment| FeedComment {
                id: comment.id,
                user: resolve(profiles, comment.author),
                text: comment.text.get().to_owned(),
                date: comment.created_at,
            })
            .collect(),
        created_at: post.created_at,
    }
}
