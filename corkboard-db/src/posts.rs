use crate::{Database, DbError};
use corkboard_common::{
    model::{
        Id, ModelValidationError,
        account::AccountMarker,
        post::{Comment, CommentText, CreatePost, Post, PostContent, PostMarker},
    },
    util::now_utc_micros,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PostError {
    #[error("Post with id {0} was not found")]
    NotFound(Id<PostMarker>),
    #[error("Account {caller} does not own post {post}")]
    Forbidden {
        post: Id<PostMarker>,
        caller: Id<AccountMarker>,
    },
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
    #[error(transparent)]
    Database(#[from] DbError),
}

/// Posts and the rules for changing them.
///
/// Author and image never change after creation, so ownership and content
/// checks against a fetched post stay valid while the backend applies the
/// mutation itself atomically.
#[derive(Clone, Debug)]
pub struct PostStore {
    db: Arc<dyn Database>,
}

impl PostStore {
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        author: Id<AccountMarker>,
        text: String,
        image: Option<String>,
    ) -> Result<Post, PostError> {
        let content = PostContent::new(text, image).map_err(ModelValidationError::from)?;
        let post = Post::new(
            Id::generate(),
            CreatePost { author, content },
            now_utc_micros(),
        );

        self.db.insert_post(&post).await?;

        info!(post = %post.id, %author, "Created post");
        Ok(post)
    }

    pub async fn fetch(&self, post_id: Id<PostMarker>) -> Result<Post, PostError> {
        self.db
            .fetch_post(post_id)
            .await?
            .ok_or(PostError::NotFound(post_id))
    }

    /// Fetches a post that `caller` owns.
    pub async fn owned(
        &self,
        post_id: Id<PostMarker>,
        caller: Id<AccountMarker>,
    ) -> Result<Post, PostError> {
        let post = self.fetch(post_id).await?;
        if post.is_owned_by(caller) {
            Ok(post)
        } else {
            Err(PostError::Forbidden {
                post: post_id,
                caller,
            })
        }
    }

    /// Replaces the text of an owned post. `None` keeps the current text.
    pub async fn edit(
        &self,
        post_id: Id<PostMarker>,
        caller: Id<AccountMarker>,
        text: Option<String>,
    ) -> Result<Post, PostError> {
        let post = self.owned(post_id, caller).await?;
        let Some(text) = text else {
            return Ok(post);
        };

        // A post without an image must keep some text.
        post.content
            .with_text(text.clone())
            .map_err(ModelValidationError::from)?;

        let post = self
            .db
            .update_post_text(post_id, &text)
            .await?
            .ok_or(PostError::NotFound(post_id))?;

        debug!(post = %post_id, "Edited post");
        Ok(post)
    }

    pub async fn delete(
        &self,
        post_id: Id<PostMarker>,
        caller: Id<AccountMarker>,
    ) -> Result<(), PostError> {
        self.owned(post_id, caller).await?;

        if !self.db.delete_post(post_id).await? {
            return Err(PostError::NotFound(post_id));
        }

        info!(post = %post_id, "Deleted post");
        Ok(())
    }

    pub async fn toggle_like(
        &self,
        post_id: Id<PostMarker>,
        caller: Id<AccountMarker>,
    ) -> Result<Post, PostError> {
        let post = self
            .db
            .toggle_like(post_id, caller)
            .await?
            .ok_or(PostError::NotFound(post_id))?;

        debug!(
            post = %post_id,
            account = %caller,
            liked = post.is_liked_by(caller),
            "Toggled like"
        );
        Ok(post)
    }

    pub async fn add_comment(
        &self,
        post_id: Id<PostMarker>,
        caller: Id<AccountMarker>,
        text: String,
    ) -> Result<Post, PostError> {
        let comment = Comment {
            id: Id::generate(),
            author: caller,
            text: CommentText::new(text).map_err(ModelValidationError::from)?,
            created_at: now_utc_micros(),
        };

        let post = self
            .db
            .prepend_comment(post_id, &comment)
            .await?
            .ok_or(PostError::NotFound(post_id))?;

        debug!(post = %post_id, comment = %comment.id, "Added comment");
        Ok(post)
    }

    /// All posts, newest first.
    pub async fn list(&self) -> Result<Vec<Post>, DbError> {
        self.db.fetch_posts().await
    }
}
