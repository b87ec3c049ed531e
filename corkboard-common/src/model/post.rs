use crate::model::{Id, account::AccountMarker};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

/// A post together with everything embedded in it.
///
/// Likes and comments have no lifecycle of their own: they are created, changed
/// and dropped only through the post that holds them.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: Id<AccountMarker>,
    pub content: PostContent,
    /// Accounts that currently like the post, each at most once.
    pub likes: Vec<Id<AccountMarker>>,
    /// Newest first.
    pub comments: Vec<Comment>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author: Id<AccountMarker>,
    pub content: PostContent,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum LikeState {
    Liked,
    Unliked,
}

impl Post {
    #[must_use]
    pub fn new(id: Id<PostMarker>, post: CreatePost, created_at: OffsetDateTime) -> Self {
        Self {
            id,
            author: post.author,
            content: post.content,
            likes: Vec::new(),
            comments: Vec::new(),
            created_at,
        }
    }

    #[must_use]
    pub fn is_owned_by(&self, account: Id<AccountMarker>) -> bool {
        self.author == account
    }

    #[must_use]
    pub fn is_liked_by(&self, account: Id<AccountMarker>) -> bool {
        self.likes.contains(&account)
    }

    /// Flips `account`'s like and reports the resulting state.
    pub fn toggle_like(&mut self, account: Id<AccountMarker>) -> LikeState {
        if let Some(position) = self.likes.iter().position(|like| *like == account) {
            self.likes.remove(position);
            LikeState::Unliked
        } else {
            self.likes.push(account);
            LikeState::Liked
        }
    }

    pub fn prepend_comment(&mut self, comment: Comment) {
        self.comments.insert(0, comment);
    }
}

/// Text and image of a post. At least one of the two is always present.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostContent {
    text: String,
    image: Option<String>,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("A post needs text or an image")]
pub struct EmptyPostError;

impl PostContent {
    pub fn new(text: String, image: Option<String>) -> Result<Self, EmptyPostError> {
        if text.trim().is_empty() && image.is_none() {
            Err(EmptyPostError)
        } else {
            Ok(Self { text, image })
        }
    }

    /// Replaces the text, keeping the image.
    pub fn with_text(&self, text: String) -> Result<Self, EmptyPostError> {
        Self::new(text, self.image.clone())
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub author: Id<AccountMarker>,
    pub text: CommentText,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct CommentText(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("A comment needs text")]
pub struct EmptyCommentError;

impl CommentText {
    pub fn new(text: String) -> Result<Self, EmptyCommentError> {
        if text.trim().is_empty() {
            Err(EmptyCommentError)
        } else {
            Ok(Self(text))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}
