use corkboard_common::model::{
    ModelValidationError,
    account::{Account, DisplayName, Email, HashedPassword, Profile},
    post::{Comment, CommentText, Post, PostContent},
};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AccountRecord {
    pub account_id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct ProfileRecord {
    pub account_id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct LikeRecord {
    pub post_id: Uuid,
    pub account_id: Uuid,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub created_at: OffsetDateTime,
}

impl TryFrom<AccountRecord> for Account {
    type Error = ModelValidationError;

    fn try_from(value: AccountRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.account_id.into(),
            name: DisplayName::new(&value.name)?,
            email: Email::new(value.email)?,
            password_hash: HashedPassword::from_phc(value.password_hash),
            avatar: value.avatar,
        })
    }
}

impl TryFrom<ProfileRecord> for Profile {
    type Error = ModelValidationError;

    fn try_from(value: ProfileRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.account_id.into(),
            name: DisplayName::new(&value.name)?,
            avatar: value.avatar,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.comment_id.into(),
            author: value.author_id.into(),
            text: CommentText::new(value.text)?,
            created_at: value.created_at,
        })
    }
}

impl PostRecord {
    /// `likes` in like order, `comments` newest first; both already filtered to this post.
    pub fn into_post(
        self,
        likes: Vec<LikeRecord>,
        comments: Vec<CommentRecord>,
    ) -> Result<Post, ModelValidationError> {
        Ok(Post {
            id: self.post_id.into(),
            author: self.author_id.into(),
            content: PostContent::new(self.text, self.image)?,
            likes: likes.into_iter().map(|like| like.account_id.into()).collect(),
            comments: comments
                .into_iter()
                .map(Comment::try_from)
                .collect::<Result<_, _>>()?,
            created_at: self.created_at,
        })
    }
}
