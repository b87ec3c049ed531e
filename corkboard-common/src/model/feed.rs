//! Display-ready posts, as served to clients.
//!
//! Field names follow the wire format the web client was written against
//! (`_id`, `user`, `createdAt`, ...).

use crate::model::{
    Id,
    account::{AccountMarker, Profile},
    post::{CommentMarker, PostMarker},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct FeedPost {
    #[serde(rename = "_id")]
    pub id: Id<PostMarker>,
    /// `None` if the author no longer resolves to an account.
    pub user: Option<Profile>,
    pub text: String,
    pub image: Option<String>,
    pub likes: Vec<Id<AccountMarker>>,
    pub comments: Vec<FeedComment>,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct FeedComment {
    #[serde(rename = "_id")]
    pub id: Id<CommentMarker>,
    pub user: Option<Profile>,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        account::{DisplayName, Profile},
        feed::{FeedComment, FeedPost},
    };
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn wire_format() {
        let author = Id::generate();
        let post = FeedPost {
            id: Id::generate(),
            user: Some(Profile {
                id: author,
                name: DisplayName::new("Ann").unwrap(),
                avatar: None,
            }),
            text: "hello".to_owned(),
            image: None,
            likes: vec![author],
            comments: vec![FeedComment {
                id: Id::generate(),
                user: None,
                text: "hi".to_owned(),
                date: datetime!(2025-10-24 10:05 UTC),
            }],
            created_at: datetime!(2025-10-24 10:00 UTC),
        };

        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["_id"], json!(post.id.to_string()));
        assert_eq!(value["user"]["_id"], json!(author.to_string()));
        assert_eq!(value["user"]["name"], json!("Ann"));
        assert_eq!(value["user"]["avatar"], json!(null));
        assert_eq!(value["image"], json!(null));
        assert_eq!(value["likes"], json!([author.to_string()]));
        assert_eq!(value["comments"][0]["user"], json!(null));
        assert_eq!(value["comments"][0]["date"], json!("2025-10-24T10:05:00Z"));
        assert_eq!(value["createdAt"], json!("2025-10-24T10:00:00Z"));

        let parsed: FeedPost = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, post);
    }
}
