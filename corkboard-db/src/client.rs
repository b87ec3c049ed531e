use crate::{
    Database, DbError, Result,
    record::{AccountRecord, CommentRecord, LikeRecord, PostRecord, ProfileRecord},
};
use async_trait::async_trait;
use corkboard_common::model::{
    Id,
    account::{Account, AccountMarker, Email, Profile},
    post::{Comment, Post, PostMarker},
};
use sqlx::{PgConnection, PgPool, postgres::PgPoolOptions, query, query_as, query_scalar};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// PostgreSQL backend.
///
/// Post mutations run in a transaction that first takes the post's row lock, so
/// read-modify-write sequences on one post are serialized.
#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Database migrations applied");
        Ok(())
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_error) if db_error.is_unique_violation())
}

/// Takes the row lock of a post for the rest of the transaction.
async fn lock_post(conn: &mut PgConnection, post_id: Id<PostMarker>) -> Result<bool> {
    let locked = query_scalar::<_, Uuid>(
        "
        SELECT post_id
        FROM posts.posts
        WHERE post_id = $1
        FOR UPDATE
        ",
    )
    .bind(post_id.uuid())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(locked.is_some())
}

/// Attaches likes and comments to post rows, keeping the order of `records`.
async fn load_posts(conn: &mut PgConnection, records: Vec<PostRecord>) -> Result<Vec<Post>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let post_ids: Vec<Uuid> = records.iter().map(|record| record.post_id).collect();

    let likes = query_as::<_, LikeRecord>(
        "
        SELECT post_id, account_id
        FROM posts.likes
        WHERE post_id = ANY($1)
        ORDER BY seq
        ",
    )
    .bind(&post_ids)
    .fetch_all(&mut *conn)
    .await?;

    let comments = query_as::<_, CommentRecord>(
        "
        SELECT comment_id, post_id, author_id, text, created_at
        FROM posts.comments
        WHERE post_id = ANY($1)
        ORDER BY seq DESC
        ",
    )
    .bind(&post_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut likes_by_post: HashMap<Uuid, Vec<LikeRecord>> = HashMap::new();
    for like in likes {
        likes_by_post.entry(like.post_id).or_default().push(like);
    }

    let mut comments_by_post: HashMap<Uuid, Vec<CommentRecord>> = HashMap::new();
    for comment in comments {
        comments_by_post
            .entry(comment.post_id)
            .or_default()
            .push(comment);
    }

    records
        .into_iter()
        .map(|record| {
            let likes = likes_by_post.remove(&record.post_id).unwrap_or_default();
            let comments = comments_by_post
                .remove(&record.post_id)
                .unwrap_or_default();
            record.into_post(likes, comments).map_err(DbError::from)
        })
        .collect()
}

async fn load_post(conn: &mut PgConnection, post_id: Id<PostMarker>) -> Result<Option<Post>> {
    let record = query_as::<_, PostRecord>(
        "
        SELECT post_id, author_id, text, image, created_at
        FROM posts.posts
        WHERE post_id = $1
        ",
    )
    .bind(post_id.uuid())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(record) = record else {
        return Ok(None);
    };

    Ok(load_posts(conn, vec![record]).await?.pop())
}

#[async_trait]
impl Database for DbClient {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        query(
            "
            INSERT INTO accounts.accounts (account_id, name, email, password_hash, avatar)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(account.id.uuid())
        .bind(account.name.get())
        .bind(account.email.get())
        .bind(account.password_hash.as_phc())
        .bind(account.avatar.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                DbError::DuplicateEmail
            } else {
                DbError::Sqlx(error)
            }
        })?;

        Ok(())
    }

    async fn fetch_account(&self, account_id: Id<AccountMarker>) -> Result<Option<Account>> {
        let record = query_as::<_, AccountRecord>(
            "
            SELECT account_id, name, email, password_hash, avatar
            FROM accounts.accounts
            WHERE account_id = $1
            ",
        )
        .bind(account_id.uuid())
        .fetch_optional(&self.pool)
        .await?;

        let account = record.map(Account::try_from).transpose()?;
        Ok(account)
    }

    async fn fetch_account_by_email(&self, email: &Email) -> Result<Option<Account>> {
        let record = query_as::<_, AccountRecord>(
            "
            SELECT account_id, name, email, password_hash, avatar
            FROM accounts.accounts
            WHERE email = $1
            ",
        )
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        let account = record.map(Account::try_from).transpose()?;
        Ok(account)
    }

    async fn fetch_profiles(&self, account_ids: &[Id<AccountMarker>]) -> Result<Vec<Profile>> {
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = account_ids.iter().map(|id| id.uuid()).collect();
        let records = query_as::<_, ProfileRecord>(
            "
            SELECT account_id, name, avatar
            FROM accounts.accounts
            WHERE account_id = ANY($1)
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let profiles = records
            .into_iter()
            .map(Profile::try_from)
            .collect::<Result<_, _>>()?;
        Ok(profiles)
    }

    async fn update_avatar(
        &self,
        account_id: Id<AccountMarker>,
        avatar: &str,
    ) -> Result<Option<Account>> {
        let record = query_as::<_, AccountRecord>(
            "
            UPDATE accounts.accounts
            SET avatar = $2
            WHERE account_id = $1
            RETURNING account_id, name, email, password_hash, avatar
            ",
        )
        .bind(account_id.uuid())
        .bind(avatar)
        .fetch_optional(&self.pool)
        .await?;

        let account = record.map(Account::try_from).transpose()?;
        Ok(account)
    }

    async fn insert_post(&self, post: &Post) -> Result<()> {
        query(
            "
            INSERT INTO posts.posts (post_id, author_id, text, image, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(post.id.uuid())
        .bind(post.author.uuid())
        .bind(post.content.text())
        .bind(post.content.image())
        .bind(post.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let mut conn = self.pool.acquire().await?;
        load_post(&mut conn, post_id).await
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let mut tx = self.pool.begin().await?;

        let records = query_as::<_, PostRecord>(
            "
            SELECT post_id, author_id, text, image, created_at
            FROM posts.posts
            ORDER BY created_at DESC, post_id DESC
            ",
        )
        .fetch_all(&mut *tx)
        .await?;

        let posts = load_posts(&mut tx, records).await?;
        tx.commit().await?;

        Ok(posts)
    }

    async fn update_post_text(&self, post_id: Id<PostMarker>, text: &str) -> Result<Option<Post>> {
        let mut tx = self.pool.begin().await?;

        let updated = query(
            "
            UPDATE posts.posts
            SET text = $2
            WHERE post_id = $1
            ",
        )
        .bind(post_id.uuid())
        .bind(text)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }

        let post = load_post(&mut tx, post_id).await?;
        tx.commit().await?;

        Ok(post)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        // Likes and comments go with it through ON DELETE CASCADE.
        let deleted = query(
            "
            DELETE FROM posts.posts
            WHERE post_id = $1
            ",
        )
        .bind(post_id.uuid())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted > 0)
    }

    async fn toggle_like(
        &self,
        post_id: Id<PostMarker>,
        account_id: Id<AccountMarker>,
    ) -> Result<Option<Post>> {
        let mut tx = self.pool.begin().await?;

        if !lock_post(&mut tx, post_id).await? {
            return Ok(None);
        }

        let unliked = query(
            "
            DELETE FROM posts.likes
            WHERE post_id = $1 AND account_id = $2
            ",
        )
        .bind(post_id.uuid())
        .bind(account_id.uuid())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if unliked == 0 {
            query(
                "
                INSERT INTO posts.likes (post_id, account_id)
                VALUES ($1, $2)
                ",
            )
            .bind(post_id.uuid())
            .bind(account_id.uuid())
            .execute(&mut *tx)
            .await?;
        }

        let post = load_post(&mut tx, post_id).await?;
        tx.commit().await?;

        Ok(post)
    }

    async fn prepend_comment(
        &self,
        post_id: Id<PostMarker>,
        comment: &Comment,
    ) -> Result<Option<Post>> {
        let mut tx = self.pool.begin().await?;

        if !lock_post(&mut tx, post_id).await? {
            return Ok(None);
        }

        query(
            "
            INSERT INTO posts.comments (comment_id, post_id, author_id, text, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(comment.id.uuid())
        .bind(post_id.uuid())
        .bind(comment.author.uuid())
        .bind(comment.text.get())
        .bind(comment.created_at)
        .execute(&mut *tx)
        .await?;

        let post = load_post(&mut tx, post_id).await?;
        tx.commit().await?;

        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbError, client::DbClient};
    use corkboard_common::model::{
        Id,
        account::{Account, DisplayName, Email, HashedPassword},
        post::{Comment, CommentText, CreatePost, Post, PostContent},
    };
    use std::sync::Arc;
    use time::OffsetDateTime;

    async fn client() -> DbClient {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let client = DbClient::connect(&url, 5).await.unwrap();
        client.migrate().await.unwrap();
        client
    }

    fn account() -> Account {
        let id = Id::generate();
        Account {
            id,
            name: DisplayName::new("Ann").unwrap(),
            email: Email::new(format!("{id}@example.com")).unwrap(),
            password_hash: HashedPassword::from_phc("$argon2id$stub".to_owned()),
            avatar: None,
        }
    }

    fn post(author: &Account) -> Post {
        Post::new(
            Id::generate(),
            CreatePost {
                author: author.id,
                content: PostContent::new("hello".to_owned(), None).unwrap(),
            },
            OffsetDateTime::now_utc().replace_nanosecond(0).unwrap(),
        )
    }

    fn comment(author: &Account, text: &str) -> Comment {
        Comment {
            id: Id::generate(),
            author: author.id,
            text: CommentText::new(text.to_owned()).unwrap(),
            created_at: OffsetDateTime::now_utc().replace_nanosecond(0).unwrap(),
        }
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL database"]
    async fn duplicate_email_is_rejected() {
        let db = client().await;
        let first = account();
        let second = Account {
            id: Id::generate(),
            ..first.clone()
        };

        db.insert_account(&first).await.unwrap();
        assert!(matches!(
            db.insert_account(&second).await,
            Err(DbError::DuplicateEmail)
        ));
        assert_eq!(
            db.fetch_account_by_email(&first.email).await.unwrap(),
            Some(first)
        );
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL database"]
    async fn post_round_trip_with_likes_and_comments() {
        let db = client().await;
        let author = account();
        db.insert_account(&author).await.unwrap();

        let post = post(&author);
        db.insert_post(&post).await.unwrap();

        let liked = db.toggle_like(post.id, author.id).await.unwrap().unwrap();
        assert_eq!(liked.likes, [author.id]);
        let unliked = db.toggle_like(post.id, author.id).await.unwrap().unwrap();
        assert!(unliked.likes.is_empty());

        let first = comment(&author, "first");
        let second = comment(&author, "second");
        db.prepend_comment(post.id, &first).await.unwrap();
        let commented = db
            .prepend_comment(post.id, &second)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(commented.comments, [second, first]);

        let edited = db
            .update_post_text(post.id, "edited")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.content.text(), "edited");
        assert_eq!(edited.comments, commented.comments);

        assert!(db.delete_post(post.id).await.unwrap());
        assert_eq!(db.fetch_post(post.id).await.unwrap(), None);
        assert_eq!(db.toggle_like(post.id, author.id).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL database"]
    async fn concurrent_likes_are_not_lost() {
        let db = Arc::new(client().await);
        let author = account();
        db.insert_account(&author).await.unwrap();
        let post = post(&author);
        let post_id = post.id;
        db.insert_post(&post).await.unwrap();

        let likers: Vec<_> = (0..16).map(|_| Id::generate()).collect();
        let tasks: Vec<_> = likers
            .iter()
            .map(|&liker| {
                let db = Arc::clone(&db);
                tokio::spawn(async move { db.toggle_like(post_id, liker).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let post = db.fetch_post(post_id).await.unwrap().unwrap();
        assert_eq!(post.likes.len(), likers.len());
    }
}
