use crate::{Database, DbError};
use corkboard_common::model::{
    Id, ModelValidationError,
    account::{Account, AccountMarker, DisplayName, Email, HashedPassword, Profile},
    auth::{PasswordHashError, hash_password, verify_password},
};
use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};
use thiserror::Error;
use tokio::task::{JoinError, spawn_blocking};
use tracing::{debug, info};

/// Verified against when the email is unknown, so that a failed login takes
/// the same time whether or not the account exists.
static UNKNOWN_ACCOUNT_HASH: LazyLock<Result<HashedPassword, PasswordHashError>> =
    LazyLock::new(|| hash_password("unknown account"));

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("An account with this email already exists")]
    DuplicateIdentity,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("The password must not be empty")]
    EmptyPassword,
    #[error("Account with id {0} was not found")]
    AccountNotFound(Id<AccountMarker>),
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error("Password hashing task failed: {0}")]
    HashTask(#[from] JoinError),
    #[error(transparent)]
    Database(DbError),
}

impl From<DbError> for CredentialError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::DuplicateEmail => Self::DuplicateIdentity,
            other => Self::Database(other),
        }
    }
}

/// Accounts and their credentials.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    db: Arc<dyn Database>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn register(
        &self,
        name: &str,
        email: String,
        password: String,
    ) -> Result<Account, CredentialError> {
        let name = DisplayName::new(name).map_err(ModelValidationError::from)?;
        let email = Email::new(email).map_err(ModelValidationError::from)?;
        if password.is_empty() {
            return Err(CredentialError::EmptyPassword);
        }

        // The unique email constraint decides races; this only skips the hashing.
        if self.db.fetch_account_by_email(&email).await?.is_some() {
            return Err(CredentialError::DuplicateIdentity);
        }

        let password_hash = spawn_blocking(move || hash_password(&password)).await??;

        let account = Account {
            id: Id::generate(),
            name,
            email,
            password_hash,
            avatar: None,
        };
        self.db.insert_account(&account).await?;

        info!(account = %account.id, "Registered account");
        Ok(account)
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn authenticate(
        &self,
        email: String,
        password: String,
    ) -> Result<Account, CredentialError> {
        let account = match Email::new(email) {
            Ok(email) => self.db.fetch_account_by_email(&email).await?,
            Err(_) => None,
        };
        let stored_hash = account.as_ref().map(|account| account.password_hash.clone());

        let verified = spawn_blocking(move || match &stored_hash {
            Some(hash) => verify_password(&password, hash),
            None => UNKNOWN_ACCOUNT_HASH
                .as_ref()
                .map_or(Ok(false), |hash| verify_password(&password, hash).map(|_| false)),
        })
        .await??;

        match account {
            Some(account) if verified => {
                debug!(account = %account.id, "Authenticated account");
                Ok(account)
            }
            _ => Err(CredentialError::InvalidCredentials),
        }
    }

    pub async fn account(&self, id: Id<AccountMarker>) -> Result<Account, CredentialError> {
        self.db
            .fetch_account(id)
            .await?
            .ok_or(CredentialError::AccountNotFound(id))
    }

    pub async fn set_avatar(
        &self,
        id: Id<AccountMarker>,
        url: &str,
    ) -> Result<Account, CredentialError> {
        let account = self
            .db
            .update_avatar(id, url)
            .await?
            .ok_or(CredentialError::AccountNotFound(id))?;

        info!(account = %id, "Updated avatar");
        Ok(account)
    }

    /// Display projections for `ids`; ids without an account are absent from the map.
    pub async fn profiles(
        &self,
        ids: &[Id<AccountMarker>],
    ) -> Result<HashMap<Id<AccountMarker>, Profile>, DbError> {
        Ok(self
            .db
            .fetch_profiles(ids)
            .await?
            .into_iter()
            .map(|profile| (profile.id, profile))
            .collect())
    }
}
