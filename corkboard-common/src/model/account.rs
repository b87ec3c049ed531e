use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Debug, Formatter};
use thiserror::Error;


#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AccountMarker;

/// A stored account. Deliberately not `Serialize`: use [`AccountSummary`] or [`Profile`].
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Account {
    pub id: Id<AccountMarker>,
    pub name: DisplayName,
    pub email: Email,
    pub password_hash: HashedPassword,
    pub avatar: Option<String>,
}

/// The account as shown to its owner after signup or login.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct AccountSummary {
    pub id: Id<AccountMarker>,
    pub name: DisplayName,
    pub email: Email,
    pub avatar: Option<String>,
}

/// Display projection of an account, embedded in posts and comments.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: Id<AccountMarker>,
    pub name: DisplayName,
    pub avatar: Option<String>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            email: account.email.clone(),
            avatar: account.avatar.clone(),
        }
    }
}

impl From<&Account> for Profile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
            avatar: account.avatar.clone(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct DisplayName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The display name is invalid: {0:?}")]
pub struct InvalidDisplayNameError(String);

impl DisplayName {
    /// Kept exactly as given; only a blank name is rejected.
    pub fn new(name: &str) -> Result<Self, InvalidDisplayNameError> {
        if name.trim().is_empty() {
            Err(InvalidDisplayNameError(name.to_owned()))
        } else {
            Ok(Self(name.to_owned()))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for DisplayName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        DisplayName::new(&inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"DisplayName"))
    }
}

/// Email address, stored and compared exactly as given (case-sensitive). Only a
/// blank address is rejected.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0:?}")]
pub struct InvalidEmailError(String);

impl Email {
    pub fn new(email: String) -> Result<Self, InvalidEmailError> {
        if email.trim().is_empty() {
            Err(InvalidEmailError(email))
        } else {
            Ok(Self(email))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Email::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Email"))
    }
}

/// PHC-formatted Argon2id hash of an account password.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct HashedPassword(String);

impl HashedPassword {
    /// Wraps an already computed PHC string, e.g. one read back from storage.
    #[must_use]
    pub fn from_phc(phc: String) -> Self {
        Self(phc)
    }

    #[must_use]
    pub fn as_phc(&self) -> &str {
        &self.0
    }
}

impl Debug for HashedPassword {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HashedPassword").field(&"[redacted]").finish()
    }
}
