pub mod account;
pub mod auth;
pub mod feed;
pub mod post;

use crate::{
    model::{
        account::{InvalidDisplayNameError, InvalidEmailError},
        post::{EmptyCommentError, EmptyPostError},
    },
    util::NonPositiveDurationError,
};
use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    DisplayName(#[from] InvalidDisplayNameError),
    #[error(transparent)]
    Email(#[from] InvalidEmailError),
    #[error(transparent)]
    EmptyPost(#[from] EmptyPostError),
    #[error(transparent)]
    EmptyComment(#[from] EmptyCommentError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
}

/// Typed identifier. Backed by a UUIDv7 so freshly generated ids sort by creation time.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(Uuid, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid, PhantomData)
    }

    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }

    #[must_use]
    pub fn uuid(self) -> Uuid {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self::new)
    }
}

impl<Marker> From<Uuid> for Id<Marker> {
    fn from(value: Uuid) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for Uuid {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}
