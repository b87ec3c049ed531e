use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use corkboard_common::model::{Id, account::AccountMarker, auth::SessionIssuer};
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The caller, as identified by a valid `Authorization: Bearer` session token.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct AuthenticatedUser {
    id: Id<AccountMarker>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn account_id(self) -> Id<AccountMarker> {
        self.id
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<SessionIssuer>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            AuthorizationHeader::from_request_parts(parts, state)
                .await
                .map_err(ServerError::InvalidAuthorizationHeader)?;

        let id = Arc::<SessionIssuer>::from_ref(state).verify(bearer.token())?;

        Ok(Self { id })
    }
}
