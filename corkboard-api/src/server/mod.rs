use axum::{
    Router,
    extract::{
        DefaultBodyLimit, FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
    },
    http::{
        HeaderValue, Method, StatusCode, Uri,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::typed_header::TypedHeaderRejection;
use corkboard_common::model::auth::{SessionError, SessionIssuer};
use corkboard_db::{
    DbError,
    accounts::{CredentialError, CredentialStore},
    feed::FeedAssembler,
    posts::{PostError, PostStore},
};
use corkboard_media::{MediaBridge, MediaError};
use json::{ErrorBody, Json};
use std::sync::Arc;
use thiserror::Error;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::error;

mod auth;
mod json;
mod routes;
#[cfg(test)]
mod test_support;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub credentials: CredentialStore,
    pub sessions: Arc<SessionIssuer>,
    pub posts: PostStore,
    pub feed: FeedAssembler,
    pub media: MediaBridge,
}

/// HTTP settings taken from the configuration.
#[derive(Clone, Debug)]
pub struct HttpSettings {
    pub allowed_origins: Vec<HeaderValue>,
    pub max_upload_bytes: usize,
}

pub fn app(state: ServerState, settings: &HttpSettings) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(settings.allowed_origins.iter().cloned()))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    ServerRouter::new()
        .route("/", get(banner))
        .nest("/api", routes::routes())
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn banner() -> &'static str {
    "Corkboard API is running"
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub async fn method_not_allowed(method: Method, uri: Uri) -> ServerError {
    ServerError::MethodNotAllowed { method, uri }
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Method {method} not allowed on {uri}")]
    MethodNotAllowed { method: Method, uri: Uri },
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Incoming multipart form rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Multipart form could not be read: {0}")]
    Multipart(#[from] MultipartError),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("No file uploaded")]
    NoFileUploaded,
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Posts(#[from] PostError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Database(#[from] DbError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::Credentials(CredentialError::AccountNotFound(_))
            | ServerError::Posts(PostError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ServerError::JsonRejection(rejection)
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE =>
            {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ServerError::Multipart(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ServerError::PathRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::MultipartRejection(_)
            | ServerError::Multipart(_)
            | ServerError::NoFileUploaded
            | ServerError::Credentials(
                CredentialError::DuplicateIdentity
                | CredentialError::InvalidCredentials
                | CredentialError::EmptyPassword
                | CredentialError::Validation(_),
            )
            | ServerError::Posts(PostError::Validation(_)) => StatusCode::BAD_REQUEST,
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::Session(SessionError::Invalid(_) | SessionError::Expired) => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::Posts(PostError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            ServerError::Media(MediaError::UnsupportedMediaType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ServerError::Media(MediaError::UploadFailed(_)) => StatusCode::BAD_GATEWAY,
            ServerError::JsonResponse(_)
            | ServerError::Session(SessionError::Sign(_))
            | ServerError::Credentials(
                CredentialError::PasswordHash(_)
                | CredentialError::HashTask(_)
                | CredentialError::Database(_),
            )
            | ServerError::Posts(PostError::Database(_))
            | ServerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text sent to the client. Internal failures are never described.
    pub fn message(&self) -> String {
        if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            return "Server error".to_owned();
        }

        match self {
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                "No token, authorization denied".to_owned()
            }
            ServerError::InvalidAuthorizationHeader(_) | ServerError::Session(_) => {
                "Token is not valid".to_owned()
            }
            ServerError::Credentials(CredentialError::DuplicateIdentity) => {
                "User already exists".to_owned()
            }
            ServerError::Posts(PostError::NotFound(_)) => "Post not found".to_owned(),
            ServerError::Posts(PostError::Forbidden { .. }) => "Not authorized".to_owned(),
            ServerError::Media(MediaError::UploadFailed(_)) => "Image upload failed".to_owned(),
            ServerError::UnknownRoute(_) => "Not found".to_owned(),
            ServerError::MethodNotAllowed { .. } => "Method not allowed".to_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let body = ErrorBody {
            status: status.as_u16(),
            msg: self.message(),
        };
        (status, Json(body)).into_response()
    }
}
