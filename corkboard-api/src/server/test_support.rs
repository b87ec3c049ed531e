//! In-process app over the in-memory store, for route tests.

use crate::{
    config::DEV_ORIGIN,
    server::{HttpSettings, ServerState, app},
};
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use corkboard_common::model::{Id, account::AccountMarker, auth::SessionIssuer};
use corkboard_db::{
    Database, accounts::CredentialStore, feed::FeedAssembler, memory::MemoryDb, posts::PostStore,
};
use corkboard_media::{MediaBridge, MediaFolder, MediaStore, StoreError, Upload};
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tower::ServiceExt;

const BOUNDARY: &str = "corkboard-test-boundary";

#[derive(Debug, Default)]
pub struct StubMediaStore {
    fail: AtomicBool,
    stored: AtomicUsize,
}

impl StubMediaStore {
    pub fn fail_uploads(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaStore for StubMediaStore {
    async fn store(&self, upload: Upload, folder: MediaFolder) -> Result<String, StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("media store unavailable".into());
        }
        let n = self.stored.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://cdn.test/{}/{n}-{}",
            folder.name(),
            upload.bytes.len()
        ))
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: ServerState,
    pub media: Arc<StubMediaStore>,
}

impl TestApp {
    pub const MAX_UPLOAD_BYTES: usize = 64 * 1024;

    pub fn new() -> Self {
        let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
        let media = Arc::new(StubMediaStore::default());
        let credentials = CredentialStore::new(Arc::clone(&db));

        let state = ServerState {
            credentials: credentials.clone(),
            sessions: Arc::new(SessionIssuer::new(b"test secret")),
            posts: PostStore::new(db),
            feed: FeedAssembler::new(credentials),
            media: MediaBridge::new(media.clone()),
        };
        let settings = HttpSettings {
            allowed_origins: vec![DEV_ORIGIN.parse().unwrap()],
            max_upload_bytes: Self::MAX_UPLOAD_BYTES,
        };

        Self {
            router: app(state.clone(), &settings),
            state,
            media,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body)
    }

    fn request(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        match token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Bytes) {
        self.send(Self::request(Method::GET, uri, None).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Bytes) {
        self.send(
            Self::request(Method::DELETE, uri, token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn send_json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: &Value,
    ) -> (StatusCode, Bytes) {
        self.send(
            Self::request(method, uri, token)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(body).unwrap()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        token: Option<&str>,
        body: &Value,
    ) -> (StatusCode, Bytes) {
        self.send_json(Method::POST, uri, token, body).await
    }

    pub async fn put_json(
        &self,
        uri: &str,
        token: Option<&str>,
        body: &Value,
    ) -> (StatusCode, Bytes) {
        self.send_json(Method::PUT, uri, token, body).await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Vec<u8>,
    ) -> (StatusCode, Bytes) {
        self.send(
            Self::request(Method::POST, uri, token)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Signs up with password `pw123456`; returns the session token and account id.
    pub async fn signup(&self, name: &str, email: &str) -> (String, Id<AccountMarker>) {
        let (status, body) = self
            .post_json(
                "/api/auth/signup",
                None,
                &serde_json::json!({"name": name, "email": email, "password": "pw123456"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let body: Value = serde_json::from_slice(&body).unwrap();
        let token = body["token"].as_str().unwrap().to_owned();
        let id = body["user"]["id"].as_str().unwrap().parse().unwrap();
        (token, id)
    }
}

/// Encodes text fields and an optional `(field, content type, bytes)` file.
pub fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some((name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"upload.bin\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
