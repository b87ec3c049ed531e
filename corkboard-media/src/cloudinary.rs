//! [`MediaStore`] backed by Cloudinary's signed upload API.

use crate::{MediaFolder, MediaStore, StoreError, Upload};
use async_trait::async_trait;
use reqwest::{
    Client, StatusCode,
    multipart::{Form, Part},
};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::{
    fmt::{Debug, Formatter},
    time::Duration,
};
use thiserror::Error;
use time::UtcDateTime;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Usually [`DEFAULT_API_BASE`].
    pub api_base: String,
}

impl Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[redacted]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CloudinaryError {
    #[error("HTTP client could not be built: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Upload request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Cloudinary replied with {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Clone, Debug)]
pub struct CloudinaryStore {
    client: Client,
    config: CloudinaryConfig,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Result<Self, CloudinaryError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(CloudinaryError::Client)?;

        Ok(Self { client, config })
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/{}/image/upload",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    async fn upload(&self, upload: Upload, folder: MediaFolder) -> Result<String, CloudinaryError> {
        let timestamp = UtcDateTime::now().unix_timestamp().to_string();
        let signature = signature(
            &[("folder", folder.name()), ("timestamp", &timestamp)],
            &self.config.api_secret,
        );

        let mut file = Part::bytes(Vec::from(upload.bytes));
        if let Some(file_name) = upload.file_name {
            file = file.file_name(file_name);
        }

        let form = Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.name())
            .text("signature", signature)
            .part("file", file);

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloudinaryError::Status { status, body });
        }

        let UploadResponse { secure_url } = response.json().await?;
        debug!(folder = folder.name(), %secure_url, "Cloudinary upload finished");
        Ok(secure_url)
    }
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    async fn store(&self, upload: Upload, folder: MediaFolder) -> Result<String, StoreError> {
        Ok(self.upload(upload, folder).await?)
    }
}

/// Request signature: SHA-1 (hex) of the parameters sorted by name, joined as
/// `k=v&k=v`, with the API secret appended.
#[must_use]
pub fn signature(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut params = params.to_vec();
    params.sort_unstable_by_key(|(name, _)| *name);

    let joined = params
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use crate::{
        MediaFolder, MediaStore, Upload,
        cloudinary::{CloudinaryConfig, CloudinaryStore, signature},
    };
    use axum::{
        Json, Router,
        extract::{Multipart, Path},
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::post,
    };
    use bytes::Bytes;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    const API_SECRET: &str = "test secret";

    #[test]
    fn signature_matches_documented_example() {
        let params = [
            ("timestamp", "1315060510"),
            ("public_id", "sample_image"),
            ("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop"),
        ];

        assert_eq!(
            signature(&params, "abcd"),
            "bfd09f95f331f558cbd1320e67aa8d488770583e"
        );
    }

    async fn fake_upload(
        Path(cloud_name): Path<String>,
        mut multipart: Multipart,
    ) -> Response {
        let mut fields = HashMap::new();
        let mut file_len = None;
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap().to_owned();
            let data = field.bytes().await.unwrap();
            if name == "file" {
                file_len = Some(data.len());
            } else {
                fields.insert(name, String::from_utf8(data.to_vec()).unwrap());
            }
        }

        let expected = signature(
            &[
                ("folder", fields["folder"].as_str()),
                ("timestamp", fields["timestamp"].as_str()),
            ],
            API_SECRET,
        );
        if fields["signature"] != expected || fields["api_key"] != "key" {
            return (StatusCode::UNAUTHORIZED, "bad signature").into_response();
        }
        let Some(file_len) = file_len else {
            return (StatusCode::BAD_REQUEST, "missing file").into_response();
        };

        Json(json!({
            "public_id": "abc",
            "secure_url": format!(
                "https://res.cloudinary.test/{cloud_name}/{}/{file_len}.png",
                fields["folder"]
            ),
        }))
        .into_response()
    }

    async fn failing_upload() -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "storage down").into_response()
    }

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{address}")
    }

    fn store(api_base: String) -> CloudinaryStore {
        CloudinaryStore::new(CloudinaryConfig {
            cloud_name: "demo".to_owned(),
            api_key: "key".to_owned(),
            api_secret: API_SECRET.to_owned(),
            api_base,
        })
        .unwrap()
    }

    fn upload() -> Upload {
        Upload {
            bytes: Bytes::from_static(b"twelve bytes"),
            content_type: "image/png".to_owned(),
            file_name: Some("photo.png".to_owned()),
        }
    }

    #[tokio::test]
    async fn signed_upload_returns_secure_url() {
        let base =
            serve(Router::new().route("/{cloud_name}/image/upload", post(fake_upload))).await;

        let url = store(base)
            .store(upload(), MediaFolder::ProfilePictures)
            .await
            .unwrap();

        assert_eq!(
            url,
            "https://res.cloudinary.test/demo/linkedin_clone_profiles/12.png"
        );
    }

    #[tokio::test]
    async fn error_status_fails_the_upload() {
        let base =
            serve(Router::new().route("/{cloud_name}/image/upload", post(failing_upload))).await;

        let error = store(base)
            .store(upload(), MediaFolder::PostImages)
            .await
            .unwrap_err();

        assert!(error.to_string().contains("500"), "{error}");
    }

    #[test]
    fn config_debug_hides_secret() {
        let config = CloudinaryConfig {
            cloud_name: "demo".to_owned(),
            api_key: "key".to_owned(),
            api_secret: API_SECRET.to_owned(),
            api_base: "https://api.cloudinary.com/v1_1".to_owned(),
        };

        assert!(!format!("{config:?}").contains(API_SECRET));
    }
}
