use axum::http::{HeaderValue, header::InvalidHeaderValue};
use corkboard_media::cloudinary::{CloudinaryConfig, DEFAULT_API_BASE};
use serde::Deserialize;
use std::{
    fmt::{Debug, Formatter},
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

/// Origin of the web client during local development.
pub const DEV_ORIGIN: &str = "http://localhost:5173";

/// Process configuration, read once from the environment at startup.
#[derive(Clone, Eq, PartialEq, Deserialize)]
pub struct Env {
    #[serde(default = "default_server_address")]
    pub server_address: IpAddr,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Without a database URL everything is kept in memory.
    pub database_url: Option<String>,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_cloudinary_api_base")]
    pub cloudinary_api_base: String,
    pub frontend_url: Option<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_server_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_server_port() -> u16 {
    5000
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_cloudinary_api_base() -> String {
    DEFAULT_API_BASE.to_owned()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Env {
    #[must_use]
    pub fn socket_address(&self) -> SocketAddr {
        SocketAddr::new(self.server_address, self.server_port)
    }

    #[must_use]
    pub fn cloudinary(&self) -> CloudinaryConfig {
        CloudinaryConfig {
            cloud_name: self.cloud_name.clone(),
            api_key: self.api_key.clone(),
            api_secret: self.api_secret.clone(),
            api_base: self.cloudinary_api_base.clone(),
        }
    }

    /// The development origin plus `FRONTEND_URL`, if set.
    pub fn allowed_origins(&self) -> Result<Vec<HeaderValue>, InvalidHeaderValue> {
        std::iter::once(DEV_ORIGIN)
            .chain(self.frontend_url.as_deref())
            .map(|origin| origin.trim_end_matches('/').parse())
            .collect()
    }
}

impl Debug for Env {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env")
            .field("server_address", &self.server_address)
            .field("server_port", &self.server_port)
            .field("database_url", &self.database_url.as_ref().map(|_| "[redacted]"))
            .field("database_max_connections", &self.database_max_connections)
            .field("jwt_secret", &"[redacted]")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[redacted]")
            .field("cloudinary_api_base", &self.cloudinary_api_base)
            .field("frontend_url", &self.frontend_url)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}
