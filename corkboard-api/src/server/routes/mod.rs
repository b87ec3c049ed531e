use crate::server::{Result, ServerRouter};
use axum::{Router, extract::Multipart};
use corkboard_media::Upload;

mod auth;
mod posts;

pub fn routes() -> ServerRouter {
    Router::new().merge(auth::routes()).merge(posts::routes())
}

/// Text fields and at most one file read from a multipart form.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
struct FormData {
    text: Option<String>,
    file: Option<Upload>,
}

/// Reads `text` and the file named `file_field`; other fields are skipped.
/// A file part without content counts as no file.
async fn read_form(mut multipart: Multipart, file_field: &str) -> Result<FormData> {
    let mut form = FormData::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(ToOwned::to_owned);
        match name.as_deref() {
            Some("text") => form.text = Some(field.text().await?),
            Some(name) if name == file_field => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let file_name = field.file_name().map(ToOwned::to_owned);
                let bytes = field.bytes().await?;

                if !bytes.is_empty() {
                    form.file = Some(Upload {
                        bytes,
                        content_type,
                        file_name,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}
