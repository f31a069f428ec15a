//! Multipart upload admission: file presence, extension, and size checks.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::{HeaderMap, StatusCode, header};

use crate::error::UploadError;
use crate::tasks::model::TaskKind;

/// An admitted upload: the file bytes plus any plain form fields.
#[derive(Debug)]
pub struct Upload {
    pub filename: String,
    pub contents: Vec<u8>,
    fields: HashMap<String, String>,
}

impl Upload {
    /// A non-file form field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Read a multipart body, enforcing the admission rules for `kind`.
pub async fn read_upload(
    multipart: &mut Multipart,
    kind: TaskKind,
    max_bytes: usize,
) -> Result<Upload, UploadError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut fields = HashMap::new();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error(max_bytes))? {
        let name = field.name().unwrap_or_default().to_string();

        if name != "file" {
            let value = field.text().await.map_err(multipart_error(max_bytes))?;
            fields.insert(name, value);
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(UploadError::EmptyFilename);
        }
        if !kind.accepts_filename(&filename) {
            return Err(UploadError::UnsupportedType {
                kind,
                allowed: kind.allowed_extensions().join(", "),
            });
        }

        let mut contents = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error(max_bytes))? {
            contents.extend_from_slice(&chunk);
            if contents.len() > max_bytes {
                return Err(UploadError::TooLarge {
                    limit_mb: max_bytes.div_ceil(1024 * 1024),
                });
            }
        }

        file = Some((filename, contents));
    }

    let (filename, contents) = file.ok_or(UploadError::MissingFile)?;
    Ok(Upload {
        filename,
        contents,
        fields,
    })
}

fn multipart_error(max_bytes: usize) -> impl Fn(MultipartError) -> UploadError {
    move |e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::TooLarge {
                limit_mb: max_bytes.div_ceil(1024 * 1024),
            }
        } else {
            UploadError::Malformed(e.body_text())
        }
    }
}

/// Base URL the client used to reach us, e.g. `http://example.com:5000`.
pub fn request_base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .filter(|p| matches!(*p, "http" | "https"))
        .unwrap_or("http");
    format!("{scheme}://{host}")
}
