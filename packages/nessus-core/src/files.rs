//! Importing `.nessus` scan and policy files.
//!
//! Files are first uploaded to `/file/upload` as multipart form data, then
//! imported by the server-side name the upload returns.

use crate::envelope;
use crate::error::{ApiError, Error, Result};
use crate::session::Session;
use crate::transport::Transport;
use reqwest::Method;
use serde_json::{Map, Value, json};
use std::path::Path;

const BOUNDARY: &str = "----------nessus-client-upload";

fn encode_multipart(filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"Filedata\"; filename=\"{}\"\r\n",
            filename.replace('"', "")
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/xml\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Uploads a local file and returns the name the server stored it under.
pub async fn upload_file<T: Transport>(session: &mut Session<T>, path: &Path) -> Result<String> {
    let content = tokio::fs::read(path).await.map_err(|source| Error::File {
        path: path.display().to_string(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.nessus".to_string());

    tracing::info!("Uploading {} ({} bytes)", filename, content.len());

    let content_type = format!("multipart/form-data; boundary={}", BOUNDARY);
    let payload = session
        .request_raw(
            Method::POST,
            "/file/upload",
            encode_multipart(&filename, &content),
            &content_type,
        )
        .await?;

    let endpoint = "POST /file/upload";
    let response = envelope::object(endpoint, payload)?;
    response
        .get("fileuploaded")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::UnexpectedShape {
                endpoint: endpoint.to_string(),
                detail: "missing `fileuploaded`".to_string(),
            }
            .into()
        })
}

/// Imports a policy file. Returns the server's description of the imported
/// policy, if it sent one.
pub async fn import_policy<T: Transport>(
    session: &mut Session<T>,
    path: &Path,
) -> Result<Option<Value>> {
    let uploaded = upload_file(session, path).await?;
    let payload = session
        .request(Method::POST, "/policies/import", Some(&json!({"file": uploaded})))
        .await?;
    Ok(payload.into_json())
}

/// Imports a scan file, optionally into a folder and with the password
/// protecting the file.
pub async fn import_scan<T: Transport>(
    session: &mut Session<T>,
    path: &Path,
    folder_id: Option<u64>,
    password: Option<&str>,
) -> Result<Option<Value>> {
    let uploaded = upload_file(session, path).await?;

    let mut params = Map::new();
    params.insert("file".to_string(), Value::String(uploaded));
    if let Some(id) = folder_id {
        params.insert("folder_id".to_string(), json!(id));
    }
    if let Some(pw) = password {
        params.insert("password".to_string(), Value::String(pw.to_string()));
    }

    let payload = session
        .request(Method::POST, "/scans/import", Some(&Value::Object(params)))
        .await?;
    Ok(payload.into_json())
}
