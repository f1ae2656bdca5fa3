//! HTTP handlers for the upload-session request surface. Thin shims: parse
//! and presence-check the wire shapes, then delegate to `UploadService`.

use crate::{errors::AppError, models::fragment::FragmentDescriptor, state::AppState};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query params for `GET /upload` and `GET /multipart`.
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    #[serde(alias = "filename")]
    pub name: Option<String>,
    #[serde(alias = "partCount")]
    pub parts: Option<i32>,
}

/// Query params for `GET /download`.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(alias = "id")]
    pub file_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadUrlResponse {
    #[serde(rename = "fileId")]
    pub file_id: Uuid,
    #[serde(rename = "uploadURL")]
    pub upload_url: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadUrlResponse {
    #[serde(rename = "fileId")]
    pub file_id: Uuid,
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    #[serde(rename = "cdnURL", skip_serializing_if = "Option::is_none")]
    pub cdn_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PartUrl {
    #[serde(rename = "partNumber")]
    pub part_number: i32,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct MultipartSessionResponse {
    #[serde(rename = "fileId")]
    pub file_id: Uuid,
    #[serde(rename = "uploadId")]
    pub upload_id: String,
    pub urls: Vec<PartUrl>,
}

/// Body of `POST /complete`. Tag and part-number fields tolerate both the
/// store's capitalized spelling and plain camelCase.
#[derive(Debug, Deserialize)]
pub struct CompleteUploadRequest {
    #[serde(rename = "fileId")]
    pub file_id: Option<String>,
    #[serde(rename = "uploadId")]
    pub upload_id: Option<String>,
    pub parts: Option<Vec<CompleteUploadPart>>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteUploadPart {
    #[serde(rename = "partNumber", alias = "PartNumber")]
    pub part_number: Option<i32>,
    #[serde(rename = "etag", alias = "ETag", alias = "eTag")]
    pub etag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompleteUploadResponse {
    pub message: &'static str,
    #[serde(rename = "fileId")]
    pub file_id: Uuid,
}

/// GET `/upload?name=<filename>` — issue a single-shot upload authorization.
pub async fn issue_upload_authorization(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
) -> Result<Json<UploadUrlResponse>, AppError> {
    let name = query
        .name
        .as_deref()
        .ok_or_else(|| AppError::bad_request("Missing file name"))?;

    let grant = state.uploads.create_single_upload(name).await?;
    Ok(Json(UploadUrlResponse {
        file_id: grant.file_id,
        upload_url: grant.upload_url,
    }))
}

/// GET `/download?file_id=<id>` — issue a download authorization.
pub async fn issue_download_authorization(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    let raw = query
        .file_id
        .as_deref()
        .ok_or_else(|| AppError::bad_request("Missing file_id"))?;
    let file_id = parse_file_id(raw)?;

    let grant = state.uploads.create_download_authorization(file_id).await?;
    Ok(Json(DownloadUrlResponse {
        file_id: grant.file_id,
        download_url: grant.download_url,
        cdn_url: grant.cdn_url,
    }))
}

/// GET `/multipart?name=<filename>&parts=<n>` — open a fragmented session.
pub async fn open_multipart_session(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
) -> Result<Json<MultipartSessionResponse>, AppError> {
    let name = query
        .name
        .as_deref()
        .ok_or_else(|| AppError::bad_request("Missing file name"))?;
    let parts = query
        .parts
        .ok_or_else(|| AppError::bad_request("Missing parts count"))?;

    let grant = state.uploads.create_multipart_session(name, parts).await?;
    Ok(Json(MultipartSessionResponse {
        file_id: grant.file_id,
        upload_id: grant.session_token,
        urls: grant
            .fragment_authorizations
            .into_iter()
            .map(|f| PartUrl {
                part_number: f.part_number,
                url: f.url,
            })
            .collect(),
    }))
}

/// POST `/complete` — finalize a fragmented session.
pub async fn finalize_multipart_session(
    State(state): State<AppState>,
    Json(body): Json<CompleteUploadRequest>,
) -> Result<Json<CompleteUploadResponse>, AppError> {
    let raw_id = body
        .file_id
        .as_deref()
        .ok_or_else(|| AppError::bad_request("fileId is required"))?;
    let file_id = parse_file_id(raw_id)?;
    let upload_id = body
        .upload_id
        .as_deref()
        .ok_or_else(|| AppError::bad_request("uploadId is required"))?;
    let parts = body
        .parts
        .ok_or_else(|| AppError::bad_request("parts are required"))?;

    let mut fragments = Vec::with_capacity(parts.len());
    for part in &parts {
        let (Some(part_number), Some(etag)) = (part.part_number, part.etag.as_deref()) else {
            return Err(AppError::bad_request(
                "Each part must have partNumber and etag",
            ));
        };
        fragments.push(FragmentDescriptor::new(part_number, etag));
    }

    state
        .uploads
        .finalize_multipart_session(file_id, upload_id, &fragments)
        .await?;

    Ok(Json(CompleteUploadResponse {
        message: "Upload completed",
        file_id,
    }))
}

fn parse_file_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("invalid file id `{raw}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_request_accepts_both_tag_spellings() {
        let body: CompleteUploadRequest = serde_json::from_str(
            r#"{
                "fileId": "0b8f7d7e-35d9-4bcd-9bd5-111111111111",
                "uploadId": "session-1",
                "parts": [
                    {"PartNumber": 1, "ETag": "\"abc\""},
                    {"partNumber": 2, "etag": "def"}
                ]
            }"#,
        )
        .unwrap();
        let parts = body.parts.unwrap();
        assert_eq!(parts[0].part_number, Some(1));
        assert_eq!(parts[0].etag.as_deref(), Some("\"abc\""));
        assert_eq!(parts[1].part_number, Some(2));
    }

    #[test]
    fn upload_query_accepts_filename_alias() {
        let query: UploadQuery =
            serde_json::from_str(r#"{"filename":"photo.png","partCount":3}"#).unwrap();
        assert_eq!(query.name.as_deref(), Some("photo.png"));
        assert_eq!(query.parts, Some(3));
    }
}
