/// Multipart form parsing for post creation
use crate::error::{AppError, Result};
use crate::models::MediaUpload;
use actix_multipart::{Field, Multipart};
use bytes::BytesMut;
use futures_util::stream::StreamExt;

/// Per-file upload guardrail
pub const MAX_FILE_BYTES: usize = 20 * 1024 * 1024;
pub const MAX_FILES: usize = 10;

/// Fields of a create-post form
#[derive(Debug, Default)]
pub struct PostForm {
    pub content: Option<String>,
    pub files: Vec<MediaUpload>,
}

async fn read_field(field: &mut Field, limit: usize) -> Result<bytes::Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?;
        if buf.len() + chunk.len() > limit {
            return Err(AppError::ValidationError(format!(
                "upload exceeds {} bytes",
                limit
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Collect `content` and `files` parts; unknown parts are drained and ignored
pub async fn parse_post_form(mut payload: Multipart) -> Result<PostForm> {
    let mut form = PostForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?;
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "content" => {
                let raw = read_field(&mut field, MAX_FILE_BYTES).await?;
                let text = String::from_utf8(raw.to_vec())
                    .map_err(|_| AppError::BadRequest("content must be UTF-8".into()))?;
                form.content = Some(text);
            }
            "files" => {
                if form.files.len() >= MAX_FILES {
                    return Err(AppError::ValidationError(format!(
                        "at most {} files per post",
                        MAX_FILES
                    )));
                }
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("file-{}", form.files.len()));
                let content_type = field
                    .content_type()
                    .map(|mime| mime.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let data = read_field(&mut field, MAX_FILE_BYTES).await?;
                if data.is_empty() {
                    continue;
                }
                form.files.push(MediaUpload {
                    filename,
                    content_type,
                    data,
                });
            }
            _ => {
                read_field(&mut field, MAX_FILE_BYTES).await?;
            }
        }
    }

    Ok(form)
}
