use crate::error::{AppError, Result};
use crate::models::{IncomingFile, IngestResponse};
use crate::services::{MediaService, MAX_FILES, MAX_FILE_BYTES};
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use bytes::BytesMut;
use futures_util::stream::StreamExt;
use uuid::Uuid;

async fn read_field(field: &mut Field) -> Result<bytes::Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?;
        if buf.len() + chunk.len() > MAX_FILE_BYTES {
            return Err(AppError::ValidationError(format!(
                "upload exceeds {} bytes",
                MAX_FILE_BYTES
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

/// Store uploaded files for a post
pub async fn ingest(service: web::Data<MediaService>, mut payload: Multipart) -> Result<HttpResponse> {
    let mut post_id = None;
    let mut files = Vec::new();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?;
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "postId" => {
                let raw = read_field(&mut field).await?;
                let raw = std::str::from_utf8(&raw)
                    .map_err(|_| AppError::BadRequest("postId must be UTF-8".into()))?;
                let id = Uuid::parse_str(raw.trim())
                    .map_err(|_| AppError::BadRequest(format!("invalid postId: {}", raw)))?;
                post_id = Some(id);
            }
            "files" => {
                if files.len() >= MAX_FILES {
                    return Err(AppError::ValidationError(format!(
                        "at most {} files per post",
                        MAX_FILES
                    )));
                }
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("file-{}", files.len()));
                let content_type = field
                    .content_type()
                    .map(|mime| mime.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let data = read_field(&mut field).await?;
                files.push(IncomingFile {
                    filename,
                    content_type,
                    data,
                });
            }
            _ => {
                read_field(&mut field).await?;
            }
        }
    }

    let post_id = post_id.ok_or_else(|| AppError::BadRequest("postId is required".into()))?;
    let urls = service.ingest(post_id, files).await?;
    Ok(HttpResponse::Ok().json(IngestResponse { urls }))
}

pub async fn list_post_media(
    service: web::Data<MediaService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let items = service.list_for_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(items))
}
