//! Receipt image uploads.
//!
//! Accepts a single multipart field named `receipt`, at most 5MB, whose
//! extension, declared content type and leading bytes all agree on one of
//! JPEG, PNG, GIF or WebP. Files land in `<UPLOAD_DIR>/receipts` and are
//! reachable at `/uploads/receipts/<file>` and `/api/upload/receipt/<file>`.

use std::path::{Path, PathBuf};

use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use image::ImageFormat;
use rand::Rng;
use tokio_stream::StreamExt;

use crate::{
    error::ApiError,
    models::{ApiResponse, UploadedReceipt},
    state::AppState,
};

pub const MAX_RECEIPT_BYTES: usize = 5 * 1024 * 1024;

const RECEIPT_FIELD: &str = "receipt";
const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];
const IMAGES_ONLY: &str = "Only image files are allowed (JPEG, PNG, GIF, WebP)";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/upload")
            .service(web::resource("/receipt").route(web::post().to(upload_receipt)))
            .service(
                web::resource("/receipt/{filename}")
                    .route(web::get().to(get_receipt))
                    .route(web::delete().to(delete_receipt)),
            ),
    );
}

struct ReceiptPart {
    original_name: String,
    content_type: Option<String>,
    data: Vec<u8>,
}

async fn upload_receipt(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut part = None;

    while let Some(field) = payload.next().await {
        let mut field = field
            .map_err(|err| ApiError::bad_request(format!("Invalid multipart request: {err}")))?;

        if field.name() != Some(RECEIPT_FIELD) {
            while let Some(chunk) = field.next().await {
                chunk.map_err(|err| ApiError::bad_request(format!("Invalid multipart request: {err}")))?;
            }
            continue;
        }

        let original_name = field
            .content_disposition()
            .and_then(|disposition| disposition.get_filename())
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("No filename provided for receipt"))?;
        let content_type = field.content_type().map(|mime| mime.essence_str().to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk
                .map_err(|err| ApiError::bad_request(format!("Invalid multipart request: {err}")))?;
            if data.len() + chunk.len() > MAX_RECEIPT_BYTES {
                return Err(ApiError::bad_request(format!(
                    "File too large. Maximum size is {}MB",
                    MAX_RECEIPT_BYTES / 1024 / 1024
                )));
            }
            data.extend_from_slice(&chunk);
        }

        part = Some(ReceiptPart {
            original_name,
            content_type,
            data,
        });
        break;
    }

    let part = part.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let extension = validate_receipt(&part.original_name, part.content_type.as_deref(), &part.data)?;

    let dir = state.config.receipts_dir();
    tokio::fs::create_dir_all(&dir).await?;
    let filename = receipt_filename(&extension);
    let path = dir.join(&filename);
    if let Err(err) = tokio::fs::write(&path, &part.data).await {
        let _ = tokio::fs::remove_file(&path).await;
        return Err(err.into());
    }

    log::info!("Stored receipt {} ({} bytes)", filename, part.data.len());

    let receipt = UploadedReceipt {
        url: format!("/uploads/receipts/{filename}"),
        filename,
        original_name: part.original_name,
        size: part.data.len(),
    };
    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Receipt uploaded successfully", receipt)))
}

async fn get_receipt(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let path = existing_receipt(&state, &path.into_inner())?;
    let file = NamedFile::open_async(&path).await?;
    Ok(file.into_response(&req))
}

async fn delete_receipt(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let path = existing_receipt(&state, &path.into_inner())?;
    tokio::fs::remove_file(&path).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Receipt deleted successfully")))
}

fn existing_receipt(state: &AppState, filename: &str) -> Result<PathBuf, ApiError> {
    if !is_safe_filename(filename) {
        return Err(ApiError::bad_request("Invalid receipt filename"));
    }
    let path = state.config.receipts_dir().join(filename);
    if !path.is_file() {
        return Err(ApiError::not_found("Receipt not found"));
    }
    Ok(path)
}

/// Returns the lowercased extension to store the receipt under.
pub(crate) fn validate_receipt(
    original_name: &str,
    content_type: Option<&str>,
    data: &[u8],
) -> Result<String, ApiError> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| ApiError::bad_request(IMAGES_ONLY))?;

    let subtype_allowed = content_type
        .and_then(|mime| mime.strip_prefix("image/"))
        .map(|subtype| ALLOWED_EXTENSIONS.contains(&subtype))
        .unwrap_or(false);
    if !subtype_allowed {
        return Err(ApiError::bad_request(IMAGES_ONLY));
    }

    if data.is_empty() {
        return Err(ApiError::bad_request("Empty file provided"));
    }
    if data.len() > MAX_RECEIPT_BYTES {
        return Err(ApiError::bad_request("File too large. Maximum size is 5MB"));
    }

    match image::guess_format(data) {
        Ok(ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP) => {
            Ok(extension)
        }
        _ => Err(ApiError::bad_request(IMAGES_ONLY)),
    }
}

fn receipt_filename(extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("receipt-{millis}-{suffix}.{extension}")
}

fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.starts_with('.')
        && !filename.contains("..")
        && filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0, 0, 0, 0];

    #[test]
    fn accepts_matching_png() {
        let ext = validate_receipt("Receipt.PNG", Some("image/png"), PNG_MAGIC).expect("valid");
        assert_eq!(ext, "png");
    }

    #[test]
    fn rejects_non_image_extension_or_type() {
        assert!(validate_receipt("notes.txt", Some("text/plain"), b"hello").is_err());
        assert!(validate_receipt("receipt.png", Some("application/pdf"), PNG_MAGIC).is_err());
        assert!(validate_receipt("receipt.png", None, PNG_MAGIC).is_err());
    }

    #[test]
    fn rejects_disguised_content() {
        assert!(validate_receipt("receipt.jpg", Some("image/jpeg"), b"%PDF-1.7").is_err());
    }

    #[test]
    fn filenames_are_sanitized() {
        assert!(is_safe_filename("receipt-1700000000000-42.png"));
        assert!(!is_safe_filename("../secrets.txt"));
        assert!(!is_safe_filename("nested/receipt.png"));
        assert!(!is_safe_filename(".env"));
        assert!(!is_safe_filename(""));
    }

    #[test]
    fn generated_names_keep_extension() {
        let name = receipt_filename("webp");
        assert!(name.starts_with("receipt-"));
        assert!(name.ends_with(".webp"));
        assert!(is_safe_filename(&name));
    }
}
