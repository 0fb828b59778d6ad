use std::io::Cursor;
use std::sync::LazyLock;

use axum::{
    Extension, Json,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::{Bytes, BytesMut};
use image::{ImageFormat, imageops::FilterType};
use regex::Regex;
use tracing::{info, warn};

use tasker_types::api::{ErrorResponse, MessageResponse};

use crate::auth::{AppState, run_blocking};
use crate::error::{ApiError, ApiResult};
use crate::middleware::Session;

/// Upload cap, checked before any decoding happens.
pub const MAX_AVATAR_BYTES: usize = 1_000_000;

/// Transport limit for the multipart body; leaves room for boundaries and
/// headers so oversized files reach our own size check.
pub const AVATAR_BODY_LIMIT: usize = 2 * MAX_AVATAR_BYTES;

/// Stored avatars are always this many pixels square.
pub const AVATAR_SIZE: u32 = 250;

static IMAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png)$").expect("image name pattern compiles"));

/// The `avatar` file part of a multipart upload, already checked for type
/// and size.
pub struct AvatarUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Upload filter failures. Rendered as a 400 carrying the filter's message,
/// separately from [`ApiError`].
#[derive(Debug)]
pub struct AvatarRejection(pub String);

impl IntoResponse for AvatarRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: self.0,
                details: Vec::new(),
            }),
        )
            .into_response()
    }
}

impl<S> FromRequest<S> for AvatarUpload
where
    S: Send + Sync,
{
    type Rejection = AvatarRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AvatarRejection(e.body_text()))?;

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| AvatarRejection(e.body_text()))?
        {
            if field.name() != Some("avatar") {
                continue;
            }

            let file_name = field.file_name().unwrap_or_default().to_string();
            if !IMAGE_NAME.is_match(&file_name) {
                return Err(AvatarRejection("File must be a JPG, JPEG, or PNG image!".into()));
            }

            let mut buf = BytesMut::new();
            while let Some(chunk) = field.chunk().await.map_err(|e| AvatarRejection(e.body_text()))? {
                if buf.len() + chunk.len() > MAX_AVATAR_BYTES {
                    return Err(AvatarRejection("File too large".into()));
                }
                buf.extend_from_slice(&chunk);
            }

            return Ok(Self {
                file_name,
                bytes: buf.freeze(),
            });
        }

        Err(AvatarRejection("Please upload an avatar image".into()))
    }
}

/// Decode any supported image, cover-crop it to a square and re-encode as
/// PNG. CPU bound: run on the blocking pool.
pub fn resize_avatar(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let resized = img.resize_to_fill(AVATAR_SIZE, AVATAR_SIZE, FilterType::Lanczos3);

    let mut out = Cursor::new(Vec::new());
    resized.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// POST /users/profile/avatar
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    upload: AvatarUpload,
) -> ApiResult<Json<MessageResponse>> {
    let user_id = session.user.id;
    let file_name = upload.file_name;

    let stored = run_blocking(&state, move |s| -> Result<bool, ApiError> {
        let png = resize_avatar(&upload.bytes).map_err(|e| {
            warn!("Undecodable avatar '{}': {}", file_name, e);
            ApiError::BadRequest("Unable to process image".into())
        })?;
        s.db.set_avatar(&user_id, Some(png.as_slice())).map_err(ApiError::internal)
    })
    .await??;

    if !stored {
        return Err(ApiError::NotFound("User"));
    }

    Ok(Json(MessageResponse::new("Upload successful!")))
}

/// GET /users/{id}/avatar, public.
pub async fn get_avatar(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    let avatar = match run_blocking(&state, move |s| s.db.get_avatar(&user_id)).await {
        Ok(Ok(avatar)) => avatar,
        Ok(Err(e)) => {
            warn!("Avatar lookup failed: {}", e);
            None
        }
        Err(e) => return e.into_response(),
    };

    match avatar {
        Some(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        None => ApiError::NotFound("Avatar").into_response(),
    }
}

/// DELETE /users/profile/avatar
pub async fn delete_avatar(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<MessageResponse>> {
    let user_id = session.user.id;
    run_blocking(&state, move |s| s.db.set_avatar(&user_id, None))
        .await?
        .map_err(ApiError::internal)?;

    info!("Avatar cleared");
    Ok(Json(MessageResponse::new("Avatar deleted")))
}
