//! Bearer-token authentication for protected endpoints.
//!
//! The token lives in a file under the data directory and is generated on
//! first start. Clients send `Authorization: Bearer <token>`.

use std::path::Path;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::Rng;
use tracing::{info, warn};

use tariffbot_core::error::TariffError;

use crate::state::AppState;

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

/// Read the token at `token_path`, or generate and save a new one.
///
/// A token that cannot be saved is an error: clients read it from the file.
pub fn load_or_generate_token(token_path: &Path) -> Result<String, TariffError> {
    if let Ok(contents) = std::fs::read_to_string(token_path) {
        let token = contents.trim();
        if !token.is_empty() {
            info!(path = %token_path.display(), "API token loaded");
            return Ok(token.to_string());
        }
    }

    let token = generate_token();
    if let Some(parent) = token_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(token_path, &token).map_err(|e| {
        TariffError::Api(format!(
            "Failed to save API token to {}: {}",
            token_path.display(),
            e
        ))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(token_path, std::fs::Permissions::from_mode(0o600))
        {
            warn!(
                error = %e,
                path = %token_path.display(),
                "Failed to restrict API token file permissions; other users may read it"
            );
        }
    }

    info!(path = %token_path.display(), "API token generated");
    Ok(token)
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "message": message,
        })),
    )
        .into_response()
}

/// Middleware that rejects requests without the configured bearer token.
pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return unauthorized("Missing Authorization header");
    };
    let Ok(value) = value.to_str() else {
        return unauthorized("Invalid Authorization header encoding");
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if token == state.api_token => next.run(req).await,
        _ => unauthorized("Invalid bearer token"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_is_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_token_persisted_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("api_token");

        let first = load_or_generate_token(&path).unwrap();
        assert!(path.exists());
        assert_eq!(load_or_generate_token(&path).unwrap(), first);
    }

    #[test]
    fn test_existing_token_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_token");
        std::fs::write(&path, "  abc123\n").unwrap();
        assert_eq!(load_or_generate_token(&path).unwrap(), "abc123");
    }

    #[test]
    fn test_blank_token_file_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_token");
        std::fs::write(&path, "\n").unwrap();
        let token = load_or_generate_token(&path).unwrap();
        assert_eq!(token.len(), 32);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), token);
    }

    #[test]
    fn test_unsavable_token_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, "file").unwrap();
        assert!(load_or_generate_token(&blocker.join("api_token")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_generated_token_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_token");
        load_or_generate_token(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
