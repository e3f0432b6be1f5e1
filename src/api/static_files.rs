//! Static UI files from the module's web root.

use super::AppState;
use axum::{
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};

/// `/` and `/index.html` map to the index document; everything else maps
/// under the web root after percent-decoding. Paths with `..` (encoded or
/// not), or resolving outside the web root through symlinks, are refused.
pub(super) async fn serve(State(state): State<AppState>, uri: Uri) -> Response {
    let Ok(decoded) = percent_encoding::percent_decode_str(uri.path()).decode_utf8() else {
        return not_found();
    };
    let path = decoded.as_ref();
    if path.contains("..") {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let relative = match path.trim_start_matches('/') {
        "" => "index.html",
        p => p,
    };

    let Ok(root) = tokio::fs::canonicalize(state.web_root.as_path()).await else {
        return not_found();
    };
    let Ok(resolved) = tokio::fs::canonicalize(root.join(relative)).await else {
        return not_found();
    };
    if !resolved.starts_with(&root) {
        tracing::warn!(path, "Refusing static path outside web root");
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    match tokio::fs::read(&resolved).await {
        Ok(data) => {
            let mime = mime_guess::from_path(&resolved).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], data).into_response()
        }
        // Directories land here too.
        Err(_) => not_found(),
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}
