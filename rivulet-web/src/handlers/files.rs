//! Ranged file streaming.
//!
//! Every status-affecting check runs before the body is built. Once the
//! response is returned, a failing read can only cut the connection short.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use futures::TryStreamExt;
use rivulet_core::streaming::{RangeRequest, StreamReader, StreamingError, resolve_range};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::server::AppState;

/// Serves `GET` and `HEAD` for a file inside a torrent.
///
/// # Errors
///
/// - `ApiError::NotFound` - If the torrent or the file path is unknown
/// - `ApiError::RangeNotSatisfiable` - If the range names no byte of the file
pub async fn serve_file(
    State(state): State<AppState>,
    Path((id, path)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let torrent = state.registry.lookup(&id)?;
    let (file_index, file) = torrent
        .layout()
        .find_file(&path)
        .ok_or_else(|| StreamingError::FileNotFound { path: path.clone() })?;
    let file_length = file.length;
    let content_type = mime_guess::from_path(&file.name).first_or_octet_stream();

    let range_header = headers.get(RANGE).and_then(|value| value.to_str().ok());
    let request = resolve_range(range_header, file_length);
    let range = match request {
        RangeRequest::Unsatisfiable => {
            debug!(%path, ?range_header, file_length, "Unsatisfiable range");
            return Err(ApiError::RangeNotSatisfiable {
                length: file_length,
            });
        }
        _ => request.byte_range(file_length),
    };
    let content_length = range.map_or(0, |r| r.len());

    let mut response = Response::builder()
        .header(ACCEPT_RANGES, "bytes")
        .header(CONTENT_TYPE, content_type.as_ref())
        .header(CONTENT_LENGTH, content_length);
    response = match request {
        RangeRequest::Partial(r) => response
            .status(StatusCode::PARTIAL_CONTENT)
            .header(CONTENT_RANGE, r.content_range(file_length)),
        _ => response.status(StatusCode::OK),
    };

    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        let reader = StreamReader::open(torrent, file_index, range, &state.config.streaming)?;
        let stream = reader.into_stream().inspect_err(move |e| {
            warn!(error = %e, file = %path, "Upstream read failed, aborting response");
        });
        Body::from_stream(stream)
    };

    response.body(body).map_err(|e| ApiError::Internal {
        message: e.to_string(),
    })
}
