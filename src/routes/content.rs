//! Unroll endpoints
//!
//! `POST /content` expands a document with the type-dispatched strategy,
//! `POST /internalcontent` with the internal one. The request body is the
//! JSON content document itself and must carry an `id` with an extractable
//! UUID. Transaction ids arrive via `X-Request-Id` and are generated when
//! absent.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{HeaderMap, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::content::{extract_uuid, Content, ID_FIELD};
use crate::reader::TRANSACTION_ID_HEADER;
use crate::server::AppState;
use crate::types::{Result, UnrollError};
use crate::unroller::UnrollEvent;

/// Handle `POST /content`
pub async fn post_content(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    handle_unroll(state, req, false).await
}

/// Handle `POST /internalcontent`
pub async fn post_internal_content(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    handle_unroll(state, req, true).await
}

async fn handle_unroll(
    state: Arc<AppState>,
    req: Request<Incoming>,
    internal: bool,
) -> Response<Full<Bytes>> {
    let tid = transaction_id(req.headers());
    let path = req.uri().path().to_string();

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            error!(transaction_id = %tid, error = %err, "Cannot read request body");
            return error_response(
                StatusCode::BAD_REQUEST,
                &tid,
                &format!("cannot read request body: {}", err),
            );
        }
    };

    let event = match unroll_event_from_bytes(&body, &tid) {
        Ok(event) => event,
        Err(err) => {
            error!(transaction_id = %tid, path = %path, error = %err, "Error expanding content, supplied document is invalid");
            return error_response(
                StatusCode::BAD_REQUEST,
                &tid,
                &format!("Error expanding content, supplied UUID is invalid: {}", err),
            );
        }
    };

    info!(transaction_id = %tid, uuid = %event.uuid, path = %path, "Transaction started");

    let result = if internal {
        state.unroller.unroll_internal(event.clone()).await
    } else {
        state.unroller.unroll(event.clone()).await
    };

    match result {
        Ok(expanded) => match serde_json::to_string(&expanded) {
            Ok(json) => {
                info!(transaction_id = %tid, uuid = %event.uuid, path = %path, status = 200, "Transaction finished");
                json_response(StatusCode::OK, &tid, json)
            }
            Err(err) => {
                error!(transaction_id = %tid, uuid = %event.uuid, error = %err, "Cannot serialise expanded content");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &tid,
                    &format!("Error expanding content for: {}: {}", event.uuid, err),
                )
            }
        },
        Err(err) => {
            let status = err.status_code();
            error!(transaction_id = %tid, uuid = %event.uuid, path = %path, status = %status.as_u16(), error = %err, "Transaction finished");
            let message = if status.is_client_error() {
                format!("Error expanding content, supplied UUID is invalid: {}", err)
            } else {
                format!("Error expanding content for: {}: {}", event.uuid, err)
            };
            error_response(status, &tid, &message)
        }
    }
}

/// Decode the request body into an unroll event. The document must be a
/// JSON object with an `id` field holding an extractable UUID.
pub(crate) fn unroll_event_from_bytes(body: &[u8], tid: &str) -> Result<UnrollEvent> {
    let content: Content = serde_json::from_slice(body)?;

    let id = content
        .get_str(ID_FIELD)
        .ok_or_else(|| UnrollError::BadRequest("missing or invalid id field".to_string()))?;
    let uuid = extract_uuid(id)?;

    Ok(UnrollEvent {
        content,
        transaction_id: tid.to_string(),
        uuid,
    })
}

/// Transaction id from the request, or a fresh one when the header is
/// missing or empty.
pub(crate) fn transaction_id(headers: &HeaderMap) -> String {
    headers
        .get(TRANSACTION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("tid_{}", Uuid::new_v4().simple()))
}

fn json_response(status: StatusCode, tid: &str, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json; charset=UTF-8")
        .header(TRANSACTION_ID_HEADER, tid)
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn error_response(status: StatusCode, tid: &str, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "message": message }).to_string();
    json_response(status, tid, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const UUID: &str = "22c0d426-1466-11e7-b0c1-37e417ee6c76";

    #[test]
    fn test_event_from_valid_body() {
        let body = json!({
            "id": format!("http://www.ft.com/thing/{}", UUID),
            "type": "http://www.ft.com/ontology/content/Article",
        })
        .to_string();

        let event = unroll_event_from_bytes(body.as_bytes(), "tid_1").unwrap();
        assert_eq!(event.uuid, UUID);
        assert_eq!(event.transaction_id, "tid_1");
    }

    #[test]
    fn test_event_from_unparseable_body() {
        let err = unroll_event_from_bytes(b"not json", "tid_1").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_event_requires_id_field() {
        let body = json!({"title": "no id"}).to_string();
        let err = unroll_event_from_bytes(body.as_bytes(), "tid_1").unwrap_err();
        assert!(matches!(err, UnrollError::BadRequest(_)));
    }

    #[test]
    fn test_event_requires_extractable_uuid() {
        let body = json!({"id": "http://www.ft.com/thing/not-a-uuid"}).to_string();
        let err = unroll_event_from_bytes(body.as_bytes(), "tid_1").unwrap_err();
        assert!(matches!(err, UnrollError::UuidExtraction(_)));
    }

    #[test]
    fn test_transaction_id_from_header_or_generated() {
        let mut headers = HeaderMap::new();
        headers.insert(TRANSACTION_ID_HEADER, "tid_abc".parse().unwrap());
        assert_eq!(transaction_id(&headers), "tid_abc");

        let generated = transaction_id(&HeaderMap::new());
        assert!(generated.starts_with("tid_"));
        assert!(generated.len() > 4);
    }
}
