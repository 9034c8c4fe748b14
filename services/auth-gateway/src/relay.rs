//! Upload relay
//!
//! Forwards a fully buffered inbound body to the downstream storage API
//! and normalizes its response. The body is passed through byte-for-byte
//! with its original Content-Type header — multipart boundaries included —
//! so the downstream sees exactly what the browser sent.
//!
//! The downstream wraps its outcome in a JSON envelope with a numeric
//! `code` field: success is `code == 200` together with a `data.full_path`
//! entry; anything else is a failure whose `message` is relayed when
//! present.

use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

/// Relay failure classes.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Downstream answered, but not with a success envelope
    #[error("{0}")]
    Upstream(String),

    /// Network failure or a body that is not the expected JSON envelope
    #[error("upload transport error: {0}")]
    Transport(String),
}

/// Normalized success result.
#[derive(Debug, PartialEq, Eq)]
pub struct UploadResult {
    pub url: String,
}

/// Downstream response envelope, all fields optional so shape violations
/// surface as explicit failures instead of silent defaults.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    code: Option<i64>,
    message: Option<String>,
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    full_path: Option<String>,
}

/// Send `body` to the storage API and extract the stored file's path.
pub async fn relay(
    client: &reqwest::Client,
    upload_url: &str,
    api_key: &str,
    content_type: &str,
    body: Bytes,
) -> Result<UploadResult, RelayError> {
    let response = client
        .post(upload_url)
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .header(reqwest::header::AUTHORIZATION, api_key)
        .body(body)
        .send()
        .await
        .map_err(|e| RelayError::Transport(format!("upload request failed: {e}")))?;

    let envelope: ApiEnvelope = response
        .json()
        .await
        .map_err(|e| RelayError::Transport(format!("invalid upload response: {e}")))?;

    match envelope {
        ApiEnvelope {
            code: Some(200),
            data: Some(ApiData {
                full_path: Some(path),
            }),
            ..
        } => {
            debug!(path, "upload stored");
            Ok(UploadResult { url: path })
        }
        ApiEnvelope { message, code, .. } => {
            debug!(?code, "upload rejected by downstream");
            Err(RelayError::Upstream(
                message.unwrap_or_else(|| "upload failed".to_string()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    type Captured = Arc<Mutex<Option<(String, String, Vec<u8>)>>>;

    /// Mock storage API that records the content-type, authorization
    /// header, and raw body of the last request, answering with `response`.
    async fn start_storage_server(response: &'static str) -> (String, Captured) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let captured: Captured = Arc::new(Mutex::new(None));
        let state = captured.clone();

        tokio::spawn(async move {
            let app = axum::Router::new()
                .route(
                    "/upload",
                    post(
                        move |State(state): State<Captured>, headers: HeaderMap, body: Bytes| async move {
                            let content_type = headers
                                .get("content-type")
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or("")
                                .to_string();
                            let auth = headers
                                .get("authorization")
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or("")
                                .to_string();
                            *state.lock().unwrap() = Some((content_type, auth, body.to_vec()));
                            (
                                [(axum::http::header::CONTENT_TYPE, "application/json")],
                                response,
                            )
                        },
                    ),
                )
                .with_state(state);
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/upload"), captured)
    }

    #[tokio::test]
    async fn success_envelope_yields_full_path() {
        let (url, _) =
            start_storage_server(r#"{"code":200,"data":{"full_path":"/x/y.png"}}"#).await;
        let client = reqwest::Client::new();

        let result = relay(&client, &url, "key-123", "image/png", Bytes::from("png-bytes"))
            .await
            .unwrap();
        assert_eq!(result, UploadResult { url: "/x/y.png".into() });
    }

    #[tokio::test]
    async fn body_and_content_type_forwarded_verbatim() {
        let (url, captured) =
            start_storage_server(r#"{"code":200,"data":{"full_path":"/x/y.png"}}"#).await;
        let client = reqwest::Client::new();

        let multipart_type = "multipart/form-data; boundary=----WebKitFormBoundaryX7";
        let body = b"------WebKitFormBoundaryX7\r\ncontent\r\n------WebKitFormBoundaryX7--".to_vec();
        relay(
            &client,
            &url,
            "key-123",
            multipart_type,
            Bytes::from(body.clone()),
        )
        .await
        .unwrap();

        let (content_type, auth, seen_body) = captured.lock().unwrap().clone().unwrap();
        assert_eq!(
            content_type, multipart_type,
            "content-type (with boundary) must pass through unchanged"
        );
        assert_eq!(auth, "key-123");
        assert_eq!(seen_body, body, "body must be forwarded byte-for-byte");
    }

    #[tokio::test]
    async fn error_envelope_relays_downstream_message() {
        let (url, _) = start_storage_server(r#"{"code":500,"message":"boom"}"#).await;
        let client = reqwest::Client::new();

        let err = relay(&client, &url, "key", "image/png", Bytes::from("x"))
            .await
            .unwrap_err();
        match err {
            RelayError::Upstream(msg) => assert_eq!(msg, "boom"),
            other => panic!("expected Upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_envelope_without_message_gets_generic_text() {
        let (url, _) = start_storage_server(r#"{"code":403}"#).await;
        let client = reqwest::Client::new();

        let err = relay(&client, &url, "key", "image/png", Bytes::from("x"))
            .await
            .unwrap_err();
        match err {
            RelayError::Upstream(msg) => assert_eq!(msg, "upload failed"),
            other => panic!("expected Upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_code_without_path_is_an_error() {
        let (url, _) = start_storage_server(r#"{"code":200,"data":{}}"#).await;
        let client = reqwest::Client::new();

        let err = relay(&client, &url, "key", "image/png", Bytes::from("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Upstream(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_transport_error() {
        let (url, _) = start_storage_server("<html>gateway error</html>").await;
        let client = reqwest::Client::new();

        let err = relay(&client, &url, "key", "image/png", Bytes::from("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Transport(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let client = reqwest::Client::new();
        let err = relay(
            &client,
            "http://127.0.0.1:1/upload",
            "key",
            "image/png",
            Bytes::from("x"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RelayError::Transport(_)));
    }
}
