//! HTTP detection client (reqwest)

use std::time::Duration;

use camera_capture::EncodedFrame;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{DetectError, DetectionClient, DetectionResult};

/// Multipart field carrying the frame
const FRAME_FIELD: &str = "frame";
const FRAME_FILE_NAME: &str = "frame.jpg";

/// Detection server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the detection service
    pub base_url: String,
    /// Per-request timeout in milliseconds (0 disables it)
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5500".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Error payload the server sends with non-success statuses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// reqwest-backed [`DetectionClient`]
pub struct HttpDetectionClient {
    client: Client,
    detect_url: String,
    stop_beep_url: String,
}

impl HttpDetectionClient {
    /// Create a new client
    pub fn new(config: &ServerConfig) -> Result<Self, DetectError> {
        let base = config.base_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(DetectError::InvalidUrl(config.base_url.clone()));
        }

        let mut builder = Client::builder();
        if config.request_timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.request_timeout_ms));
        }
        let client = builder
            .build()
            .map_err(|e| DetectError::Transport(e.to_string()))?;

        info!("Detection client targeting {}", base);

        Ok(Self {
            client,
            detect_url: format!("{}/detect", base),
            stop_beep_url: format!("{}/stop_beep", base),
        })
    }

    /// Map non-success statuses to [`DetectError::Status`]
    async fn check_status(response: Response) -> Result<Response, DetectError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| {
                status
                    .canonical_reason()
                    .unwrap_or("Network response was not ok")
                    .to_string()
            });

        Err(DetectError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait::async_trait]
impl DetectionClient for HttpDetectionClient {
    async fn detect(&self, frame: EncodedFrame) -> Result<DetectionResult, DetectError> {
        metrics::counter!("detect_requests_total").increment(1);
        debug!(
            "Uploading frame {} ({} bytes, {}x{})",
            frame.sequence,
            frame.bytes.len(),
            frame.width,
            frame.height
        );

        let content_type = frame.content_type();
        let part = Part::bytes(frame.bytes)
            .file_name(FRAME_FILE_NAME)
            .mime_str(content_type)?;
        let form = Form::new().part(FRAME_FIELD, part);

        let outcome = async {
            let response = self.client.post(&self.detect_url).multipart(form).send().await?;
            let response = Self::check_status(response).await?;
            let result = response.json::<DetectionResult>().await?;
            Ok::<_, DetectError>(result)
        }
        .await;

        if outcome.is_err() {
            metrics::counter!("detect_errors_total").increment(1);
        }
        outcome
    }

    async fn stop_beep(&self) -> Result<(), DetectError> {
        let response = self
            .client
            .post(&self.stop_beep_url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        Self::check_status(response).await?;
        debug!("Server alarm silenced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Multipart, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    /// What the mock server saw
    #[derive(Default)]
    struct Seen {
        fields: Vec<(String, Option<String>, Option<String>, usize)>,
        stop_beep_content_types: Vec<String>,
    }

    #[derive(Clone)]
    struct MockServer {
        seen: Arc<Mutex<Seen>>,
        detect_status: StatusCode,
        detect_body: Value,
    }

    async fn detect_handler(
        State(server): State<MockServer>,
        mut multipart: Multipart,
    ) -> (StatusCode, Json<Value>) {
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let len = field.bytes().await.unwrap().len();
            server
                .seen
                .lock()
                .unwrap()
                .fields
                .push((name, file_name, content_type, len));
        }
        (server.detect_status, Json(server.detect_body.clone()))
    }

    async fn stop_beep_handler(
        State(server): State<MockServer>,
        headers: HeaderMap,
    ) -> Json<Value> {
        let content_type = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        server
            .seen
            .lock()
            .unwrap()
            .stop_beep_content_types
            .push(content_type);
        Json(json!({"message": "Beep stopped"}))
    }

    async fn spawn_server(status: StatusCode, body: Value) -> (String, Arc<Mutex<Seen>>) {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let state = MockServer {
            seen: seen.clone(),
            detect_status: status,
            detect_body: body,
        };
        let app = Router::new()
            .route("/detect", post(detect_handler))
            .route("/stop_beep", post(stop_beep_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), seen)
    }

    fn client_for(base_url: String) -> HttpDetectionClient {
        HttpDetectionClient::new(&ServerConfig {
            base_url,
            request_timeout_ms: 2_000,
        })
        .unwrap()
    }

    fn frame() -> EncodedFrame {
        EncodedFrame {
            bytes: vec![0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9],
            width: 2,
            height: 2,
            sequence: 0,
        }
    }

    #[test]
    fn test_rejects_non_http_url() {
        let result = HttpDetectionClient::new(&ServerConfig {
            base_url: "ftp://example.com".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(DetectError::InvalidUrl(_))));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = client_for("http://127.0.0.1:5500/".to_string());
        assert_eq!(client.detect_url, "http://127.0.0.1:5500/detect");
        assert_eq!(client.stop_beep_url, "http://127.0.0.1:5500/stop_beep");
    }

    #[tokio::test]
    async fn test_detect_uploads_frame_field() {
        let (url, seen) = spawn_server(
            StatusCode::OK,
            json!({"drowsy": true, "processed_image": "abc", "status": "success"}),
        )
        .await;
        let client = client_for(url);

        let result = client.detect(frame()).await.unwrap();
        assert!(result.drowsy);
        assert_eq!(result.annotated_image(), Some("abc"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.fields.len(), 1);
        let (name, file_name, content_type, len) = &seen.fields[0];
        assert_eq!(name, "frame");
        assert_eq!(file_name.as_deref(), Some("frame.jpg"));
        assert_eq!(content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(*len, 7);
    }

    #[tokio::test]
    async fn test_detect_non_success_is_error() {
        let (url, _) = spawn_server(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "Model not initialized"}),
        )
        .await;
        let client = client_for(url);

        match client.detect(frame()).await {
            Err(DetectError::Status { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "Model not initialized");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_detect_invalid_body_is_error() {
        let (url, _) = spawn_server(StatusCode::OK, json!(["not", "an", "object"])).await;
        let client = client_for(url);

        assert!(matches!(
            client.detect(frame()).await,
            Err(DetectError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_detect_connection_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(format!("http://{}", addr));
        assert!(matches!(
            client.detect(frame()).await,
            Err(DetectError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_beep_sends_json_content_type() {
        let (url, seen) = spawn_server(StatusCode::OK, json!({})).await;
        let client = client_for(url);

        client.stop_beep().await.unwrap();
        assert_eq!(
            seen.lock().unwrap().stop_beep_content_types,
            vec!["application/json".to_string()]
        );
    }
}
