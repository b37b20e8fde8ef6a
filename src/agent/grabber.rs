// src/agent/grabber.rs
//! HTTP client for the grabber admin API
//!
//! Every command is a JSON `POST` to `{url}/api/admin/record_*`. Anything but
//! `200 OK` is a failure. Only plain `http://` grabbers are supported.

use crate::agent::{AgentProvider, RecordingAgent};
use crate::contest::model::RecordingPeer;
use crate::utils::errors::{RecorderError, Result};
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use dashmap::DashMap;
use http_body_util::{BodyExt, Full};
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Grabber client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrabberConfig {
    /// Login paired with a team's credential for basic auth
    pub login: String,

    /// Deadline for one request, including reading the response
    pub request_timeout_ms: u64,
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            login: "admin".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl GrabberConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartRecordRequest<'a> {
    peer_name: &'a str,
    record_id: &'a str,
    /// Milliseconds
    timeout: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordRequest<'a> {
    peer_name: &'a str,
    record_id: &'a str,
}

/// Client for one grabber instance
pub struct GrabberClient {
    api_path: String,
    authorization: Option<String>,
    request_timeout: Duration,
    http_client: Client<HttpConnector, Full<Bytes>>,
}

impl GrabberClient {
    /// Create a client for the grabber at `url`
    pub fn new(url: &str, credentials: Option<(&str, &str)>, request_timeout: Duration) -> Self {
        let http_client = Client::builder(TokioExecutor::new()).build_http();

        let authorization = credentials.map(|(login, password)| {
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", login, password));
            format!("Basic {}", token)
        });

        Self {
            api_path: format!("{}/api/admin", url.trim_end_matches('/')),
            authorization,
            request_timeout,
            http_client,
        }
    }

    async fn send_request<T: Serialize>(&self, url_suffix: &str, content: &T) -> Result<String> {
        let url = format!("{}{}", self.api_path, url_suffix);
        let body = serde_json::to_vec(content).map_err(|e| {
            RecorderError::AgentRequestFailed(format!("Serialization error: {}", e))
        })?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(&url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(authorization) = &self.authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        let request = builder.body(Full::new(Bytes::from(body))).map_err(|e| {
            RecorderError::AgentRequestFailed(format!("Request build error for {}: {}", url, e))
        })?;

        debug!("Sending grabber request to {}", url);

        let exchange = async {
            let response = self.http_client.request(request).await.map_err(|e| {
                RecorderError::AgentRequestFailed(format!("Sending request to {} failed: {}", url, e))
            })?;

            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| {
                    RecorderError::AgentRequestFailed(format!("Response body error: {}", e))
                })?
                .to_bytes();

            Ok::<_, RecorderError>((status, String::from_utf8_lossy(&body).into_owned()))
        };

        let (status, body) = tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| {
                RecorderError::AgentRequestFailed(format!(
                    "Request to {} timed out after {:?}",
                    url, self.request_timeout
                ))
            })??;

        if status != StatusCode::OK {
            return Err(RecorderError::AgentStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl RecordingAgent for GrabberClient {
    async fn start_record(&self, peer_name: &str, record_id: &str, timeout: Duration) -> Result<()> {
        let request = StartRecordRequest {
            peer_name,
            record_id,
            timeout: timeout.as_millis() as u64,
        };
        let response = self.send_request("/record_start", &request).await?;
        info!("Grabber record started {} {} {}", peer_name, record_id, response);
        Ok(())
    }

    async fn stop_record(&self, peer_name: &str, record_id: &str) -> Result<()> {
        let request = RecordRequest {
            peer_name,
            record_id,
        };
        let response = self.send_request("/record_stop", &request).await?;
        info!("Grabber record stopped {} {} {}", peer_name, record_id, response);
        Ok(())
    }

    async fn upload_record(&self, peer_name: &str, record_id: &str) -> Result<()> {
        let request = RecordRequest {
            peer_name,
            record_id,
        };
        let response = self.send_request("/record_upload", &request).await?;
        info!(
            "Grabber record upload requested {} {} {}",
            peer_name, record_id, response
        );
        Ok(())
    }
}

/// Hands out one cached [`GrabberClient`] per grabber URL and credential
pub struct GrabberProvider {
    config: GrabberConfig,
    clients: DashMap<(String, Option<String>), Arc<GrabberClient>>,
}

impl GrabberProvider {
    pub fn new(config: GrabberConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

impl AgentProvider for GrabberProvider {
    fn agent_for(&self, peer: &RecordingPeer) -> Arc<dyn RecordingAgent> {
        let key = (peer.url.clone(), peer.credential.clone());
        let entry = self.clients.entry(key).or_insert_with(|| {
            debug!("Creating grabber client for {}", peer.url);
            let credentials = peer
                .credential
                .as_deref()
                .map(|credential| (self.config.login.as_str(), credential));
            Arc::new(GrabberClient::new(
                &peer.url,
                credentials,
                self.config.request_timeout(),
            ))
        });
        let client: Arc<GrabberClient> = Arc::clone(entry.value());
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, answer with `status_line`, return the raw request
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];

            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);

                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "{}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();

            String::from_utf8_lossy(&raw).to_string()
        });

        (url, handle)
    }

    #[test]
    fn test_config_default() {
        let config = GrabberConfig::default();
        assert_eq!(config.login, "admin");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_start_record_request() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", "ok").await;
        let client = GrabberClient::new(&url, Some(("admin", "live")), Duration::from_secs(5));

        client
            .start_record("comp01", "R1", Duration::from_secs(120))
            .await
            .unwrap();

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/admin/record_start HTTP/1.1"));
        // base64("admin:live")
        assert!(raw.contains("YWRtaW46bGl2ZQ=="));
        assert!(raw.contains(r#""peerName":"comp01""#));
        assert!(raw.contains(r#""recordId":"R1""#));
        assert!(raw.contains(r#""timeout":120000"#));
    }

    #[tokio::test]
    async fn test_non_ok_status_is_error() {
        let (url, server) = serve_once("HTTP/1.1 404 Not Found", "no such peer").await;
        let client = GrabberClient::new(&url, None, Duration::from_secs(5));

        let result = client.stop_record("comp01", "R1").await;
        let raw = server.await.unwrap();

        assert!(raw.starts_with("POST /api/admin/record_stop"));
        assert!(!raw.to_lowercase().contains("authorization"));
        match result {
            Err(RecorderError::AgentStatus { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such peer");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = GrabberClient::new(&url, None, Duration::from_secs(5));
        let result = client.upload_record("comp01", "R1").await;

        assert!(matches!(result, Err(RecorderError::AgentRequestFailed(_))));
    }

    #[tokio::test]
    async fn test_provider_caches_per_url_and_credential() {
        let provider = GrabberProvider::new(GrabberConfig::default());
        let peer = |url: &str, credential: Option<&str>| RecordingPeer {
            url: url.to_string(),
            peer_name: "comp01".to_string(),
            credential: credential.map(str::to_string),
        };

        provider.agent_for(&peer("http://g1:8000", None));
        provider.agent_for(&peer("http://g1:8000", None));
        provider.agent_for(&peer("http://g1:8000", Some("secret")));
        provider.agent_for(&peer("http://g2:8000", None));

        assert_eq!(provider.client_count(), 3);
    }
}
