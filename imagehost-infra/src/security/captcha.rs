use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cloudflare Turnstile校验接口
pub const TURNSTILE_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

/// 人机验证失败原因
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("captcha secret key is missing")]
    MissingSecret,

    #[error("captcha token is missing")]
    MissingToken,

    #[error("failed to send verification request: {0}")]
    RequestFailed(#[source] reqwest::Error),

    #[error("verification request failed with status: {0}")]
    VerificationRequestFailed(StatusCode),

    #[error("failed to decode verification response: {0}")]
    ResponseDecodeFailed(#[source] reqwest::Error),

    #[error("verification rejected: [{}]", .error_codes.join(", "))]
    VerificationRejected { error_codes: Vec<String> },
}

/// 人机验证trait
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// 校验客户端提交的token
    /// remote_ip未知时传None
    async fn verify(
        &self,
        secret_key: &str,
        token: &str,
        remote_ip: Option<&str>,
    ) -> Result<(), VerificationError>;
}

#[derive(Debug, Serialize)]
struct SiteVerifyRequest<'a> {
    secret: &'a str,
    response: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remoteip: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
    #[serde(default)]
    hostname: Option<String>,
}

/// 基于Turnstile的实现
/// 每次校验只发送一次请求，不缓存、不重试
pub struct TurnstileVerifier {
    http_client: reqwest::Client,
    verify_url: String,
}

impl TurnstileVerifier {
    pub fn new() -> Self {
        Self::with_verify_url(TURNSTILE_VERIFY_URL)
    }

    /// 指定校验接口地址
    pub fn with_verify_url(verify_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            verify_url: verify_url.into(),
        }
    }
}

impl Default for TurnstileVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptchaVerifier for TurnstileVerifier {
    async fn verify(
        &self,
        secret_key: &str,
        token: &str,
        remote_ip: Option<&str>,
    ) -> Result<(), VerificationError> {
        if secret_key.is_empty() {
            tracing::warn!("Turnstile secret key is not configured");
            return Err(VerificationError::MissingSecret);
        }
        if token.is_empty() {
            return Err(VerificationError::MissingToken);
        }

        let body = SiteVerifyRequest {
            secret: secret_key,
            response: token,
            remoteip: remote_ip,
        };

        let response = self
            .http_client
            .post(&self.verify_url)
            .json(&body)
            .send()
            .await
            .map_err(VerificationError::RequestFailed)?;

        if response.status() != StatusCode::OK {
            return Err(VerificationError::VerificationRequestFailed(response.status()));
        }

        let verdict: SiteVerifyResponse = response
            .json()
            .await
            .map_err(VerificationError::ResponseDecodeFailed)?;

        if !verdict.success {
            return Err(VerificationError::VerificationRejected {
                error_codes: verdict.error_codes,
            });
        }

        tracing::debug!(hostname = ?verdict.hostname, "Turnstile verification succeeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as HttpStatus, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    type Received = Arc<Mutex<Vec<Value>>>;

    /// 启动一个本地的假校验服务，返回其地址和收到的请求体
    async fn spawn_provider(status: HttpStatus, body: &'static str) -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let captured = received.clone();

        let app = Router::new().route(
            "/siteverify",
            post(move |Json(payload): Json<Value>| {
                let captured = captured.clone();
                async move {
                    captured.lock().unwrap().push(payload);
                    (status, body)
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/siteverify", addr), received)
    }

    #[tokio::test]
    async fn test_preconditions_checked_before_request() {
        let (url, received) = spawn_provider(HttpStatus::OK, r#"{"success":true}"#).await;
        let verifier = TurnstileVerifier::with_verify_url(url);

        let err = verifier.verify("", "token", None).await.unwrap_err();
        assert!(matches!(err, VerificationError::MissingSecret));

        let err = verifier.verify("secret", "", None).await.unwrap_err();
        assert!(matches!(err, VerificationError::MissingToken));

        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_sends_one_request() {
        let (url, received) =
            spawn_provider(HttpStatus::OK, r#"{"success":true,"hostname":"example.com"}"#).await;
        let verifier = TurnstileVerifier::with_verify_url(url);

        verifier.verify("secret", "token", Some("203.0.113.7")).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0],
            json!({"secret": "secret", "response": "token", "remoteip": "203.0.113.7"})
        );
    }

    #[tokio::test]
    async fn test_remote_ip_omitted_when_unknown() {
        let (url, received) = spawn_provider(HttpStatus::OK, r#"{"success":true}"#).await;
        let verifier = TurnstileVerifier::with_verify_url(url);

        verifier.verify("secret", "token", None).await.unwrap();

        let received = received.lock().unwrap();
        assert!(received[0].get("remoteip").is_none());
    }

    #[tokio::test]
    async fn test_rejected_carries_error_codes() {
        let (url, _) = spawn_provider(
            HttpStatus::OK,
            r#"{"success":false,"error-codes":["invalid-input-response","timeout-or-duplicate"]}"#,
        )
        .await;
        let verifier = TurnstileVerifier::with_verify_url(url);

        match verifier.verify("secret", "token", None).await.unwrap_err() {
            VerificationError::VerificationRejected { error_codes } => {
                assert_eq!(error_codes, vec!["invalid-input-response", "timeout-or-duplicate"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_ok_status() {
        let (url, _) = spawn_provider(HttpStatus::INTERNAL_SERVER_ERROR, "oops").await;
        let verifier = TurnstileVerifier::with_verify_url(url);

        match verifier.verify("secret", "token", None).await.unwrap_err() {
            VerificationError::VerificationRequestFailed(status) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let (url, _) = spawn_provider(HttpStatus::OK, "<html>not json</html>").await;
        let verifier = TurnstileVerifier::with_verify_url(url);

        let err = verifier.verify("secret", "token", None).await.unwrap_err();
        assert!(matches!(err, VerificationError::ResponseDecodeFailed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        // 绑定后立即释放端口，连接会被拒绝
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let verifier = TurnstileVerifier::with_verify_url(format!("http://{}/siteverify", addr));
        let err = verifier.verify("secret", "token", None).await.unwrap_err();
        assert!(matches!(err, VerificationError::RequestFailed(_)));
    }
}
