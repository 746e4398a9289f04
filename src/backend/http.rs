//! HTTP implementation of the backend interface.
//!
//! Talks to the onboarding REST API. The session id, once known, is attached
//! to every request as a `session-id` header.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::error::BackendError;
use crate::risk::RiskSignal;
use crate::wizard::model::{AccountType, IdentityFields};

use super::{
    NotificationChannel, OnboardingBackend, PranIssuance, ProfileUpdate, ResumedProfile,
    ResumedSession, ScanOutcome, SessionHandle,
};

const SESSION_HEADER: &str = "session-id";

/// REST client for the onboarding backend.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    session_id: RwLock<Option<String>>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            session_id: RwLock::new(None),
        }
    }

    /// Remember the session id for subsequent request headers.
    pub async fn set_session_id(&self, session_id: impl Into<String>) {
        *self.session_id.write().await = Some(session_id.into());
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(self.url(path));
        if let Some(id) = self.session_id.read().await.as_deref() {
            builder = builder.header(SESSION_HEADER, id);
        }
        builder
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, BackendError> {
        let response = self
            .request(path)
            .await
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BackendError::RequestFailed {
                endpoint: path.to_string(),
                reason: format!("status {}", response.status()),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::InvalidResponse {
                endpoint: path.to_string(),
                reason: e.to_string(),
            })
    }
}

#[derive(Deserialize)]
struct StartSessionResponse {
    session_id: String,
    resume_token: String,
}

#[derive(Deserialize)]
struct ResumeResponse {
    session_id: String,
    #[serde(default)]
    data: ResumedData,
}

#[derive(Deserialize, Default)]
struct ResumedData {
    #[serde(default)]
    account_type: Option<AccountType>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    lang: Option<String>,
}

#[derive(Deserialize)]
struct ScanResponse {
    success: bool,
    #[serde(default)]
    data: Option<ScanData>,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Deserialize)]
struct ScanData {
    #[serde(flatten)]
    fields: IdentityFields,
    #[serde(flatten)]
    risk: RiskSignal,
}

#[derive(Deserialize)]
struct PranResponse {
    pran: String,
    timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

#[async_trait]
impl OnboardingBackend for HttpBackend {
    async fn start_session(
        &self,
        language: &str,
        account_type: AccountType,
    ) -> Result<SessionHandle, BackendError> {
        let body = json!({ "lang": language, "account_type": account_type });
        let resp: StartSessionResponse = self.post_json("/api/session/start", &body).await?;
        self.set_session_id(resp.session_id.clone()).await;
        Ok(SessionHandle {
            session_id: resp.session_id,
            resume_token: resp.resume_token,
        })
    }

    async fn resume_session(&self, resume_token: &str) -> Result<ResumedSession, BackendError> {
        let path = "/api/session/resume";
        let response = self
            .request(path)
            .await
            .json(&json!({ "resume_token": resume_token }))
            .send()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;

        // The backend answers 404 for unknown/expired tokens; surface that
        // distinctly so the UI can say so without touching local state.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::InvalidResumeToken);
        }
        if !response.status().is_success() {
            return Err(BackendError::RequestFailed {
                endpoint: path.to_string(),
                reason: format!("status {}", response.status()),
            });
        }

        let resp: ResumeResponse =
            response
                .json()
                .await
                .map_err(|e| BackendError::InvalidResponse {
                    endpoint: path.to_string(),
                    reason: e.to_string(),
                })?;

        self.set_session_id(resp.session_id.clone()).await;
        Ok(ResumedSession {
            session_id: resp.session_id,
            profile: ResumedProfile {
                account_type: resp.data.account_type,
                full_name: resp.data.full_name,
                language: resp.data.lang,
            },
        })
    }

    async fn scan_document(&self, file: Vec<u8>) -> Result<ScanOutcome, BackendError> {
        let path = "/api/kyc/scan";
        let part = reqwest::multipart::Part::bytes(file).file_name("document");
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .request(path)
            .await
            .multipart(form)
            .send()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;

        // A non-2xx is still a retryable scan failure; surface the detail
        // message when the error body carries one.
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from));
            return Err(BackendError::ScanFailed {
                reason: detail.unwrap_or_else(|| format!("status {status}")),
            });
        }

        let resp: ScanResponse =
            response
                .json()
                .await
                .map_err(|e| BackendError::InvalidResponse {
                    endpoint: path.to_string(),
                    reason: e.to_string(),
                })?;

        match (resp.success, resp.data) {
            (true, Some(data)) => Ok(ScanOutcome {
                fields: data.fields,
                risk: data.risk,
            }),
            _ => Err(BackendError::ScanFailed {
                reason: resp.detail.unwrap_or_else(|| "extraction failed".to_string()),
            }),
        }
    }

    async fn issue_pran(&self) -> Result<PranIssuance, BackendError> {
        let resp: PranResponse = self
            .post_json("/api/payment/generate-pran", &json!({}))
            .await
            .map_err(|e| match e {
                BackendError::RequestFailed { reason, .. } => {
                    BackendError::IssuanceFailed { reason }
                }
                other => other,
            })?;
        Ok(PranIssuance {
            pran: resp.pran,
            issued_at: resp.timestamp,
        })
    }

    async fn update_profile(&self, update: ProfileUpdate) -> Result<RiskSignal, BackendError> {
        let body = json!({ "fields": update });
        self.post_json("/api/session/update", &body).await
    }

    async fn archive_consent(
        &self,
        consent_type: &str,
        consent_text: &str,
        metadata: serde_json::Value,
    ) -> Result<(), BackendError> {
        let body = json!({
            "consent_type": consent_type,
            "consent_text": consent_text,
            "additional_data": metadata,
        });
        let _: serde_json::Value = self.post_json("/api/kyc/consent/archive", &body).await?;
        Ok(())
    }

    async fn send_notification(
        &self,
        channel: NotificationChannel,
        recipient: &str,
        message: &str,
    ) -> Result<(), BackendError> {
        let path = match channel {
            NotificationChannel::WhatsApp => "/api/notification/whatsapp",
            NotificationChannel::Sms => "/api/notification/sms",
        };
        let body = json!({ "phone": recipient, "message": message });
        let _: serde_json::Value = self.post_json(path, &body).await?;
        Ok(())
    }

    async fn chat(&self, query: &str) -> Result<String, BackendError> {
        let resp: ChatResponse = self
            .post_json("/api/notification/chat", &json!({ "query": query }))
            .await?;
        Ok(resp.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response per connection on an ephemeral port.
    async fn canned_server(status_line: &'static str, body: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        port
    }

    #[tokio::test]
    async fn scan_server_error_is_retryable_scan_failure() {
        let port = canned_server(
            "500 Internal Server Error",
            r#"{"detail":"OCR engine offline"}"#,
        )
        .await;
        let backend = HttpBackend::new(format!("http://127.0.0.1:{port}"));

        let err = backend.scan_document(vec![1, 2, 3]).await.unwrap_err();
        match err {
            BackendError::ScanFailed { reason } => assert_eq!(reason, "OCR engine offline"),
            other => panic!("expected ScanFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scan_error_without_detail_reports_status() {
        let port = canned_server("502 Bad Gateway", "upstream unavailable").await;
        let backend = HttpBackend::new(format!("http://127.0.0.1:{port}"));

        let err = backend.scan_document(vec![1]).await.unwrap_err();
        match err {
            BackendError::ScanFailed { reason } => assert!(reason.contains("502")),
            other => panic!("expected ScanFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resume_not_found_is_invalid_token() {
        let port = canned_server("404 Not Found", r#"{"detail":"unknown token"}"#).await;
        let backend = HttpBackend::new(format!("http://127.0.0.1:{port}"));

        let err = backend.resume_session("TOK-gone").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidResumeToken));
    }
}
