use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// Client for the Cloudflare Workers AI LLaVA vision model.
///
/// One instance per process, built from configuration at startup. When no
/// credentials are configured the process carries `None` instead and the
/// pipeline short-circuits to manual review.
pub struct VisionClient {
    http: Client,
    account_id: String,
    api_token: String,
}

#[derive(Deserialize)]
struct AiResponse {
    result: AiResult,
}

#[derive(Deserialize)]
struct AiResult {
    description: String,
}

impl VisionClient {
    pub fn new(account_id: String, api_token: String) -> Self {
        Self {
            http: Client::new(),
            account_id,
            api_token,
        }
    }

    /// Send a document image plus an instruction prompt, returning the
    /// model's freeform response text.
    ///
    /// Rate-limit and availability failures surface as
    /// [`VisionError::Transient`]; everything else (auth, malformed request,
    /// content policy) is [`VisionError::Permanent`].
    pub async fn analyze(
        &self,
        image_bytes: &[u8],
        _mime_type: &str,
        prompt: &str,
    ) -> Result<String, VisionError> {
        let url = format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/@cf/llava-hf/llava-1.5-7b-hf",
            self.account_id
        );

        let request_body = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(image_bytes),
            "prompt": prompt,
            "max_tokens": 768
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: AiResponse = response
            .json()
            .await
            .map_err(|e| VisionError::Permanent(format!("unreadable response body: {e}")))?;

        Ok(parsed.result.description)
    }
}

fn classify_transport_error(e: reqwest::Error) -> VisionError {
    if e.is_timeout() || e.is_connect() {
        VisionError::Transient(e.to_string())
    } else {
        VisionError::Permanent(e.to_string())
    }
}

fn classify_status(status: StatusCode, body: String) -> VisionError {
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => {
            VisionError::Transient(format!("analysis service returned {status}: {body}"))
        }
        _ => VisionError::Permanent(format!("analysis service returned {status}: {body}")),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// Rate limited or temporarily unavailable; safe to retry with backoff.
    #[error("analysis service rate limited or unavailable: {0}")]
    Transient(String),

    /// Request rejected for a non-retryable reason.
    #[error("analysis service rejected the request: {0}")]
    Permanent(String),
}

impl VisionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, VisionError::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_status_is_transient() {
        let e = classify_status(StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(e.is_transient());
    }

    #[test]
    fn auth_failure_is_permanent() {
        let e = classify_status(StatusCode::UNAUTHORIZED, "bad token".to_string());
        assert!(!e.is_transient());
    }
}
