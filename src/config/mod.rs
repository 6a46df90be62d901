use serde::Deserialize;

use crate::services::decision::DecisionThresholds;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Connection pool size. The worker needs only a few; the default suits
    /// a single server process.
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Redis connection string for the submission queue
    pub redis_url: String,

    /// Cloudflare account ID. Absent means the analysis service is
    /// unconfigured and every submission goes straight to manual review.
    #[serde(default)]
    pub cf_account_id: Option<String>,

    /// Cloudflare Workers AI API token
    #[serde(default)]
    pub cf_api_token: Option<String>,

    /// R2 bucket name for encrypted document images
    pub r2_bucket: String,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: String,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: String,

    /// R2 endpoint URL
    pub r2_endpoint: String,

    /// AES-256-GCM encryption key (base64-encoded, 32 bytes)
    pub encryption_key: String,

    /// HS256 secret for user and reviewer bearer tokens
    pub jwt_secret: String,

    /// External analysis quota, requests per minute; drives call spacing.
    #[serde(default = "default_vision_quota_rpm")]
    pub vision_quota_rpm: u32,

    /// Minimum aggregate confidence for automatic approval.
    #[serde(default = "default_approve_confidence")]
    pub approve_confidence: u8,

    /// Aggregate confidence below which a batch is rejected outright.
    #[serde(default = "default_reject_confidence")]
    pub reject_confidence: u8,

    /// Total issue count above which a batch is rejected outright.
    #[serde(default = "default_max_issues")]
    pub max_issues: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_vision_quota_rpm() -> u32 {
    5
}

fn default_approve_confidence() -> u8 {
    70
}

fn default_reject_confidence() -> u8 {
    50
}

fn default_max_issues() -> usize {
    3
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Vision credentials, when both halves are configured.
    pub fn vision_credentials(&self) -> Option<(String, String)> {
        match (&self.cf_account_id, &self.cf_api_token) {
            (Some(account), Some(token)) => Some((account.clone(), token.clone())),
            _ => None,
        }
    }

    pub fn decision_thresholds(&self) -> DecisionThresholds {
        DecisionThresholds {
            approve_confidence: self.approve_confidence,
            reject_confidence: self.reject_confidence,
            max_issues: self.max_issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            bind_addr: default_bind_addr(),
            database_url: "postgres://localhost/id_verify".to_string(),
            db_max_connections: default_db_max_connections(),
            redis_url: "redis://localhost".to_string(),
            cf_account_id: None,
            cf_api_token: None,
            r2_bucket: "documents".to_string(),
            r2_access_key: "key".to_string(),
            r2_secret_key: "secret".to_string(),
            r2_endpoint: "https://example.invalid".to_string(),
            encryption_key: String::new(),
            jwt_secret: "secret".to_string(),
            vision_quota_rpm: default_vision_quota_rpm(),
            approve_confidence: default_approve_confidence(),
            reject_confidence: default_reject_confidence(),
            max_issues: default_max_issues(),
        }
    }

    #[test]
    fn defaults_match_observed_policy() {
        let config = base_config();
        let thresholds = config.decision_thresholds();
        assert_eq!(thresholds.approve_confidence, 70);
        assert_eq!(thresholds.reject_confidence, 50);
        assert_eq!(thresholds.max_issues, 3);
        assert_eq!(config.vision_quota_rpm, 5);
        assert_eq!(config.db_max_connections, 10);
    }

    #[test]
    fn vision_credentials_require_both_halves() {
        let mut config = base_config();
        assert!(config.vision_credentials().is_none());

        config.cf_account_id = Some("acct".to_string());
        assert!(config.vision_credentials().is_none());

        config.cf_api_token = Some("token".to_string());
        let (account, token) = config.vision_credentials().unwrap();
        assert_eq!(account, "acct");
        assert_eq!(token, "token");
    }
}
