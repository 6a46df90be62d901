use sqlx::PgPool;
use std::sync::Arc;

use crate::services::decision::DecisionThresholds;
use crate::services::{
    auth::TokenVerifier, encryption::EncryptionService, queue::SubmissionQueue,
    storage::DocumentStore, vision::VisionClient,
};

/// Shared application state passed to route handlers and the worker.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub storage: Arc<DocumentStore>,
    pub encryption: Arc<EncryptionService>,
    pub queue: Arc<SubmissionQueue>,
    pub auth: Arc<TokenVerifier>,
    /// None when the analysis service is unconfigured; the worker then
    /// short-circuits every submission to manual review.
    pub vision: Option<Arc<VisionClient>>,
    pub thresholds: DecisionThresholds,
    /// External analysis quota in requests per minute.
    pub vision_quota_rpm: u32,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: PgPool,
        storage: DocumentStore,
        encryption: EncryptionService,
        queue: SubmissionQueue,
        auth: TokenVerifier,
        vision: Option<VisionClient>,
        thresholds: DecisionThresholds,
        vision_quota_rpm: u32,
    ) -> Self {
        Self {
            db,
            storage: Arc::new(storage),
            encryption: Arc::new(encryption),
            queue: Arc::new(queue),
            auth: Arc::new(auth),
            vision: vision.map(Arc::new),
            thresholds,
            vision_quota_rpm,
        }
    }
}
