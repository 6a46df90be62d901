use std::str::FromStr;
use std::time::Duration;

use id_verify::{
    app_state::AppState,
    config::AppConfig,
    db::{self, queries},
    models::decision::VerificationDecision,
    models::document::{DocumentJob, DocumentType},
    models::submission::SubmissionStatus,
    services::{
        analyzer::DocumentAnalyzer,
        auth::TokenVerifier,
        decision,
        encryption::EncryptionService,
        orchestrator::{Orchestrator, PacingGate},
        queue::{QueuedSubmission, SubmissionQueue},
        retry::RetryPolicy,
        storage::DocumentStore,
        vision::VisionClient,
    },
};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

const MAX_RETRIES: i32 = 3;
const POLL_INTERVAL_MS: u64 = 1000; // 1 second

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting document verification worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    // The worker drives one submission at a time; a small pool is plenty.
    let db_pool = db::init_pool(&config.database_url, 5)
        .await
        .expect("Failed to connect to database");

    // Initialize services
    tracing::info!("Initializing services");
    let storage = DocumentStore::new(
        &config.r2_bucket,
        &config.r2_endpoint,
        &config.r2_access_key,
        &config.r2_secret_key,
    )
    .expect("Failed to initialize document store");

    let encryption =
        EncryptionService::new(&config.encryption_key).expect("Failed to initialize encryption");

    let queue = SubmissionQueue::new(&config.redis_url).expect("Failed to initialize queue");

    let auth = TokenVerifier::new(&config.jwt_secret);

    let vision = match config.vision_credentials() {
        Some((account_id, api_token)) => Some(VisionClient::new(account_id, api_token)),
        None => {
            tracing::warn!(
                "No Workers AI credentials configured; all submissions will defer to manual review"
            );
            None
        }
    };

    let state = AppState::new(
        db_pool,
        storage,
        encryption,
        queue,
        auth,
        vision,
        config.decision_thresholds(),
        config.vision_quota_rpm,
    );

    tracing::info!("Worker ready, starting submission processing loop");

    loop {
        match process_next_submission(&state).await {
            Ok(true) => {
                tracing::debug!("Submission processed, checking for next");
            }
            Ok(false) => {
                tracing::trace!("No submissions available, sleeping");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Error processing submission, will retry");
                sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        }
    }
}

/// Process the next submission from the queue.
/// Returns Ok(true) if a submission was processed, Ok(false) if none was available.
async fn process_next_submission(state: &AppState) -> Result<bool, Box<dyn std::error::Error>> {
    let submission = match state.queue.dequeue().await? {
        Some(s) => s,
        None => return Ok(false),
    };

    if let Ok(depth) = state.queue.queue_depth().await {
        metrics::gauge!("verification_queue_depth").set(depth as f64);
    }

    tracing::info!(
        submission_id = %submission.submission_id,
        user_id = %submission.user_id,
        document_count = submission.documents.len(),
        "Processing verification submission"
    );

    if let Err(e) = queries::update_submission_status(
        &state.db,
        submission.submission_id,
        SubmissionStatus::Processing,
    )
    .await
    {
        tracing::error!(submission_id = %submission.submission_id, error = %e, "Failed to update submission status");
        return Err(e.into());
    }

    let start = std::time::Instant::now();

    match run_pipeline(state, &submission).await {
        Ok(decision) => {
            let decision_json = serde_json::to_value(&decision)?;

            // Persist the decision, then map it onto the user's status. The
            // decision record itself is immutable from here on.
            queries::update_submission_result(
                &state.db,
                submission.submission_id,
                SubmissionStatus::Completed,
                Some(decision_json),
                None,
            )
            .await?;
            queries::save_decision(&state.db, submission.user_id, &decision).await?;
            queries::apply_decision_to_status(&state.db, submission.user_id, &decision).await?;

            // No long-term retention of raw document images once analysis
            // has run. When the service was unconfigured no claims were
            // extracted, so the images stay for the human reviewer.
            if decision.analyzed {
                for doc in &submission.documents {
                    if let Err(e) = state.storage.delete_document(&doc.image_key).await {
                        tracing::warn!(key = %doc.image_key, error = %e, "Failed to delete document image");
                    }
                }
            }

            state.queue.complete(&submission).await?;

            metrics::counter!(
                "verification_decisions_total",
                "decision" => decision.decision.to_string()
            )
            .increment(1);
            metrics::histogram!("submission_processing_seconds")
                .record(start.elapsed().as_secs_f64());

            tracing::info!(
                submission_id = %submission.submission_id,
                decision = %decision.decision,
                aggregate_confidence = decision.aggregate_confidence,
                duration_ms = start.elapsed().as_millis() as u64,
                "Submission completed"
            );

            Ok(true)
        }
        Err(e) => {
            tracing::error!(submission_id = %submission.submission_id, error = %e, "Submission processing failed");

            let retry_count =
                queries::increment_retry_count(&state.db, submission.submission_id).await?;

            if retry_count >= MAX_RETRIES {
                // Max retries exceeded; the user stays pending for the
                // review queue rather than being silently dropped.
                queries::update_submission_result(
                    &state.db,
                    submission.submission_id,
                    SubmissionStatus::Failed,
                    None,
                    Some(&format!(
                        "Processing failed after {} retries: {}",
                        MAX_RETRIES, e
                    )),
                )
                .await?;

                state.queue.complete(&submission).await?;
                metrics::counter!("verification_submissions_failed").increment(1);

                tracing::warn!(
                    submission_id = %submission.submission_id,
                    retry_count = retry_count,
                    "Submission failed after max retries; awaiting manual review"
                );
            } else {
                state.queue.enqueue(&submission).await?;
                state.queue.complete(&submission).await?;

                queries::update_submission_status(
                    &state.db,
                    submission.submission_id,
                    SubmissionStatus::Pending,
                )
                .await?;

                tracing::info!(
                    submission_id = %submission.submission_id,
                    retry_count = retry_count,
                    "Submission re-queued for retry"
                );
            }

            Ok(true)
        }
    }
}

/// Run the decision pipeline for one submission: load and decrypt the
/// images, drive the analyzers sequentially, and compute the decision.
async fn run_pipeline(
    state: &AppState,
    submission: &QueuedSubmission,
) -> Result<VerificationDecision, Box<dyn std::error::Error>> {
    // Unconfigured analysis service short-circuits the whole pipeline: no
    // external calls, immediate deferral to a human.
    let Some(vision) = state.vision.clone() else {
        return Ok(VerificationDecision::service_unavailable());
    };

    let mut jobs = Vec::with_capacity(submission.documents.len());
    for doc in &submission.documents {
        let document_type = match DocumentType::from_str(&doc.document_type) {
            Ok(t) => t,
            Err(_) => {
                // Unsupported types are absent from the aggregate, not failures.
                tracing::warn!(
                    submission_id = %submission.submission_id,
                    document_type = %doc.document_type,
                    "Skipping unsupported document type"
                );
                continue;
            }
        };

        let sealed = state.storage.get_document(&doc.image_key).await?;
        let image_bytes = state.encryption.decrypt(&sealed)?;

        jobs.push(DocumentJob {
            document_type,
            image_bytes,
            mime_type: doc.mime_type.clone(),
            declared_value: doc.declared_value.clone(),
        });
    }

    let analyzer = DocumentAnalyzer::new(vision, RetryPolicy::default());
    let mut orchestrator =
        Orchestrator::new(analyzer, PacingGate::for_quota(state.vision_quota_rpm));
    let results = orchestrator.run(&jobs).await;

    Ok(decision::decide(results, &state.thresholds))
}
