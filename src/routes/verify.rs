use std::str::FromStr;

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::document::DocumentType;
use crate::models::submission::{DeclaredDocument, SubmissionStatusResponse, SubmitResponse};
use crate::services::queue::{QueuedDocument, QueuedSubmission};
use crate::services::storage::DocumentStore;

/// One uploaded document paired with its declared value, pre-validation.
struct UploadedDocument {
    document_type: DocumentType,
    bytes: Vec<u8>,
    mime_type: String,
    declared_value: String,
}

/// POST /api/v1/verifications — submit a batch of identity documents.
///
/// Multipart layout: one file part per document, named by its type
/// (`id_card`, `tax_id`, `driver_license`, `passport`), plus a text part
/// `<type>_number` carrying the user-declared value. Returns 202
/// immediately; analysis happens in the background worker.
pub async fn submit_documents(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, String)> {
    let claims = state
        .auth
        .claims_from_headers(&headers)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;

    // Privileged roles never go through the verification pipeline.
    if claims.is_privileged() {
        return Err((
            StatusCode::FORBIDDEN,
            "privileged accounts are exempt from document verification".to_string(),
        ));
    }

    let user_id = claims.sub;

    // One batch at a time per account: a second submission while the first
    // is still being analyzed is refused rather than racing it.
    let active = queries::has_active_submission(&state.db, user_id)
        .await
        .map_err(internal)?;
    if active {
        return Err((
            StatusCode::CONFLICT,
            "a verification submission is already being processed for this account".to_string(),
        ));
    }

    let mut files: Vec<(DocumentType, Vec<u8>, String)> = Vec::new();
    let mut declared: Vec<(DocumentType, String)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| (StatusCode::BAD_REQUEST, "malformed multipart body".to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if let Some(type_name) = name.strip_suffix("_number") {
            match DocumentType::from_str(type_name) {
                Ok(document_type) => {
                    let value = field
                        .text()
                        .await
                        .map_err(|_| (StatusCode::BAD_REQUEST, "unreadable field".to_string()))?;
                    declared.push((document_type, value));
                }
                Err(_) => {
                    tracing::warn!(field = %name, "unsupported document type field, skipping");
                }
            }
            continue;
        }

        match DocumentType::from_str(&name) {
            Ok(document_type) => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| (StatusCode::BAD_REQUEST, "unreadable upload".to_string()))?;

                // Sniff the actual format rather than trusting the header.
                let format = image::guess_format(&data).map_err(|_| {
                    (
                        StatusCode::UNSUPPORTED_MEDIA_TYPE,
                        format!("{name} is not a supported image format"),
                    )
                })?;

                files.push((document_type, data.to_vec(), format.to_mime_type().to_string()));
            }
            Err(_) => {
                tracing::warn!(field = %name, "unsupported document type upload, skipping");
            }
        }
    }

    if files.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "no supported documents in submission".to_string(),
        ));
    }

    let mut documents = Vec::with_capacity(files.len());
    for (document_type, bytes, mime_type) in files {
        let declared_value = declared
            .iter()
            .find(|(t, _)| *t == document_type)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("missing declared value for {}", document_type.label()),
                )
            })?;

        let meta = DeclaredDocument {
            declared_value: declared_value.clone(),
        };
        meta.validate().map_err(|e| {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("invalid declared value for {}: {e}", document_type.label()),
            )
        })?;

        documents.push(UploadedDocument {
            document_type,
            bytes,
            mime_type,
            declared_value,
        });
    }

    // The insert can still lose a race that the check above did not see;
    // the partial unique index turns that into a conflict rather than a
    // second active submission.
    let submission = queries::create_submission(&state.db, user_id, documents.len() as i32)
        .await
        .map_err(|e| {
            if queries::is_duplicate_active_submission(&e) {
                (
                    StatusCode::CONFLICT,
                    "a verification submission is already being processed for this account"
                        .to_string(),
                )
            } else {
                internal(e)
            }
        })?;
    queries::mark_user_pending(&state.db, user_id)
        .await
        .map_err(internal)?;

    // Encrypt and park the images; only keys travel through the queue.
    let mut queued_documents = Vec::with_capacity(documents.len());
    for (index, doc) in documents.iter().enumerate() {
        let sealed = state
            .encryption
            .encrypt(&doc.bytes)
            .map_err(internal)?;
        let key = DocumentStore::document_key(submission.id, index);
        state
            .storage
            .put_document(&key, &sealed)
            .await
            .map_err(internal)?;

        queued_documents.push(QueuedDocument {
            document_type: doc.document_type.to_string(),
            image_key: key,
            mime_type: doc.mime_type.clone(),
            declared_value: doc.declared_value.clone(),
        });
    }

    state
        .queue
        .enqueue(&QueuedSubmission {
            submission_id: submission.id,
            user_id,
            documents: queued_documents,
        })
        .await
        .map_err(internal)?;

    metrics::counter!("verification_submissions_total").increment(1);
    tracing::info!(
        submission_id = %submission.id,
        user_id = %user_id,
        document_count = submission.document_count,
        "verification submission accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            submission_id: submission.id,
            status: "pending".to_string(),
            message: "documents submitted for verification".to_string(),
        }),
    ))
}

/// GET /api/v1/verifications/{id} — submission status and decision.
pub async fn get_submission_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(submission_id): Path<Uuid>,
) -> Result<Json<SubmissionStatusResponse>, (StatusCode, String)> {
    let claims = state
        .auth
        .claims_from_headers(&headers)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;

    let submission = queries::get_submission(&state.db, submission_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "submission not found".to_string()))?;

    if submission.user_id != claims.sub && !claims.can_review() {
        return Err((StatusCode::FORBIDDEN, "not your submission".to_string()));
    }

    Ok(Json(SubmissionStatusResponse {
        submission_id: submission.id,
        status: submission.status.as_str().to_string(),
        decision: submission.decision,
        error: submission.error,
    }))
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!(error = %e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal error".to_string(),
    )
}
