use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::queries::{self, StoreError};
use crate::models::submission::OverrideRequest;
use crate::models::user::{OverrideRecord, UserVerification, VerificationStatus};

/// POST /api/v1/review/override — manual reviewer decision.
///
/// Sets the final verification status independently of the AI decision,
/// which stays untouched as the evidence trail. Allowed only while the
/// account is pending or rejected.
pub async fn override_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OverrideRequest>,
) -> Result<Json<OverrideRecord>, (StatusCode, String)> {
    let claims = state
        .auth
        .claims_from_headers(&headers)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;

    if !claims.can_review() {
        return Err((
            StatusCode::FORBIDDEN,
            "reviewer role required".to_string(),
        ));
    }

    request
        .validate()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let status = match request.status.as_str() {
        "verified" => VerificationStatus::Verified,
        "rejected" => VerificationStatus::Rejected,
        other => {
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("override status must be verified or rejected, got {other}"),
            ));
        }
    };

    let record = queries::record_override(
        &state.db,
        request.user_id,
        status,
        &request.reason,
        claims.sub,
    )
    .await
    .map_err(|e| match e {
        StoreError::OverrideNotAllowed(current) => (
            StatusCode::CONFLICT,
            format!("override not allowed while account status is {current}"),
        ),
        other => {
            tracing::error!(error = %other, "override failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    })?;

    metrics::counter!("verification_overrides_total").increment(1);
    tracing::info!(
        user_id = %record.user_id,
        reviewer_id = %record.reviewer_id,
        status = %record.status,
        "manual override recorded"
    );

    Ok(Json(record))
}

/// GET /api/v1/review/users/{user_id} — the audit-facing verification
/// record: status, stored AI decision and timestamps.
pub async fn get_user_verification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserVerification>, (StatusCode, String)> {
    let claims = state
        .auth
        .claims_from_headers(&headers)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;

    if !claims.can_review() && claims.sub != user_id {
        return Err((StatusCode::FORBIDDEN, "reviewer role required".to_string()));
    }

    let record = queries::get_user_verification(&state.db, user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "verification lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        })?
        .ok_or((
            StatusCode::NOT_FOUND,
            "no verification record for user".to_string(),
        ))?;

    Ok(Json(record))
}
