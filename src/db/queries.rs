use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::decision::{Decision, VerificationDecision};
use crate::models::submission::{SubmissionStatus, VerificationSubmission};
use crate::models::user::{OverrideRecord, UserVerification, VerificationStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("serializing decision failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("override not allowed: account status is {0}")]
    OverrideNotAllowed(VerificationStatus),
}

/// True when the error is the partial unique index refusing a second active
/// submission for the same user. The route maps this to a conflict response.
pub fn is_duplicate_active_submission(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn row_to_submission(row: &sqlx::postgres::PgRow) -> Result<VerificationSubmission, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(VerificationSubmission {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        status: SubmissionStatus::parse(&status),
        document_count: row.try_get("document_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        decision: row.try_get("decision")?,
        error: row.try_get("error")?,
        retry_count: row.try_get("retry_count")?,
    })
}

/// Insert a new verification submission in the pending state.
pub async fn create_submission(
    pool: &PgPool,
    user_id: Uuid,
    document_count: i32,
) -> Result<VerificationSubmission, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO verification_submissions (user_id, status, document_count)
        VALUES ($1, 'pending', $2)
        RETURNING id, user_id, status, document_count, created_at, updated_at,
                  decision, error, retry_count
        "#,
    )
    .bind(user_id)
    .bind(document_count)
    .fetch_one(pool)
    .await?;

    row_to_submission(&row)
}

/// Get a submission by id.
pub async fn get_submission(
    pool: &PgPool,
    submission_id: Uuid,
) -> Result<Option<VerificationSubmission>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, status, document_count, created_at, updated_at,
               decision, error, retry_count
        FROM verification_submissions
        WHERE id = $1
        "#,
    )
    .bind(submission_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_submission).transpose()
}

/// True when the user already has a submission being analyzed. Used to
/// refuse concurrent batches for the same account.
pub async fn has_active_submission(pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS n
        FROM verification_submissions
        WHERE user_id = $1 AND status IN ('pending', 'processing')
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let n: i64 = row.try_get("n")?;
    Ok(n > 0)
}

/// Update a submission's queue status.
pub async fn update_submission_status(
    pool: &PgPool,
    submission_id: Uuid,
    status: SubmissionStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE verification_submissions
        SET status = $1,
            updated_at = NOW(),
            processing_started_at = CASE WHEN $1 = 'processing' THEN NOW() ELSE processing_started_at END,
            processing_completed_at = CASE WHEN $1 IN ('completed', 'failed') THEN NOW() ELSE processing_completed_at END
        WHERE id = $2
        "#,
    )
    .bind(status.as_str())
    .bind(submission_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record the submission outcome (decision JSON or terminal error).
pub async fn update_submission_result(
    pool: &PgPool,
    submission_id: Uuid,
    status: SubmissionStatus,
    decision: Option<serde_json::Value>,
    error: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE verification_submissions
        SET status = $1,
            decision = $2,
            error = $3,
            updated_at = NOW(),
            processing_completed_at = NOW()
        WHERE id = $4
        "#,
    )
    .bind(status.as_str())
    .bind(decision)
    .bind(error)
    .bind(submission_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Increment and return the submission's retry count.
pub async fn increment_retry_count(
    pool: &PgPool,
    submission_id: Uuid,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"
        UPDATE verification_submissions
        SET retry_count = retry_count + 1, updated_at = NOW()
        WHERE id = $1
        RETURNING retry_count
        "#,
    )
    .bind(submission_id)
    .fetch_one(pool)
    .await?;

    row.try_get("retry_count")
}

/// Move the user's verification status to pending at submission time,
/// creating the record on first contact.
pub async fn mark_user_pending(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO user_verification (user_id, status, updated_at)
        VALUES ($1, 'pending', NOW())
        ON CONFLICT (user_id)
        DO UPDATE SET status = 'pending', rejection_reason = NULL, updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist the AI decision onto the user's verification record. The stored
/// decision is immutable evidence: later overrides never touch this column.
pub async fn save_decision(
    pool: &PgPool,
    user_id: Uuid,
    decision: &VerificationDecision,
) -> Result<(), StoreError> {
    let decision_json = serde_json::to_value(decision)?;

    sqlx::query(
        r#"
        INSERT INTO user_verification (user_id, status, decision, analyzed_at, updated_at)
        VALUES ($1, 'pending', $2, $3, NOW())
        ON CONFLICT (user_id)
        DO UPDATE SET decision = $2, analyzed_at = $3, updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(decision_json)
    .bind(decision.analyzed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Map the decision onto the user-status transition: approved verifies the
/// account, rejected rejects it with the reasoning copied over, manual
/// review leaves it pending for a human.
pub async fn apply_decision_to_status(
    pool: &PgPool,
    user_id: Uuid,
    decision: &VerificationDecision,
) -> Result<(), sqlx::Error> {
    match decision.decision {
        Decision::Approved => {
            sqlx::query(
                r#"
                UPDATE user_verification
                SET status = 'verified', rejection_reason = NULL, updated_at = NOW()
                WHERE user_id = $1 AND status = 'pending'
                "#,
            )
            .bind(user_id)
            .execute(pool)
            .await?;
        }
        Decision::Rejected => {
            sqlx::query(
                r#"
                UPDATE user_verification
                SET status = 'rejected', rejection_reason = $2, updated_at = NOW()
                WHERE user_id = $1 AND status = 'pending'
                "#,
            )
            .bind(user_id)
            .bind(&decision.reasoning)
            .execute(pool)
            .await?;
        }
        Decision::ManualReview => {
            // Status stays pending; the review queue picks it up.
        }
    }

    Ok(())
}

/// Record a manual reviewer override: append the audit row and move the
/// status, allowed only while the account is pending or rejected. The AI
/// decision columns are left untouched.
pub async fn record_override(
    pool: &PgPool,
    user_id: Uuid,
    status: VerificationStatus,
    reason: &str,
    reviewer_id: Uuid,
) -> Result<OverrideRecord, StoreError> {
    let mut tx = pool.begin().await?;

    let current =
        sqlx::query(r#"SELECT status FROM user_verification WHERE user_id = $1 FOR UPDATE"#)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

    let current_status = match current {
        Some(row) => {
            let s: String = row.try_get("status")?;
            s.parse::<VerificationStatus>()
                .unwrap_or(VerificationStatus::NotSubmitted)
        }
        None => VerificationStatus::NotSubmitted,
    };

    if !matches!(
        current_status,
        VerificationStatus::Pending | VerificationStatus::Rejected
    ) {
        return Err(StoreError::OverrideNotAllowed(current_status));
    }

    let rejection_reason = match status {
        VerificationStatus::Rejected => Some(reason),
        _ => None,
    };

    sqlx::query(
        r#"
        UPDATE user_verification
        SET status = $2, rejection_reason = $3, updated_at = NOW()
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .bind(status.to_string())
    .bind(rejection_reason)
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query(
        r#"
        INSERT INTO verification_overrides (user_id, status, reason, reviewer_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, status, reason, reviewer_id, created_at
        "#,
    )
    .bind(user_id)
    .bind(status.to_string())
    .bind(reason)
    .bind(reviewer_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    let status_str: String = row.try_get("status")?;
    Ok(OverrideRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        status: status_str
            .parse::<VerificationStatus>()
            .unwrap_or(VerificationStatus::Pending),
        reason: row.try_get("reason")?,
        reviewer_id: row.try_get("reviewer_id")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Read a user's verification record (status, stored decision, timestamps).
pub async fn get_user_verification(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<UserVerification>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT user_id, status, rejection_reason, decision, analyzed_at, updated_at
        FROM user_verification
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(match row {
        Some(r) => {
            let status: String = r.try_get("status")?;
            Some(UserVerification {
                user_id: r.try_get("user_id")?,
                status: status
                    .parse::<VerificationStatus>()
                    .unwrap_or(VerificationStatus::NotSubmitted),
                rejection_reason: r.try_get("rejection_reason")?,
                decision: r.try_get("decision")?,
                analyzed_at: r.try_get("analyzed_at")?,
                updated_at: r.try_get("updated_at")?,
            })
        }
        None => None,
    })
}
