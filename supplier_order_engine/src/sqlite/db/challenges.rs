use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{ChallengeStatus, NewTwoFactorChallenge, TwoFactorChallenge},
    traits::StoreError,
};

/// Cancels every pending challenge for the user and credential. Returns the number of rows superseded.
pub async fn supersede_pending(
    user_id: i64,
    credential_id: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        "UPDATE two_factor_challenges SET status = 'cancelled', updated_at = $1 WHERE user_id = $2 AND credential_id = \
         $3 AND status = 'pending'",
    )
    .bind(Utc::now())
    .bind(user_id)
    .bind(credential_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn insert_challenge(
    challenge: NewTwoFactorChallenge,
    conn: &mut SqliteConnection,
) -> Result<TwoFactorChallenge, StoreError> {
    let now = Utc::now();
    let challenge: TwoFactorChallenge = sqlx::query_as(
        r#"
        INSERT INTO two_factor_challenges (
            user_id,
            credential_id,
            order_id,
            session_token,
            request_type,
            two_fa_type,
            prompt_message,
            expires_at,
            created_at,
            updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
        RETURNING *;
        "#,
    )
    .bind(challenge.user_id)
    .bind(challenge.credential_id)
    .bind(challenge.order_id)
    .bind(challenge.session_token)
    .bind(challenge.request_type)
    .bind(challenge.two_fa_type)
    .bind(challenge.prompt_message)
    .bind(challenge.expires_at)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ {} challenge {} opened for credential {}", challenge.request_type, challenge.id, challenge.credential_id);
    Ok(challenge)
}

pub async fn fetch_by_token(
    session_token: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<TwoFactorChallenge>, StoreError> {
    let challenge = sqlx::query_as("SELECT * FROM two_factor_challenges WHERE session_token = $1")
        .bind(session_token)
        .fetch_optional(conn)
        .await?;
    Ok(challenge)
}

pub async fn fetch_pending_for_user(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<TwoFactorChallenge>, StoreError> {
    let challenges = sqlx::query_as(
        "SELECT * FROM two_factor_challenges WHERE user_id = $1 AND status = 'pending' ORDER BY created_at ASC, id ASC",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(challenges)
}

pub async fn begin_attempt(
    challenge_id: i64,
    max_attempts: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<TwoFactorChallenge>, StoreError> {
    let challenge = sqlx::query_as(
        r#"
        UPDATE two_factor_challenges SET attempts = attempts + 1, status = 'submitted', updated_at = $1
        WHERE id = $2 AND status = 'pending' AND attempts < $3
        RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(challenge_id)
    .bind(max_attempts)
    .fetch_optional(conn)
    .await?;
    Ok(challenge)
}

pub async fn update_status(
    challenge_id: i64,
    from: &[ChallengeStatus],
    to: ChallengeStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<TwoFactorChallenge>, StoreError> {
    if from.is_empty() {
        return Ok(None);
    }
    let now = Utc::now();
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE two_factor_challenges SET status = ");
    builder.push_bind(to);
    builder.push(", updated_at = ").push_bind(now);
    if to == ChallengeStatus::Verified {
        builder.push(", verified_at = ").push_bind(now);
    }
    builder.push(" WHERE id = ").push_bind(challenge_id);
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in from {
        statuses.push_bind(*status);
    }
    statuses.push_unseparated(") RETURNING *");
    let challenge: Option<TwoFactorChallenge> = builder.build_query_as().fetch_optional(conn).await?;
    if let Some(c) = &challenge {
        trace!("🗃️ Challenge {} is now {to}", c.id);
    }
    Ok(challenge)
}

pub async fn store_code(challenge_id: i64, code: &str, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    sqlx::query("UPDATE two_factor_challenges SET submitted_code = $1, updated_at = $2 WHERE id = $3")
        .bind(code)
        .bind(Utc::now())
        .bind(challenge_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Reads the most recently verified, still unconsumed code for the credential and clears it. Call inside a
/// transaction so two sessions cannot both consume the same code.
pub async fn take_verified_code(credential_id: i64, conn: &mut SqliteConnection) -> Result<Option<String>, StoreError> {
    let row: Option<(i64, String)> = sqlx::query_as(
        r#"
        SELECT id, submitted_code FROM two_factor_challenges
        WHERE credential_id = $1 AND status = 'verified' AND submitted_code IS NOT NULL
        ORDER BY verified_at DESC, id DESC LIMIT 1
        "#,
    )
    .bind(credential_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some((challenge_id, code)) = row else {
        return Ok(None);
    };
    sqlx::query("UPDATE two_factor_challenges SET submitted_code = NULL WHERE id = $1")
        .bind(challenge_id)
        .execute(conn)
        .await?;
    trace!("🗃️ Stored code from challenge {challenge_id} handed to a new session");
    Ok(Some(code))
}

/// Pending challenges whose expiry is at or before `now`.
pub async fn fetch_expired_pending(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<TwoFactorChallenge>, StoreError> {
    let pending: Vec<TwoFactorChallenge> =
        sqlx::query_as("SELECT * FROM two_factor_challenges WHERE status = 'pending'").fetch_all(conn).await?;
    Ok(pending.into_iter().filter(|c| c.expires_at <= now).collect())
}
