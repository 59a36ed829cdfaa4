use chrono::{DateTime, Utc};

use crate::{
    db_types::{ChallengeStatus, NewTwoFactorChallenge, TwoFactorChallenge},
    traits::StoreError,
};

/// Persistence for two-factor challenges. Rows are never deleted; they leave the `pending` state through
/// [`ChallengeManagement::update_challenge_status`] or the expiry sweep.
#[allow(async_fn_in_trait)]
pub trait ChallengeManagement {
    /// Stores the new challenge. In the same transaction, any older `pending` challenge for the same user and
    /// credential is marked `cancelled`, so there is only ever one authoritative challenge per pair.
    ///
    /// Returns the new challenge and the number of challenges it superseded.
    async fn insert_challenge(&self, challenge: NewTwoFactorChallenge)
        -> Result<(TwoFactorChallenge, u64), StoreError>;

    async fn fetch_challenge_by_token(&self, session_token: &str) -> Result<Option<TwoFactorChallenge>, StoreError>;

    async fn fetch_pending_challenges(&self, user_id: i64) -> Result<Vec<TwoFactorChallenge>, StoreError>;

    /// Starts a code attempt: atomically increments the attempt counter and moves the challenge to `submitted`,
    /// provided it is still `pending` and has fewer than `max_attempts` attempts. Returns `None` without writing
    /// anything otherwise, so of several concurrent submissions exactly one wins.
    async fn begin_code_attempt(
        &self,
        challenge_id: i64,
        max_attempts: i64,
    ) -> Result<Option<TwoFactorChallenge>, StoreError>;

    /// Moves the challenge to `to` if its current status is one of `from`. Moving to `verified` also stamps
    /// `verified_at`. Returns `None` when the challenge was not in an allowed state.
    async fn update_challenge_status(
        &self,
        challenge_id: i64,
        from: &[ChallengeStatus],
        to: ChallengeStatus,
    ) -> Result<Option<TwoFactorChallenge>, StoreError>;

    /// Keeps a code for adapters that cannot verify codes directly; it is handed to the next session for the
    /// credential.
    async fn store_submitted_code(&self, challenge_id: i64, code: &str) -> Result<(), StoreError>;

    /// Returns and clears the most recent stored code for a verified challenge on the credential.
    async fn take_verified_code(&self, credential_id: i64) -> Result<Option<String>, StoreError>;

    /// Marks every `pending` challenge whose `expires_at` is at or before `now` as `expired` and returns them.
    async fn expire_challenges(&self, now: DateTime<Utc>) -> Result<Vec<TwoFactorChallenge>, StoreError>;
}
