//! # Two-factor challenge manager
//!
//! When a supplier asks for a code, the operation that hit the prompt opens a challenge here and gives up. The user
//! answers over the message bus (or the HTTP fallback); a verified code schedules the follow-up job that picks the
//! suspended operation up again.
//!
//! Challenge rows are the single source of truth. Every status change is a conditional update, so concurrent
//! submissions, cancellations and the expiry sweep can race without double counting attempts or resuming twice.
use chrono::{DateTime, Utc};
use log::*;

use crate::{
    adapters::{with_timeout, AdapterError, AdapterResult, TwoFactorPrompt},
    db_types::{
        ChallengeStatus,
        NewTwoFactorChallenge,
        OrderId,
        Supplier,
        SupplierCredential,
        TwoFactorChallenge,
        TwoFactorRequestType,
    },
    events::{ChallengeOpenedEvent, ChallengeResolvedEvent},
    helpers::new_session_token,
    messaging::{ClientAction, ServerMessage},
    soe_api::{
        errors::TwoFactorError,
        order_objects::{CodeOutcome, PlacementOptions},
        session,
        EngineContext,
    },
    task_queue::{Job, JobKind, RetryPolicy},
    traits::{CatalogManagement, ChallengeManagement, StoreError},
};

/// Everything needed to open a challenge.
#[derive(Debug, Clone)]
pub struct ChallengeRequest {
    pub user_id: i64,
    pub credential_id: i64,
    pub supplier_name: String,
    pub order_id: Option<OrderId>,
    pub request_type: TwoFactorRequestType,
    pub prompt: TwoFactorPrompt,
}

impl ChallengeRequest {
    pub fn new(
        credential: &SupplierCredential,
        supplier: &Supplier,
        request_type: TwoFactorRequestType,
        prompt: TwoFactorPrompt,
    ) -> Self {
        Self {
            user_id: credential.user_id,
            credential_id: credential.id,
            supplier_name: supplier.name.clone(),
            order_id: None,
            request_type,
            prompt,
        }
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

pub struct TwoFactorApi<B> {
    ctx: EngineContext<B>,
}

impl<B> TwoFactorApi<B> {
    pub fn new(ctx: EngineContext<B>) -> Self {
        Self { ctx }
    }
}

impl<B> TwoFactorApi<B>
where B: ChallengeManagement + CatalogManagement
{
    /// Stores a new challenge (superseding any pending one for the same user and credential), pushes the prompt to
    /// the user and fires the challenge-opened hook.
    pub async fn open_challenge(&self, request: ChallengeRequest) -> Result<TwoFactorChallenge, TwoFactorError> {
        let ChallengeRequest { user_id, credential_id, supplier_name, order_id, request_type, prompt } = request;
        let session_token =
            if prompt.session_token.is_empty() { new_session_token() } else { prompt.session_token.clone() };
        let prompt_message = if prompt.prompt_message.is_empty() {
            format!("Enter the verification code {supplier_name} sent you")
        } else {
            prompt.prompt_message.clone()
        };
        let expires_at = Utc::now() + self.ctx.config.challenge_lifetime(prompt.expires_in);
        let new_challenge = NewTwoFactorChallenge {
            user_id,
            credential_id,
            order_id,
            session_token,
            request_type,
            two_fa_type: prompt.two_fa_type,
            prompt_message,
            expires_at,
        };
        let (challenge, superseded) = self.ctx.db.insert_challenge(new_challenge).await?;
        if superseded > 0 {
            debug!("🔐️ Challenge {} superseded {superseded} older challenge(s) for credential {credential_id}", challenge.id);
        }
        info!("🔐️ {request_type} challenge {} opened for user {user_id} at {supplier_name}", challenge.id);
        let message = ServerMessage::TwoFaRequired {
            session_token: challenge.session_token.clone(),
            prompt_message: challenge.prompt_message.clone(),
            expires_at: challenge.expires_at,
            supplier_name: supplier_name.clone(),
        };
        self.ctx.bus.publish(user_id, message).await;
        self.ctx.producers.publish_challenge_opened(ChallengeOpenedEvent { challenge: challenge.clone(), supplier_name }).await;
        Ok(challenge)
    }

    /// Answers a challenge. The outcome is also published to the user's channel.
    pub async fn submit_code(&self, user_id: i64, session_token: &str, code: &str) -> Result<CodeOutcome, TwoFactorError> {
        let result = self.try_submit_code(user_id, session_token, code).await;
        self.ctx.bus.publish(user_id, code_result_message(&result)).await;
        result
    }

    async fn try_submit_code(&self, user_id: i64, session_token: &str, code: &str) -> Result<CodeOutcome, TwoFactorError> {
        let challenge = self.fetch_for_user(user_id, session_token).await?;
        match challenge.status {
            ChallengeStatus::Pending => {},
            ChallengeStatus::Expired => return Err(TwoFactorError::Expired),
            status => return Err(TwoFactorError::NotPending(status)),
        }
        if Utc::now() >= challenge.expires_at {
            let expired =
                self.ctx.db.update_challenge_status(challenge.id, &[ChallengeStatus::Pending], ChallengeStatus::Expired).await?;
            if let Some(expired) = expired {
                self.resolved(expired).await;
            }
            return Err(TwoFactorError::Expired);
        }
        let max_attempts = self.ctx.config.max_code_attempts;
        if challenge.attempts >= max_attempts {
            self.mark(challenge.id, &[ChallengeStatus::Pending], ChallengeStatus::Failed).await?;
            return Err(TwoFactorError::AttemptsExhausted);
        }
        let Some(challenge) = self.ctx.db.begin_code_attempt(challenge.id, max_attempts).await? else {
            // Lost a race with another submission, a cancellation or the expiry sweep.
            return Err(self.current_state(session_token).await);
        };
        let attempts_remaining = max_attempts - challenge.attempts;
        match self.verify_with_supplier(&challenge, code).await {
            Ok(true) => self.accept(challenge).await,
            Err(AdapterError::NotImplemented(_)) => {
                debug!("🔐️ The adapter cannot check codes. Keeping the code for the next session");
                self.ctx.db.store_submitted_code(challenge.id, code).await?;
                self.accept(challenge).await
            },
            Ok(false) => self.reject(challenge, attempts_remaining, "Invalid code".to_string()).await,
            Err(e) => {
                warn!("🔐️ Could not check the code for challenge {}: {e}", challenge.id);
                self.reject(challenge, attempts_remaining, e.to_string()).await
            },
        }
    }

    /// Sends the code to the supplier once. The credential is locked for the round trip, so the check never shares
    /// the supplier session with queued work.
    async fn verify_with_supplier(&self, challenge: &TwoFactorChallenge, code: &str) -> AdapterResult<bool> {
        let (credential, supplier) =
            self.credential_and_supplier(challenge.credential_id).await.map_err(|e| AdapterError::Unexpected(e.to_string()))?;
        let _lock = self.ctx.locks.lock_credential(credential.id).await;
        let mut adapter = session::connect(&self.ctx, &supplier, &credential).await?;
        with_timeout(self.ctx.config.adapter_timeout, adapter.verify_two_factor_code(&challenge.session_token, code)).await
    }

    async fn accept(&self, challenge: TwoFactorChallenge) -> Result<CodeOutcome, TwoFactorError> {
        let Some(verified) = self
            .ctx
            .db
            .update_challenge_status(challenge.id, &[ChallengeStatus::Submitted], ChallengeStatus::Verified)
            .await?
        else {
            return Err(self.current_state(&challenge.session_token).await);
        };
        info!("🔐️ Challenge {} verified", verified.id);
        let job = follow_up_job(&verified);
        self.resolved(verified).await;
        self.ctx.scheduler.schedule(job)?;
        Ok(CodeOutcome::Verified)
    }

    async fn reject(
        &self,
        challenge: TwoFactorChallenge,
        attempts_remaining: i64,
        reason: String,
    ) -> Result<CodeOutcome, TwoFactorError> {
        if attempts_remaining > 0 {
            self.mark(challenge.id, &[ChallengeStatus::Submitted], ChallengeStatus::Pending).await?;
            debug!("🔐️ Code rejected for challenge {}. {attempts_remaining} attempts left", challenge.id);
            return Ok(CodeOutcome::Rejected { attempts_remaining, reason });
        }
        info!("🔐️ Challenge {} failed after too many attempts", challenge.id);
        self.mark(challenge.id, &[ChallengeStatus::Submitted], ChallengeStatus::Failed).await?;
        Err(TwoFactorError::AttemptsExhausted)
    }

    /// Withdraws a pending challenge. The suspended operation is not resumed.
    pub async fn cancel(&self, user_id: i64, session_token: &str) -> Result<TwoFactorChallenge, TwoFactorError> {
        let challenge = self.fetch_for_user(user_id, session_token).await?;
        let cancelled = self
            .ctx
            .db
            .update_challenge_status(
                challenge.id,
                &[ChallengeStatus::Pending, ChallengeStatus::Submitted],
                ChallengeStatus::Cancelled,
            )
            .await?
            .ok_or(TwoFactorError::NotPending(challenge.status))?;
        info!("🔐️ Challenge {} cancelled by user {user_id}", cancelled.id);
        self.ctx.bus.publish(user_id, ServerMessage::Cancelled { session_token: session_token.to_string() }).await;
        self.resolved(cancelled.clone()).await;
        Ok(cancelled)
    }

    /// Dispatches an action received on the user's channel and returns the reply.
    pub async fn handle_action(&self, user_id: i64, action: ClientAction) -> ServerMessage {
        match action {
            ClientAction::SubmitCode { session_token, code } => {
                code_result_message(&self.submit_code(user_id, &session_token, &code).await)
            },
            ClientAction::Cancel { session_token } => match self.cancel(user_id, &session_token).await {
                Ok(_) => ServerMessage::Cancelled { session_token },
                Err(e) => ServerMessage::error(e.to_string()),
            },
        }
    }

    pub async fn pending_challenges(&self, user_id: i64) -> Result<Vec<TwoFactorChallenge>, TwoFactorError> {
        Ok(self.ctx.db.fetch_pending_challenges(user_id).await?)
    }

    /// Expires every pending challenge past its deadline and lets the affected users know.
    pub async fn expire_stale_challenges(&self, now: DateTime<Utc>) -> Result<Vec<TwoFactorChallenge>, TwoFactorError> {
        let expired = self.ctx.db.expire_challenges(now).await?;
        for challenge in &expired {
            debug!("🔐️ Challenge {} expired", challenge.id);
            let message = ServerMessage::error(format!(
                "The verification request \"{}\" expired. Start the operation again to get a new code",
                challenge.prompt_message
            ));
            self.ctx.bus.publish(challenge.user_id, message).await;
            self.resolved(challenge.clone()).await;
        }
        Ok(expired)
    }

    /// Opens a supplier session for the credential. A two-factor prompt during the handshake opens a login challenge
    /// instead of failing.
    pub async fn refresh_session(&self, credential_id: i64) -> Result<(), TwoFactorError> {
        let (credential, supplier) = self.credential_and_supplier(credential_id).await?;
        match session::open_session(&self.ctx, &supplier, &credential).await {
            Ok(_) => {
                info!("🔐️ Session for credential {credential_id} at {} is ready", supplier.name);
                Ok(())
            },
            Err(AdapterError::TwoFactorRequired(prompt)) => {
                let request = ChallengeRequest::new(&credential, &supplier, TwoFactorRequestType::Login, prompt);
                self.open_challenge(request).await?;
                Ok(())
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn credential_and_supplier(&self, credential_id: i64) -> Result<(SupplierCredential, Supplier), TwoFactorError> {
        let credential =
            self.ctx.db.fetch_credential(credential_id).await?.ok_or(TwoFactorError::CredentialNotFound(credential_id))?;
        let supplier = self
            .ctx
            .db
            .fetch_supplier(credential.supplier_id)
            .await?
            .ok_or(StoreError::SupplierNotFound(credential.supplier_id))?;
        Ok((credential, supplier))
    }

    async fn fetch_for_user(&self, user_id: i64, session_token: &str) -> Result<TwoFactorChallenge, TwoFactorError> {
        self.ctx
            .db
            .fetch_challenge_by_token(session_token)
            .await?
            .filter(|c| c.user_id == user_id)
            .ok_or(TwoFactorError::ChallengeNotFound)
    }

    /// Explains why a conditional update on the challenge did not apply.
    async fn current_state(&self, session_token: &str) -> TwoFactorError {
        match self.ctx.db.fetch_challenge_by_token(session_token).await {
            Ok(Some(c)) if c.status == ChallengeStatus::Expired => TwoFactorError::Expired,
            Ok(Some(c)) if c.attempts >= self.ctx.config.max_code_attempts => TwoFactorError::AttemptsExhausted,
            Ok(Some(c)) => TwoFactorError::NotPending(c.status),
            Ok(None) => TwoFactorError::ChallengeNotFound,
            Err(e) => e.into(),
        }
    }

    async fn mark(&self, id: i64, from: &[ChallengeStatus], to: ChallengeStatus) -> Result<(), TwoFactorError> {
        if let Some(challenge) = self.ctx.db.update_challenge_status(id, from, to).await? {
            if challenge.status != ChallengeStatus::Pending {
                self.resolved(challenge).await;
            }
        }
        Ok(())
    }

    async fn resolved(&self, challenge: TwoFactorChallenge) {
        self.ctx.producers.publish_challenge_resolved(ChallengeResolvedEvent { challenge }).await;
    }
}

/// The job that resumes whatever was waiting on a verified challenge. It runs exactly once.
pub fn follow_up_job(challenge: &TwoFactorChallenge) -> Job {
    let kind = match (challenge.request_type, challenge.order_id) {
        (TwoFactorRequestType::Login, Some(order_id)) => {
            JobKind::PlaceOrder { order_id, options: PlacementOptions::resumed() }
        },
        (TwoFactorRequestType::Checkout, Some(order_id)) => JobKind::ResumeCheckout { order_id },
        (TwoFactorRequestType::PriceRefresh, Some(order_id)) => JobKind::VerifyPrices { order_id },
        (TwoFactorRequestType::PriceRefresh, None) => JobKind::QuickRefresh { user_id: challenge.user_id },
        (TwoFactorRequestType::Login | TwoFactorRequestType::Checkout, None) => {
            JobKind::RefreshSession { credential_id: challenge.credential_id }
        },
    };
    let job = Job::new(kind, RetryPolicy::none());
    // Each refresh branch takes its own credential lock.
    if matches!(job.kind, JobKind::QuickRefresh { .. }) {
        job
    } else {
        job.for_credential(challenge.credential_id)
    }
}

/// The reply sent to the user for a code submission.
pub fn code_result_message(result: &Result<CodeOutcome, TwoFactorError>) -> ServerMessage {
    match result {
        Ok(CodeOutcome::Verified) => ServerMessage::code_accepted(),
        Ok(CodeOutcome::Rejected { attempts_remaining, reason }) => {
            ServerMessage::code_rejected(reason.clone(), *attempts_remaining)
        },
        Err(
            e @ (TwoFactorError::AttemptsExhausted | TwoFactorError::Expired | TwoFactorError::NotPending(_)),
        ) => ServerMessage::code_rejected(e.to_string(), 0),
        Err(e) => ServerMessage::error(e.to_string()),
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;
    use crate::db_types::TwoFactorKind;

    fn challenge(request_type: TwoFactorRequestType, order_id: Option<OrderId>) -> TwoFactorChallenge {
        let now = Utc::now();
        TwoFactorChallenge {
            id: 1,
            user_id: 10,
            credential_id: 20,
            order_id,
            session_token: "token".into(),
            request_type,
            two_fa_type: TwoFactorKind::Sms,
            prompt_message: "Enter the code".into(),
            status: ChallengeStatus::Verified,
            attempts: 1,
            submitted_code: None,
            expires_at: now,
            verified_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn follow_up_jobs_resume_the_suspended_operation() {
        let job = follow_up_job(&challenge(TwoFactorRequestType::Checkout, Some(OrderId(5))));
        assert_eq!(job.kind, JobKind::ResumeCheckout { order_id: OrderId(5) });
        assert_eq!(job.policy, RetryPolicy::none());
        assert_eq!(job.concurrency_key.as_deref(), Some("credential:20"));

        let job = follow_up_job(&challenge(TwoFactorRequestType::Login, Some(OrderId(5))));
        assert_eq!(job.kind, JobKind::PlaceOrder { order_id: OrderId(5), options: PlacementOptions::resumed() });

        let job = follow_up_job(&challenge(TwoFactorRequestType::PriceRefresh, None));
        assert_eq!(job.kind, JobKind::QuickRefresh { user_id: 10 });
        assert_eq!(job.concurrency_key, None);

        let job = follow_up_job(&challenge(TwoFactorRequestType::Login, None));
        assert_eq!(job.kind, JobKind::RefreshSession { credential_id: 20 });
    }

    #[test]
    fn terminal_failures_cannot_be_retried() {
        let msg = code_result_message(&Err(TwoFactorError::AttemptsExhausted));
        let ServerMessage::CodeResult { success, can_retry, attempts_remaining, .. } = msg else {
            panic!("expected a code result");
        };
        assert!(!success);
        assert!(!can_retry);
        assert_eq!(attempts_remaining, 0);

        let msg =
            code_result_message(&Ok(CodeOutcome::Rejected { attempts_remaining: 2, reason: "Invalid code".into() }));
        assert_eq!(msg, ServerMessage::code_rejected("Invalid code", 2));
    }
}
