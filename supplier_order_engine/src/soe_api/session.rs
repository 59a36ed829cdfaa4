//! Opening a supplier session: connect through the factory, then revive the session or log in.
use log::*;
use sog_common::Secret;

use crate::{
    adapters::{AdapterError, AdapterResult, CallPolicy, SessionContext, SupplierAdapter},
    db_types::{Supplier, SupplierCredential},
    live_call,
    soe_api::EngineContext,
    traits::ChallengeManagement,
};

/// Connects an adapter for the credential. A code stored by an earlier challenge is handed over (and consumed) so
/// that adapters which need it at login can use it.
pub(crate) async fn connect<B: ChallengeManagement>(
    ctx: &EngineContext<B>,
    supplier: &Supplier,
    credential: &SupplierCredential,
) -> AdapterResult<Box<dyn SupplierAdapter>> {
    let code = match ctx.db.take_verified_code(credential.id).await {
        Ok(code) => code,
        Err(e) => {
            warn!("🔐️ Could not load a stored code for credential {}: {e}", credential.id);
            None
        },
    };
    let context = SessionContext {
        supplier: supplier.clone(),
        credential: credential.clone(),
        two_factor_code: code.map(Secret::new),
    };
    let policy = ctx.config.call_policy();
    live_call!(&policy, ctx.adapters.connect(context.clone()))
}

/// Revives the session if the adapter can, otherwise performs a full login. An adapter that implements neither is
/// assumed to manage its own session.
pub(crate) async fn handshake(adapter: &mut dyn SupplierAdapter, policy: &CallPolicy) -> AdapterResult<()> {
    match live_call!(policy, adapter.soft_refresh()) {
        Ok(true) => {
            trace!("🔐️ Supplier session revived");
            return Ok(());
        },
        Ok(false) | Err(AdapterError::NotImplemented(_)) => {},
        Err(e) if e.is_session_failure() => debug!("🔐️ Soft refresh failed ({e}). Logging in"),
        Err(e) => return Err(e),
    }
    match live_call!(policy, adapter.login()) {
        Ok(()) | Err(AdapterError::NotImplemented(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// [`connect`] followed by [`handshake`].
pub(crate) async fn open_session<B: ChallengeManagement>(
    ctx: &EngineContext<B>,
    supplier: &Supplier,
    credential: &SupplierCredential,
) -> AdapterResult<Box<dyn SupplierAdapter>> {
    let mut adapter = connect(ctx, supplier, credential).await?;
    handshake(adapter.as_mut(), &ctx.config.call_policy()).await?;
    Ok(adapter)
}

#[cfg(test)]
mod test {
    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct Scripted {
        refresh: Option<AdapterResult<bool>>,
        login: Option<AdapterResult<()>>,
        logins: u32,
    }

    #[async_trait]
    impl SupplierAdapter for Scripted {
        async fn login(&mut self) -> AdapterResult<()> {
            self.logins += 1;
            self.login.clone().unwrap_or(Err(AdapterError::NotImplemented("login")))
        }

        async fn soft_refresh(&mut self) -> AdapterResult<bool> {
            self.refresh.clone().unwrap_or(Err(AdapterError::NotImplemented("soft_refresh")))
        }
    }

    #[tokio::test]
    async fn revived_sessions_skip_login() {
        let mut adapter = Scripted { refresh: Some(Ok(true)), ..Default::default() };
        handshake(&mut adapter, &CallPolicy::default()).await.unwrap();
        assert_eq!(adapter.logins, 0);
    }

    #[tokio::test]
    async fn falls_back_to_login() {
        let mut adapter = Scripted { refresh: Some(Ok(false)), login: Some(Ok(())), ..Default::default() };
        handshake(&mut adapter, &CallPolicy::default()).await.unwrap();
        assert_eq!(adapter.logins, 1);

        let mut adapter = Scripted { refresh: Some(Err(AdapterError::SessionExpired)), login: Some(Ok(())), logins: 0 };
        handshake(&mut adapter, &CallPolicy::default()).await.unwrap();
        assert_eq!(adapter.logins, 1);
    }

    #[tokio::test]
    async fn bare_adapters_are_trusted() {
        let mut adapter = Scripted::default();
        handshake(&mut adapter, &CallPolicy::default()).await.unwrap();
        assert_eq!(adapter.logins, 1);
    }

    #[tokio::test]
    async fn login_failures_surface() {
        let mut adapter = Scripted {
            refresh: Some(Ok(false)),
            login: Some(Err(AdapterError::TwoFactorRequired(Default::default()))),
            ..Default::default()
        };
        let err = handshake(&mut adapter, &CallPolicy::default()).await.unwrap_err();
        assert!(matches!(err, AdapterError::TwoFactorRequired(_)));

        let mut adapter = Scripted { refresh: Some(Err(AdapterError::Maintenance)), ..Default::default() };
        let err = handshake(&mut adapter, &CallPolicy::default()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Maintenance));
        assert_eq!(adapter.logins, 0);
    }
}
