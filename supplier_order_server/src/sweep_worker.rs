use std::time::Duration;

use chrono::Utc;
use log::*;
use supplier_order_engine::{db_types::TwoFactorChallenge, SqliteDatabase, TwoFactorApi};
use tokio::task::JoinHandle;

/// Starts the challenge expiry sweep. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_sweep_worker(api: TwoFactorApi<SqliteDatabase>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Challenge expiry worker started. Sweeping every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running challenge expiry sweep");
            match api.expire_stale_challenges(Utc::now()).await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No challenges expired"),
                Ok(expired) => {
                    info!("🕰️ {} challenges expired", expired.len());
                    debug!("🕰️ Expired challenges: {}", challenge_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running challenge expiry sweep: {e}");
                },
            }
        }
    })
}

fn challenge_list(challenges: &[TwoFactorChallenge]) -> String {
    challenges
        .iter()
        .map(|c| format!("[{}] user: {} credential: {} type: {}", c.id, c.user_id, c.credential_id, c.request_type))
        .collect::<Vec<String>>()
        .join(", ")
}
