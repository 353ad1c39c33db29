//! Webhook delivery policy: POST JSON, `X-Subscription-ID` and
//! event-type headers, 10s timeout per attempt, up to 3 attempts with
//! exponential backoff (1s, 2s, 4s). 2xx is success; exhausted attempts are
//! logged and swallowed, never re-queued.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};

const MAX_ATTEMPTS: u32 = 3;
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);
const BACKOFFS: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(2)];

pub async fn deliver(http: &Client, url: &str, subscription_id: &str, event_type: &str, body: &Value) {
    let payload = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(subscription_id, error = %e, "failed to marshal webhook payload");
            return;
        }
    };

    for attempt in 1..=MAX_ATTEMPTS {
        let result = http
            .post(url)
            .timeout(ATTEMPT_TIMEOUT)
            .header("X-Subscription-ID", subscription_id)
            .header("X-Event-Type", event_type)
            .header("Content-Type", "application/json")
            .body(payload.clone())
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                info!(subscription_id, attempt, status = %resp.status(), "webhook delivered");
                return;
            }
            Ok(resp) => {
                warn!(subscription_id, attempt, status = %resp.status(), "webhook returned non-2xx");
            }
            Err(e) => {
                warn!(subscription_id, attempt, error = %e, "webhook delivery attempt failed");
            }
        }

        if let Some(backoff) = BACKOFFS.get((attempt - 1) as usize) {
            tokio::time::sleep(*backoff).await;
        }
    }

    warn!(subscription_id, url, "webhook delivery exhausted all attempts, giving up");
}
