//! Web-push fan-out to browser subscriptions.
//!
//! Broadcasts are best-effort: each active subscription gets one POST and
//! failures are tolerated. Endpoints answering 404/410 are deactivated
//! immediately; other failures bump a counter that deactivates the
//! subscription once it keeps failing. There is no retry queue.
//!
//! When VAPID keys are configured the request carries a
//! `vapid t=<ES256 JWT>, k=<public key>` Authorization header, as push
//! services require for identified senders.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use db::models::push_subscription::PushSubscription;

/// TTL the push service may hold an undelivered message for (1 day).
const PUSH_TTL_SECS: u32 = 86_400;

/// Lifetime of the VAPID authorization JWT (12 hours; RFC 8292 caps it
/// at 24).
const VAPID_JWT_HOURS: i64 = 12;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum PushError {
    #[error("invalid VAPID configuration: {0}")]
    InvalidVapid(String),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// What a broadcast did, for logging and the admin response.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    pub failed: usize,
    pub deactivated: usize,
}

/// Notification payload shown by the service worker.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// Absolute URL the notification opens.
    pub url: String,
    /// Browser notification tag; same-tag notifications collapse.
    pub tag: String,
}

struct Vapid {
    signing_key: EncodingKey,
    /// base64url-encoded uncompressed P-256 public key, sent verbatim.
    public_key: String,
    subject: String,
}

#[derive(Clone)]
pub struct PushService {
    client: reqwest::Client,
    pool: SqlitePool,
    vapid: Option<Arc<Vapid>>,
}

#[derive(Serialize)]
struct VapidClaims {
    aud: String,
    exp: i64,
    sub: String,
}

impl PushService {
    /// Build from `TLU_VAPID_PRIVATE_KEY` / `TLU_VAPID_PUBLIC_KEY` /
    /// `TLU_VAPID_SUBJECT`. Without keys the service still broadcasts,
    /// just without VAPID identification.
    pub fn from_env(pool: SqlitePool) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PushError::InvalidVapid(format!("http client: {e}")))?;

        let vapid = match (
            std::env::var("TLU_VAPID_PRIVATE_KEY").ok(),
            std::env::var("TLU_VAPID_PUBLIC_KEY").ok(),
        ) {
            (Some(private_key), Some(public_key)) => {
                let signing_key = load_vapid_key(&private_key)?;
                let subject = std::env::var("TLU_VAPID_SUBJECT")
                    .unwrap_or_else(|_| format!("mailto:admin@{}", site_host()));
                info!("VAPID keys configured for web push");
                Some(Arc::new(Vapid {
                    signing_key,
                    public_key,
                    subject,
                }))
            }
            (None, None) => {
                warn!("VAPID keys not configured; push requests will be unsigned");
                None
            }
            _ => {
                return Err(PushError::InvalidVapid(
                    "TLU_VAPID_PRIVATE_KEY and TLU_VAPID_PUBLIC_KEY must be set together"
                        .to_string(),
                ));
            }
        };

        Ok(Self {
            client,
            pool,
            vapid,
        })
    }

    /// The public key browsers need for `PushManager.subscribe()`.
    pub fn public_key(&self) -> Option<&str> {
        self.vapid.as_deref().map(|v| v.public_key.as_str())
    }

    /// Send a message to every active subscription. Returns once the whole
    /// batch has been attempted; callers usually `tokio::spawn` this.
    pub async fn broadcast(&self, message: &PushMessage) -> Result<BroadcastOutcome, PushError> {
        let subscriptions = PushSubscription::list_active(&self.pool).await?;
        if subscriptions.is_empty() {
            return Ok(BroadcastOutcome::default());
        }

        let payload = serde_json::to_vec(message).unwrap_or_default();
        let mut outcome = BroadcastOutcome::default();

        for subscription in subscriptions {
            match self.deliver(&subscription, &payload).await {
                Delivery::Delivered => {
                    outcome.delivered += 1;
                    PushSubscription::record_success(&self.pool, subscription.id).await?;
                }
                Delivery::Gone => {
                    outcome.deactivated += 1;
                    PushSubscription::deactivate(&self.pool, subscription.id).await?;
                }
                Delivery::Failed => {
                    outcome.failed += 1;
                    PushSubscription::record_failure(&self.pool, subscription.id).await?;
                }
            }
        }

        info!(
            delivered = outcome.delivered,
            failed = outcome.failed,
            deactivated = outcome.deactivated,
            "Push broadcast finished"
        );
        Ok(outcome)
    }

    async fn deliver(&self, subscription: &PushSubscription, payload: &[u8]) -> Delivery {
        let mut request = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", PUSH_TTL_SECS)
            .header("Urgency", "normal")
            .body(payload.to_vec());

        if let Some(vapid) = &self.vapid {
            match self.authorization_header(vapid, &subscription.endpoint) {
                Ok(header) => request = request.header("Authorization", header),
                Err(e) => {
                    warn!(error = %e, "Failed to build VAPID header, sending unsigned");
                }
            }
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => Delivery::Delivered,
            Ok(response)
                if response.status() == reqwest::StatusCode::NOT_FOUND
                    || response.status() == reqwest::StatusCode::GONE =>
            {
                debug!(endpoint = %subscription.endpoint, "Subscription gone");
                Delivery::Gone
            }
            Ok(response) => {
                debug!(
                    endpoint = %subscription.endpoint,
                    status = %response.status(),
                    "Push delivery rejected"
                );
                Delivery::Failed
            }
            Err(e) => {
                debug!(endpoint = %subscription.endpoint, error = %e, "Push delivery failed");
                Delivery::Failed
            }
        }
    }

    /// `vapid t=<jwt>, k=<public key>`, audience-bound to the endpoint
    /// origin.
    fn authorization_header(&self, vapid: &Vapid, endpoint: &str) -> Result<String, PushError> {
        let aud = endpoint_origin(endpoint)
            .ok_or_else(|| PushError::InvalidVapid(format!("unparseable endpoint {endpoint}")))?;

        let claims = VapidClaims {
            aud,
            exp: (Utc::now() + ChronoDuration::hours(VAPID_JWT_HOURS)).timestamp(),
            sub: vapid.subject.clone(),
        };
        let token = encode(
            &Header::new(Algorithm::ES256),
            &claims,
            &vapid.signing_key,
        )?;

        Ok(format!("vapid t={token}, k={}", vapid.public_key))
    }
}

enum Delivery {
    Delivered,
    Gone,
    Failed,
}

/// Accepts PEM content directly, a path to a PEM file, or a raw
/// base64url-encoded PKCS#8 key.
fn load_vapid_key(value: &str) -> Result<EncodingKey, PushError> {
    let trimmed = value.trim();

    if trimmed.starts_with("-----BEGIN") {
        return EncodingKey::from_ec_pem(trimmed.as_bytes()).map_err(PushError::from);
    }

    let path = std::path::Path::new(trimmed);
    if path.exists() {
        let pem = std::fs::read(path)
            .map_err(|e| PushError::InvalidVapid(format!("reading {trimmed}: {e}")))?;
        return EncodingKey::from_ec_pem(&pem).map_err(PushError::from);
    }

    let der = URL_SAFE_NO_PAD
        .decode(trimmed)
        .map_err(|e| PushError::InvalidVapid(format!("not PEM, path or base64url: {e}")))?;
    Ok(EncodingKey::from_ec_der(&der))
}

/// Scheme + host (+ port) of a push endpoint, the VAPID `aud` value.
fn endpoint_origin(endpoint: &str) -> Option<String> {
    let url = reqwest::Url::parse(endpoint).ok()?;
    let host = url.host_str()?;
    match url.port() {
        Some(port) => Some(format!("{}://{}:{}", url.scheme(), host, port)),
        None => Some(format!("{}://{}", url.scheme(), host)),
    }
}

fn site_host() -> String {
    utils::assets::site_url()
        .split("://")
        .nth(1)
        .unwrap_or("localhost")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_origin() {
        assert_eq!(
            endpoint_origin("https://fcm.googleapis.com/fcm/send/abc123").as_deref(),
            Some("https://fcm.googleapis.com")
        );
        assert_eq!(
            endpoint_origin("http://localhost:9999/push/xyz").as_deref(),
            Some("http://localhost:9999")
        );
        assert!(endpoint_origin("not a url").is_none());
    }

    #[tokio::test]
    async fn test_broadcast_deactivates_dead_endpoints() {
        let (pool, _temp_dir) = db::test_utils::setup_test_pool().await;

        // An endpoint nothing listens on: connection refused counts as a
        // transient failure, not a gone subscription
        let sub = PushSubscription::upsert(
            &pool,
            &db::models::push_subscription::CreateSubscription {
                endpoint: "http://127.0.0.1:1/push".to_string(),
                keys: db::models::push_subscription::SubscriptionKeys {
                    p256dh: "BKey".to_string(),
                    auth: "secret".to_string(),
                },
            },
        )
        .await
        .unwrap();

        let service = PushService {
            client: reqwest::Client::new(),
            pool: pool.clone(),
            vapid: None,
        };

        let outcome = service
            .broadcast(&PushMessage {
                title: "New article".to_string(),
                body: "Read it now".to_string(),
                url: "https://news.example.com/article".to_string(),
                tag: "news".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.deactivated, 0);

        let active = PushSubscription::list_active(&pool).await.unwrap();
        assert_eq!(active[0].id, sub.id);
        assert_eq!(active[0].failure_count, 1);
    }
}
