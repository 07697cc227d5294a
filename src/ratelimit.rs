//! Request admission: composite client fingerprints and per-client
//! token buckets.
//!
//! Clients are identified by a 16-hex-character fingerprint derived from
//! their network address and selected headers, so address churn behind a
//! proxy does not merge unrelated clients into one bucket. Buckets are
//! created lazily and evicted after five minutes of silence.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use sha2::{Digest, Sha256};

use crate::config::RateLimitConfig;

/// Buckets idle longer than this are evicted.
pub const IDLE_TTL: Duration = Duration::from_secs(5 * 60);

/// Length of the hex client identifier.
const FINGERPRINT_LEN: usize = 16;

/// Token bucket for one client.
type ClientBucket = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct ClientEntry {
    bucket: Arc<ClientBucket>,
    last_seen: Instant,
}

/// Per-client token bucket registry.
pub struct RateLimiterRegistry {
    clients: RwLock<HashMap<String, ClientEntry>>,
    quota: Quota,
}

impl RateLimiterRegistry {
    /// Create a registry from the rate-limit configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        let rpm = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);

        Self {
            clients: RwLock::new(HashMap::new()),
            quota: Quota::per_minute(rpm).allow_burst(burst),
        }
    }

    /// Check whether `client_id` may proceed, creating its bucket on
    /// first sight and refreshing its idle timer.
    pub fn allow(&self, client_id: &str) -> bool {
        let mut clients = self.clients.write().unwrap();

        let entry = clients
            .entry(client_id.to_string())
            .or_insert_with(|| ClientEntry {
                bucket: Arc::new(RateLimiter::direct(self.quota)),
                last_seen: Instant::now(),
            });
        entry.last_seen = Instant::now();

        entry.bucket.check().is_ok()
    }

    /// Evict buckets idle longer than [`IDLE_TTL`]. Returns the number
    /// removed.
    pub fn evict_idle(&self) -> usize {
        let mut clients = self.clients.write().unwrap();
        let before = clients.len();
        clients.retain(|_, entry| entry.last_seen.elapsed() < IDLE_TTL);
        before - clients.len()
    }

    /// Number of tracked clients.
    pub fn client_count(&self) -> usize {
        self.clients.read().unwrap().len()
    }

    /// Spawn the periodic idle-eviction task.
    pub fn start_eviction_task(self: &Arc<Self>, interval: Duration) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.tick().await; // first tick completes immediately
            loop {
                timer.tick().await;
                let removed = registry.evict_idle();
                if removed > 0 {
                    tracing::debug!(removed, "Evicted idle rate-limit clients");
                }
            }
        });
    }
}

/// Derive the composite client fingerprint from request metadata.
///
/// Components, each skipped entirely when absent: the client address
/// (first `X-Forwarded-For` entry, else `X-Real-IP`, else the peer
/// address), the first token of the lowercased `User-Agent`, the first
/// two characters of `Accept-Language`, and the first 8 hex characters
/// of the hashed `session_id` cookie. The identifier is the first 16
/// hex characters of the SHA-256 over the joined components.
pub fn client_fingerprint(headers: &HeaderMap, peer_addr: Option<&str>) -> String {
    let mut components: Vec<String> = Vec::with_capacity(4);

    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        })
        .or_else(|| peer_addr.map(|a| a.to_string()));
    if let Some(ip) = ip.filter(|v| !v.is_empty()) {
        components.push(format!("ip:{ip}"));
    }

    if let Some(ua) = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_lowercase())
        .and_then(|v| v.split_whitespace().next().map(str::to_string))
    {
        components.push(format!("ua:{ua}"));
    }

    if let Some(lang) = headers
        .get("accept-language")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
    {
        let prefix: String = lang.chars().take(2).collect();
        components.push(format!("lang:{prefix}"));
    }

    if let Some(session) = session_cookie(headers) {
        let digest = hex::encode(Sha256::digest(session.as_bytes()));
        components.push(format!("sess:{}", &digest[..8]));
    }

    let combined = components.join("|");
    let digest = hex::encode(Sha256::digest(combined.as_bytes()));
    digest[..FINGERPRINT_LEN].to_string()
}

/// Extract the `session_id` cookie value, if present and non-empty.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get("cookie")?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "session_id" && !value.is_empty()).then(|| value.to_string())
    })
}
