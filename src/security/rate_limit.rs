//! Per-route, per-client rate limiting.
//!
//! Each (route, client IP) pair owns a token bucket whose capacity is the
//! quota's request count and which refills evenly over the quota's period.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Above this many tracked buckets, idle ones are dropped before inserting.
const MAX_TRACKED_BUCKETS: usize = 10_000;

/// `requests` per `period`, written `"5/second"` or `"10 per minute"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quota {
    pub requests: u32,
    pub period: Duration,
}

impl Quota {
    pub const fn per_second(requests: u32) -> Self {
        Self {
            requests,
            period: Duration::from_secs(1),
        }
    }

    pub const fn per_minute(requests: u32) -> Self {
        Self {
            requests,
            period: Duration::from_secs(60),
        }
    }

    pub const fn per_hour(requests: u32) -> Self {
        Self {
            requests,
            period: Duration::from_secs(3600),
        }
    }

    fn refill_per_sec(&self) -> f64 {
        self.requests as f64 / self.period.as_secs_f64()
    }
}

impl FromStr for Quota {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (count, unit) = s
            .split_once('/')
            .or_else(|| s.split_once(" per "))
            .ok_or_else(|| format!("expected \"<n>/<unit>\", got {s:?}"))?;

        let requests: u32 = count
            .trim()
            .parse()
            .map_err(|_| format!("invalid request count in {s:?}"))?;

        match unit.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => Ok(Self::per_second(requests)),
            "m" | "min" | "minute" | "minutes" => Ok(Self::per_minute(requests)),
            "h" | "hour" | "hours" => Ok(Self::per_hour(requests)),
            other => Err(format!("unknown period {other:?} in {s:?}")),
        }
    }
}

impl TryFrom<String> for Quota {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.period.as_secs() {
            1 => "second",
            60 => "minute",
            3600 => "hour",
            _ => return write!(f, "{} per {}s", self.requests, self.period.as_secs()),
        };
        write!(f, "{}/{}", self.requests, unit)
    }
}

impl From<Quota> for String {
    fn from(quota: Quota) -> Self {
        quota.to_string()
    }
}

/// The rate-limited routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Status,
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    Seek,
    Volume,
    Playlist,
    PlaylistAdd,
    PlaylistAddPlay,
    PlaylistRemove,
    PlaylistPlay,
    PlaylistClear,
    Search,
    Playlists,
    Random,
    Repeat,
    Health,
    /// The web UI page and its static assets.
    Ui,
}

impl Endpoint {
    /// Name used in config overrides, logs and metrics.
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Status => "status",
            Endpoint::Play => "play",
            Endpoint::Pause => "pause",
            Endpoint::Stop => "stop",
            Endpoint::Next => "next",
            Endpoint::Previous => "previous",
            Endpoint::Seek => "seek",
            Endpoint::Volume => "volume",
            Endpoint::Playlist => "playlist",
            Endpoint::PlaylistAdd => "playlist_add",
            Endpoint::PlaylistAddPlay => "playlist_addplay",
            Endpoint::PlaylistRemove => "playlist_remove",
            Endpoint::PlaylistPlay => "playlist_play",
            Endpoint::PlaylistClear => "playlist_clear",
            Endpoint::Search => "search",
            Endpoint::Playlists => "playlists",
            Endpoint::Random => "random",
            Endpoint::Repeat => "repeat",
            Endpoint::Health => "health",
            Endpoint::Ui => "ui",
        }
    }

    /// Built-in quota; `None` falls back to the configured defaults.
    pub fn builtin_quota(self) -> Option<Quota> {
        match self {
            Endpoint::Status | Endpoint::PlaylistRemove => Some(Quota::per_second(10)),
            Endpoint::Play
            | Endpoint::Pause
            | Endpoint::Stop
            | Endpoint::Next
            | Endpoint::Previous
            | Endpoint::Seek
            | Endpoint::Volume
            | Endpoint::Playlist
            | Endpoint::PlaylistPlay
            | Endpoint::Random
            | Endpoint::Repeat => Some(Quota::per_second(5)),
            Endpoint::PlaylistAdd | Endpoint::PlaylistAddPlay => Some(Quota::per_minute(10)),
            Endpoint::PlaylistClear => Some(Quota::per_minute(3)),
            Endpoint::Search | Endpoint::Playlists => Some(Quota::per_second(3)),
            Endpoint::Health | Endpoint::Ui => None,
        }
    }
}

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn refill(&mut self, capacity: f64, refill_rate: f64, now: Instant) {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;
    }
}

/// Buckets for one (route, client) pair, one per quota.
struct ClientBuckets {
    buckets: Vec<TokenBucket>,
    last_seen: Instant,
}

impl ClientBuckets {
    fn new(quotas: &[Quota]) -> Self {
        Self {
            buckets: quotas
                .iter()
                .map(|quota| TokenBucket::new(quota.requests as f64))
                .collect(),
            last_seen: Instant::now(),
        }
    }

    /// Spend one token from every bucket, or from none.
    fn try_acquire(&mut self, quotas: &[Quota]) -> bool {
        let now = Instant::now();
        self.last_seen = now;

        for (bucket, quota) in self.buckets.iter_mut().zip(quotas) {
            bucket.refill(quota.requests as f64, quota.refill_per_sec(), now);
        }
        if self.buckets.iter().any(|bucket| bucket.tokens < 1.0) {
            return false;
        }
        for bucket in &mut self.buckets {
            bucket.tokens -= 1.0;
        }
        true
    }
}

/// Shared limiter state for all routes.
pub struct RateLimiter {
    enabled: bool,
    default: Vec<Quota>,
    overrides: HashMap<String, Quota>,
    buckets: DashMap<(Endpoint, IpAddr), ClientBuckets>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            default: config.default.clone(),
            overrides: config
                .routes
                .iter()
                .map(|(name, quota)| (name.clone(), *quota))
                .collect(),
            buckets: DashMap::new(),
        }
    }

    /// Effective quotas: config override, then built-in, then the defaults.
    pub fn quotas_for(&self, endpoint: Endpoint) -> Vec<Quota> {
        match self
            .overrides
            .get(endpoint.name())
            .copied()
            .or_else(|| endpoint.builtin_quota())
        {
            Some(quota) => vec![quota],
            None => self.default.clone(),
        }
    }

    /// Take one token for `client` on `endpoint`. Returns false when exhausted.
    pub fn check(&self, endpoint: Endpoint, client: IpAddr) -> bool {
        if !self.enabled {
            return true;
        }

        let quotas = self.quotas_for(endpoint);

        if self.buckets.len() > MAX_TRACKED_BUCKETS {
            self.purge_idle();
        }

        let allowed = self
            .buckets
            .entry((endpoint, client))
            .or_insert_with(|| ClientBuckets::new(&quotas))
            .try_acquire(&quotas);

        if !allowed {
            tracing::warn!(client = %client, route = endpoint.name(), quotas = ?quotas, "Rate limit exceeded");
            metrics::record_rate_limited(endpoint.name());
        }
        allowed
    }

    /// Drop buckets that have been idle long enough to be full again.
    fn purge_idle(&self) {
        let now = Instant::now();
        self.buckets.retain(|(endpoint, _), buckets| {
            let longest = self
                .quotas_for(*endpoint)
                .iter()
                .map(|quota| quota.period)
                .max()
                .unwrap_or_default();
            now.duration_since(buckets.last_seen) < longest
        });
    }
}
