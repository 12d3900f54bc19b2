//! Version marker bookkeeping between a local cache and its remote source
//!
//! A [`FreshnessTracker`] owns one marker key in a [`LocalStore`]. Reads
//! compare that marker with the one stored on the remote parent document;
//! writes derive the next marker, which the caller stores remotely and then
//! confirms locally.
//!
//! ## Write Protocol
//!
//! ```text
//! next_marker()  ──►  remote write (marker + fields)  ──►  confirm_write(marker)
//!                          │
//!                          └── failure: local marker untouched, next check is Stale
//! ```
//!
//! [`FreshnessTracker::record_write`] combines the first and last step for
//! callers that do not care about the ordering.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::FreshnessConfig;
use crate::error::Result;
use crate::traits::LocalStore;

/// How the next marker is derived from the current one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerStrategy {
    /// Alternate between 1 and 2
    ///
    /// Only detects "changed since I last looked". An even number of
    /// foreign writes reads as fresh.
    #[default]
    Toggle,

    /// Strictly increasing counter starting at 1
    Counter,
}

impl MarkerStrategy {
    /// Marker following `current`
    pub fn next(self, current: Option<VersionMarker>) -> VersionMarker {
        match self {
            MarkerStrategy::Toggle => {
                // Absent counts as 1
                match current.map_or(1, |m| m.0) {
                    1 => VersionMarker(2),
                    _ => VersionMarker(1),
                }
            }
            MarkerStrategy::Counter => match current {
                Some(m) => VersionMarker(m.0.saturating_add(1)),
                None => VersionMarker(1),
            },
        }
    }
}

impl std::str::FromStr for MarkerStrategy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "toggle" => Ok(MarkerStrategy::Toggle),
            "counter" => Ok(MarkerStrategy::Counter),
            other => Err(crate::Error::config(format!(
                "Unknown marker strategy: {} (expected toggle or counter)",
                other
            ))),
        }
    }
}

/// Integer change marker stored locally and on the parent document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionMarker(pub i64);

impl VersionMarker {
    pub fn get(self) -> i64 {
        self.0
    }

    /// Coerce a remote field value to a marker
    ///
    /// Accepts integers, integral floats and numeric strings. Anything else
    /// (including empty strings and booleans) yields `None`, so a remote
    /// `true` never matches a local `1`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let marker = match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
            Value::String(s) => parse_marker(s),
            _ => None,
        };
        marker.map(VersionMarker)
    }

    /// Parse the string encoding used in the local store
    pub fn parse(s: &str) -> Option<Self> {
        parse_marker(s).map(VersionMarker)
    }

    /// Remote field representation
    pub fn to_value(self) -> Value {
        Value::from(self.0)
    }
}

impl fmt::Display for VersionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn parse_marker(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(integral))
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Result of comparing local and remote markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// Local cache matches the remote document
    Fresh,
    /// Local cache should be replaced with remote data
    Stale,
}

impl Freshness {
    pub fn is_fresh(self) -> bool {
        self == Freshness::Fresh
    }
}

/// Raw state of the local marker key
enum Stored {
    Missing,
    Invalid,
    Marker(VersionMarker),
}

impl Stored {
    fn marker(self) -> Option<VersionMarker> {
        match self {
            Stored::Marker(marker) => Some(marker),
            Stored::Missing | Stored::Invalid => None,
        }
    }
}

/// Tracks the version marker of one parent entity
#[derive(Clone)]
pub struct FreshnessTracker {
    store: Arc<dyn LocalStore>,
    key: String,
    strategy: MarkerStrategy,
}

impl fmt::Debug for FreshnessTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreshnessTracker")
            .field("key", &self.key)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl FreshnessTracker {
    /// Create a tracker over `key` in `store`
    pub fn new(store: Arc<dyn LocalStore>, key: impl Into<String>, strategy: MarkerStrategy) -> Self {
        Self {
            store,
            key: key.into(),
            strategy,
        }
    }

    /// Create the tracker for one parent entity as configured
    ///
    /// With `per_profile_keys` each parent gets its own key, so several
    /// trackers can share one local store without colliding.
    pub fn for_parent(store: Arc<dyn LocalStore>, config: &FreshnessConfig, parent_id: &str) -> Self {
        Self::new(store, config.key_for(parent_id), config.strategy)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn strategy(&self) -> MarkerStrategy {
        self.strategy
    }

    /// Locally stored marker
    ///
    /// An unparsable stored value reads as no marker.
    pub async fn current(&self) -> Result<Option<VersionMarker>> {
        Ok(self.stored().await?.marker())
    }

    async fn stored(&self) -> Result<Stored> {
        let stored = match self.store.get_string(&self.key).await? {
            None => Stored::Missing,
            Some(raw) => match VersionMarker::parse(&raw) {
                Some(marker) => Stored::Marker(marker),
                None => {
                    warn!("Ignoring unparsable local marker under {}", self.key);
                    Stored::Invalid
                }
            },
        };
        Ok(stored)
    }

    /// Compare the local marker with the remote one
    ///
    /// `Fresh` only if both exist, coerce to integers and are equal.
    pub async fn check_freshness(&self, remote: Option<&Value>) -> Result<Freshness> {
        let local = self.current().await?;
        let remote = remote.and_then(VersionMarker::from_value);

        let freshness = match (local, remote) {
            (Some(local), Some(remote)) if local == remote => Freshness::Fresh,
            _ => Freshness::Stale,
        };

        debug!(
            "Freshness {}: local={:?} remote={:?} -> {:?}",
            self.key, local, remote, freshness
        );
        Ok(freshness)
    }

    /// Marker the next write should carry, without persisting it
    ///
    /// A stored value that does not parse restarts the sequence at 1.
    pub async fn next_marker(&self) -> Result<VersionMarker> {
        let next = match self.stored().await? {
            Stored::Missing => self.strategy.next(None),
            Stored::Invalid => VersionMarker(1),
            Stored::Marker(current) => self.strategy.next(Some(current)),
        };
        Ok(next)
    }

    /// Persist a marker after its remote write succeeded
    pub async fn confirm_write(&self, marker: VersionMarker) -> Result<()> {
        self.store.set_string(&self.key, &marker.to_string()).await?;
        debug!("Local marker {} = {}", self.key, marker);
        Ok(())
    }

    /// Compute, persist and return the next marker
    pub async fn record_write(&self) -> Result<VersionMarker> {
        let marker = self.next_marker().await?;
        self.confirm_write(marker).await?;
        Ok(marker)
    }

    /// Take over the remote marker after reading remote data
    ///
    /// Returns the adopted marker, or `None` when the remote value does not
    /// coerce (the local marker is left alone then).
    pub async fn adopt(&self, remote: &Value) -> Result<Option<VersionMarker>> {
        match VersionMarker::from_value(remote) {
            Some(marker) => {
                self.confirm_write(marker).await?;
                Ok(Some(marker))
            }
            None => Ok(None),
        }
    }

    /// Forget the local marker
    pub async fn reset(&self) -> Result<()> {
        self.store.remove(&self.key).await
    }
}
