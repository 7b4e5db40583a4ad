//! Per-interaction event identity
//!
//! Every id is drawn independently: no counter, no shared state. The OS
//! CSPRNG is preferred; if it cannot be read, a freshly seeded PRNG supplies
//! the bytes instead. Both paths go through the RFC 4122 v4 layout so
//! format-validating collectors accept the value.

use rand::rngs::{OsRng, SmallRng};
use rand::{Rng, SeedableRng, TryRngCore};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use uuid::{Builder, Uuid, Version};

/// Deduplication token attached to every tracked event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Uuid", into = "Uuid")]
pub struct EventId(Uuid);

impl EventId {
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse a hyphenated id, accepting only v4 values
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::try_parse(value).ok().and_then(|u| Self::try_from(u).ok())
    }
}

impl TryFrom<Uuid> for EventId {
    type Error = String;

    fn try_from(value: Uuid) -> Result<Self, Self::Error> {
        if value.get_version() == Some(Version::Random)
            && value.get_variant() == uuid::Variant::RFC4122
        {
            Ok(Self(value))
        } else {
            Err(format!("event id {value} is not a version-4 uuid"))
        }
    }
}

impl From<EventId> for Uuid {
    fn from(value: EventId) -> Self {
        value.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

/// Source of event ids. Injected into the listener so tests can pin ids.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> EventId;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> EventId {
        generate_event_id()
    }
}

pub fn generate_event_id() -> EventId {
    let mut bytes = [0u8; 16];
    if let Err(err) = OsRng.try_fill_bytes(&mut bytes) {
        debug!(error = %err, "OS random source unavailable, using seeded fallback");
        bytes = fallback_bytes();
    }
    from_random_bytes(bytes)
}

fn from_random_bytes(bytes: [u8; 16]) -> EventId {
    EventId(Builder::from_random_bytes(bytes).into_uuid())
}

fn fallback_bytes() -> [u8; 16] {
    // RandomState keys are randomized per instance, so two calls in the same
    // nanosecond still seed differently.
    let mut hasher = RandomState::new().build_hasher();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    hasher.write_u128(nanos);
    let mut rng = SmallRng::seed_from_u64(hasher.finish());
    rng.random::<[u8; 16]>()
}
