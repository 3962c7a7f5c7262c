// Synthetic primary keys for auto-keyed tables.
//
// The engine has no auto-increment, so keys are minted client-side. Both
// strategies produce 18-digit values that fit a `bigint` column.
use crate::models::SyntheticKey;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

pub trait KeyGenerator: Send + Sync {
    fn next_key(&self) -> SyntheticKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    #[default]
    Uuid,
    Sequential,
}

/// First 18 decimal digits of a random UUIDv4.
///
/// Not collision-free: uniqueness is only probabilistic.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncatedUuidKeys;

impl KeyGenerator for TruncatedUuidKeys {
    fn next_key(&self) -> SyntheticKey {
        loop {
            // The v4 version nibble sits at bit 76, so the decimal form always
            // has more than 18 digits and a non-zero leading digit.
            let digits = Uuid::new_v4().as_u128().to_string();
            if let Some(key) = digits
                .get(..SyntheticKey::DIGITS)
                .and_then(|prefix| prefix.parse::<i64>().ok())
                .and_then(SyntheticKey::new)
            {
                return key;
            }
        }
    }
}

/// Node id plus a per-process counter: `1 NNNN CCCCCCCCCCCCC`.
///
/// Unique across nodes with distinct ids as long as the counter, seeded from
/// the wall clock in milliseconds, is not outrun across restarts.
#[derive(Debug)]
pub struct SequentialKeys {
    node_id: u16,
    counter: AtomicU64,
}

impl SequentialKeys {
    const NODE_LIMIT: u16 = 10_000;
    const COUNTER_SPAN: u64 = 10_000_000_000_000;

    pub fn new(node_id: u16) -> Self {
        let seed = chrono::Utc::now().timestamp_millis().max(0) as u64;
        Self::with_seed(node_id, seed)
    }

    pub fn with_seed(node_id: u16, seed: u64) -> Self {
        Self {
            node_id: node_id % Self::NODE_LIMIT,
            counter: AtomicU64::new(seed % Self::COUNTER_SPAN),
        }
    }
}

impl KeyGenerator for SequentialKeys {
    fn next_key(&self) -> SyntheticKey {
        let count = self.counter.fetch_add(1, Ordering::Relaxed) % Self::COUNTER_SPAN;
        let value = SyntheticKey::MIN
            + self.node_id as i64 * Self::COUNTER_SPAN as i64
            + count as i64;
        SyntheticKey::new(value).unwrap_or_else(|| {
            unreachable!("node id and counter are bounded below 10^17")
        })
    }
}

impl KeyStrategy {
    pub fn generator(self, node_id: u16) -> Box<dyn KeyGenerator> {
        match self {
            KeyStrategy::Uuid => Box::new(TruncatedUuidKeys),
            KeyStrategy::Sequential => Box::new(SequentialKeys::new(node_id)),
        }
    }
}
