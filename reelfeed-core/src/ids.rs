//! Video id allocation.
//!
//! Snowflake layout, most significant bit first:
//! 1 unused sign bit, 41 bits of milliseconds since [`SNOWFLAKE_EPOCH_MS`],
//! 10 bits of node id, 12 bits of per-millisecond sequence.

use chrono::Utc;
use parking_lot::Mutex;

use crate::video::VideoId;

/// 2024-01-01T00:00:00Z in Unix milliseconds.
pub const SNOWFLAKE_EPOCH_MS: i64 = 1_704_067_200_000;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;
const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

/// Source of never-reused video ids.
pub trait IdGenerator: Send + Sync + std::fmt::Debug {
    /// Allocates the next id.
    fn next_id(&self) -> VideoId;
}

/// Errors raised when configuring id generation.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error("Node id {node_id} exceeds maximum {max}")]
    NodeIdOutOfRange { node_id: u16, max: u16 },
}

#[derive(Debug)]
struct SnowflakeState {
    last_ms: i64,
    sequence: u16,
}

/// Time-ordered distributed id generator.
///
/// Ids from one generator strictly increase, even when the wall clock steps
/// backwards or a millisecond's sequence space runs out: the generator then
/// borrows from the next logical millisecond instead of sleeping.
#[derive(Debug)]
pub struct SnowflakeGenerator {
    node_id: u16,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeGenerator {
    /// Creates a generator for `node_id`.
    ///
    /// # Errors
    ///
    /// - `IdError::NodeIdOutOfRange` - Node id does not fit in 10 bits
    pub fn new(node_id: u16) -> Result<Self, IdError> {
        if node_id > MAX_NODE_ID {
            return Err(IdError::NodeIdOutOfRange {
                node_id,
                max: MAX_NODE_ID,
            });
        }

        Ok(Self {
            node_id,
            state: Mutex::new(SnowflakeState {
                last_ms: 0,
                sequence: 0,
            }),
        })
    }

    /// Node id embedded in every generated id.
    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    fn allocate(&self, now_ms: i64) -> VideoId {
        let mut state = self.state.lock();
        let elapsed = (now_ms - SNOWFLAKE_EPOCH_MS).max(0);

        if elapsed > state.last_ms {
            state.last_ms = elapsed;
            state.sequence = 0;
        } else if state.sequence < MAX_SEQUENCE {
            state.sequence += 1;
        } else {
            state.last_ms += 1;
            state.sequence = 0;
        }

        let raw = (state.last_ms << (NODE_BITS + SEQUENCE_BITS))
            | (i64::from(self.node_id) << SEQUENCE_BITS)
            | i64::from(state.sequence);
        VideoId(raw)
    }
}

impl IdGenerator for SnowflakeGenerator {
    fn next_id(&self) -> VideoId {
        self.allocate(Utc::now().timestamp_millis())
    }
}

/// Splits a snowflake id into (milliseconds since epoch, node id, sequence).
pub fn decompose(id: VideoId) -> (i64, u16, u16) {
    let raw = id.as_i64();
    let sequence = (raw & i64::from(MAX_SEQUENCE)) as u16;
    let node = ((raw >> SEQUENCE_BITS) & i64::from(MAX_NODE_ID)) as u16;
    let millis = raw >> (NODE_BITS + SEQUENCE_BITS);
    (millis, node, sequence)
}
