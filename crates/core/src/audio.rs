//! Audio frame types
//!
//! Audio is opaque to the engine: frames carry encoded bytes between the
//! telephony transport and the external speech services without the engine
//! inspecting samples.

use chrono::{DateTime, Utc};

/// One binary audio frame on the duplex call connection
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub bytes: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl AudioFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            timestamp: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<Vec<u8>> for AudioFrame {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}
