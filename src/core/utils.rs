use crc::{Crc, CRC_32_ISO_HDLC};
use log::debug;
use sha2::{Digest, Sha256};

use crate::core::types::{ChainId, Hash32};

/// Compute SHA256 hash of data
pub fn compute_sha256(data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute SHA256 of two concatenated slices (Merkle parent nodes)
pub fn compute_sha256_pair(left: &[u8], right: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Fast CRC32 checksum guarding the compact export trailer
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
    CRC.checksum(data)
}

/// Derive a chain id from the genesis root and an anchor nonce
pub fn generate_chain_id(genesis_root: &Hash32, anchor_nonce: u64) -> ChainId {
    let mut data = Vec::with_capacity(32 + 8 + 8);
    data.extend_from_slice(b"chain-id");
    data.extend_from_slice(genesis_root);
    data.extend_from_slice(&anchor_nonce.to_be_bytes());
    compute_sha256(&data)
}

/// Short hex prefix for log lines
pub fn short_hex(bytes: &[u8]) -> String {
    hex::encode(&bytes[..bytes.len().min(8)])
}

/// Performance timing utilities
pub struct PerformanceTimer {
    start_time: std::time::Instant,
    operation_name: String,
}

impl PerformanceTimer {
    pub fn new(operation_name: &str) -> Self {
        Self {
            start_time: std::time::Instant::now(),
            operation_name: operation_name.to_string(),
        }
    }

    pub fn elapsed_ms(&self) -> u32 {
        self.start_time.elapsed().as_millis() as u32
    }

    pub fn finish(self) -> u32 {
        let elapsed = self.elapsed_ms();
        debug!("{} completed in {}ms", self.operation_name, elapsed);
        elapsed
    }
}
