use serde::{Deserialize, Serialize};

use crate::core::errors::{ProvenanceError, ProvenanceResult};

// Commitment Consensus Constants
pub const HASH_SIZE: usize = 32; // SHA256 output size
pub const DEFAULT_TILE_WIDTH: u32 = 32; // Default tile edge in pixels
pub const DEFAULT_TILE_HEIGHT: u32 = 32;
pub const MAX_IMAGE_DIMENSION: u32 = 65536; // Reject absurd width/height up front
pub const MAX_BYTES_PER_PIXEL: u32 = 8; // Up to 16-bit RGBA

// Signature Consensus Constants
pub const CURVE_SCALAR_SIZE: usize = 32; // P-256 field element width
pub const RAW_SIGNATURE_SIZE: usize = 64; // r || s concatenation
pub const SEC1_COMPRESSED_SIZE: usize = 33;
pub const SEC1_UNCOMPRESSED_SIZE: usize = 65;
pub const WRAPPED_KEY_DIGEST_SIZE: usize = 32; // Hardware-wrapper key fingerprint

// Export Format Consensus Constants
pub const EXPORT_FORMAT_VERSION: u32 = 1; // Full JSON document version
pub const COMPACT_MAGIC: &[u8; 4] = b"IPEX"; // 4-byte magic for the compact encoding
pub const COMPACT_FORMAT_VERSION: u16 = 1;
pub const URL_PROOF_PARAM: &str = "proof"; // Query parameter carrying the compact payload

// Orchestration Defaults
pub const DEFAULT_EVALUATOR_TIMEOUT_MS: u64 = 2_000; // Circuit evaluator call budget
pub const DEFAULT_BATCH_CONCURRENCY: usize = 8;
pub const DEFAULT_REGISTRY_CAPACITY: usize = 1024; // Chains kept before exported ones are evicted

/// SHA256 digest
pub type Hash32 = [u8; 32];

/// Chain identifier (SHA256 of genesis root and anchor nonce)
pub type ChainId = [u8; 32];

/// Raw decoded image: row-major pixel bytes, no compression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per pixel (1 = grayscale, 3 = RGB, 4 = RGBA)
    pub bytes_per_pixel: u32,
    /// Pixel buffer, exactly width * height * bytes_per_pixel bytes
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn new(
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
        pixels: Vec<u8>,
    ) -> ProvenanceResult<Self> {
        if width == 0 || height == 0 || width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION
        {
            return Err(ProvenanceError::InvalidDimensions { width, height });
        }
        if bytes_per_pixel == 0 || bytes_per_pixel > MAX_BYTES_PER_PIXEL {
            return Err(ProvenanceError::MalformedEncoding(format!(
                "unsupported bytes per pixel: {}",
                bytes_per_pixel
            )));
        }
        let expected = width as usize * height as usize * bytes_per_pixel as usize;
        if pixels.len() != expected {
            return Err(ProvenanceError::MalformedEncoding(format!(
                "pixel buffer is {} bytes, expected {} for {}x{}x{}",
                pixels.len(),
                expected,
                width,
                height,
                bytes_per_pixel
            )));
        }
        Ok(Self {
            width,
            height,
            bytes_per_pixel,
            pixels,
        })
    }

    /// Bytes in one pixel row
    pub fn row_stride(&self) -> usize {
        self.width as usize * self.bytes_per_pixel as usize
    }
}

/// Rectangular pixel region selected for disclosure or redaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDescriptor {
    /// Left edge in pixels
    pub x: u32,
    /// Top edge in pixels
    pub y: u32,
    /// Region width in pixels
    pub width: u32,
    /// Region height in pixels
    pub height: u32,
}

impl RegionDescriptor {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> ProvenanceResult<Self> {
        if width == 0 || height == 0 {
            return Err(ProvenanceError::MalformedEncoding(format!(
                "empty region: {}x{}",
                width, height
            )));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Row-major indices of grid tiles this region overlaps, clipped to the grid
    pub fn overlapping_tiles(
        &self,
        tile_width: u32,
        tile_height: u32,
        grid_width: u32,
        grid_height: u32,
    ) -> Vec<u32> {
        if self.width == 0 || self.height == 0 || grid_width == 0 || grid_height == 0 {
            return Vec::new();
        }
        let first_col = self.x / tile_width;
        let first_row = self.y / tile_height;
        if first_col >= grid_width || first_row >= grid_height {
            return Vec::new();
        }

        // Last covered pixel, inclusive; widened so x + width near u32::MAX
        // cannot overflow
        let last_col = ((self.x as u64 + self.width as u64 - 1) / tile_width as u64)
            .min(grid_width as u64 - 1) as u32;
        let last_row = ((self.y as u64 + self.height as u64 - 1) / tile_height as u64)
            .min(grid_height as u64 - 1) as u32;

        let mut indices = Vec::new();
        for row in first_row..=last_row {
            for col in first_col..=last_col {
                indices.push(row * grid_width + col);
            }
        }
        indices
    }
}

/// Declared edit applied between two commitments in a proof chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformationDescriptor {
    Crop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    Resize {
        width: u32,
        height: u32,
    },
    Rotate {
        degrees: u16,
    },
    Grayscale,
    Brightness {
        delta: i16,
    },
    Blur {
        radius: u32,
    },
    Redaction {
        regions: Vec<RegionDescriptor>,
    },
    /// Escape hatch for transformations the core does not model
    Custom {
        name: String,
        params: String,
    },
}

impl TransformationDescriptor {
    /// Stable bytes fed to the circuit evaluator
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // serde_json output is deterministic for these shapes
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Pixel fill applied to redacted tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionStyle {
    /// All-zero bytes
    Blackout,
    /// Alternating 0x00/0xFF pixels, deterministic per tile
    Checkerboard,
}

/// How much confidence a caller demands from signature verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrictnessPolicy {
    /// Only a completed cryptographic check passes
    #[default]
    Strict,
    /// A structurally valid package with an unverifiable key also passes
    Lenient,
}
