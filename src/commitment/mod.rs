pub mod merkle;
pub mod tiles;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::{
    errors::ProvenanceResult,
    types::{Hash32, ImageData},
    utils::{short_hex, PerformanceTimer},
};

pub use merkle::{MerklePath, MerkleTree};
pub use tiles::TileSet;

/// Merkle commitment to a tiled image.
///
/// The root is a pure function of the pixel bytes and the tile size:
/// committing the same image twice yields the identical root, and changing
/// any single tile byte changes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// Merkle root over the tile hashes
    #[serde(with = "hex")]
    pub root: Hash32,
    /// Tree depth (hashing levels above the leaves)
    pub depth: u32,
    /// Number of leaves / tiles
    pub leaf_count: u32,
    /// Tile width in pixels
    pub tile_width: u32,
    /// Tile height in pixels
    pub tile_height: u32,
    /// Tiles per row
    pub grid_width: u32,
    /// Tiles per column
    pub grid_height: u32,
}

impl Commitment {
    /// Hex prefix of the root for log lines
    pub fn short_id(&self) -> String {
        short_hex(&self.root)
    }
}

/// Commit to an image: tile it, hash each tile, build the Merkle tree.
pub fn commit(
    image: &ImageData,
    tile_width: u32,
    tile_height: u32,
) -> ProvenanceResult<Commitment> {
    let timer = PerformanceTimer::new("commit");
    let tile_set = TileSet::from_image(image, tile_width, tile_height)?;
    let commitment = commit_tile_set(&tile_set);
    debug!(
        "Committed {}x{} image as {} tiles, root {} in {}ms",
        image.width,
        image.height,
        commitment.leaf_count,
        commitment.short_id(),
        timer.elapsed_ms()
    );
    Ok(commitment)
}

/// Commit to an already-tiled image
pub fn commit_tile_set(tile_set: &TileSet) -> Commitment {
    let tree = MerkleTree::from_tiles(&tile_set.tiles);
    Commitment {
        root: tree.root(),
        depth: tree.depth(),
        leaf_count: tree.leaf_count() as u32,
        tile_width: tile_set.tile_width,
        tile_height: tile_set.tile_height,
        grid_width: tile_set.grid_width,
        grid_height: tile_set.grid_height,
    }
}
