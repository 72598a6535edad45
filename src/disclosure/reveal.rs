use log::debug;
use serde::{Deserialize, Serialize};

use crate::commitment::{Commitment, MerklePath, MerkleTree, TileSet};
use crate::core::{
    errors::{ProvenanceError, ProvenanceResult},
    types::{Hash32, RegionDescriptor},
    utils::{compute_sha256, short_hex},
};

/// One disclosed tile: raw bytes plus the sibling path back to the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedTile {
    /// Row-major tile index
    pub index: u32,
    /// Raw tile bytes, including any boundary padding
    pub bytes: Vec<u8>,
    pub path: MerklePath,
}

/// Inclusion proof for the tiles overlapping one region.
///
/// Verification recomputes each leaf hash from the revealed bytes and walks
/// the sibling path; every path must land on the committed root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealProof {
    /// Root of the commitment the tiles belong to
    #[serde(with = "hex")]
    pub root: Hash32,
    pub region: RegionDescriptor,
    pub tile_width: u32,
    pub tile_height: u32,
    pub grid_width: u32,
    pub grid_height: u32,
    pub revealed: Vec<RevealedTile>,
}

/// Package the tiles overlapping `region` with their Merkle paths
pub fn reveal(
    commitment: &Commitment,
    tile_set: &TileSet,
    region: &RegionDescriptor,
) -> ProvenanceResult<RevealProof> {
    let tree = consistent_tree(commitment, tile_set)?;

    let indices = region.overlapping_tiles(
        commitment.tile_width,
        commitment.tile_height,
        commitment.grid_width,
        commitment.grid_height,
    );
    if indices.is_empty() {
        return Err(ProvenanceError::MalformedEncoding(format!(
            "region {}x{}+{}+{} overlaps no tiles",
            region.width, region.height, region.x, region.y
        )));
    }

    let mut revealed = Vec::with_capacity(indices.len());
    for index in indices {
        let path = tree
            .path(index)
            .ok_or_else(|| ProvenanceError::MalformedEncoding(format!(
                "tile index {} outside the grid",
                index
            )))?;
        revealed.push(RevealedTile {
            index,
            bytes: tile_set.tiles[index as usize].clone(),
            path,
        });
    }

    debug!(
        "Revealed {} tiles of commitment {}",
        revealed.len(),
        commitment.short_id()
    );
    Ok(RevealProof {
        root: commitment.root,
        region: *region,
        tile_width: commitment.tile_width,
        tile_height: commitment.tile_height,
        grid_width: commitment.grid_width,
        grid_height: commitment.grid_height,
        revealed,
    })
}

/// Check a reveal proof against a commitment root. Any mismatch returns
/// false; this never errors.
pub fn verify_reveal(root: &Hash32, proof: &RevealProof) -> bool {
    if proof.root != *root || proof.revealed.is_empty() {
        return false;
    }

    // The revealed set must be exactly the tiles the region overlaps
    let mut expected = proof.region.overlapping_tiles(
        proof.tile_width,
        proof.tile_height,
        proof.grid_width,
        proof.grid_height,
    );
    expected.sort_unstable();
    let mut actual: Vec<u32> = proof.revealed.iter().map(|tile| tile.index).collect();
    actual.sort_unstable();
    if expected != actual {
        return false;
    }

    for tile in &proof.revealed {
        if tile.path.leaf_index != tile.index {
            return false;
        }
        let leaf = compute_sha256(&tile.bytes);
        if !tile.path.verify(root, &leaf) {
            debug!(
                "Reveal rejected: tile {} does not reach root {}",
                tile.index,
                short_hex(root)
            );
            return false;
        }
    }
    true
}

/// Rebuild the tree and insist the tile set actually matches the commitment
pub(crate) fn consistent_tree(
    commitment: &Commitment,
    tile_set: &TileSet,
) -> ProvenanceResult<MerkleTree> {
    let tree = MerkleTree::from_tiles(&tile_set.tiles);
    if tree.root() != commitment.root {
        return Err(ProvenanceError::VerificationFailed {
            reason: format!(
                "tile set root {} does not match commitment {}",
                short_hex(&tree.root()),
                commitment.short_id()
            ),
        });
    }
    Ok(tree)
}
