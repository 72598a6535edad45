use std::collections::BTreeSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::commitment::{Commitment, MerkleTree, TileSet};
use crate::core::{
    errors::{ProvenanceError, ProvenanceResult},
    types::{Hash32, RedactionStyle, RegionDescriptor},
    utils::compute_sha256,
};
use crate::disclosure::reveal::consistent_tree;

/// Replacement bytes for one redacted tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedTile {
    /// Row-major tile index
    pub index: u32,
    /// Tile bytes after the redaction fill
    pub bytes: Vec<u8>,
}

/// Proof that declared regions were obscured while everything else is
/// provably unchanged.
///
/// Carries the full original leaf vector: untouched tiles appear as the same
/// leaves in both trees, so "outside the regions nothing changed" holds by
/// construction once both roots recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionProof {
    #[serde(with = "hex")]
    pub original_root: Hash32,
    #[serde(with = "hex")]
    pub redacted_root: Hash32,
    pub regions: Vec<RegionDescriptor>,
    pub style: RedactionStyle,
    pub tile_width: u32,
    pub tile_height: u32,
    pub grid_width: u32,
    pub grid_height: u32,
    /// Indices of intentionally altered tiles, sorted ascending
    pub touched: Vec<u32>,
    /// SHA256 of every original tile, row-major
    pub original_leaves: Vec<Hash32>,
    /// Replacement bytes for each touched tile, same order as `touched`
    pub redacted_tiles: Vec<RedactedTile>,
}

/// Obscure the tiles under `regions` and build the scope proof.
/// Returns the proof plus the redacted tile set for rendering.
pub fn redact(
    commitment: &Commitment,
    tile_set: &TileSet,
    regions: &[RegionDescriptor],
    style: RedactionStyle,
) -> ProvenanceResult<(RedactionProof, TileSet)> {
    if regions.is_empty() {
        return Err(ProvenanceError::MalformedEncoding(
            "redaction needs at least one region".into(),
        ));
    }
    let tree = consistent_tree(commitment, tile_set)?;
    let original_leaves = tree.leaves().to_vec();

    let mut candidates = BTreeSet::new();
    for region in regions {
        for index in region.overlapping_tiles(
            commitment.tile_width,
            commitment.tile_height,
            commitment.grid_width,
            commitment.grid_height,
        ) {
            candidates.insert(index);
        }
    }
    if candidates.is_empty() {
        return Err(ProvenanceError::MalformedEncoding(
            "regions overlap no tiles".into(),
        ));
    }

    let mut redacted_set = tile_set.clone();
    let mut touched = Vec::new();
    let mut redacted_tiles = Vec::new();
    for index in candidates {
        let original = &tile_set.tiles[index as usize];
        let fill = fill_tile(tile_set, style);
        // A tile the fill cannot change (e.g. blackout of an all-black tile)
        // stays in the untouched set; the difference invariant must hold for
        // every tile we declare altered
        if fill == *original {
            continue;
        }
        redacted_set.tiles[index as usize] = fill.clone();
        touched.push(index);
        redacted_tiles.push(RedactedTile { index, bytes: fill });
    }

    let redacted_root = MerkleTree::from_tiles(&redacted_set.tiles).root();
    debug!(
        "Redacted {} of {} tiles ({:?})",
        touched.len(),
        tile_set.tile_count(),
        style
    );

    let proof = RedactionProof {
        original_root: commitment.root,
        redacted_root,
        regions: regions.to_vec(),
        style,
        tile_width: commitment.tile_width,
        tile_height: commitment.tile_height,
        grid_width: commitment.grid_width,
        grid_height: commitment.grid_height,
        touched,
        original_leaves,
        redacted_tiles,
    };
    Ok((proof, redacted_set))
}

/// Check redaction scope against the original commitment root.
///
/// Verifies that untouched tiles hash-match the original commitment, that
/// every touched tile lies inside a declared region and genuinely differs
/// from the original, and that the touched substitution reproduces the
/// declared redacted root. Redaction quality is out of scope.
pub fn verify_redaction(original_root: &Hash32, proof: &RedactionProof) -> bool {
    if proof.original_root != *original_root {
        return false;
    }
    let leaf_count = (proof.grid_width as usize).saturating_mul(proof.grid_height as usize);
    if proof.original_leaves.len() != leaf_count {
        return false;
    }
    if MerkleTree::from_leaves(proof.original_leaves.clone()).root() != *original_root {
        return false;
    }

    // Touched tiles must all fall inside the declared regions
    let mut allowed = BTreeSet::new();
    for region in &proof.regions {
        for index in region.overlapping_tiles(
            proof.tile_width,
            proof.tile_height,
            proof.grid_width,
            proof.grid_height,
        ) {
            allowed.insert(index);
        }
    }
    if proof.touched.is_empty()
        || proof.touched.len() != proof.redacted_tiles.len()
        || proof.touched.iter().any(|index| !allowed.contains(index))
    {
        return false;
    }

    let mut redacted_leaves = proof.original_leaves.clone();
    for (index, tile) in proof.touched.iter().zip(&proof.redacted_tiles) {
        if *index != tile.index || *index as usize >= redacted_leaves.len() {
            return false;
        }
        let leaf = compute_sha256(&tile.bytes);
        // An "altered" tile identical to the original would let a prover
        // claim redaction without changing anything
        if leaf == proof.original_leaves[*index as usize] {
            return false;
        }
        redacted_leaves[*index as usize] = leaf;
    }

    MerkleTree::from_leaves(redacted_leaves).root() == proof.redacted_root
}

/// Deterministic replacement bytes for one tile
fn fill_tile(tile_set: &TileSet, style: RedactionStyle) -> Vec<u8> {
    let len = tile_set.tile_byte_len();
    match style {
        RedactionStyle::Blackout => vec![0u8; len],
        RedactionStyle::Checkerboard => {
            let bpp = tile_set.bytes_per_pixel as usize;
            let width = tile_set.tile_width as usize;
            let mut bytes = vec![0u8; len];
            for (pixel, chunk) in bytes.chunks_mut(bpp).enumerate() {
                let row = pixel / width;
                let col = pixel % width;
                if (row + col) % 2 == 1 {
                    chunk.fill(0xff);
                }
            }
            bytes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::commit;
    use crate::core::types::ImageData;

    fn setup() -> (Commitment, TileSet) {
        let pixels: Vec<u8> = (0..128usize * 96)
            .map(|i| (i % 253) as u8 | 0x10)
            .collect();
        let image = ImageData::new(128, 96, 1, pixels).unwrap();
        let tile_set = TileSet::from_image(&image, 32, 32).unwrap();
        let commitment = commit(&image, 32, 32).unwrap();
        (commitment, tile_set)
    }

    #[test]
    fn test_redaction_scope_holds() {
        let (commitment, tile_set) = setup();
        let regions = [RegionDescriptor::new(32, 32, 64, 32).unwrap()];
        let (proof, redacted_set) =
            redact(&commitment, &tile_set, &regions, RedactionStyle::Blackout).unwrap();

        assert!(verify_redaction(&commitment.root, &proof));

        // Tiles outside the region hash-match the original commitment
        let original_tree = MerkleTree::from_tiles(&tile_set.tiles);
        let redacted_tree = MerkleTree::from_tiles(&redacted_set.tiles);
        for index in 0..tile_set.tile_count() {
            let inside = proof.touched.contains(&(index as u32));
            let same = original_tree.leaves()[index] == redacted_tree.leaves()[index];
            assert_eq!(same, !inside, "tile {}", index);
        }
        assert_eq!(redacted_tree.root(), proof.redacted_root);
    }

    #[test]
    fn test_checkerboard_style() {
        let (commitment, tile_set) = setup();
        let regions = [RegionDescriptor::new(0, 0, 32, 32).unwrap()];
        let (proof, _) = redact(
            &commitment,
            &tile_set,
            &regions,
            RedactionStyle::Checkerboard,
        )
        .unwrap();
        assert!(verify_redaction(&commitment.root, &proof));
        assert_eq!(proof.touched, vec![0]);
    }

    #[test]
    fn test_touched_outside_region_rejected() {
        let (commitment, tile_set) = setup();
        let regions = [RegionDescriptor::new(0, 0, 32, 32).unwrap()];
        let (mut proof, _) =
            redact(&commitment, &tile_set, &regions, RedactionStyle::Blackout).unwrap();
        // Claim an extra altered tile outside the declared region
        proof.touched.push(5);
        proof.redacted_tiles.push(RedactedTile {
            index: 5,
            bytes: vec![0u8; tile_set.tile_byte_len()],
        });
        assert!(!verify_redaction(&commitment.root, &proof));
    }

    #[test]
    fn test_unchanged_touched_tile_rejected() {
        let (commitment, tile_set) = setup();
        let regions = [RegionDescriptor::new(0, 0, 32, 32).unwrap()];
        let (mut proof, _) =
            redact(&commitment, &tile_set, &regions, RedactionStyle::Blackout).unwrap();
        // Swap the replacement bytes back to the original tile content
        proof.redacted_tiles[0].bytes = tile_set.tiles[0].clone();
        assert!(!verify_redaction(&commitment.root, &proof));
    }

    #[test]
    fn test_forged_original_leaves_rejected() {
        let (commitment, tile_set) = setup();
        let regions = [RegionDescriptor::new(0, 0, 32, 32).unwrap()];
        let (mut proof, _) =
            redact(&commitment, &tile_set, &regions, RedactionStyle::Blackout).unwrap();
        proof.original_leaves[7] = [0u8; 32];
        assert!(!verify_redaction(&commitment.root, &proof));
    }

    #[test]
    fn test_blackout_of_black_tile_left_untouched() {
        // Image already all-zero: blackout cannot change anything
        let image = ImageData::new(64, 64, 1, vec![0u8; 64 * 64]).unwrap();
        let tile_set = TileSet::from_image(&image, 32, 32).unwrap();
        let commitment = commit(&image, 32, 32).unwrap();
        let regions = [RegionDescriptor::new(0, 0, 64, 64).unwrap()];
        let (proof, _) =
            redact(&commitment, &tile_set, &regions, RedactionStyle::Blackout).unwrap();
        // No tile could be altered, so the proof declares none touched and
        // fails verification rather than claiming an empty redaction
        assert!(proof.touched.is_empty());
        assert!(!verify_redaction(&commitment.root, &proof));
    }

    #[test]
    fn test_empty_regions_rejected() {
        let (commitment, tile_set) = setup();
        assert!(matches!(
            redact(&commitment, &tile_set, &[], RedactionStyle::Blackout),
            Err(ProvenanceError::MalformedEncoding(_))
        ));
    }
}
