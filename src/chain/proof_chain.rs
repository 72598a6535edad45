use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::chain::evaluator::{
    prove_with_timeout, verify_with_timeout, CircuitEvaluator, EvaluatorOptions,
};
use crate::commitment::{commit, Commitment};
use crate::core::{
    errors::{ProvenanceError, ProvenanceResult},
    types::{ChainId, Hash32, ImageData, TransformationDescriptor},
    utils::{generate_chain_id, short_hex, PerformanceTimer},
};

/// One node in a transformation proof chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofLink {
    /// Position in the chain, 0-based
    pub index: u32,
    /// Commitment root of the image before this transformation
    #[serde(with = "hex")]
    pub input_root: Hash32,
    /// Commitment root of the image after this transformation
    #[serde(with = "hex")]
    pub output_root: Hash32,
    /// The declared edit
    pub transformation: TransformationDescriptor,
    /// Opaque proof bytes from the circuit evaluator
    pub proof_blob: Vec<u8>,
}

/// Append-only sequence of transformation proofs anchored at a genesis
/// commitment.
///
/// Linkage invariant: `links[0].input_root == genesis_root` and
/// `links[i].output_root == links[i+1].input_root`. Prior links are never
/// mutated; an exported chain is a read-only snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofChain {
    #[serde(with = "hex")]
    pub chain_id: ChainId,
    #[serde(with = "hex")]
    pub genesis_root: Hash32,
    /// Tile size every commitment in this chain uses
    pub tile_width: u32,
    pub tile_height: u32,
    pub links: Vec<ProofLink>,
    /// Set on export; an exported chain refuses further extension
    pub exported: bool,
}

impl ProofChain {
    /// Anchor a new chain at a genesis commitment (depth 0)
    pub fn anchor(genesis: &Commitment) -> Self {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::anchor_with_nonce(genesis, nonce)
    }

    /// Anchor with an explicit nonce, for callers that manage uniqueness
    pub fn anchor_with_nonce(genesis: &Commitment, nonce: u64) -> Self {
        let chain_id = generate_chain_id(&genesis.root, nonce);
        info!(
            "Anchored chain {} at genesis root {}",
            short_hex(&chain_id),
            genesis.short_id()
        );
        Self {
            chain_id,
            genesis_root: genesis.root,
            tile_width: genesis.tile_width,
            tile_height: genesis.tile_height,
            links: Vec::new(),
            exported: false,
        }
    }

    /// Rebuild a chain from imported parts, validating the linkage invariant.
    /// The result is a read-only snapshot.
    pub fn from_parts(
        chain_id: ChainId,
        genesis_root: Hash32,
        tile_width: u32,
        tile_height: u32,
        links: Vec<ProofLink>,
    ) -> ProvenanceResult<Self> {
        let mut expected_input = genesis_root;
        for (i, link) in links.iter().enumerate() {
            if link.index as usize != i {
                return Err(ProvenanceError::MalformedEncoding(format!(
                    "link {} carries index {}",
                    i, link.index
                )));
            }
            if link.input_root != expected_input {
                return Err(ProvenanceError::LinkageMismatch {
                    expected: hex::encode(expected_input),
                    actual: hex::encode(link.input_root),
                });
            }
            expected_input = link.output_root;
        }
        Ok(Self {
            chain_id,
            genesis_root,
            tile_width,
            tile_height,
            links,
            exported: true,
        })
    }

    /// Output root of the chain as currently extended
    pub fn current_output_root(&self) -> Hash32 {
        self.links
            .last()
            .map(|link| link.output_root)
            .unwrap_or(self.genesis_root)
    }

    /// Number of links
    pub fn depth(&self) -> u32 {
        self.links.len() as u32
    }

    pub fn short_id(&self) -> String {
        short_hex(&self.chain_id)
    }

    /// Append a prepared link. The declared input must equal the current
    /// output root; exported chains are read-only.
    pub fn append_link(
        &mut self,
        transformation: TransformationDescriptor,
        input_root: Hash32,
        output_root: Hash32,
        proof_blob: Vec<u8>,
    ) -> ProvenanceResult<&ProofLink> {
        if self.exported {
            return Err(ProvenanceError::ChainReadOnly {
                chain_id: self.short_id(),
            });
        }
        let current = self.current_output_root();
        if input_root != current {
            return Err(ProvenanceError::LinkageMismatch {
                expected: hex::encode(current),
                actual: hex::encode(input_root),
            });
        }
        let link = ProofLink {
            index: self.links.len() as u32,
            input_root,
            output_root,
            transformation,
            proof_blob,
        };
        debug!(
            "Chain {} extended to depth {} (output root {})",
            self.short_id(),
            self.links.len() + 1,
            short_hex(&link.output_root)
        );
        self.links.push(link);
        Ok(self.links.last().expect("just pushed"))
    }

    /// Commit the transformed image, obtain a proof blob from the evaluator,
    /// and append the resulting link.
    pub fn extend(
        &mut self,
        transformation: TransformationDescriptor,
        new_image: &ImageData,
        evaluator: &Arc<dyn CircuitEvaluator>,
        options: EvaluatorOptions,
    ) -> ProvenanceResult<&ProofLink> {
        if self.exported {
            return Err(ProvenanceError::ChainReadOnly {
                chain_id: self.short_id(),
            });
        }
        let timer = PerformanceTimer::new("chain_extend");
        let input_root = self.current_output_root();
        let output = commit(new_image, self.tile_width, self.tile_height)?;
        let proof_blob = prove_with_timeout(
            evaluator,
            &transformation,
            &input_root,
            &output.root,
            &new_image.pixels,
            options,
        )?;
        let link = self.append_link(transformation, input_root, output.root, proof_blob)?;
        timer.finish();
        Ok(link)
    }

    /// Walk every link: check the linkage invariant and ask the evaluator to
    /// verify each proof blob. Returns false at the first failure.
    pub fn verify(
        &self,
        evaluator: &Arc<dyn CircuitEvaluator>,
        options: EvaluatorOptions,
    ) -> ProvenanceResult<bool> {
        let timer = PerformanceTimer::new("chain_verify");
        let mut expected_input = self.genesis_root;
        for link in &self.links {
            if link.input_root != expected_input {
                debug!(
                    "Chain {} linkage broken at link {}",
                    self.short_id(),
                    link.index
                );
                return Ok(false);
            }
            let valid = verify_with_timeout(
                evaluator,
                &link.transformation,
                &link.input_root,
                &link.output_root,
                &link.proof_blob,
                options,
            )?;
            if !valid {
                debug!(
                    "Chain {} proof blob rejected at link {}",
                    self.short_id(),
                    link.index
                );
                return Ok(false);
            }
            expected_input = link.output_root;
        }
        timer.finish();
        Ok(true)
    }

    /// Freeze the chain; further `extend` calls fail with `ChainReadOnly`
    pub fn mark_exported(&mut self) {
        self.exported = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::evaluator::HashBindingEvaluator;

    fn gradient_image(width: u32, height: u32, salt: u8) -> ImageData {
        let pixels: Vec<u8> = (0..width as usize * height as usize)
            .map(|i| (i % 251) as u8 ^ salt)
            .collect();
        ImageData::new(width, height, 1, pixels).unwrap()
    }

    fn evaluator() -> Arc<dyn CircuitEvaluator> {
        Arc::new(HashBindingEvaluator)
    }

    #[test]
    fn test_anchor_is_depth_zero() {
        let image = gradient_image(64, 64, 0);
        let genesis = commit(&image, 32, 32).unwrap();
        let chain = ProofChain::anchor_with_nonce(&genesis, 7);
        assert_eq!(chain.depth(), 0);
        assert_eq!(chain.current_output_root(), genesis.root);
    }

    #[test]
    fn test_linkage_invariant_over_repeated_extends() {
        let evaluator = evaluator();
        let genesis_image = gradient_image(64, 64, 0);
        let genesis = commit(&genesis_image, 32, 32).unwrap();
        let mut chain = ProofChain::anchor_with_nonce(&genesis, 7);

        for salt in 1..=4u8 {
            let edited = gradient_image(64, 64, salt);
            chain
                .extend(
                    TransformationDescriptor::Brightness { delta: salt as i16 },
                    &edited,
                    &evaluator,
                    EvaluatorOptions::default(),
                )
                .unwrap();
        }

        assert_eq!(chain.depth(), 4);
        assert_eq!(chain.links[0].input_root, chain.genesis_root);
        for pair in chain.links.windows(2) {
            assert_eq!(pair[0].output_root, pair[1].input_root);
        }
        assert!(chain
            .verify(&evaluator, EvaluatorOptions::default())
            .unwrap());
    }

    #[test]
    fn test_tampered_link_fails_verification() {
        let evaluator = evaluator();
        let genesis = commit(&gradient_image(64, 64, 0), 32, 32).unwrap();
        let mut chain = ProofChain::anchor_with_nonce(&genesis, 7);
        chain
            .extend(
                TransformationDescriptor::Grayscale,
                &gradient_image(64, 64, 1),
                &evaluator,
                EvaluatorOptions::default(),
            )
            .unwrap();

        chain.links[0].output_root[0] ^= 0xff;
        assert!(!chain
            .verify(&evaluator, EvaluatorOptions::default())
            .unwrap());
    }

    #[test]
    fn test_append_rejects_stale_input_root() {
        let genesis = commit(&gradient_image(64, 64, 0), 32, 32).unwrap();
        let mut chain = ProofChain::anchor_with_nonce(&genesis, 7);
        let result = chain.append_link(
            TransformationDescriptor::Grayscale,
            [9u8; 32],
            [1u8; 32],
            vec![],
        );
        assert!(matches!(
            result,
            Err(ProvenanceError::LinkageMismatch { .. })
        ));
    }

    #[test]
    fn test_exported_chain_is_read_only() {
        let evaluator = evaluator();
        let genesis = commit(&gradient_image(64, 64, 0), 32, 32).unwrap();
        let mut chain = ProofChain::anchor_with_nonce(&genesis, 7);
        chain.mark_exported();
        let result = chain.extend(
            TransformationDescriptor::Grayscale,
            &gradient_image(64, 64, 1),
            &evaluator,
            EvaluatorOptions::default(),
        );
        assert!(matches!(result, Err(ProvenanceError::ChainReadOnly { .. })));
    }

    #[test]
    fn test_from_parts_rejects_broken_linkage() {
        let evaluator = evaluator();
        let genesis = commit(&gradient_image(64, 64, 0), 32, 32).unwrap();
        let mut chain = ProofChain::anchor_with_nonce(&genesis, 7);
        chain
            .extend(
                TransformationDescriptor::Grayscale,
                &gradient_image(64, 64, 1),
                &evaluator,
                EvaluatorOptions::default(),
            )
            .unwrap();

        let mut links = chain.links.clone();
        links[0].input_root = [3u8; 32];
        let result = ProofChain::from_parts(
            chain.chain_id,
            chain.genesis_root,
            chain.tile_width,
            chain.tile_height,
            links,
        );
        assert!(matches!(
            result,
            Err(ProvenanceError::LinkageMismatch { .. })
        ));
    }
}
