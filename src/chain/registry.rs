use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::chain::evaluator::{prove_with_timeout, CircuitEvaluator, EvaluatorOptions};
use crate::chain::proof_chain::ProofChain;
use crate::commitment::{commit, Commitment};
use crate::core::{
    errors::{ProvenanceError, ProvenanceResult},
    types::{ChainId, ImageData, TransformationDescriptor, DEFAULT_REGISTRY_CAPACITY},
    utils::short_hex,
};

/// Explicit-context store of live proof chains, keyed by chain id.
///
/// Never a global: callers create registries and pass them to every
/// operation, so independent registries coexist (one per test, one per
/// tenant). Extension is serialized per chain; reads clone snapshots and
/// hold no lock while verifying. Once the registry exceeds its capacity,
/// exported chains are evicted first since their exports are self-contained.
pub struct ChainRegistry {
    capacity: usize,
    anchor_counter: AtomicU64,
    chains: RwLock<HashMap<ChainId, Arc<Mutex<ProofChain>>>>,
    /// Insertion order, scanned for eviction candidates
    order: Mutex<VecDeque<ChainId>>,
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ChainRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            anchor_counter: AtomicU64::new(0),
            chains: RwLock::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
        }
    }

    /// Anchor a new chain at a genesis commitment and register it
    pub fn anchor(&self, genesis: &Commitment) -> ChainId {
        let counter = self.anchor_counter.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let chain = ProofChain::anchor_with_nonce(genesis, nanos.wrapping_add(counter));
        let chain_id = chain.chain_id;

        {
            let mut chains = self
                .chains
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            chains.insert(chain_id, Arc::new(Mutex::new(chain)));
        }
        lock_ignoring_poison(&self.order).push_back(chain_id);
        self.evict_over_capacity();
        chain_id
    }

    fn entry(&self, chain_id: &ChainId) -> ProvenanceResult<Arc<Mutex<ProofChain>>> {
        let chains = self
            .chains
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        chains
            .get(chain_id)
            .cloned()
            .ok_or_else(|| ProvenanceError::ChainNotFound {
                chain_id: short_hex(chain_id),
            })
    }

    /// Extend a registered chain with one transformation.
    ///
    /// The base state is read under the chain lock, the lock is released for
    /// the (potentially slow) evaluator call, and the base root is re-checked
    /// on append. A concurrent extension that lands first surfaces as
    /// `LinkageMismatch` instead of silently forking the chain.
    pub fn extend(
        &self,
        chain_id: &ChainId,
        transformation: TransformationDescriptor,
        new_image: &ImageData,
        evaluator: &Arc<dyn CircuitEvaluator>,
        options: EvaluatorOptions,
    ) -> ProvenanceResult<u32> {
        let entry = self.entry(chain_id)?;

        let (input_root, tile_width, tile_height) = {
            let chain = lock_ignoring_poison(&entry);
            if chain.exported {
                return Err(ProvenanceError::ChainReadOnly {
                    chain_id: chain.short_id(),
                });
            }
            (
                chain.current_output_root(),
                chain.tile_width,
                chain.tile_height,
            )
        };

        // No chain lock held through commit + prove
        let output = commit(new_image, tile_width, tile_height)?;
        let proof_blob = prove_with_timeout(
            evaluator,
            &transformation,
            &input_root,
            &output.root,
            &new_image.pixels,
            options,
        )?;

        let mut chain = lock_ignoring_poison(&entry);
        chain.append_link(transformation, input_root, output.root, proof_blob)?;
        Ok(chain.depth())
    }

    /// Verify a registered chain. Works on a snapshot so no lock is held
    /// while the evaluator runs.
    pub fn verify(
        &self,
        chain_id: &ChainId,
        evaluator: &Arc<dyn CircuitEvaluator>,
        options: EvaluatorOptions,
    ) -> ProvenanceResult<bool> {
        let snapshot = self.snapshot(chain_id)?;
        snapshot.verify(evaluator, options)
    }

    /// Clone the current state of a registered chain
    pub fn snapshot(&self, chain_id: &ChainId) -> ProvenanceResult<ProofChain> {
        let entry = self.entry(chain_id)?;
        let chain = lock_ignoring_poison(&entry);
        Ok(chain.clone())
    }

    /// Freeze a chain for export and return the read-only snapshot. The
    /// chain becomes an eviction candidate.
    pub fn mark_exported(&self, chain_id: &ChainId) -> ProvenanceResult<ProofChain> {
        let entry = self.entry(chain_id)?;
        let snapshot = {
            let mut chain = lock_ignoring_poison(&entry);
            chain.mark_exported();
            chain.clone()
        };
        info!(
            "Chain {} exported at depth {}",
            snapshot.short_id(),
            snapshot.depth()
        );
        self.evict_over_capacity();
        Ok(snapshot)
    }

    pub fn contains(&self, chain_id: &ChainId) -> bool {
        self.chains
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(chain_id)
    }

    pub fn len(&self) -> usize {
        self.chains
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict oldest exported chains while over capacity. Live (unexported)
    /// chains are never evicted.
    fn evict_over_capacity(&self) {
        while self.len() > self.capacity {
            let candidate = {
                let mut order = lock_ignoring_poison(&self.order);
                let chains = self
                    .chains
                    .read()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                // Drop stale order entries, then find the oldest exported chain
                order.retain(|id| chains.contains_key(id));
                order
                    .iter()
                    .position(|id| {
                        chains
                            .get(id)
                            .map(|entry| lock_ignoring_poison(entry).exported)
                            .unwrap_or(false)
                    })
                    .and_then(|pos| order.remove(pos))
            };

            match candidate {
                Some(chain_id) => {
                    let mut chains = self
                        .chains
                        .write()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    chains.remove(&chain_id);
                    debug!("Evicted exported chain {}", short_hex(&chain_id));
                }
                // Every chain is still live; nothing to evict
                None => break,
            }
        }
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::evaluator::HashBindingEvaluator;

    fn gradient_image(salt: u8) -> ImageData {
        let pixels: Vec<u8> = (0..64usize * 64).map(|i| (i % 251) as u8 ^ salt).collect();
        ImageData::new(64, 64, 1, pixels).unwrap()
    }

    fn evaluator() -> Arc<dyn CircuitEvaluator> {
        Arc::new(HashBindingEvaluator)
    }

    #[test]
    fn test_anchor_then_extend_then_verify() {
        let registry = ChainRegistry::default();
        let evaluator = evaluator();
        let genesis = commit(&gradient_image(0), 32, 32).unwrap();
        let chain_id = registry.anchor(&genesis);

        let depth = registry
            .extend(
                &chain_id,
                TransformationDescriptor::Grayscale,
                &gradient_image(1),
                &evaluator,
                EvaluatorOptions::default(),
            )
            .unwrap();
        assert_eq!(depth, 1);
        assert!(registry
            .verify(&chain_id, &evaluator, EvaluatorOptions::default())
            .unwrap());
    }

    #[test]
    fn test_unknown_chain_id() {
        let registry = ChainRegistry::default();
        let evaluator = evaluator();
        let result = registry.extend(
            &[0u8; 32],
            TransformationDescriptor::Grayscale,
            &gradient_image(0),
            &evaluator,
            EvaluatorOptions::default(),
        );
        assert!(matches!(result, Err(ProvenanceError::ChainNotFound { .. })));
    }

    #[test]
    fn test_exported_chain_rejects_extension() {
        let registry = ChainRegistry::default();
        let evaluator = evaluator();
        let genesis = commit(&gradient_image(0), 32, 32).unwrap();
        let chain_id = registry.anchor(&genesis);
        registry.mark_exported(&chain_id).unwrap();

        let result = registry.extend(
            &chain_id,
            TransformationDescriptor::Grayscale,
            &gradient_image(1),
            &evaluator,
            EvaluatorOptions::default(),
        );
        assert!(matches!(result, Err(ProvenanceError::ChainReadOnly { .. })));
    }

    #[test]
    fn test_concurrent_extensions_do_not_fork() {
        let registry = Arc::new(ChainRegistry::default());
        let evaluator = evaluator();
        let genesis = commit(&gradient_image(0), 32, 32).unwrap();
        let chain_id = registry.anchor(&genesis);

        let mut handles = Vec::new();
        for salt in 1..=8u8 {
            let registry = Arc::clone(&registry);
            let evaluator = Arc::clone(&evaluator);
            handles.push(std::thread::spawn(move || {
                registry.extend(
                    &chain_id,
                    TransformationDescriptor::Brightness { delta: salt as i16 },
                    &gradient_image(salt),
                    &evaluator,
                    EvaluatorOptions::default(),
                )
            }));
        }

        let mut succeeded = 0u32;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => succeeded += 1,
                Err(ProvenanceError::LinkageMismatch { .. }) => {}
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        // Losers get LinkageMismatch; the chain itself never forks
        let snapshot = registry.snapshot(&chain_id).unwrap();
        assert_eq!(snapshot.depth(), succeeded);
        assert!(snapshot
            .verify(&evaluator, EvaluatorOptions::default())
            .unwrap());
    }

    #[test]
    fn test_eviction_prefers_exported_chains() {
        let registry = ChainRegistry::new(2);
        let genesis_a = commit(&gradient_image(0), 32, 32).unwrap();
        let genesis_b = commit(&gradient_image(1), 32, 32).unwrap();
        let genesis_c = commit(&gradient_image(2), 32, 32).unwrap();

        let a = registry.anchor(&genesis_a);
        let b = registry.anchor(&genesis_b);
        registry.mark_exported(&a).unwrap();

        let c = registry.anchor(&genesis_c);
        // Capacity 2: the exported chain goes, live chains stay
        assert!(!registry.contains(&a));
        assert!(registry.contains(&b));
        assert!(registry.contains(&c));
    }

    #[test]
    fn test_live_chains_survive_over_capacity() {
        let registry = ChainRegistry::new(1);
        let a = registry.anchor(&commit(&gradient_image(0), 32, 32).unwrap());
        let b = registry.anchor(&commit(&gradient_image(1), 32, 32).unwrap());
        // Nothing exported yet, so nothing is evicted
        assert!(registry.contains(&a));
        assert!(registry.contains(&b));
        assert_eq!(registry.len(), 2);
    }
}
