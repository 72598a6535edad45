use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use crate::core::{
    errors::{ProvenanceError, ProvenanceResult},
    types::{Hash32, TransformationDescriptor, DEFAULT_EVALUATOR_TIMEOUT_MS},
    utils::compute_sha256,
};

/// Boundary to the external zero-knowledge circuit evaluator.
///
/// Proof blobs are opaque: the core never inspects them, it only carries
/// them through links and export formats unchanged.
pub trait CircuitEvaluator: Send + Sync + 'static {
    /// Produce a proof blob for one transformation step
    fn prove(
        &self,
        transformation: &TransformationDescriptor,
        input_root: &Hash32,
        output_root: &Hash32,
        witness: &[u8],
    ) -> ProvenanceResult<Vec<u8>>;

    /// Check a proof blob against its declared roots and transformation
    fn verify(
        &self,
        transformation: &TransformationDescriptor,
        input_root: &Hash32,
        output_root: &Hash32,
        proof_blob: &[u8],
    ) -> ProvenanceResult<bool>;
}

/// Caller-supplied budget for evaluator calls
#[derive(Debug, Clone, Copy)]
pub struct EvaluatorOptions {
    pub timeout: Duration,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_EVALUATOR_TIMEOUT_MS),
        }
    }
}

/// Run `prove` on a helper thread, abandoning the result past the deadline
pub fn prove_with_timeout(
    evaluator: &Arc<dyn CircuitEvaluator>,
    transformation: &TransformationDescriptor,
    input_root: &Hash32,
    output_root: &Hash32,
    witness: &[u8],
    options: EvaluatorOptions,
) -> ProvenanceResult<Vec<u8>> {
    let evaluator = Arc::clone(evaluator);
    let transformation = transformation.clone();
    let input_root = *input_root;
    let output_root = *output_root;
    let witness = witness.to_vec();
    run_with_timeout(options.timeout, move || {
        evaluator.prove(&transformation, &input_root, &output_root, &witness)
    })
}

/// Run `verify` on a helper thread, abandoning the result past the deadline
pub fn verify_with_timeout(
    evaluator: &Arc<dyn CircuitEvaluator>,
    transformation: &TransformationDescriptor,
    input_root: &Hash32,
    output_root: &Hash32,
    proof_blob: &[u8],
    options: EvaluatorOptions,
) -> ProvenanceResult<bool> {
    let evaluator = Arc::clone(evaluator);
    let transformation = transformation.clone();
    let input_root = *input_root;
    let output_root = *output_root;
    let proof_blob = proof_blob.to_vec();
    run_with_timeout(options.timeout, move || {
        evaluator.verify(&transformation, &input_root, &output_root, &proof_blob)
    })
}

fn run_with_timeout<T: Send + 'static>(
    timeout: Duration,
    f: impl FnOnce() -> ProvenanceResult<T> + Send + 'static,
) -> ProvenanceResult<T> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // Receiver may be gone after a timeout; a failed send is fine
        let _ = tx.send(f());
    });
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(_) => Err(ProvenanceError::EvaluatorTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Development evaluator that binds (transformation, roots) by hash.
///
/// Produces deterministic blobs with no zero-knowledge properties; it keeps
/// the chaining, disclosure and batching logic testable without a SNARK
/// backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashBindingEvaluator;

const BINDING_DOMAIN: &[u8] = b"hash-binding-evaluator-v1";

impl HashBindingEvaluator {
    fn binding(
        transformation: &TransformationDescriptor,
        input_root: &Hash32,
        output_root: &Hash32,
    ) -> Hash32 {
        let descriptor = transformation.canonical_bytes();
        let mut data =
            Vec::with_capacity(BINDING_DOMAIN.len() + descriptor.len() + 2 * input_root.len());
        data.extend_from_slice(BINDING_DOMAIN);
        data.extend_from_slice(&descriptor);
        data.extend_from_slice(input_root);
        data.extend_from_slice(output_root);
        compute_sha256(&data)
    }
}

impl CircuitEvaluator for HashBindingEvaluator {
    fn prove(
        &self,
        transformation: &TransformationDescriptor,
        input_root: &Hash32,
        output_root: &Hash32,
        _witness: &[u8],
    ) -> ProvenanceResult<Vec<u8>> {
        Ok(Self::binding(transformation, input_root, output_root).to_vec())
    }

    fn verify(
        &self,
        transformation: &TransformationDescriptor,
        input_root: &Hash32,
        output_root: &Hash32,
        proof_blob: &[u8],
    ) -> ProvenanceResult<bool> {
        let expected = Self::binding(transformation, input_root, output_root);
        Ok(proof_blob == expected)
    }
}
