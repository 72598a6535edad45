use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};
use rayon::prelude::*;

use crate::commitment::{commit, Commitment, TileSet};
use crate::core::{
    errors::{ProvenanceError, ProvenanceResult},
    types::{
        Hash32, ImageData, RedactionStyle, RegionDescriptor, DEFAULT_BATCH_CONCURRENCY,
    },
    utils::PerformanceTimer,
};
use crate::disclosure::{redact, reveal, RedactionProof, RevealProof};
use crate::signature::{verify_commitment_signature, SignaturePackage, VerificationOutcome};

/// Cooperative cancellation handle shared between a batch and its caller.
///
/// Cancelling stops new items from being scheduled; items already running
/// finish and still report their outcome.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bounded-concurrency settings for one batch call
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Worker threads; the ceiling on simultaneously processed items
    pub concurrency: usize,
    pub cancel: CancellationToken,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_BATCH_CONCURRENCY,
            cancel: CancellationToken::new(),
        }
    }
}

/// Per-item outcome; `Failed` carries the input index alongside the error
#[derive(Debug)]
pub enum BatchOutcome<T> {
    Succeeded(T),
    Failed {
        index: usize,
        error: ProvenanceError,
    },
}

impl<T> BatchOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Succeeded(_))
    }

    pub fn as_success(&self) -> Option<&T> {
        match self {
            BatchOutcome::Succeeded(value) => Some(value),
            BatchOutcome::Failed { .. } => None,
        }
    }
}

/// Outcomes indexed identically to the batch inputs.
/// `outcomes.len()` always equals the input length; nothing is dropped.
#[derive(Debug)]
pub struct BatchResult<T> {
    pub outcomes: Vec<BatchOutcome<T>>,
}

impl<T> BatchResult<T> {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}

/// Run one operation over every item on a dedicated bounded pool.
/// A failing item is recorded at its index and never aborts the rest.
fn run_batch<I, T, F>(
    operation: &str,
    items: &[I],
    options: &BatchOptions,
    op: F,
) -> ProvenanceResult<BatchResult<T>>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> ProvenanceResult<T> + Sync,
{
    let timer = PerformanceTimer::new(operation);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.concurrency.max(1))
        .build()
        .map_err(|e| {
            ProvenanceError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?;

    let cancel = &options.cancel;
    let outcomes: Vec<BatchOutcome<T>> = pool.install(|| {
        items
            .par_iter()
            .enumerate()
            .map(|(index, item)| {
                if cancel.is_cancelled() {
                    return BatchOutcome::Failed {
                        index,
                        error: ProvenanceError::Cancelled,
                    };
                }
                match op(item) {
                    Ok(value) => BatchOutcome::Succeeded(value),
                    Err(error) => {
                        debug!("{} item {} failed: {}", operation, index, error);
                        BatchOutcome::Failed { index, error }
                    }
                }
            })
            .collect()
    });

    let result = BatchResult { outcomes };
    info!(
        "{}: {} items, {} succeeded, {} failed in {}ms",
        operation,
        result.len(),
        result.succeeded(),
        result.failed(),
        timer.elapsed_ms()
    );
    Ok(result)
}

/// One image to commit
#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub image: ImageData,
    pub tile_width: u32,
    pub tile_height: u32,
}

/// One signature package to check
#[derive(Debug, Clone)]
pub struct SignatureCheckRequest {
    pub root: Hash32,
    pub package: SignaturePackage,
}

/// One region to reveal
#[derive(Debug, Clone)]
pub struct RevealRequest {
    pub commitment: Commitment,
    pub tile_set: TileSet,
    pub region: RegionDescriptor,
}

/// One redaction job
#[derive(Debug, Clone)]
pub struct RedactRequest {
    pub commitment: Commitment,
    pub tile_set: TileSet,
    pub regions: Vec<RegionDescriptor>,
    pub style: RedactionStyle,
}

pub fn batch_commit(
    requests: &[CommitRequest],
    options: &BatchOptions,
) -> ProvenanceResult<BatchResult<Commitment>> {
    run_batch("batch_commit", requests, options, |request| {
        commit(&request.image, request.tile_width, request.tile_height)
    })
}

pub fn batch_verify_signatures(
    requests: &[SignatureCheckRequest],
    options: &BatchOptions,
) -> ProvenanceResult<BatchResult<VerificationOutcome>> {
    run_batch("batch_verify_signatures", requests, options, |request| {
        verify_commitment_signature(&request.root, &request.package)
    })
}

pub fn batch_reveal(
    requests: &[RevealRequest],
    options: &BatchOptions,
) -> ProvenanceResult<BatchResult<RevealProof>> {
    run_batch("batch_reveal", requests, options, |request| {
        reveal(&request.commitment, &request.tile_set, &request.region)
    })
}

pub fn batch_redact(
    requests: &[RedactRequest],
    options: &BatchOptions,
) -> ProvenanceResult<BatchResult<(RedactionProof, TileSet)>> {
    run_batch("batch_redact", requests, options, |request| {
        redact(
            &request.commitment,
            &request.tile_set,
            &request.regions,
            request.style,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_request(salt: u8) -> CommitRequest {
        let pixels: Vec<u8> = (0..64usize * 64).map(|i| (i % 251) as u8 ^ salt).collect();
        CommitRequest {
            image: ImageData::new(64, 64, 1, pixels).unwrap(),
            tile_width: 32,
            tile_height: 32,
        }
    }

    fn bad_request() -> CommitRequest {
        let mut request = good_request(0);
        // Zero tile width fails inside commit, not at construction
        request.tile_width = 0;
        request
    }

    #[test]
    fn test_batch_isolation_exact_counts() {
        // 8 items, 3 intentionally malformed
        let requests = vec![
            good_request(1),
            bad_request(),
            good_request(2),
            good_request(3),
            bad_request(),
            good_request(4),
            bad_request(),
            good_request(5),
        ];
        for concurrency in [1, 2, 8] {
            let options = BatchOptions {
                concurrency,
                cancel: CancellationToken::new(),
            };
            let result = batch_commit(&requests, &options).unwrap();
            assert_eq!(result.len(), 8);
            assert_eq!(result.succeeded(), 5, "concurrency {}", concurrency);
            assert_eq!(result.failed(), 3);
            // Failures sit exactly where the malformed inputs were
            for index in [1, 4, 6] {
                assert!(!result.outcomes[index].is_success());
            }
        }
    }

    #[test]
    fn test_failed_outcome_carries_index_and_error() {
        let requests = vec![good_request(0), bad_request()];
        let result = batch_commit(&requests, &BatchOptions::default()).unwrap();
        match &result.outcomes[1] {
            BatchOutcome::Failed { index, error } => {
                assert_eq!(*index, 1);
                assert!(matches!(error, ProvenanceError::InvalidTileSize { .. }));
            }
            BatchOutcome::Succeeded(_) => panic!("malformed item succeeded"),
        }
    }

    #[test]
    fn test_cancelled_batch_reports_every_item() {
        let requests: Vec<CommitRequest> = (0..16).map(|i| good_request(i as u8)).collect();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let options = BatchOptions {
            concurrency: 4,
            cancel,
        };
        let result = batch_commit(&requests, &options).unwrap();
        assert_eq!(result.len(), 16);
        assert_eq!(result.failed(), 16);
        assert!(result.outcomes.iter().all(|o| matches!(
            o,
            BatchOutcome::Failed {
                error: ProvenanceError::Cancelled,
                ..
            }
        )));
    }

    #[test]
    fn test_batch_results_deterministic_across_concurrency() {
        let requests: Vec<CommitRequest> = (0..6).map(|i| good_request(i as u8)).collect();
        let serial = batch_commit(
            &requests,
            &BatchOptions {
                concurrency: 1,
                cancel: CancellationToken::new(),
            },
        )
        .unwrap();
        let parallel = batch_commit(
            &requests,
            &BatchOptions {
                concurrency: 4,
                cancel: CancellationToken::new(),
            },
        )
        .unwrap();
        for (a, b) in serial.outcomes.iter().zip(&parallel.outcomes) {
            assert_eq!(a.as_success().unwrap(), b.as_success().unwrap());
        }
    }

    #[test]
    fn test_empty_batch() {
        let result = batch_commit(&[], &BatchOptions::default()).unwrap();
        assert!(result.is_empty());
    }
}
