//! Cryptographic core for image provenance.
//!
//! An image is tiled, each tile hashed, and the tile hashes committed to in a
//! Merkle tree. Edits extend a hash-linked chain of transformation proofs,
//! regions can be selectively disclosed or provably redacted, commitment
//! roots can carry device signatures, and finished chains export to four
//! interchange formats. The zero-knowledge circuit lives behind the
//! [`chain::CircuitEvaluator`] trait; this crate treats its proof blobs as
//! opaque bytes.

pub mod batch;
pub mod chain;
pub mod commitment;
pub mod core;
pub mod disclosure;
pub mod export;
pub mod signature;

pub use crate::core::errors::{ProvenanceError, ProvenanceResult};
pub use crate::core::types::{
    ChainId, Hash32, ImageData, RedactionStyle, RegionDescriptor, StrictnessPolicy,
    TransformationDescriptor, DEFAULT_TILE_HEIGHT, DEFAULT_TILE_WIDTH,
};

pub use crate::batch::{
    batch_commit, batch_redact, batch_reveal, batch_verify_signatures, BatchOptions,
    BatchOutcome, BatchResult, CancellationToken, CommitRequest, RedactRequest, RevealRequest,
    SignatureCheckRequest,
};
pub use crate::chain::{
    ChainRegistry, CircuitEvaluator, EvaluatorOptions, HashBindingEvaluator, ProofChain,
    ProofLink,
};
pub use crate::commitment::{commit, commit_tile_set, Commitment, MerklePath, MerkleTree, TileSet};
pub use crate::disclosure::{
    redact, reveal, verify_redaction, verify_reveal, DisclosureProof, RedactionProof, RevealProof,
};
pub use crate::export::{
    export_compact, export_full, export_url, export_widget, import_compact, import_full,
    import_url, import_widget, FullExport,
};
pub use crate::signature::{
    sign_root, verify_commitment_signature, KeyEncoding, SignatureEncoding, SignaturePackage,
    VerificationOutcome,
};
