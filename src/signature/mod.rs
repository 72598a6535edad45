pub mod encoding;

use log::debug;
use p256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use serde::{Deserialize, Serialize};

use crate::core::{
    errors::{ProvenanceError, ProvenanceResult},
    types::{Hash32, StrictnessPolicy},
    utils::{compute_sha256, short_hex},
};

pub use encoding::{
    normalize_public_key, normalize_signature, KeyEncoding, NormalizedKey, NormalizedSignature,
    SignatureEncoding,
};

/// Detached signature over a commitment root, in whatever encodings the
/// signing device produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePackage {
    /// Signature bytes in the declared encoding
    pub signature: Vec<u8>,
    pub signature_encoding: SignatureEncoding,
    /// Public key bytes in the declared encoding
    pub public_key: Vec<u8>,
    pub key_encoding: KeyEncoding,
}

/// Result of verifying a signature package against a commitment root.
///
/// `Verified` and `FormatValid` are deliberately distinct: downstream
/// confidence scoring weighs a completed cryptographic check differently
/// from a package that merely parses. They are never collapsed to a bool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The cryptographic check ran and passed
    Verified,
    /// Every component parses, but the check could not be completed
    /// (e.g. only a wrapped key fingerprint was available)
    FormatValid { reason: String },
    /// The cryptographic check ran and returned false
    VerificationFailed { reason: String },
}

impl VerificationOutcome {
    /// Whether this outcome passes under the given strictness policy
    pub fn is_acceptable(&self, policy: StrictnessPolicy) -> bool {
        match self {
            VerificationOutcome::Verified => true,
            VerificationOutcome::FormatValid { .. } => policy == StrictnessPolicy::Lenient,
            VerificationOutcome::VerificationFailed { .. } => false,
        }
    }
}

/// Verify a signature package against a commitment root.
///
/// Parsing failures are errors (`MalformedEncoding`); a completed-but-false
/// cryptographic check is the `VerificationFailed` outcome, not an error.
pub fn verify_commitment_signature(
    root: &Hash32,
    package: &SignaturePackage,
) -> ProvenanceResult<VerificationOutcome> {
    let normalized = normalize_signature(&package.signature, package.signature_encoding)?;
    let key = normalize_public_key(&package.public_key, package.key_encoding)?;

    let outcome = match key {
        NormalizedKey::Point(point) => {
            let verifying_key = VerifyingKey::from_sec1_bytes(&point).map_err(|_| {
                ProvenanceError::MalformedEncoding("normalized point rejected by ECDSA".into())
            })?;
            match Signature::from_slice(&normalized.to_bytes()) {
                Ok(signature) => match verifying_key.verify(root, &signature) {
                    Ok(()) => VerificationOutcome::Verified,
                    Err(_) => VerificationOutcome::VerificationFailed {
                        reason: format!(
                            "ECDSA check failed for root {}",
                            short_hex(root)
                        ),
                    },
                },
                // r or s of zero, or >= the curve order: structurally a
                // signature, cryptographically never valid
                Err(_) => VerificationOutcome::VerificationFailed {
                    reason: "signature scalars outside the curve order".into(),
                },
            }
        }
        NormalizedKey::WrappedDigest(digest) => VerificationOutcome::FormatValid {
            reason: format!(
                "wrapped key {} cannot be checked without unwrapping",
                short_hex(&digest)
            ),
        },
    };

    debug!(
        "Signature over root {} -> {:?}",
        short_hex(root),
        std::mem::discriminant(&outcome)
    );
    Ok(outcome)
}

/// Sign a commitment root, emitting the requested encodings.
pub fn sign_root(
    signing_key: &SigningKey,
    root: &Hash32,
    signature_encoding: SignatureEncoding,
    key_encoding: KeyEncoding,
) -> SignaturePackage {
    let signature: Signature = signing_key.sign(root);
    let signature_bytes = match signature_encoding {
        SignatureEncoding::Der => signature.to_der().as_bytes().to_vec(),
        SignatureEncoding::RawFixed => signature.to_bytes().to_vec(),
    };

    let verifying_key = signing_key.verifying_key();
    let public_key = match key_encoding {
        KeyEncoding::Sec1Uncompressed => verifying_key.to_encoded_point(false).as_bytes().to_vec(),
        KeyEncoding::Sec1Compressed => verifying_key.to_encoded_point(true).as_bytes().to_vec(),
        KeyEncoding::WrappedDigest => {
            compute_sha256(verifying_key.to_encoded_point(false).as_bytes()).to_vec()
        }
    };

    SignaturePackage {
        signature: signature_bytes,
        signature_encoding,
        public_key,
        key_encoding,
    }
}
