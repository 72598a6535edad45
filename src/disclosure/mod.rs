pub mod redact;
pub mod reveal;

use serde::{Deserialize, Serialize};

use crate::core::types::Hash32;

pub use redact::{redact, verify_redaction, RedactedTile, RedactionProof};
pub use reveal::{reveal, verify_reveal, RevealProof, RevealedTile};

/// Either kind of selective-disclosure proof, as attached to exports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisclosureProof {
    Reveal(RevealProof),
    Redaction(RedactionProof),
}

impl DisclosureProof {
    /// Verify against the commitment root the proof claims to disclose from
    pub fn verify(&self, root: &Hash32) -> bool {
        match self {
            DisclosureProof::Reveal(proof) => verify_reveal(root, proof),
            DisclosureProof::Redaction(proof) => verify_redaction(root, proof),
        }
    }

    /// Root this disclosure is bound to
    pub fn root(&self) -> Hash32 {
        match self {
            DisclosureProof::Reveal(proof) => proof.root,
            DisclosureProof::Redaction(proof) => proof.original_root,
        }
    }
}
