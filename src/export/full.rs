use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::{ProofChain, ProofLink};
use crate::core::{
    errors::{ProvenanceError, ProvenanceResult},
    types::{Hash32, TransformationDescriptor, EXPORT_FORMAT_VERSION},
};
use crate::disclosure::DisclosureProof;

/// Complete, self-describing proof document. Everything a verifier needs is
/// inline; no other system state is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullExport {
    pub format_version: u32,
    /// Hex chain id
    pub chain_id: String,
    /// Hex genesis commitment root
    pub genesis_root: String,
    pub tile_width: u32,
    pub tile_height: u32,
    pub links: Vec<ExportedLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclosures: Option<Vec<DisclosureProof>>,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedLink {
    pub input_root: String,
    pub output_root: String,
    pub transformation: TransformationDescriptor,
    /// Base64 proof blob, carried through unchanged
    pub proof_blob: String,
}

/// Probe for the version tag before committing to the full schema
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionProbe {
    format_version: u32,
}

/// Serialize a chain (plus optional disclosures) into the full JSON document
pub fn export_full(
    chain: &ProofChain,
    disclosures: Option<&[DisclosureProof]>,
) -> ProvenanceResult<String> {
    let document = FullExport {
        format_version: EXPORT_FORMAT_VERSION,
        chain_id: hex::encode(chain.chain_id),
        genesis_root: hex::encode(chain.genesis_root),
        tile_width: chain.tile_width,
        tile_height: chain.tile_height,
        links: chain
            .links
            .iter()
            .map(|link| ExportedLink {
                input_root: hex::encode(link.input_root),
                output_root: hex::encode(link.output_root),
                transformation: link.transformation.clone(),
                proof_blob: BASE64.encode(&link.proof_blob),
            })
            .collect(),
        disclosures: disclosures.map(<[DisclosureProof]>::to_vec),
        exported_at: Utc::now(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Reconstruct a read-only chain and its disclosures from a full document
pub fn import_full(json: &str) -> ProvenanceResult<(ProofChain, Vec<DisclosureProof>)> {
    let probe: VersionProbe = serde_json::from_str(json)
        .map_err(|e| ProvenanceError::MalformedEncoding(format!("full export: {}", e)))?;
    if probe.format_version != EXPORT_FORMAT_VERSION {
        return Err(ProvenanceError::UnsupportedFormat {
            version: probe.format_version,
            supported: EXPORT_FORMAT_VERSION,
        });
    }

    let document: FullExport = serde_json::from_str(json)
        .map_err(|e| ProvenanceError::MalformedEncoding(format!("full export: {}", e)))?;

    let chain_id = decode_hash(&document.chain_id, "chainId")?;
    let genesis_root = decode_hash(&document.genesis_root, "genesisRoot")?;

    let mut links = Vec::with_capacity(document.links.len());
    for (index, link) in document.links.iter().enumerate() {
        links.push(ProofLink {
            index: index as u32,
            input_root: decode_hash(&link.input_root, "inputRoot")?,
            output_root: decode_hash(&link.output_root, "outputRoot")?,
            transformation: link.transformation.clone(),
            proof_blob: BASE64.decode(&link.proof_blob).map_err(|e| {
                ProvenanceError::MalformedEncoding(format!("proofBlob base64: {}", e))
            })?,
        });
    }

    let chain = ProofChain::from_parts(
        chain_id,
        genesis_root,
        document.tile_width,
        document.tile_height,
        links,
    )?;
    Ok((chain, document.disclosures.unwrap_or_default()))
}

pub(crate) fn decode_hash(hex_str: &str, field: &str) -> ProvenanceResult<Hash32> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| ProvenanceError::MalformedEncoding(format!("{} hex: {}", field, e)))?;
    bytes.try_into().map_err(|_| {
        ProvenanceError::MalformedEncoding(format!("{} must be 32 bytes", field))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::test_support::{demo_chain, demo_disclosure};

    #[test]
    fn test_full_round_trip() {
        let (chain, evaluator) = demo_chain(3);
        let json = export_full(&chain, None).unwrap();
        let (imported, disclosures) = import_full(&json).unwrap();

        assert_eq!(imported.chain_id, chain.chain_id);
        assert_eq!(imported.genesis_root, chain.genesis_root);
        assert_eq!(imported.links.len(), chain.links.len());
        assert!(disclosures.is_empty());
        assert!(imported
            .verify(&evaluator, Default::default())
            .unwrap());
    }

    #[test]
    fn test_full_round_trip_with_disclosures() {
        let (chain, _) = demo_chain(1);
        let disclosure = demo_disclosure();
        let json = export_full(&chain, Some(std::slice::from_ref(&disclosure))).unwrap();
        let (_, disclosures) = import_full(&json).unwrap();
        assert_eq!(disclosures.len(), 1);
        assert_eq!(disclosures[0], disclosure);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let (chain, _) = demo_chain(1);
        let json = export_full(&chain, None)
            .unwrap()
            .replace("\"formatVersion\": 1", "\"formatVersion\": 99");
        assert!(matches!(
            import_full(&json),
            Err(ProvenanceError::UnsupportedFormat {
                version: 99,
                supported: 1
            })
        ));
    }

    #[test]
    fn test_truncated_root_rejected() {
        let (chain, _) = demo_chain(1);
        let json = export_full(&chain, None).unwrap();
        let short = hex::encode(&chain.genesis_root[..16]);
        let broken = json.replace(&hex::encode(chain.genesis_root), &short);
        assert!(matches!(
            import_full(&broken),
            Err(ProvenanceError::MalformedEncoding(_))
                | Err(ProvenanceError::LinkageMismatch { .. })
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(import_full("not json").is_err());
        assert!(import_full("{}").is_err());
    }
}
