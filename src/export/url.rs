use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use log::debug;

use crate::chain::ProofChain;
use crate::core::{
    errors::{ProvenanceError, ProvenanceResult},
    types::URL_PROOF_PARAM,
};
use crate::export::compact::{export_compact, import_compact};

/// Placeholder in a URL template replaced by the encoded payload
pub const URL_TEMPLATE_PLACEHOLDER: &str = "{proof}";

/// Encode a chain into a shareable URL.
///
/// The compact bytes are base64-url encoded without padding and either
/// substituted for a `{proof}` placeholder in the template or appended as the
/// `proof` query parameter.
pub fn export_url(chain: &ProofChain, base_template: &str) -> ProvenanceResult<String> {
    let payload = URL_SAFE_NO_PAD.encode(export_compact(chain)?);
    let url = if base_template.contains(URL_TEMPLATE_PLACEHOLDER) {
        base_template.replace(URL_TEMPLATE_PLACEHOLDER, &payload)
    } else {
        let separator = if base_template.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}={}",
            base_template, separator, URL_PROOF_PARAM, payload
        )
    };
    debug!(
        "URL export of chain {}: {} characters",
        chain.short_id(),
        url.len()
    );
    Ok(url)
}

/// Extract and decode the proof payload from a URL
pub fn import_url(url: &str) -> ProvenanceResult<ProofChain> {
    let query = url.split_once('?').map(|(_, q)| q).unwrap_or(url);
    let payload = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == URL_PROOF_PARAM)
        .map(|(_, value)| value)
        // Accept a bare payload too, as produced by placeholder templates
        .unwrap_or(query);
    // Fragments never belong to the payload
    let payload = payload.split('#').next().unwrap_or_default();
    if payload.is_empty() {
        return Err(ProvenanceError::MalformedEncoding(
            "no proof payload in URL".into(),
        ));
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| ProvenanceError::MalformedEncoding(format!("proof payload base64: {}", e)))?;
    import_compact(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::test_support::demo_chain;

    #[test]
    fn test_query_parameter_round_trip() {
        let (chain, evaluator) = demo_chain(2);
        let url = export_url(&chain, "https://verify.example.com/p").unwrap();
        assert!(url.starts_with("https://verify.example.com/p?proof="));
        let imported = import_url(&url).unwrap();
        assert_eq!(imported.chain_id, chain.chain_id);
        assert!(imported.verify(&evaluator, Default::default()).unwrap());
    }

    #[test]
    fn test_existing_query_gets_ampersand() {
        let (chain, _) = demo_chain(1);
        let url = export_url(&chain, "https://example.com/v?lang=en").unwrap();
        assert!(url.contains("lang=en&proof="));
        assert_eq!(import_url(&url).unwrap().chain_id, chain.chain_id);
    }

    #[test]
    fn test_placeholder_template() {
        let (chain, _) = demo_chain(1);
        let url = export_url(&chain, "https://example.com/v/{proof}/check").unwrap();
        assert!(!url.contains("{proof}"));

        // Round trip via the bare payload between the path segments
        let payload = url
            .strip_prefix("https://example.com/v/")
            .and_then(|rest| rest.strip_suffix("/check"))
            .unwrap();
        let imported = import_url(&format!("https://x.test/?proof={}", payload)).unwrap();
        assert_eq!(imported.chain_id, chain.chain_id);
    }

    #[test]
    fn test_payload_is_url_safe() {
        let (chain, _) = demo_chain(3);
        let url = export_url(&chain, "https://example.com/v").unwrap();
        let payload = url.split_once("proof=").unwrap().1;
        assert!(payload
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_corrupted_payload_rejected() {
        let (chain, _) = demo_chain(1);
        let url = export_url(&chain, "https://example.com/v").unwrap();
        assert!(import_url(&format!("{}AAAA", url)).is_err());
        assert!(import_url("https://example.com/v?proof=!!!").is_err());
        assert!(import_url("https://example.com/v").is_err());
    }
}
