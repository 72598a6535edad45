use log::debug;

use crate::chain::ProofChain;
use crate::core::errors::{ProvenanceError, ProvenanceResult};
use crate::disclosure::DisclosureProof;
use crate::export::full::{export_full, import_full};

const JSON_ISLAND_ID: &str = "provenance-proof";

const WIDGET_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Image Provenance Proof</title>
<style>
body { font-family: system-ui, sans-serif; margin: 2rem; color: #1a1a2e; }
.card { border: 1px solid #ccd; border-radius: 8px; padding: 1rem 1.5rem; max-width: 42rem; }
.ok { color: #0a7a33; } .bad { color: #b3261e; }
code { font-size: 0.85em; word-break: break-all; }
table { border-collapse: collapse; margin-top: 0.5rem; }
td, th { padding: 0.2rem 0.8rem 0.2rem 0; text-align: left; }
</style>
</head>
<body>
<div class="card">
<h2>Image Provenance Proof</h2>
<div id="status">Checking&hellip;</div>
<div id="details"></div>
</div>
<script type="application/json" id="provenance-proof">"#;

const WIDGET_TAIL: &str = r#"</script>
<script>
(function () {
  var status = document.getElementById("status");
  var details = document.getElementById("details");
  function fail(reason) {
    status.innerHTML = '<strong class="bad">Proof structure invalid</strong>: ' + reason;
  }
  var doc;
  try {
    doc = JSON.parse(document.getElementById("provenance-proof").textContent);
  } catch (e) {
    return fail("embedded document is not JSON");
  }
  if (doc.formatVersion !== 1) return fail("unsupported format version " + doc.formatVersion);
  if (!/^[0-9a-f]{64}$/.test(doc.genesisRoot)) return fail("malformed genesis root");
  var expected = doc.genesisRoot;
  for (var i = 0; i < doc.links.length; i++) {
    var link = doc.links[i];
    if (link.inputRoot !== expected) return fail("broken linkage at step " + i);
    if (!/^[0-9a-f]{64}$/.test(link.outputRoot)) return fail("malformed root at step " + i);
    expected = link.outputRoot;
  }
  status.innerHTML = '<strong class="ok">Proof structure valid</strong>' +
    ' &mdash; ' + doc.links.length + ' transformation step(s).' +
    ' Cryptographic re-verification of each step requires a circuit evaluator.';
  var rows = doc.links.map(function (link, i) {
    return "<tr><td>" + i + "</td><td>" + link.transformation.type +
      "</td><td><code>" + link.outputRoot.slice(0, 16) + "</code></td></tr>";
  }).join("");
  details.innerHTML =
    "<table><tr><th>Chain</th><td colspan=2><code>" + doc.chainId + "</code></td></tr>" +
    "<tr><th>Genesis root</th><td colspan=2><code>" + doc.genesisRoot + "</code></td></tr></table>" +
    (doc.links.length
      ? "<table><tr><th>#</th><th>Transformation</th><th>Output root</th></tr>" + rows + "</table>"
      : "");
})();
</script>
</body>
</html>
"#;

/// Render a chain (plus optional disclosures) into a self-contained HTML
/// page. The full JSON document rides along in a script island and an inline
/// script checks structure and linkage with no network access.
pub fn export_widget(
    chain: &ProofChain,
    disclosures: Option<&[DisclosureProof]>,
) -> ProvenanceResult<String> {
    let json = export_full(chain, disclosures)?;
    // A literal close tag inside the island would end the script early
    let json = json.replace("</", "<\\/");
    let html = format!("{}{}{}", WIDGET_HEAD, json, WIDGET_TAIL);
    debug!(
        "Widget export of chain {}: {} bytes of HTML",
        chain.short_id(),
        html.len()
    );
    Ok(html)
}

/// Pull the embedded JSON document back out of a widget page
pub fn import_widget(html: &str) -> ProvenanceResult<(ProofChain, Vec<DisclosureProof>)> {
    let island_open = format!("<script type=\"application/json\" id=\"{}\">", JSON_ISLAND_ID);
    let start = html.find(&island_open).ok_or_else(|| {
        ProvenanceError::MalformedEncoding("widget is missing its proof island".into())
    })? + island_open.len();
    let end = html[start..].find("</script>").ok_or_else(|| {
        ProvenanceError::MalformedEncoding("widget proof island is unterminated".into())
    })? + start;
    let json = html[start..end].replace("<\\/", "</");
    import_full(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::test_support::{demo_chain, demo_disclosure};

    #[test]
    fn test_widget_round_trip() {
        let (chain, evaluator) = demo_chain(2);
        let html = export_widget(&chain, None).unwrap();
        let (imported, disclosures) = import_widget(&html).unwrap();
        assert_eq!(imported.chain_id, chain.chain_id);
        assert_eq!(imported.links, chain.links);
        assert!(disclosures.is_empty());
        assert!(imported.verify(&evaluator, Default::default()).unwrap());
    }

    #[test]
    fn test_widget_is_self_contained() {
        let (chain, _) = demo_chain(1);
        let html = export_widget(&chain, None).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        // No external fetches of any kind
        assert!(!html.contains("http://"));
        assert!(!html.contains("https://"));
        assert!(!html.contains("src="));
        assert!(!html.contains("fetch("));
    }

    #[test]
    fn test_widget_carries_disclosures() {
        let (chain, _) = demo_chain(1);
        let disclosure = demo_disclosure();
        let html = export_widget(&chain, Some(std::slice::from_ref(&disclosure))).unwrap();
        let (_, disclosures) = import_widget(&html).unwrap();
        assert_eq!(disclosures, vec![disclosure]);
    }

    #[test]
    fn test_widget_without_island_rejected() {
        assert!(matches!(
            import_widget("<html><body>nothing here</body></html>"),
            Err(ProvenanceError::MalformedEncoding(_))
        ));
    }
}
