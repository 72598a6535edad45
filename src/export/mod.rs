pub mod compact;
pub mod full;
pub mod url;
pub mod widget;

use serde::{de::DeserializeOwned, Serialize};

use crate::core::errors::ProvenanceResult;

pub use compact::{export_compact, import_compact};
pub use full::{export_full, import_full, ExportedLink, FullExport};
pub use url::{export_url, import_url, URL_TEMPLATE_PLACEHOLDER};
pub use widget::{export_widget, import_widget};

/// Serialize any proof artifact for storage
pub fn to_bytes<T: Serialize>(artifact: &T) -> ProvenanceResult<Vec<u8>> {
    Ok(serde_json::to_vec(artifact)?)
}

/// Deserialize a stored proof artifact
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> ProvenanceResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}
