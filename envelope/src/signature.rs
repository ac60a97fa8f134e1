//! Deterministic fingerprints for "collections changed" notifications.
//!
//! Two contexts that both react to the same underlying change would otherwise
//! echo each other forever. A sender remembers the signature of the last set
//! it announced and stays quiet while the signature is unchanged.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::bytes_to_hex;

/// The signature-relevant view of one collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub bookmark_count: u64,
    /// Last-modified stamp, milliseconds since Unix epoch.
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl CollectionSummary {
    fn fold_into(&self, hasher: &mut Sha256) {
        let position = self.position.map(i64::to_be_bytes);
        let updated_at = self.updated_at.map(i64::to_be_bytes);
        let bookmark_count = self.bookmark_count.to_be_bytes();
        let flags = [u8::from(self.is_pinned), u8::from(self.is_shared)];
        let fields: [Option<&[u8]>; 8] = [
            Some(self.id.as_bytes()),
            Some(self.name.as_bytes()),
            self.icon.as_deref().map(str::as_bytes),
            self.color.as_deref().map(str::as_bytes),
            position.as_ref().map(<[u8; 8]>::as_slice),
            Some(flags.as_slice()),
            Some(bookmark_count.as_slice()),
            updated_at.as_ref().map(<[u8; 8]>::as_slice),
        ];
        for field in fields {
            fold_field(hasher, field);
        }
    }
}

/// Length-prefix every field so no content can shift a field boundary.
/// An absent field is distinct from an empty one.
fn fold_field(hasher: &mut Sha256, field: Option<&[u8]>) {
    match field {
        None => hasher.update([0u8]),
        Some(bytes) => {
            hasher.update([1u8]);
            hasher.update(u64::try_from(bytes.len()).unwrap_or(u64::MAX).to_be_bytes());
            hasher.update(bytes);
        }
    }
}

/// Fold a collection set into a hex SHA-256 signature.
///
/// Order matters: the dashboard renders collections in the order given, so a
/// reordering is a real change.
#[must_use]
pub fn collections_signature(collections: &[CollectionSummary]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(u64::try_from(collections.len()).unwrap_or(u64::MAX).to_be_bytes());
    for collection in collections {
        collection.fold_into(&mut hasher);
    }
    bytes_to_hex(&hasher.finalize())
}
