//! Hosted image references.

use serde::{Deserialize, Serialize};

/// An uploaded asset as returned by the image host.
///
/// `public_id` is what the host needs to delete or replace the asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub secure_url: String,
    pub public_id: String,
}
