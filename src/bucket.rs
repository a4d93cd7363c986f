//! Deterministic naming for the per-cluster state bucket.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const HASH_LEN: usize = 10;

/// Name of the object storage bucket that backs a cluster.
///
/// The name is `<cluster>-<hash>` where `hash` is the first ten hex digits
/// of the SHA-256 digest over the project and zone. Re-running the same
/// command always targets the same bucket, and the same cluster name in a
/// different project or zone gets a different one.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketName(String);

impl BucketName {
    /// Derives the bucket name for a cluster.
    #[must_use]
    pub fn derive(cluster_name: &str, project: &str, zone: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(project.as_bytes());
        hasher.update([0_u8]);
        hasher.update(zone.as_bytes());
        let digest = hex::encode(hasher.finalize());
        let suffix: String = digest.chars().take(HASH_LEN).collect();
        Self(format!("{cluster_name}-{suffix}"))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BucketName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
