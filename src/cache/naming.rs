//! Deterministic cache collection names.

use sha2::{Digest, Sha256};

use crate::resilience::retries::OpId;

/// Hex characters of the module digest kept in the name.
const MODULE_DIGEST_LEN: usize = 32;

/// `{prefix}_{operation}_{digest of module path}`.
///
/// Stable across restarts and builds: it depends only on the prefix, the
/// operation name and the module path string.
pub fn collection_name(prefix: &str, op: &OpId) -> String {
    let digest = hex::encode(Sha256::digest(op.module.as_bytes()));
    format!("{}_{}_{}", prefix, op.name, &digest[..MODULE_DIGEST_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_stable() {
        let op = OpId::new("list_snapshots", "app::versions");
        let first = collection_name("memoize", &op);
        assert_eq!(first, collection_name("memoize", &op));
        assert!(first.starts_with("memoize_list_snapshots_"));
        assert_eq!(first.len(), "memoize_list_snapshots_".len() + 32);
    }

    #[test]
    fn test_module_changes_digest() {
        let a = collection_name("memoize", &OpId::new("list", "app::a"));
        let b = collection_name("memoize", &OpId::new("list", "app::b"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_known_digest() {
        // sha256("") = e3b0c442 98fc1c14 9afbf4c8 996fb924 ...
        let name = collection_name("p", &OpId::new("f", ""));
        assert_eq!(name, "p_f_e3b0c44298fc1c149afbf4c8996fb924");
    }
}
