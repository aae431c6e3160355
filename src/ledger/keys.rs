//! Ledger key derivation.
//!
//! Repository and user rows live under a digest of their identifying fields,
//! so the same (author, name) pair always lands on the same key on every
//! replica. Secondary rows use composite keys that share a prefix with their
//! parent, which keeps a repository's rows adjacent in key order.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::json;
use sha2::{Digest, Sha256};

/// Composite key index for branch rows: `[repo, branch]`.
pub const BRANCH_INDEX: &str = "index-Branch";

/// Composite key index for commit rows: `[repo, branch, hash]`.
pub const BRANCH_COMMITS_INDEX: &str = "index-BranchCommits";

/// Composite key index for access log rows: `[repo, authorized, timestamp]`.
pub const REPO_USER_ACCESS_INDEX: &str = "index-RepoUserAccess";

const SEPARATOR: char = '\u{0}';

/// Key of a repository row.
pub fn repo_key(author: &str, name: &str) -> String {
    digest_key(&json!({ "author": author, "name": name }))
}

/// Key of a user row.
pub fn user_key(name: &str, public_key: &str) -> String {
    digest_key(&json!({ "name": name, "publicKey": public_key }))
}

/// Build a composite key: `\0type\0attr1\0attr2\0`.
pub fn composite_key(object_type: &str, attributes: &[&str]) -> String {
    let mut key = String::with_capacity(
        2 + object_type.len() + attributes.iter().map(|a| a.len() + 1).sum::<usize>(),
    );
    key.push(SEPARATOR);
    key.push_str(object_type);
    key.push(SEPARATOR);
    for attr in attributes {
        key.push_str(attr);
        key.push(SEPARATOR);
    }
    key
}

/// base64(sha256(json)). serde_json maps keep keys sorted, so the encoding is
/// canonical.
fn digest_key(value: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_key_is_stable() {
        let key = repo_key("alice", "proj");
        assert_eq!(key, repo_key("alice", "proj"));
        assert_ne!(key, repo_key("alice", "proj2"));
        assert_ne!(key, repo_key("proj", "alice"));
        // 32 byte digest, padded base64
        assert_eq!(key.len(), 44);
        assert!(key.ends_with('='));
    }

    #[test]
    fn test_repo_key_hashes_sorted_json() {
        let mut hasher = Sha256::new();
        hasher.update(br#"{"author":"alice","name":"proj"}"#);
        assert_eq!(repo_key("alice", "proj"), STANDARD.encode(hasher.finalize()));
    }

    #[test]
    fn test_user_key_depends_on_public_key() {
        assert_ne!(user_key("alice", "k1"), user_key("alice", "k2"));
        assert_ne!(user_key("alice", "k1"), repo_key("alice", "k1"));
    }

    #[test]
    fn test_composite_key() {
        assert_eq!(
            composite_key(BRANCH_INDEX, &["repo", "main"]),
            "\u{0}index-Branch\u{0}repo\u{0}main\u{0}"
        );
        assert_eq!(composite_key("t", &[]), "\u{0}t\u{0}");
    }
}
