//! Identity resolution: content keys and item identities.
//!
//! Content keys are SHA-256 based and truncated to [`CONTENT_KEY_LEN`] hex
//! characters (128 bits), so distinct texts only collide with negligible
//! probability. Item identities combine a short fingerprint of the content
//! prefix with a session counter, so two nodes with identical text still get
//! distinct identities.

use sha2::{Digest, Sha256};

use crate::document::Document;
use crate::model::{ContentKey, ItemIdentity};

/// Length of a [`ContentKey`] in characters.
pub const CONTENT_KEY_LEN: usize = 32;

/// Length of the content fingerprint embedded in an [`ItemIdentity`].
const IDENTITY_FINGERPRINT_LEN: usize = 16;

/// Trim, lowercase, and collapse every run of whitespace to a single space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derive the cache key for a piece of content.
///
/// Pure: depends only on the normalized text.
pub fn content_key(text: &str) -> ContentKey {
    let mut hex = sha256_hex(&normalize(text));
    hex.truncate(CONTENT_KEY_LEN);
    ContentKey(hex)
}

fn sha256_hex(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Mints item identities and remembers them on the nodes they belong to.
#[derive(Debug)]
pub struct IdentityResolver {
    next_index: u64,
    prefix_chars: usize,
}

impl IdentityResolver {
    /// `prefix_chars` bounds how much normalized content feeds the fingerprint.
    pub fn new(prefix_chars: usize) -> Self {
        Self {
            next_index: 0,
            prefix_chars,
        }
    }

    /// Identity for `node`: the one already attached to it, or a fresh one
    /// which is attached before returning.
    pub fn resolve<D: Document>(
        &mut self,
        doc: &mut D,
        node: &D::Node,
        content: &str,
    ) -> ItemIdentity {
        if let Some(existing) = doc.identity_marker(node) {
            return existing;
        }
        let identity = self.mint(content);
        doc.set_identity_marker(node, &identity);
        identity
    }

    /// A new identity, unique for this resolver, without attaching it anywhere.
    pub fn mint(&mut self, content: &str) -> ItemIdentity {
        let prefix: String = normalize(content).chars().take(self.prefix_chars).collect();
        let mut fingerprint = sha256_hex(&prefix);
        fingerprint.truncate(IDENTITY_FINGERPRINT_LEN);

        let index = self.next_index;
        self.next_index += 1;
        ItemIdentity(format!("item-{fingerprint}-{index}"))
    }

    /// Number of identities minted so far.
    pub fn minted(&self) -> u64 {
        self.next_index
    }
}
