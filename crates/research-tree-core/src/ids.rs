//! Identifier and dedup primitives.
//!
//! - Chunk ids are content-addressed: the SHA-256 of the chunk text, unless
//!   the retrieval backend supplied its own stable id.
//! - Question dedup keys are the text trimmed and lowercased.
//!
//! Chunk ids never depend on a result's position in a search response, so
//! the same evidence retrieved by two different searches maps to one id.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a chunk's text.
///
/// # Example
///
/// ```rust
/// use research_tree_core::ids::chunk_id;
///
/// let a = chunk_id("Black holes evaporate.");
/// assert_eq!(a, chunk_id("Black holes evaporate."));
/// assert_eq!(a.len(), 64);
/// ```
pub fn chunk_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Resolve the id for a retrieved chunk: the upstream id wins when present
/// and non-blank, otherwise the content hash.
pub fn resolve_chunk_id(upstream: Option<&str>, text: &str) -> String {
    match upstream.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => chunk_id(text),
    }
}

/// Dedup key for question text.
pub fn normalize_question(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_is_deterministic() {
        assert_eq!(chunk_id("alpha"), chunk_id("alpha"));
        assert_ne!(chunk_id("alpha"), chunk_id("beta"));
    }

    #[test]
    fn test_chunk_id_known_digest() {
        assert_eq!(
            chunk_id(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_upstream_id_takes_priority() {
        assert_eq!(resolve_chunk_id(Some("es-42"), "text"), "es-42");
        assert_eq!(resolve_chunk_id(Some("  "), "text"), chunk_id("text"));
        assert_eq!(resolve_chunk_id(None, "text"), chunk_id("text"));
    }

    #[test]
    fn test_normalize_question() {
        assert_eq!(
            normalize_question("  What Is A Black Hole?\n"),
            "what is a black hole?"
        );
    }
}
