//! ABOUTME: Cache-key derivation: class tag + hashed question + hashed conversation digest

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use sage_core::ClassFilter;

fn hash_str(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Build the cache key `"<class_tag>:<hash(question)>:<hash(digest)>"`.
///
/// `question` should already be lowercased and trimmed (see
/// [`sage_core::Question::normalized`]); `conversation_digest` is the
/// pipe-joined serialization from [`sage_core::conversation_digest`].
#[must_use]
pub fn cache_key(class_filter: ClassFilter, question_normalized: &str, conversation_digest: &str) -> String {
    format!(
        "{}:{:x}:{:x}",
        class_filter.cache_tag(),
        hash_str(question_normalized),
        hash_str(conversation_digest)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic_for_same_inputs() {
        let a = cache_key(ClassFilter::Class(10), "what is photosynthesis?", "");
        let b = cache_key(ClassFilter::Class(10), "what is photosynthesis?", "");
        assert_eq!(a, b);
    }

    #[test]
    fn key_differs_by_class() {
        let a = cache_key(ClassFilter::Class(10), "what is photosynthesis?", "");
        let b = cache_key(ClassFilter::Class(11), "what is photosynthesis?", "");
        assert_ne!(a, b);
    }

    #[test]
    fn key_differs_by_conversation_digest() {
        let a = cache_key(ClassFilter::All, "what is photosynthesis?", "");
        let b = cache_key(ClassFilter::All, "what is photosynthesis?", "User: hi|Assistant: hello");
        assert_ne!(a, b);
    }
}
