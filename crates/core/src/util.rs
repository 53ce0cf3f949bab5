/// Hash and size figures for a piece of generated content.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContentStats {
    /// Hex-encoded BLAKE3 hash of the content.
    pub hash: String,
    pub word_count: u32,
    pub character_count: u32,
}

pub fn content_stats(content: &str) -> ContentStats {
    ContentStats {
        hash: content_hash(content),
        word_count: saturating_u32(content.split_whitespace().count()),
        character_count: saturating_u32(content.chars().count()),
    }
}

pub fn content_hash(content: &str) -> String {
    hex::encode(blake3::hash(content.as_bytes()).as_bytes())
}

fn saturating_u32(value: usize) -> u32 { u32::try_from(value).unwrap_or(u32::MAX) }

/// Truncate to at most `max_bytes`, backing off to a char boundary.
pub fn truncate_utf8(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_stats() {
        let stats = content_stats("  one two\tthree\n");
        assert_eq!(stats.word_count, 3);
        assert_eq!(stats.character_count, 16);
        assert_eq!(stats.hash, content_hash("  one two\tthree\n"));
        assert_ne!(stats.hash, content_hash("one two three"));
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate_utf8("hello", 10), "hello");
        assert_eq!(truncate_utf8("hello", 3), "hel");
        // 'é' is two bytes; cutting inside it backs off
        assert_eq!(truncate_utf8("aé", 2), "a");
    }
}
