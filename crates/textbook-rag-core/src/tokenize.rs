//! Term normalization shared by index construction and query projection.
//!
//! Both sides of retrieval must see exactly the same terms, so there is one
//! tokenizer and nothing else in the crate splits text.
//!
//! Rules, applied in order:
//!
//! 1. Lowercase the input.
//! 2. Split on every character that is not alphanumeric.
//! 3. Drop tokens shorter than [`MIN_TOKEN_CHARS`] characters.
//! 4. Drop stopwords.

use crate::stopwords::is_stopword;

/// Shortest token kept, in characters.
pub const MIN_TOKEN_CHARS: usize = 2;

/// Split `text` into normalized, stopword-free terms, in order of appearance.
///
/// ```rust
/// use textbook_rag_core::tokenize::tokenize;
///
/// assert_eq!(tokenize("What is ROS 2?"), vec!["ros"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|t| !is_stopword(t))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_splits() {
        assert_eq!(
            tokenize("Gazebo, Isaac-Sim; ROS2"),
            vec!["gazebo", "isaac", "sim", "ros2"]
        );
    }

    #[test]
    fn test_drops_stopwords_and_single_chars() {
        assert_eq!(tokenize("a robot is a machine, x y z"), vec!["robot", "machine"]);
    }

    #[test]
    fn test_empty_and_punctuation_only() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("?!... --- ,,,").is_empty());
    }

    #[test]
    fn test_keeps_repeats() {
        assert_eq!(tokenize("robot robot Robot"), vec!["robot", "robot", "robot"]);
    }

    #[test]
    fn test_unicode_letters_are_term_characters() {
        assert_eq!(tokenize("Über señal"), vec!["über", "señal"]);
    }
}
