// Thought Segment Extraction
//
// Generated text interleaves internal reasoning inside <think>...</think>
// markers. decompose() splits an accumulated buffer into the ordered
// reasoning segments and the displayable remainder, without ever exposing
// marker syntax or a half-received segment as answer text.

use regex::Regex;
use std::sync::LazyLock;

/// Opening marker for a reasoning segment
const THOUGHT_OPEN: &str = "<think>";

/// Matches one complete reasoning segment
static THOUGHT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("Invalid thought regex"));

/// Result of decomposing an accumulated text buffer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decomposition {
    /// Reasoning segments in encounter order, trimmed
    pub thoughts: Vec<String>,
    /// Displayable content with all marker pairs removed
    pub main_content: String,
}

/// Decompose an accumulated text buffer into thoughts and display content
///
/// Pure and deterministic: calling it repeatedly on a growing prefix of the
/// same buffer never changes previously extracted thoughts. Text after an
/// open marker with no matching close marker is withheld from both outputs
/// until the close marker arrives on a later re-scan.
///
/// # Arguments
/// * `text` - The full accumulated buffer, not an individual fragment
pub fn decompose(text: &str) -> Decomposition {
    let mut thoughts = Vec::new();
    let mut main_content = String::new();
    let mut cursor = 0;

    for caps in THOUGHT_PATTERN.captures_iter(text) {
        if let (Some(full), Some(inner)) = (caps.get(0), caps.get(1)) {
            main_content.push_str(&text[cursor..full.start()]);
            thoughts.push(inner.as_str().trim().to_string());
            cursor = full.end();
        }
    }

    let tail = &text[cursor..];
    match tail.find(THOUGHT_OPEN) {
        // Dangling open marker: the trailing segment is not yet renderable
        Some(open) => main_content.push_str(&tail[..open]),
        None => main_content.push_str(tail),
    }

    Decomposition {
        thoughts,
        main_content,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(decompose(""), Decomposition::default());
    }

    #[test]
    fn test_plain_text_passes_through() {
        let result = decompose("Hello there");
        assert!(result.thoughts.is_empty());
        assert_eq!(result.main_content, "Hello there");
    }

    #[test]
    fn test_single_thought_before_content() {
        let result = decompose("<think>plan A</think>Hello");
        assert_eq!(result.thoughts, vec!["plan A"]);
        assert_eq!(result.main_content, "Hello");
    }

    #[test]
    fn test_unterminated_thought_is_withheld() {
        let result = decompose("<think>partial");
        assert!(result.thoughts.is_empty());
        assert_eq!(result.main_content, "");
    }

    #[test]
    fn test_content_before_dangling_marker_still_renders() {
        let result = decompose("Answer so far<think>not done yet");
        assert!(result.thoughts.is_empty());
        assert_eq!(result.main_content, "Answer so far");
    }

    #[test]
    fn test_multiple_thoughts_in_source_order() {
        let result =
            decompose("a<think>first</think>b<think> second </think>c");
        assert_eq!(result.thoughts, vec!["first", "second"]);
        assert_eq!(result.main_content, "abc");
    }

    #[test]
    fn test_stray_close_marker_is_plain_text() {
        let result = decompose("a</think>b");
        assert!(result.thoughts.is_empty());
        assert_eq!(result.main_content, "a</think>b");
    }

    #[test]
    fn test_marker_split_across_fragments_resolves_on_rescan() {
        // The buffer is always re-scanned in full, so a marker that arrived
        // in two fragments is recognized once both halves are present.
        let first_half = "Hi <th";
        let full = "Hi <think>x</think> there";
        assert_eq!(decompose(first_half).main_content, "Hi <th");
        let result = decompose(full);
        assert_eq!(result.thoughts, vec!["x"]);
        assert_eq!(result.main_content, "Hi  there");
    }

    #[test]
    fn test_growing_prefix_never_changes_emitted_thoughts() {
        let full = "<think>alpha</think>one<think>beta</think>two";
        let mut previous: Vec<String> = Vec::new();
        for len in 0..=full.len() {
            let result = decompose(&full[..len]);
            assert!(
                result.thoughts.starts_with(&previous),
                "previously emitted thoughts changed at prefix length {}",
                len
            );
            previous = result.thoughts;
        }
        assert_eq!(previous, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_malformed_nesting_degrades_without_panic() {
        let result = decompose("<think>a<think>b</think>c");
        // The non-greedy pair wins; whatever was inside it is a thought and
        // the remainder stays visible.
        assert_eq!(result.thoughts.len(), 1);
        assert_eq!(result.main_content, "c");
    }

    #[test]
    fn test_thought_trimming() {
        let result = decompose("<think>\n  indented reasoning \n</think>done");
        assert_eq!(result.thoughts, vec!["indented reasoning"]);
        assert_eq!(result.main_content, "done");
    }
}
