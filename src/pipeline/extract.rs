//! Pull fenced Markdown blocks out of a raw model response.
//!
//! Models wrap their answer in a fence but often add a sentence before or
//! after it. The scan is single-pass, left to right, and yields
//! non-overlapping blocks in order of discovery:
//!
//! 1. From the cursor, look for a ```` ```markdown ```` opener; only if there
//!    is none anywhere ahead, fall back to a bare ```` ``` ```` opener.
//! 2. Content starts on the line after the opener.
//! 3. It ends at the next bare ```` ``` ````, or at end of input when the
//!    fence is never closed.
//! 4. Trim, keep, and continue after the closer.

const TAGGED_FENCE: &str = "```markdown";
const FENCE: &str = "```";

/// Extract every fenced block from `text`, most-specific fence first.
///
/// Returns an empty vector when `text` contains no fence. A block whose
/// opener is the last line of the input (no line terminator) is empty.
pub fn extract_markdown_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while cursor < text.len() {
        let rest = &text[cursor..];
        let Some(open) = rest.find(TAGGED_FENCE).or_else(|| rest.find(FENCE)) else {
            break;
        };
        let open = cursor + open;

        let start = match text[open..].find('\n') {
            Some(nl) => open + nl + 1,
            None => text.len(),
        };

        let (end, next) = match text[start..].find(FENCE) {
            Some(close) => (start + close, start + close + FENCE.len()),
            None => (text.len(), text.len()),
        };

        blocks.push(text[start..end].trim().to_string());
        cursor = next;
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_block_is_extracted_and_trimmed() {
        let raw = "Here you go:\n```markdown\n\n# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n```\nDone.";
        assert_eq!(
            extract_markdown_blocks(raw),
            vec!["# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |".to_string()]
        );
    }

    #[test]
    fn tagged_block_wins_over_later_bare_fence() {
        let raw = "```markdown\n# Page\n```\nand some code:\n```\nlet x = 1;\n```";
        let blocks = extract_markdown_blocks(raw);
        assert_eq!(blocks[0], "# Page");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1], "let x = 1;");
    }

    #[test]
    fn tagged_block_is_preferred_over_earlier_bare_fence() {
        // The tagged opener is searched first from the cursor, so the earlier
        // bare block is skipped over entirely.
        let raw = "```\nnoise\n```\n```markdown\nsignal\n```";
        assert_eq!(extract_markdown_blocks(raw), vec!["signal".to_string()]);
    }

    #[test]
    fn bare_fence_is_still_extracted() {
        let raw = "```\n## Heading\ntext\n```";
        assert_eq!(
            extract_markdown_blocks(raw),
            vec!["## Heading\ntext".to_string()]
        );
    }

    #[test]
    fn no_fence_yields_nothing() {
        assert!(extract_markdown_blocks("plain answer without fences").is_empty());
        assert!(extract_markdown_blocks("").is_empty());
    }

    #[test]
    fn unterminated_fence_runs_to_end_of_input() {
        let raw = "Sure.\n```markdown\n# Cut off\n| a |\n";
        assert_eq!(
            extract_markdown_blocks(raw),
            vec!["# Cut off\n| a |".to_string()]
        );
    }

    #[test]
    fn two_tagged_blocks_in_order() {
        let raw = "```markdown\nprevious\n```\n\n```markdown\ncurrent\n```";
        assert_eq!(
            extract_markdown_blocks(raw),
            vec!["previous".to_string(), "current".to_string()]
        );
    }

    #[test]
    fn crlf_line_endings() {
        let raw = "```markdown\r\n# A\r\n```\r\n";
        assert_eq!(extract_markdown_blocks(raw), vec!["# A".to_string()]);
    }

    #[test]
    fn opener_on_last_line_gives_empty_block() {
        assert_eq!(extract_markdown_blocks("text ```markdown"), vec![String::new()]);
    }
}
