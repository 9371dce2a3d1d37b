//! Instructions sent to the vision model.
//!
//! Both prompts ask for fenced ```` ```markdown ```` output because the
//! pipeline locates the answer by its fences; any chatter the model adds
//! around the block is ignored. Callers can override either prompt through
//! [`crate::config::WorkerConfig`]; these constants are used otherwise.

/// Default instruction for converting one page image to Markdown.
pub const PAGE_TO_MARKDOWN_PROMPT: &str = r#"Convert this image of a page from a PDF into Markdown.

Rules:
- Preserve all text in natural reading order.
- Convert every table to a valid Markdown pipe table, with a header row and a separator row.
- If there is an image or figure, replace it with a short alternative text description.
- Do not add commentary.

Return the Markdown inside a single fenced block that starts with ```markdown and ends with ```."#;

/// Default instruction for repairing content split across a page boundary.
///
/// The two pages are appended after this text by [`overlap_correction_prompt`].
pub const OVERLAP_CORRECTION_PROMPT: &str = r#"You are given the Markdown of two consecutive pages of the same PDF document.

Check whether the CURRENT page begins with content that continues from the end of the PREVIOUS page, most often a table whose rows were split by the page break.

If it does, move the continued content so it is whole: append the continued rows to the table on the previous page (without repeating the header) and remove them from the current page. Keep every other line of both pages exactly as it is.

If nothing is split, return both pages unchanged.

Return exactly two fenced blocks, each starting with ```markdown and ending with ```: first the corrected PREVIOUS page, then the corrected CURRENT page. Do not return anything else."#;

/// Build the full correction instruction for a pair of pages.
pub fn overlap_correction_prompt(instruction: &str, previous: &str, current: &str) -> String {
    format!(
        "{instruction}\n\nPREVIOUS page:\n```markdown\n{previous}\n```\n\nCURRENT page:\n```markdown\n{current}\n```"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_prompt_asks_for_markdown_fence() {
        assert!(PAGE_TO_MARKDOWN_PROMPT.contains("```markdown"));
        assert!(PAGE_TO_MARKDOWN_PROMPT.contains("table"));
    }

    #[test]
    fn correction_prompt_embeds_both_pages_in_order() {
        let p = overlap_correction_prompt(OVERLAP_CORRECTION_PROMPT, "| a |", "| b |");
        let prev = p.find("| a |").unwrap();
        let cur = p.find("| b |").unwrap();
        assert!(prev < cur);
        assert!(p.starts_with(OVERLAP_CORRECTION_PROMPT));
    }
}
