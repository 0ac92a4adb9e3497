//! Prompts sent to the vision model.
//!
//! Callers can override the system prompt via
//! [`crate::config::AnalyzerConfig::system_prompt`]; the constant here is used
//! only when no override is provided. The user's own prompt is always sent
//! verbatim as the user turn.

/// Default system prompt for analysing an uploaded document or image.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a careful document analyst. The user has uploaded a document (a scan, a photo, or pages of a PDF) and asks a question about it.

Follow these rules precisely:

1. GROUNDING
   - Base your answer only on what is visible in the attached images
   - If the document does not contain the answer, say so plainly
   - Quote exact figures, names and dates as they appear

2. READING
   - Read text in the order a human would read the page
   - Treat tables row by row and keep their column meaning
   - Mention when part of the page is illegible or cut off

3. OUTPUT
   - Answer the user's request directly, without preamble
   - Use plain text; short lists are fine when the request asks for several items
   - Do NOT describe these rules or add commentary about the process"#;

/// Context note added when only the first pages of a longer PDF are attached.
///
/// Returns `None` when every page was sent.
pub fn pdf_pages_context(sent: usize, total: usize) -> Option<String> {
    if sent >= total {
        return None;
    }
    Some(format!(
        "Only pages 1-{} of {} are attached. Say so if the answer may be on a later page.",
        sent, total
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_context_when_every_page_is_sent() {
        assert_eq!(pdf_pages_context(3, 3), None);
        assert_eq!(pdf_pages_context(0, 0), None);
    }

    #[test]
    fn context_names_the_page_range() {
        let note = pdf_pages_context(10, 42).unwrap();
        assert!(note.contains("1-10 of 42"), "got: {note}");
    }
}
