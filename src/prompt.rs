//! Prompt templates for the completion stages.

/// Sentinel that should never appear in real templates.
const ESCAPE_SENTINEL: &str = "\x00LBRACE\x00";
/// Sentinel for escaped closing brace.
const ESCAPE_SENTINEL_CLOSE: &str = "\x00RBRACE\x00";

/// System instruction for the single-shot summary stage.
pub const SUMMARY_SYSTEM: &str = "Summarize the following content:";

/// User prompt for the outline stage. `{input}` is the budgeted source text.
pub const OUTLINE_TEMPLATE: &str = "Create a detailed outline for an article based on the \
following content. Use headings and short bullet points.\n\n{input}";

/// User prompt for the article stage. `{input}` is the full outline.
pub const ARTICLE_TEMPLATE: &str = "Write a complete, well-structured article that follows \
this outline section by section:\n\n{input}";

/// Substitute `input` into a stage template.
///
/// Replaces `{input}` with `input`. The inserted text is never itself
/// scanned for escapes, so an outline containing braces passes through
/// verbatim.
///
/// Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
///
/// # Example
///
/// ```
/// use content_pipeline::prompt::render;
///
/// let result = render("Reply as JSON {{\"summary\": ...}} for: {input}", "data");
/// assert_eq!(result, r#"Reply as JSON {"summary": ...} for: data"#);
/// ```
pub fn render(template: &str, input: &str) -> String {
    // Pass 1: protect escaped braces
    let mut rendered = template.replace("{{", ESCAPE_SENTINEL);
    rendered = rendered.replace("}}", ESCAPE_SENTINEL_CLOSE);

    // Pass 2: substitute the input
    rendered = rendered.replace("{input}", input);

    // Pass 3: restore escaped braces
    rendered = rendered.replace(ESCAPE_SENTINEL, "{");
    rendered = rendered.replace(ESCAPE_SENTINEL_CLOSE, "}");
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic() {
        assert_eq!(render("Process {input} now", "data"), "Process data now");
    }

    #[test]
    fn test_render_no_placeholders() {
        let result = render("static prompt", "ignored_in_template");
        assert_eq!(result, "static prompt");
    }

    #[test]
    fn test_render_escaped_braces_no_substitution() {
        let result = render("Output format: {{\"result\": {{\"value\": 42}}}}", "data");
        assert_eq!(result, r#"Output format: {"result": {"value": 42}}"#);
    }

    #[test]
    fn test_escaped_placeholder_stays_literal() {
        assert_eq!(render("Use {{input}} for {input}", "text"), "Use {input} for text");
    }

    #[test]
    fn test_input_is_not_rescanned() {
        let outline = "1. Intro {input}\n2. {{Body}}";
        let result = render("Outline:\n{input}", outline);
        assert_eq!(result, "Outline:\n1. Intro {input}\n2. {{Body}}");
    }

    #[test]
    fn test_article_template_embeds_outline_verbatim() {
        let outline = "I. Background\n  - history\nII. Findings";
        let prompt = render(ARTICLE_TEMPLATE, outline);
        assert!(prompt.ends_with(outline));
        assert!(prompt.starts_with("Write a complete"));
    }

    #[test]
    fn test_outline_template_has_input() {
        assert!(OUTLINE_TEMPLATE.contains("{input}"));
        assert!(render(OUTLINE_TEMPLATE, "source").ends_with("\n\nsource"));
    }
}
