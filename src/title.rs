//! Extracts the title of a source document from its first top-level heading.

/// The marker which begins a top-level heading line. Deeper headings (`## `)
/// don't start with this exact sequence and are therefore ignored.
const HEADING_MARKER: &str = "# ";

/// Returns the text following the first line that starts with `# `, with
/// trailing whitespace removed. Returns the empty string if there is no such
/// line. A leading byte order mark is ignored.
///
/// This is a line-oriented scan of the raw markdown rather than a walk of the
/// parsed document, so a `# ` line inside a fenced code block still counts.
pub fn extract_title(markdown: &str) -> &str {
    let markdown = markdown.strip_prefix('\u{feff}').unwrap_or(markdown);
    markdown
        .lines()
        .find_map(|line| line.strip_prefix(HEADING_MARKER))
        .map(str::trim_end)
        .unwrap_or_default()
}
