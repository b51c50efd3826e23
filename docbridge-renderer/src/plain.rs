//! Markdown → plain text.
//!
//! Rules, applied in order:
//!
//! | Input                         | Output                     |
//! |-------------------------------|----------------------------|
//! | fenced / indented code blocks | dropped entirely           |
//! | inline code                   | its literal text           |
//! | raw HTML tags                 | dropped, inner text kept   |
//! | emphasis, links, headings     | their text only            |
//! | any whitespace run            | a single space, trimmed    |
//! | `â†’` (mis-decoded arrow)      | `->`                       |
//! | `<null>`                      | `"null"`                   |
//!
//! The conversion is idempotent: rendering its own output returns it
//! unchanged.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

/// Encoding artifacts replaced after text extraction.
const FIXUPS: &[(&str, &str)] = &[("â†’", "->"), ("<null>", "\"null\"")];

/// Render `markdown` as single-line plain text.
pub fn render_plain_text(markdown: &str) -> String {
    // `<null>` would otherwise be parsed as an inline HTML tag and dropped.
    let markdown = markdown.replace("<null>", "\"null\"");

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut text = String::with_capacity(markdown.len());
    let mut code_block_depth = 0usize;
    for event in Parser::new_ext(&markdown, options) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => code_block_depth += 1,
            Event::End(TagEnd::CodeBlock) => {
                code_block_depth = code_block_depth.saturating_sub(1);
                text.push(' ');
            }
            _ if code_block_depth > 0 => {}
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak | Event::Rule => text.push(' '),
            Event::Html(html) => {
                text.push(' ');
                strip_tags(&html, &mut text);
                text.push(' ');
            }
            Event::InlineHtml(html) => strip_tags(&html, &mut text),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::TableCell
                | TagEnd::TableRow
                | TagEnd::TableHead,
            ) => text.push(' '),
            _ => {}
        }
    }

    let mut single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    for (from, to) in FIXUPS {
        if single_line.contains(from) {
            single_line = single_line.replace(from, to);
        }
    }
    single_line
}

/// Append `html` to `out` without its tags.
///
/// A tag left open at the end of the chunk swallows the rest of it; block
/// HTML arrives line by line, so that never crosses a line.
fn strip_tags(html: &str, out: &mut String) {
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            _ => out.push(c),
        }
    }
}
