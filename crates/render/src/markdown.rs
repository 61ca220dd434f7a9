//! Markdown subset for assistant replies.
//!
//! Handles what models actually produce:
//! - fenced code blocks (``` and ~~~), rendered by [`crate::code_block`]
//! - `# Heading` through `###### Heading`
//! - `**bold**`, `*italic*`, `_italic_`
//! - `- bullet` and `* bullet` list items
//! - `[text](url)` links and bare YouTube URLs
//! - `` `inline code` ``
//! - paragraphs separated by blank lines, single newlines as `<br>`

use crate::code_block::{parse_placeholder, render_code_block, split_fences, CodeBlock};
use crate::escape::escape_html;
use crate::youtube;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub html: String,
    pub code_blocks: Vec<CodeBlock>,
}

/// Render a reply to HTML.
pub fn render_message(text: &str) -> String {
    render_message_with_blocks(text).html
}

/// Render a reply and keep the extracted code blocks, so callers can act
/// on a block by the `data-block-index` its buttons carry.
pub fn render_message_with_blocks(text: &str) -> RenderedMessage {
    // NUL is reserved for placeholders.
    let normalized = text.replace("\r\n", "\n").replace('\u{0}', "");
    let (prose, code_blocks) = split_fences(&normalized);
    let escaped = escape_html(&prose);

    let mut out = BlockWriter::default();
    for line in escaped.split('\n') {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            out.close();
            continue;
        }

        if let Some(index) = parse_placeholder(trimmed) {
            out.close();
            match code_blocks.get(index) {
                Some(block) => out.html.push_str(&render_code_block(block)),
                None => tracing::warn!(index, "code block placeholder without a block"),
            }
            continue;
        }

        if let Some((level, rest)) = heading(trimmed) {
            out.close();
            // `#` maps to h3.
            let tag = (level + 2).min(6);
            out.html
                .push_str(&format!("<h{tag}>{}</h{tag}>", render_inline(rest)));
            continue;
        }

        if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            out.open(Block::List);
            out.html.push_str(&format!("<li>{}</li>", render_inline(item.trim())));
            continue;
        }

        if out.current == Some(Block::Paragraph) {
            out.html.push_str("<br>");
        } else {
            out.open(Block::Paragraph);
        }
        out.html.push_str(&render_inline(trimmed));
    }
    out.close();

    tracing::debug!(
        code_blocks = code_blocks.len(),
        html_len = out.html.len(),
        "rendered message"
    );
    RenderedMessage {
        html: out.html,
        code_blocks,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Paragraph,
    List,
}

#[derive(Default)]
struct BlockWriter {
    html: String,
    current: Option<Block>,
}

impl BlockWriter {
    fn open(&mut self, block: Block) {
        if self.current == Some(block) {
            return;
        }
        self.close();
        self.html.push_str(match block {
            Block::Paragraph => "<p>",
            Block::List => "<ul>",
        });
        self.current = Some(block);
    }

    fn close(&mut self) {
        if let Some(block) = self.current.take() {
            self.html.push_str(match block {
                Block::Paragraph => "</p>",
                Block::List => "</ul>",
            });
        }
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    line[level..].strip_prefix(' ').map(|rest| (level, rest.trim()))
}

// ── Inline ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Bold,
    Italic(char),
    Code,
    Link,
}

/// Apply inline rules to one line of already-escaped text.
fn render_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut remaining = text;

    while !remaining.is_empty() {
        let Some((pos, kind)) = find_next_marker(remaining) else {
            out.push_str(&youtube::linkify(remaining));
            break;
        };
        out.push_str(&youtube::linkify(&remaining[..pos]));

        match kind {
            MarkerKind::Bold => {
                let rest = &remaining[pos + 2..];
                match rest.find("**").filter(|end| *end > 0) {
                    Some(end) => {
                        out.push_str(&format!("<strong>{}</strong>", render_inline(&rest[..end])));
                        remaining = &rest[end + 2..];
                    }
                    None => {
                        out.push_str("**");
                        remaining = rest;
                    }
                }
            }
            MarkerKind::Italic(marker) => {
                let rest = &remaining[pos + 1..];
                match closing_italic(rest, marker) {
                    Some(end) => {
                        out.push_str(&format!("<em>{}</em>", render_inline(&rest[..end])));
                        remaining = &rest[end + 1..];
                    }
                    None => {
                        out.push(marker);
                        remaining = rest;
                    }
                }
            }
            MarkerKind::Code => {
                let rest = &remaining[pos + 1..];
                match rest.find('`') {
                    Some(end) => {
                        out.push_str(&format!("<code>{}</code>", &rest[..end]));
                        remaining = &rest[end + 1..];
                    }
                    None => {
                        out.push('`');
                        remaining = rest;
                    }
                }
            }
            MarkerKind::Link => {
                let rest = &remaining[pos + 1..];
                match parse_link(rest) {
                    Some((label, url, consumed)) => {
                        out.push_str(&format!(
                            r#"<a href="{url}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                            render_inline(label)
                        ));
                        remaining = &rest[consumed..];
                    }
                    None => {
                        out.push('[');
                        remaining = rest;
                    }
                }
            }
        }
    }
    out
}

/// `label](url)` after the opening bracket. Only http(s) targets become links.
fn parse_link(rest: &str) -> Option<(&str, &str, usize)> {
    let close = rest.find("](")?;
    let after = &rest[close + 2..];
    let end = after.find(')')?;
    let url = after[..end].trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return None;
    }
    Some((&rest[..close], url, close + 2 + end + 1))
}

fn find_next_marker(text: &str) -> Option<(usize, MarkerKind)> {
    let mut best: Option<(usize, MarkerKind)> = None;
    let mut consider = |found: Option<usize>, kind: MarkerKind| {
        if let Some(pos) = found {
            if best.map_or(true, |(b, _)| pos < b) {
                best = Some((pos, kind));
            }
        }
    };

    consider(text.find("**"), MarkerKind::Bold);
    consider(find_single_star(text), MarkerKind::Italic('*'));
    consider(find_opening_underscore(text), MarkerKind::Italic('_'));
    consider(text.find('`'), MarkerKind::Code);
    consider(
        text.find('[').filter(|pos| text[*pos..].contains("](")),
        MarkerKind::Link,
    );

    best
}

/// A lone `*` directly followed by non-space text.
fn find_single_star(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    (0..bytes.len()).find(|&i| {
        bytes[i] == b'*'
            && (i == 0 || bytes[i - 1] != b'*')
            && bytes
                .get(i + 1)
                .is_some_and(|next| *next != b'*' && !next.is_ascii_whitespace())
    })
}

/// `_` at a word start, so `snake_case` names stay untouched.
fn find_opening_underscore(text: &str) -> Option<usize> {
    text.char_indices().find_map(|(i, c)| {
        if c != '_' {
            return None;
        }
        let prev_ok = text[..i]
            .chars()
            .next_back()
            .map_or(true, |p| !p.is_alphanumeric());
        let next_ok = text[i + 1..]
            .chars()
            .next()
            .is_some_and(|n| n != '_' && !n.is_whitespace());
        (prev_ok && next_ok).then_some(i)
    })
}

fn closing_italic(rest: &str, marker: char) -> Option<usize> {
    rest.match_indices(marker).map(|(i, _)| i).find(|&i| {
        if i == 0 {
            return false;
        }
        let before_ok = rest[..i].chars().next_back().is_some_and(|p| !p.is_whitespace());
        let after = rest[i + 1..].chars().next();
        let after_ok = match marker {
            '_' => after.map_or(true, |a| !a.is_alphanumeric()),
            _ => after != Some('*'),
        };
        before_ok && after_ok
    })
}
