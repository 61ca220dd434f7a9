//! Fenced code blocks: extraction, placeholders, and the HTML container.

use crate::escape::escape_html;

const PLACEHOLDER_PREFIX: &str = "\u{0}CODEBLOCK";
const PLACEHOLDER_END: char = '\u{0}';
const DEFAULT_LANGUAGE: &str = "plaintext";

/// Buttons rendered in each block header, as (action, label).
const ACTIONS: [(&str, &str); 3] = [("copy", "Copy"), ("save", "Save"), ("apply", "Apply")];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Position among the blocks of one message, starting at 0.
    pub index: usize,
    pub language: Option<String>,
    pub code: String,
}

impl CodeBlock {
    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }
}

struct Fence {
    ch: char,
    len: usize,
}

fn opening_fence(line: &str) -> Option<(Fence, Option<String>)> {
    let trimmed = line.trim_start();
    let ch = trimmed.chars().next()?;
    if ch != '`' && ch != '~' {
        return None;
    }
    let len = trimmed.chars().take_while(|c| *c == ch).count();
    if len < 3 {
        return None;
    }
    let info = trimmed[len..].trim();
    // "```js```" on one line is inline code, not a fence.
    if ch == '`' && info.contains('`') {
        return None;
    }
    let language = info
        .split_whitespace()
        .next()
        .map(sanitize_language)
        .filter(|l| !l.is_empty());
    Some((Fence { ch, len }, language))
}

fn closes(line: &str, fence: &Fence) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= fence.len && trimmed.chars().all(|c| c == fence.ch)
}

fn sanitize_language(tag: &str) -> String {
    tag.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '#' | '-' | '_' | '.'))
        .collect::<String>()
        .to_ascii_lowercase()
}

pub(crate) fn placeholder(index: usize) -> String {
    format!("{}{}{}", PLACEHOLDER_PREFIX, index, PLACEHOLDER_END)
}

pub(crate) fn parse_placeholder(line: &str) -> Option<usize> {
    line.strip_prefix(PLACEHOLDER_PREFIX)?
        .strip_suffix(PLACEHOLDER_END)?
        .parse()
        .ok()
}

/// Replace every fenced block with a placeholder line.
///
/// Returns the remaining prose and the blocks in order. A fence is closed
/// by a line of the same character at least as long as the opener; an
/// unterminated fence runs to the end of the text.
pub(crate) fn split_fences(text: &str) -> (String, Vec<CodeBlock>) {
    let mut prose = String::with_capacity(text.len());
    let mut blocks = Vec::new();
    let mut lines = text.split('\n');

    while let Some(line) = lines.next() {
        if let Some((fence, language)) = opening_fence(line) {
            let mut body: Vec<&str> = Vec::new();
            for inner in lines.by_ref() {
                if closes(inner, &fence) {
                    break;
                }
                body.push(inner);
            }
            let index = blocks.len();
            prose.push_str(&placeholder(index));
            prose.push('\n');
            blocks.push(CodeBlock {
                index,
                language,
                code: body.join("\n"),
            });
        } else {
            prose.push_str(line);
            prose.push('\n');
        }
    }
    prose.pop();
    (prose, blocks)
}

/// Every fenced block in `text`, in order of appearance.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    let normalized = text.replace("\r\n", "\n");
    split_fences(&normalized).1
}

/// The interactive container for one block. The body is escaped here,
/// independently of the surrounding prose.
pub fn render_code_block(block: &CodeBlock) -> String {
    let lang = escape_html(block.language_or_default());
    let index = block.index;

    let mut html = format!(
        r#"<div class="code-block" data-language="{lang}" data-block-index="{index}">"#
    );
    html.push_str(&format!(
        r#"<div class="code-block-header"><span class="code-language">{lang}</span><div class="code-actions">"#
    ));
    for (action, label) in ACTIONS {
        html.push_str(&format!(
            r#"<button class="code-action {action}-code" data-action="{action}" data-block-index="{index}">{label}</button>"#
        ));
    }
    html.push_str("</div></div>");
    html.push_str(&format!(
        r#"<pre><code class="language-{lang}">{}</code></pre></div>"#,
        escape_html(&block.code)
    ));
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backtick_and_tilde_fences() {
        let text = "intro\n```js\nwiggle(2,30)\n```\nmiddle\n~~~\nloopOut()\n~~~\nend";
        let blocks = extract_code_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].language.as_deref(), Some("js"));
        assert_eq!(blocks[0].code, "wiggle(2,30)");
        assert_eq!(blocks[1].language, None);
        assert_eq!(blocks[1].language_or_default(), "plaintext");
        assert_eq!(blocks[1].index, 1);
    }

    #[test]
    fn test_tilde_does_not_close_backtick_fence() {
        let blocks = extract_code_blocks("```\na\n~~~\nb\n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].code, "a\n~~~\nb");
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let blocks = extract_code_blocks("text\n```jsx\nconst a = 1;\nconst b = 2;");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].code, "const a = 1;\nconst b = 2;");
    }

    #[test]
    fn test_crlf_input() {
        let blocks = extract_code_blocks("```js\r\nvar x = 1;\r\n```\r\n");
        assert_eq!(blocks[0].code, "var x = 1;");
    }

    #[test]
    fn test_split_leaves_placeholder_lines() {
        let (prose, blocks) = split_fences("a\n```\nx\n```\nb");
        assert_eq!(blocks.len(), 1);
        let lines: Vec<&str> = prose.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(parse_placeholder(lines[1]), Some(0));
        assert_eq!(parse_placeholder(lines[0]), None);
    }

    #[test]
    fn test_language_tag_is_sanitized() {
        let blocks = extract_code_blocks("```\"><script> extra\nx\n```");
        assert_eq!(blocks[0].language.as_deref(), Some("script"));
    }

    #[test]
    fn test_container_escapes_body_and_numbers_buttons() {
        let html = render_code_block(&CodeBlock {
            index: 3,
            language: Some("js".into()),
            code: "if (a < b) alert(\"x\");".into(),
        });
        assert!(html.starts_with(r#"<div class="code-block" data-language="js" data-block-index="3">"#));
        assert!(html.contains("if (a &lt; b) alert(&quot;x&quot;);"));
        assert_eq!(html.matches(r#"data-block-index="3""#).count(), 4);
        assert!(html.contains(r#"data-action="apply""#));
    }
}
