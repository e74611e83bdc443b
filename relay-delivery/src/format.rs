//! Content formatter: pure text transformation from raw model output to
//! render-safe HTML for the transport.
//!
//! Normalizes bullet markers, converts fenced/inline code to `<pre><code>` /
//! `<code>` with escaping, then runs a markup-repair pass so the transport
//! never receives unbalanced or hostile tags (an invalid tag makes Telegram
//! reject the whole message). No I/O, no state.

use relay_core::ContentKind;

/// Formats raw model text for delivery: bullets → canonical `•`, code fences →
/// `<pre><code class="language-X">`, inline backticks → `<code>`, then markup
/// repair. Non-text content kinds get their indicator emoji prefixed.
pub fn format_content(text: &str, kind: ContentKind) -> String {
    if text.is_empty() {
        return String::new();
    }
    let bulleted = normalize_bullets(text);
    let coded = convert_code(&bulleted);
    let repaired = repair_markup(&coded);
    match kind.indicator() {
        Some(indicator) => format!("{} {}", indicator, repaired),
        None => repaired,
    }
}

/// Escapes `&`, `<`, `>` so the text renders literally.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Rewrites leading `•`/`*`/`-` markers to a single canonical bullet, skipping
/// lines inside fenced blocks (their indentation and markers are content).
fn normalize_bullets(text: &str) -> String {
    let mut out = Vec::new();
    let mut in_fence = false;
    for line in text.split('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            out.push(line.to_string());
            continue;
        }
        if in_fence {
            out.push(line.to_string());
            continue;
        }
        if trimmed.starts_with("• ") || trimmed.starts_with("* ") || trimmed.starts_with("- ") {
            let rest = trimmed[2..].trim();
            out.push(format!("• {}", rest));
        } else {
            out.push(trimmed.to_string());
        }
    }
    out.join("\n")
}

/// Returns a sanitized language tag for a fence opener, defaulting to "text".
fn fence_language(marker: &str) -> String {
    let lang: String = marker
        .trim_start_matches("```")
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '+' || *c == '-' || *c == '_')
        .collect();
    if lang.is_empty() {
        "text".to_string()
    } else {
        lang
    }
}

/// Converts fenced blocks to `<pre><code class="language-X">` with escaped
/// content, and single-backtick spans outside fences to `<code>`.
fn convert_code(text: &str) -> String {
    let mut out = Vec::new();
    let mut in_fence = false;
    for line in text.split('\n') {
        if line.trim().starts_with("```") {
            if !in_fence {
                out.push(format!(
                    "<pre><code class=\"language-{}\">",
                    fence_language(line.trim())
                ));
                in_fence = true;
            } else {
                out.push("</code></pre>".to_string());
                in_fence = false;
            }
        } else if in_fence {
            out.push(escape_text(line));
        } else {
            out.push(convert_inline_code(line));
        }
    }
    out.join("\n")
}

/// Converts `` `span` `` pairs on one line to `<code>span</code>` (escaped).
/// A lone unmatched backtick stays literal.
fn convert_inline_code(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(open) = rest.find('`') {
        match rest[open + 1..].find('`') {
            Some(close) => {
                out.push_str(&rest[..open]);
                out.push_str("<code>");
                out.push_str(&escape_text(&rest[open + 1..open + 1 + close]));
                out.push_str("</code>");
                rest = &rest[open + close + 2..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

/// Markup repair: scans character-by-character with an open-tag stack.
/// A closing tag matching the stack top is accepted; a mismatched or
/// unexpected closing tag is escaped to literal text; tags still open at
/// end-of-text are closed in reverse order. Malformed tags are escaped whole.
fn repair_markup(text: &str) -> String {
    let mut open_tags: Vec<String> = Vec::new();
    let mut result = String::with_capacity(text.len());
    let mut current_tag = String::new();
    let mut in_tag = false;

    for c in text.chars() {
        if c == '<' {
            if in_tag {
                // "<" inside an unterminated tag: the old fragment was not a tag
                result.push_str(&escape_text(&current_tag));
            }
            in_tag = true;
            current_tag = String::from("<");
        } else if c == '>' && in_tag {
            current_tag.push(c);
            match tag_name(&current_tag) {
                Some((name, is_closing)) => {
                    if is_closing {
                        if open_tags.last() == Some(&name) {
                            open_tags.pop();
                            result.push_str(&current_tag);
                        } else {
                            result.push_str(&escape_text(&current_tag));
                        }
                    } else {
                        open_tags.push(name);
                        result.push_str(&current_tag);
                    }
                }
                None => result.push_str(&escape_text(&current_tag)),
            }
            in_tag = false;
            current_tag.clear();
        } else if in_tag {
            current_tag.push(c);
        } else {
            result.push(c);
        }
    }

    // Unterminated tag at end of text
    if !current_tag.is_empty() {
        result.push_str(&escape_text(&current_tag));
    }

    // Close anything left open, innermost first
    for tag in open_tags.iter().rev() {
        result.push_str(&format!("</{}>", tag));
    }

    result
}

/// Extracts `(lowercased tag name, is_closing)` from `<...>` text, or `None`
/// when the content does not start with a plausible tag name.
fn tag_name(tag: &str) -> Option<(String, bool)> {
    let inner = tag.strip_prefix('<')?.strip_suffix('>')?;
    let (body, is_closing) = match inner.strip_prefix('/') {
        Some(rest) => (rest, true),
        None => (inner, false),
    };
    let name: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    if name.is_empty() {
        None
    } else {
        Some((name, is_closing))
    }
}
