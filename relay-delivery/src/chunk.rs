//! Chunker: splits formatted text into an ordered sequence of chunks, each
//! within the transport's per-message ceiling, without ever splitting inside
//! a code block.
//!
//! Code regions are buffered whole and placed as one atomic unit once the
//! region closes; a block that alone exceeds the ceiling is hard-wrapped at
//! the limit as a last resort (the transport rejects oversized messages
//! outright, so emitting one could only fail).

/// Per-message size ceiling imposed by the transport.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Splits `text` into chunks of at most [`MAX_MESSAGE_LEN`] characters.
pub fn split_message(text: &str) -> Vec<String> {
    split_with_limit(text, MAX_MESSAGE_LEN)
}

/// Splits with an explicit limit (tests use small limits).
/// Empty input produces an empty sequence.
pub fn split_with_limit(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_code_block = false;
    let mut code_buffer: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if is_code_boundary(line, in_code_block) {
            in_code_block = !in_code_block;
            code_buffer.push(line);
            if !in_code_block {
                let code_text = code_buffer.join("\n");
                place_code_block(&mut chunks, &mut current, &code_text, max_len);
                code_buffer.clear();
            }
            continue;
        }
        if in_code_block {
            code_buffer.push(line);
            continue;
        }

        if current.len() + line.len() + 1 > max_len {
            if !current.is_empty() {
                push_chunk(&mut chunks, &current, max_len);
            }
            current = line.to_string();
        } else if current.is_empty() {
            current = line.to_string();
        } else {
            current.push('\n');
            current.push_str(line);
        }
    }

    // Fence never closed: place the buffered region anyway so nothing is lost
    if !code_buffer.is_empty() {
        let code_text = code_buffer.join("\n");
        place_code_block(&mut chunks, &mut current, &code_text, max_len);
    }

    if !current.is_empty() {
        push_chunk(&mut chunks, &current, max_len);
    }

    chunks
}

/// Detects a code-region boundary line: a raw fence, a formatted `<pre>`
/// opener, or a formatted `</pre>` closer while inside a region.
fn is_code_boundary(line: &str, in_code_block: bool) -> bool {
    if line.starts_with("```") {
        return true;
    }
    if !in_code_block && line.starts_with("<pre>") {
        return true;
    }
    in_code_block && line.trim_end().ends_with("</pre>")
}

/// Places a completed code region as one atomic unit: appended to `current`
/// when it fits, otherwise flushed into its own chunk(s).
fn place_code_block(chunks: &mut Vec<String>, current: &mut String, code_text: &str, max_len: usize) {
    if current.len() + code_text.len() + 1 > max_len {
        if !current.is_empty() {
            push_chunk(chunks, current, max_len);
            current.clear();
        }
        push_chunk(chunks, code_text, max_len);
    } else if current.is_empty() {
        current.push_str(code_text);
    } else {
        current.push('\n');
        current.push_str(code_text);
    }
}

/// Trims and records one chunk, hard-wrapping anything still over the limit.
fn push_chunk(chunks: &mut Vec<String>, chunk: &str, max_len: usize) {
    let trimmed = chunk.trim();
    if trimmed.is_empty() {
        return;
    }
    if trimmed.len() <= max_len {
        chunks.push(trimmed.to_string());
        return;
    }
    for piece in hard_wrap(trimmed, max_len) {
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
    }
}

/// Last-resort wrap of an oversized unit at the byte limit, kept on char
/// boundaries.
fn hard_wrap(text: &str, max_len: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    for c in text.chars() {
        if piece.len() + c.len_utf8() > max_len {
            pieces.push(std::mem::take(&mut piece));
        }
        piece.push(c);
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_empty_sequence() {
        assert!(split_message("").is_empty());
        assert!(split_message("   \n  ").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = split_message("hello\nworld");
        assert_eq!(chunks, vec!["hello\nworld"]);
    }

    #[test]
    fn test_every_chunk_within_limit_and_text_reconstructs() {
        let lines: Vec<String> = (0..60).map(|i| format!("line number {:02}", i)).collect();
        let text = lines.join("\n");
        let chunks = split_with_limit(&text, 100);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 100);
        }
        let rejoined = chunks.join("\n");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn test_code_block_never_split_when_it_fits() {
        let filler = "x".repeat(90);
        let text = format!("{}\n```\nfn f() {{}}\nfn g() {{}}\n```", filler);
        let chunks = split_with_limit(&text, 100);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], "```\nfn f() {}\nfn g() {}\n```");
    }

    #[test]
    fn test_formatted_pre_region_treated_as_code() {
        let filler = "y".repeat(90);
        let text = format!(
            "{}\n<pre><code class=\"language-rust\">\nlet a = 1;\n</code></pre>",
            filler
        );
        let chunks = split_with_limit(&text, 100);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].starts_with("<pre>"));
        assert!(chunks[1].ends_with("</pre>"));
    }

    #[test]
    fn test_unclosed_fence_still_emitted() {
        let text = "intro\n```\nno closing fence";
        let chunks = split_with_limit(&text, 4096);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("no closing fence"));
    }

    #[test]
    fn test_nine_thousand_chars_split_into_three() {
        let text = "a".repeat(9000);
        let chunks = split_message(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 4096);
        assert_eq!(chunks[2].len(), 808);
        for chunk in &chunks {
            assert!(chunk.len() <= MAX_MESSAGE_LEN);
        }
    }

    #[test]
    fn test_oversized_code_block_hard_wrapped() {
        let body = "z".repeat(250);
        let text = format!("```\n{}\n```", body);
        let chunks = split_with_limit(&text, 100);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 100);
        }
        let joined: String = chunks.join("");
        assert!(joined.contains(&"z".repeat(100)));
    }

    #[test]
    fn test_hard_wrap_respects_char_boundaries() {
        let text = "é".repeat(60); // 2 bytes each
        let pieces = hard_wrap(&text, 101);
        for piece in &pieces {
            assert!(piece.len() <= 101);
        }
        assert_eq!(pieces.concat(), text);
    }
}
