/// Top-level fragments of `text` that open with `open` and close with the
/// matching `close`, in order of appearance.
///
/// Quotes inside a candidate are tracked so brackets in string values do not
/// count towards nesting. A candidate that never balances is skipped and the
/// scan resumes right after its opening bracket.
pub(crate) fn balanced_fragments(text: &str, open: char, close: char) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut cursor = 0;
    while cursor < text.len() {
        let Some(offset) = text[cursor..].find(open) else {
            break;
        };
        let start = cursor + offset;
        match matching_close(&text[start..], open, close) {
            Some(len) => {
                fragments.push(&text[start..start + len]);
                cursor = start + len;
            }
            None => cursor = start + open.len_utf8(),
        }
    }
    fragments
}

/// Byte length of the balanced fragment at the start of `text`.
fn matching_close(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
        } else if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(idx + ch.len_utf8());
            }
        }
    }
    None
}

/// Escape raw control characters that appear inside string values.
///
/// Whitespace between tokens is left alone; only characters inside an open
/// string literal are rewritten. `\r\n` collapses into a single `\n`.
pub(crate) fn escape_string_controls(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = fragment.chars().peekable();
    while let Some(ch) = chars.next() {
        if !in_string {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(ch);
            continue;
        }
        match ch {
            '\\' => {
                escaped = true;
                out.push(ch);
            }
            '"' => {
                in_string = false;
                out.push(ch);
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            ch if ch.is_control() && (ch as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", ch as u32));
            }
            _ => out.push(ch),
        }
    }
    out
}
