/// Escape the characters that are significant inside XML text and attributes.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Longest prefix of `text` within `max_bytes`, cut on a char boundary.
fn prefix_within(text: &str, max_bytes: usize) -> &str {
    let mut end = max_bytes.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Join lines until `limit` bytes, summarising whatever did not fit.
///
/// A first line that alone exceeds `limit` is shortened with an ellipsis, so
/// the result is never empty when `lines` is not.
pub fn join_within(lines: &[String], limit: usize) -> String {
    let mut out = String::new();
    for (idx, line) in lines.iter().enumerate() {
        let remaining = lines.len() - idx;
        let tail = format!("\n… and {remaining} more");
        let needed = if out.is_empty() { line.len() } else { line.len() + 1 };
        let room = if remaining > 1 { tail.len() } else { 0 };
        if out.len() + needed + room > limit {
            if !out.is_empty() {
                out.push_str(&tail);
                return out;
            }
            let rest = remaining - 1;
            let rest_tail = if rest > 0 {
                format!("\n… and {rest} more")
            } else {
                String::new()
            };
            let budget = limit.saturating_sub(rest_tail.len());
            let ellipsis = '…'.len_utf8();
            if budget > ellipsis {
                out.push_str(prefix_within(line, budget - ellipsis));
                out.push('…');
            } else {
                out.push_str(prefix_within(line, budget));
            }
            if out.len() + rest_tail.len() <= limit {
                out.push_str(&rest_tail);
            }
            return out;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("A&B<\"x\">"), "A&amp;B&lt;&quot;x&quot;&gt;");
    }

    #[test]
    fn truncates_long_lists() {
        let lines: Vec<String> = (0..50).map(|i| format!("SYMBOL{i:02}")).collect();
        let joined = join_within(&lines, 100);
        assert!(joined.len() <= 100, "{}", joined.len());
        assert!(joined.contains("more"));

        let short = vec!["A".to_string(), "B".to_string()];
        assert_eq!(join_within(&short, 100), "A\nB");
    }

    #[test]
    fn oversized_first_line_is_shortened_not_dropped() {
        let long = vec!["X".repeat(200)];
        let joined = join_within(&long, 50);
        assert!(!joined.is_empty());
        assert!(joined.len() <= 50, "{}", joined.len());
        assert!(joined.ends_with('…'));

        let mut lines = long.clone();
        lines.push("B".to_string());
        let joined = join_within(&lines, 50);
        assert!(joined.starts_with("XXX"));
        assert!(joined.ends_with("… and 1 more"), "{joined}");
        assert!(joined.len() <= 50, "{}", joined.len());
    }
}
