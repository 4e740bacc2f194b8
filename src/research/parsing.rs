//! Text helpers shared by the stage parsers.

/// Remove a surrounding Markdown code fence (```json ... ```), if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (e.g. "json") on the opening fence line
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };

    body.trim_end().trim_end_matches("```").trim()
}

/// Strip list decoration from one line: bullets, "1." / "2)" numbering,
/// surrounding quotes and brackets.
pub fn strip_list_marker(line: &str) -> &str {
    let mut item = line.trim();

    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = item.strip_prefix(bullet) {
            item = rest.trim_start();
            break;
        }
    }

    let digits = item.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &item[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            item = rest.trim_start();
        }
    }

    item.trim_end_matches(',')
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '[' | ']' | '<' | '>'))
        .trim()
}

/// Parse a source list block: one source per line, or comma separated.
/// "none" (any case) means no sources.
pub fn parse_source_items(block: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();

    for line in block.lines() {
        for part in line.split(", ") {
            let item = strip_list_marker(part);
            if item.is_empty() || item.eq_ignore_ascii_case("none") {
                continue;
            }
            if !items.iter().any(|existing| existing == item) {
                items.push(item.to_string());
            }
        }
    }

    items
}

/// If `line` starts with `label` (case-insensitive, Markdown emphasis and
/// heading marks ignored), return the rest of the line.
pub fn labeled_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let text = line
        .trim()
        .trim_start_matches(|c| c == '*' || c == '#')
        .trim_start();
    let head = text.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    Some(text[label.len()..].trim_start_matches('*').trim())
}

/// Trim sentence punctuation and wrapping from the end of a URL-like token.
///
/// A closing parenthesis is kept when it balances one inside the token, so
/// `https://en.wikipedia.org/wiki/Acid_(chemistry)` survives intact while
/// `(https://a.org/x)` loses its outer `)`.
pub fn trim_url_token(token: &str) -> &str {
    let mut url = token;
    loop {
        url = url.trim_end_matches(|c| {
            matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ']' | '>' | '"' | '\'')
        });
        let unbalanced = url.matches(')').count() > url.matches('(').count();
        match url.strip_suffix(')') {
            Some(rest) if unbalanced => url = rest,
            _ => return url,
        }
    }
}

/// Whether `text` mentions `identifier` as a whole token, not as part of a
/// longer URL or path (`ipcc.org/ref10` does not mention `ipcc.org/ref1`).
pub fn mentions(text: &str, identifier: &str) -> bool {
    if identifier.is_empty() {
        return false;
    }

    text.match_indices(identifier).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = &text[start + identifier.len()..];
        !before.is_some_and(is_url_char) && ends_token(after)
    })
}

fn is_url_char(c: char) -> bool {
    c.is_alphanumeric()
        || matches!(
            c,
            '/' | '.' | '-' | '_' | '~' | '%' | '#' | '?' | '=' | '&' | '+' | ':' | '@'
        )
}

fn ends_token(rest: &str) -> bool {
    let rest = rest.trim_start_matches(|c| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'));
    match rest.chars().next() {
        None => true,
        Some(c) => !is_url_char(c) && c != '(',
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("```json\n[\"a\"]\n```", "[\"a\"]")]
    #[case("```\nplain\n```", "plain")]
    #[case("  no fences  ", "no fences")]
    fn test_strip_code_fences(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(strip_code_fences(input), expected);
    }

    #[rstest]
    #[case("- https://a.org", "https://a.org")]
    #[case("1. What is it?", "What is it?")]
    #[case("2) Why?", "Why?")]
    #[case("\"quoted\",", "quoted")]
    #[case("[ipcc.org/ref1]", "ipcc.org/ref1")]
    #[case("<https://b.org>", "https://b.org")]
    fn test_strip_list_marker(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(strip_list_marker(input), expected);
    }

    #[rstest]
    #[case("SUMMARY: text", "SUMMARY:", Some("text"))]
    #[case("**Summary:** text", "SUMMARY:", Some("text"))]
    #[case("## SOURCES:", "SOURCES:", Some(""))]
    #[case("Summaries: text", "SUMMARY:", None)]
    #[case("é", "SUMMARY:", None)]
    fn test_labeled_value(#[case] line: &str, #[case] label: &str, #[case] expected: Option<&str>) {
        assert_eq!(labeled_value(line, label), expected);
    }

    #[rstest]
    #[case("https://a.org/x.", "https://a.org/x")]
    #[case("https://a.org/x),", "https://a.org/x")]
    #[case("https://en.wikipedia.org/wiki/Acid_(chemistry)", "https://en.wikipedia.org/wiki/Acid_(chemistry)")]
    #[case("https://en.wikipedia.org/wiki/Acid_(chemistry)).", "https://en.wikipedia.org/wiki/Acid_(chemistry)")]
    fn test_trim_url_token(#[case] token: &str, #[case] expected: &str) {
        assert_eq!(trim_url_token(token), expected);
    }

    #[rstest]
    #[case("Uptake lowers pH (ipcc.org/ref1).", "ipcc.org/ref1", true)]
    #[case("See ipcc.org/ref10 for details", "ipcc.org/ref1", false)]
    #[case("URL: ipcc.org/ref1\nnext", "ipcc.org/ref1", true)]
    #[case("Mirror at https://ipcc.org/ref1", "ipcc.org/ref1", false)]
    #[case("Read ipcc.org/ref1.html", "ipcc.org/ref1", false)]
    #[case("Acid_(chemistry) page", "Acid_", false)]
    #[case("anything", "", false)]
    fn test_mentions(#[case] text: &str, #[case] identifier: &str, #[case] expected: bool) {
        assert_eq!(mentions(text, identifier), expected);
    }

    #[test]
    fn test_parse_source_items() {
        let block = "- https://a.org\n- https://b.org, https://c.org\n\n- https://a.org";
        assert_eq!(
            parse_source_items(block),
            vec!["https://a.org", "https://b.org", "https://c.org"]
        );
        assert!(parse_source_items("None").is_empty());
        assert!(parse_source_items("- none\n").is_empty());
    }
}
