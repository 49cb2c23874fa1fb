//! Building blocks of GBNF text.

/// The empty grammar. Derives exactly the empty string.
pub(crate) const NO_VALUE: &str = "\"\"";

/// One character inside a JSON string, escapes included.
pub(crate) const STRING_CHAR: &str =
    r#"[^"\\\x7F\x00-\x1F] | "\\" ["\\/bfnrt] | "\\u" [0-9a-fA-F]{4}"#;

/// An integer with at most 16 digits, so it survives a round trip through `f64`.
pub(crate) const INTEGER: &str = r#""-"? ("0" | [1-9] [0-9]{0,15})"#;

pub(crate) const FRACTION_AND_EXPONENT: &str = r#"("." [0-9]+)? ([eE] [-+]? [0-9]+)?"#;

pub(crate) const BOOLEAN: &str = r#"("true" | "false")"#;

pub(crate) const DATE: &str =
    r#"[0-9]{4} "-" ("0" [1-9] | "1" [012]) "-" ("0" [1-9] | [12] [0-9] | "3" [01])"#;

pub(crate) const TIME: &str = r#"([01] [0-9] | "2" [0-3]) ":" [0-5] [0-9] ":" [0-5] [0-9] ("." [0-9]{3})? ("Z" | [+-] ([01] [0-9] | "2" [0-3]) ":" [0-5] [0-9])"#;

/// Suffix appended to `root` when the caller wants a stop sequence.
pub(crate) const TRAILING_NEWLINES: &str = r#""\n\n\n\n" [\n]*"#;

/// Quotes `text` as a GBNF string literal.
pub(crate) fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7F => {
                out.push_str(&format!("\\x{:02X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Joins non-empty parts with single spaces.
pub(crate) fn seq<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for part in parts {
        let part = part.as_ref();
        if part.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(part);
    }
    out
}

/// Parenthesized alternation. A single alternative is returned as is.
pub(crate) fn alt(options: &[String]) -> String {
    match options {
        [] => NO_VALUE.to_string(),
        [only] => only.clone(),
        _ => format!("( {} )", options.join(" | ")),
    }
}

/// `text` repeated `count` times as the shortest literal form.
pub(crate) fn repeated_literal(text: &str, count: usize) -> String {
    let plain = quote(&text.repeat(count));
    if count <= 1 {
        return plain;
    }
    let counted = format!("{}{{{}}}", quote(text), count);
    if counted.len() < plain.len() {
        counted
    } else {
        plain
    }
}

/// Turns a def name into something usable inside a rule name.
pub(crate) fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}
