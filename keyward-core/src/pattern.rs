//! Glob-style key patterns as understood by `SCAN ... MATCH`.

use std::fmt;

use regex::Regex;

use crate::error::StoreError;

/// Compiled `MATCH` pattern.
///
/// Supports `*`, `?`, `[...]` classes (with `^` negation and ranges) and `\`
/// escapes. Matching covers the whole key name.
#[derive(Clone)]
pub struct KeyPattern {
    source: String,
    regex: Regex,
}

impl KeyPattern {
    /// Compiles `pattern`.
    pub fn new(pattern: &str) -> Result<Self, StoreError> {
        let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| {
            StoreError::InvalidArgument(format!("key pattern `{pattern}`: {e}"))
        })?;
        Ok(Self {
            source: pattern.to_owned(),
            regex,
        })
    }

    /// Returns the pattern as given.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns `true` if `key` matches the whole pattern.
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

impl fmt::Debug for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyPattern").field(&self.source).finish()
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)^");
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => match chars.get(i) {
                Some(&escaped) => {
                    push_literal(&mut out, escaped);
                    i += 1;
                }
                None => out.push_str(r"\\"),
            },
            '[' => match parse_class(&chars[i..]) {
                Some((class, consumed)) => {
                    out.push_str(&class);
                    i += consumed;
                }
                // unterminated class: treat the bracket literally
                None => out.push_str(r"\["),
            },
            c => push_literal(&mut out, c),
        }
    }
    out.push('$');
    out
}

/// Translates the class body following `[`. Returns the regex and the number
/// of pattern characters consumed, or `None` when no `]` closes the class.
///
/// Follows server semantics: `[]` matches nothing, `[^]` matches any single
/// character and reversed ranges such as `[z-a]` are swapped.
fn parse_class(chars: &[char]) -> Option<(String, usize)> {
    let mut i = 0;
    let negated = chars.first() == Some(&'^');
    if negated {
        i += 1;
    }
    let mut body = String::new();
    loop {
        let c = *chars.get(i)?;
        i += 1;
        match c {
            ']' => break,
            '\\' => {
                let escaped = *chars.get(i)?;
                i += 1;
                push_class_char(&mut body, escaped);
            }
            c if chars.get(i) == Some(&'-') && i + 1 < chars.len() => {
                let end = chars[i + 1];
                i += 2;
                let (low, high) = if c <= end { (c, end) } else { (end, c) };
                push_class_char(&mut body, low);
                body.push('-');
                push_class_char(&mut body, high);
            }
            c => push_class_char(&mut body, c),
        }
    }

    let class = match (body.is_empty(), negated) {
        (true, false) => r"[^\s\S]".to_owned(),
        (true, true) => ".".to_owned(),
        (false, false) => format!("[{body}]"),
        (false, true) => format!("[^{body}]"),
    };
    Some((class, i))
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

fn push_class_char(out: &mut String, c: char) {
    if c.is_alphanumeric() {
        out.push(c);
    } else {
        push_literal(out, c);
    }
}
