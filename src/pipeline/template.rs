//! `{name}` placeholders in prompts and capability arguments.
//!
//! A placeholder is an identifier (`[A-Za-z0-9_]+`) in braces. Anything else
//! in braces, such as a JSON example, is left as written.

use std::collections::BTreeMap;

enum Piece<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn is_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn pieces(template: &str) -> Vec<Piece<'_>> {
    let mut out = Vec::new();
    let mut text_start = 0;
    let mut i = 0;
    while i < template.len() {
        let rest = &template[i..];
        if rest.starts_with('{') {
            if let Some(close) = rest.find('}') {
                let name = &rest[1..close];
                if is_ident(name) {
                    out.push(Piece::Text(&template[text_start..i]));
                    out.push(Piece::Placeholder(name));
                    i += close + 1;
                    text_start = i;
                    continue;
                }
            }
        }
        i += rest.chars().next().map(char::len_utf8).unwrap_or(1);
    }
    out.push(Piece::Text(&template[text_start..]));
    out
}

/// Placeholder names in order of first appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for piece in pieces(template) {
        if let Piece::Placeholder(name) = piece {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Substitute every placeholder; an unknown name is an error naming it.
pub fn render(template: &str, inputs: &BTreeMap<String, String>) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    for piece in pieces(template) {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Placeholder(name) => {
                let value = inputs
                    .get(name)
                    .ok_or_else(|| format!("unresolved placeholder '{{{}}}'", name))?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}
