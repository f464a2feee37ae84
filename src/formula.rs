//! Reference scanning and resolution for KPI formula strings.
//!
//! A formula may point at other KPIs with either delimiter syntax,
//! interchangeably: double-curly `{{token}}` or square-bracket `[token]`.
//! The scanner is a plain character walk rather than a regex so that an
//! unterminated delimiter run degrades predictably: it is kept as literal
//! text, which then fails arithmetic tokenization for that day.

use crate::schema::Kpi;

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Plain expression text between references.
    Literal(String),
    /// The trimmed token found between reference delimiters.
    Reference(String),
}

/// Splits a formula string into literal and reference segments.
pub fn parse(formula: &str) -> Vec<Segment> {
    let chars: Vec<char> = formula.chars().collect();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '{' && i + 1 < chars.len() && chars[i + 1] == '{' {
            if let Some(end) = find_close(&chars, i + 2, "}}") {
                push_literal(&mut segments, &mut literal);
                let token: String = chars[i + 2..end].iter().collect();
                segments.push(Segment::Reference(token.trim().to_string()));
                i = end + 2;
                continue;
            }
        } else if chars[i] == '[' {
            if let Some(end) = find_close(&chars, i + 1, "]") {
                push_literal(&mut segments, &mut literal);
                let token: String = chars[i + 1..end].iter().collect();
                segments.push(Segment::Reference(token.trim().to_string()));
                i = end + 1;
                continue;
            }
        }

        literal.push(chars[i]);
        i += 1;
    }

    push_literal(&mut segments, &mut literal);
    segments
}

fn find_close(chars: &[char], from: usize, closer: &str) -> Option<usize> {
    let closer: Vec<char> = closer.chars().collect();
    let mut i = from;
    while i + closer.len() <= chars.len() {
        if chars[i..i + closer.len()] == closer[..] {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn push_literal(segments: &mut Vec<Segment>, literal: &mut String) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

/// Resolves a reference token to a KPI id within the active KPI set.
///
/// Resolution order: exact id match first, then case-insensitive trimmed
/// display-name match. First match in list order wins; no match means the
/// reference contributes zero, never an error.
pub fn resolve_reference<'a>(token: &str, kpis: &'a [Kpi]) -> Option<&'a str> {
    let trimmed = token.trim();

    if let Some(kpi) = kpis.iter().find(|k| k.id == trimmed) {
        return Some(&kpi.id);
    }

    let lowered = trimmed.to_lowercase();
    kpis.iter()
        .find(|k| k.name.trim().to_lowercase() == lowered)
        .map(|k| k.id.as_str())
}
