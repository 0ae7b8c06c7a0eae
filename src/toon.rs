//! TOON: Typed Object-Oriented Notation.
//!
//! The compact, LLM-friendly structured text format used for `config.toon`,
//! `status.toon`, and `references.toon`. Scalars are `key: value`
//! pairs; arrays carry an explicit header `name[N]{field1,field2,...}:`
//! followed by N comma-separated rows; indentation denotes nesting under a
//! scalar key.
//!
//! This module is a small, hand-rolled reader/writer for the shape the
//! artifact store's documents actually need — it is not a general-purpose
//! serialization format. Each artifact type in [`crate::store::schema`]
//! owns its own `to_toon`/`from_toon` pair built on top of these primitives,
//! per the "typed printer and parser per variant" design note.

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A parsed TOON document: top-level scalar fields plus named arrays.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Document {
    pub fields: BTreeMap<String, String>,
    pub arrays: BTreeMap<String, Table>,
}

/// A single parsed array block.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Document {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|s| s.as_str())
    }

    pub fn get_required(&self, key: &str) -> crate::error::Result<&str> {
        self.get(key).ok_or_else(|| crate::error::Error::InvariantViolation(format!(
            "TOON document missing required field `{key}`"
        )))
    }

    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|s| split_list(s))
            .unwrap_or_default()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.arrays.get(name)
    }
}

/// Split a comma-separated inline list, trimming whitespace and dropping
/// empty elements (`"none"` and `""` both parse to an empty list).
fn split_list(s: &str) -> Vec<String> {
    if s.is_empty() || s.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
}

/// Render a comma-separated inline list ("none" when empty, matching the
/// source convention for an absent `depends` field).
pub fn render_list(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(",")
    }
}

/// Parse a TOON document from its on-disk text representation.
pub fn parse(input: &str) -> crate::error::Result<Document> {
    let mut doc = Document::default();
    let mut lines = input.lines().peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(header) = parse_array_header(trimmed) {
            let (name, columns, count) = header;
            let mut rows = Vec::with_capacity(count);
            for _ in 0..count {
                let Some(row_line) = lines.next() else {
                    return Err(crate::error::Error::InvariantViolation(format!(
                        "TOON array `{name}` declared {count} row(s) but input ended early"
                    )));
                };
                rows.push(split_row(row_line.trim(), columns.len()));
            }
            doc.arrays.insert(name, Table { columns, rows });
            continue;
        }

        if let Some((key, value)) = trimmed.split_once(':') {
            doc.fields.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    Ok(doc)
}

/// Parse a `name[N]{col1,col2,...}:` header line.
fn parse_array_header(line: &str) -> Option<(String, Vec<String>, usize)> {
    let line = line.strip_suffix(':')?;
    let bracket_open = line.find('[')?;
    let bracket_close = line.find(']')?;
    let brace_open = line.find('{')?;
    let brace_close = line.find('}')?;
    if !(bracket_open < bracket_close && bracket_close < brace_open && brace_open < brace_close) {
        return None;
    }

    let name = line[..bracket_open].trim().to_string();
    let count: usize = line[bracket_open + 1..bracket_close].trim().parse().ok()?;
    let columns: Vec<String> = line[brace_open + 1..brace_close]
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    Some((name, columns, count))
}

/// Split one data row, respecting the column count (a trailing field may
/// itself contain commas only if it is the last column — callers that need
/// embedded commas should not use table rows for that field).
fn split_row(line: &str, columns: usize) -> Vec<String> {
    if columns == 0 {
        return Vec::new();
    }
    let mut parts: Vec<&str> = line.splitn(columns, ',').collect();
    while parts.len() < columns {
        parts.push("");
    }
    parts.into_iter().map(|p| p.trim().to_string()).collect()
}

/// A writer that accumulates scalar fields and array blocks in order.
#[derive(Debug, Default)]
pub struct Writer {
    buf: String,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&mut self, key: &str, value: impl AsRef<str>) -> &mut Self {
        let _ = writeln!(self.buf, "{key}: {}", value.as_ref());
        self
    }

    pub fn field_list(&mut self, key: &str, items: &[String]) -> &mut Self {
        self.field(key, render_list(items))
    }

    pub fn table(&mut self, name: &str, columns: &[&str], rows: &[Vec<String>]) -> &mut Self {
        let _ = writeln!(
            self.buf,
            "{name}[{}]{{{}}}:",
            rows.len(),
            columns.join(",")
        );
        for row in rows {
            let _ = writeln!(self.buf, "  {}", row.join(","));
        }
        self
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars_and_a_table() {
        let mut w = Writer::new();
        w.field("plan_id", "add-x")
            .field_list("domains", &["backend".to_string(), "api".to_string()])
            .table(
                "deliverables",
                &["number", "title"],
                &[
                    vec!["1".to_string(), "Add endpoint".to_string()],
                    vec!["2".to_string(), "Add tests".to_string()],
                ],
            );
        let text = w.finish();

        let doc = parse(&text).unwrap();
        assert_eq!(doc.get("plan_id"), Some("add-x"));
        assert_eq!(doc.get_list("domains"), vec!["backend", "api"]);
        let table = doc.table("deliverables").unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1][1], "Add tests");
    }

    #[test]
    fn empty_list_renders_as_none_and_parses_back_empty() {
        let mut w = Writer::new();
        w.field_list("depends", &[]);
        let doc = parse(&w.finish()).unwrap();
        assert!(doc.get_list("depends").is_empty());
        assert_eq!(doc.get("depends"), Some("none"));
    }
}
