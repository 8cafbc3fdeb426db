//! Terminal output utilities: notes and plain-text tables.

// ANSI styles
pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

/// Print a formatted WARNING note to stderr.
pub fn note_warn(msg: &str) {
    if supports_color() {
        eprintln!("{YELLOW}{BOLD}⚠{RESET} {msg}");
    } else {
        eprintln!("WARN: {msg}");
    }
}

/// Print a formatted ERROR note to stderr.
pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

/// Print a formatted SUCCESS note to stderr.
pub fn note_success(msg: &str) {
    if supports_color() {
        eprintln!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        eprintln!("OK: {msg}");
    }
}

/// Left-aligned text table; every column is as wide as its widest cell.
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let line = |cells: &[String]| -> String {
            let padded: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let cell = cells.get(i).map(String::as_str).unwrap_or("");
                    format!("{cell:<w$}")
                })
                .collect();
            format!("  {}", padded.join("  ").trim_end())
        };

        let mut out = String::new();
        out.push_str(&line(&self.headers));
        out.push('\n');
        let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&line(&sep));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&line(row));
            out.push('\n');
        }
        out
    }
}

/// One-line summary of a tool's JSON Schema: property names, `*` marking
/// required ones, e.g. `path*: string, content*: string`.
pub fn schema_summary(schema: &serde_json::Value) -> String {
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return "-".to_string();
    };
    if properties.is_empty() {
        return "-".to_string();
    }
    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    properties
        .iter()
        .map(|(name, spec)| {
            let kind = spec.get("type").and_then(|t| t.as_str()).unwrap_or("any");
            let mark = if required.contains(&name.as_str()) { "*" } else { "" };
            format!("{name}{mark}: {kind}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summarizes_tool_schema() {
        let schema = json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "limit": {"type": "integer"}
            },
            "required": ["path"]
        });
        let summary = schema_summary(&schema);
        assert!(summary.contains("path*: string"));
        assert!(summary.contains("limit: integer"));
        assert!(!summary.contains("limit*"));
        assert_eq!(schema_summary(&json!({"type": "object"})), "-");
    }

    #[test]
    fn renders_aligned_columns() {
        let mut table = Table::new(["ID", "STATUS"]);
        table.row(vec!["a".into(), "completed".into()]);
        table.row(vec!["long-id".into(), "failed".into()]);
        let out = table.render();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "  ID       STATUS");
        assert_eq!(lines[1], "  -------  ---------");
        assert_eq!(lines[2], "  a        completed");
        assert_eq!(lines[3], "  long-id  failed");
    }

    #[test]
    fn missing_cells_are_blank() {
        let mut table = Table::new(["A", "B"]);
        table.row(vec!["x".into()]);
        assert_eq!(table.render().lines().nth(2), Some("  x"));
    }
}
