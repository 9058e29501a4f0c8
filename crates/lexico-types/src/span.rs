use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location span.
///
/// Line/column values are 1-based. A zero span (`Span::default()`) means the
/// front end supplied no location for the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "line", default)]
    pub start_line: u32,
    #[serde(rename = "column", default)]
    pub start_col: u32,
    #[serde(default)]
    pub end_line: u32,
    #[serde(rename = "end_column", default)]
    pub end_col: u32,
}

impl Span {
    /// Create a new span.
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Create a zero-width span at a single position.
    pub fn point(line: u32, col: u32) -> Self {
        Self::new(line, col, line, col)
    }

    /// Whether the span carries no location.
    pub fn is_unknown(&self) -> bool {
        self.start_line == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// A source text handed to the front end, kept for error reporting.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub source: String,
    /// Byte offsets where each line starts.
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            name: name.into(),
            source,
            line_starts,
        }
    }

    /// Extract a source line by 1-based line number, without its terminator.
    pub fn line(&self, line_number: u32) -> Option<&str> {
        let idx = line_number.checked_sub(1)? as usize;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&s| s.saturating_sub(1))
            .unwrap_or(self.source.len());
        Some(self.source[start..end].trim_end_matches('\r'))
    }

    /// The line a span starts on, or an empty string when unknown.
    pub fn line_for(&self, span: Span) -> &str {
        self.line(span.start_line).unwrap_or("")
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_span_is_zero_width() {
        let s = Span::point(4, 2);
        assert_eq!((s.start_line, s.start_col), (4, 2));
        assert_eq!((s.end_line, s.end_col), (4, 2));
        assert!(!s.is_unknown());
    }

    #[test]
    fn default_span_is_unknown() {
        assert!(Span::default().is_unknown());
    }

    #[test]
    fn span_display_uses_start() {
        assert_eq!(Span::new(3, 7, 3, 15).to_string(), "3:7");
    }

    #[test]
    fn span_json_uses_line_and_column() {
        let json = serde_json::to_string(&Span::new(2, 5, 2, 9)).unwrap();
        assert!(json.contains("\"line\":2"));
        assert!(json.contains("\"column\":5"));
        assert!(json.contains("\"end_column\":9"));
    }

    #[test]
    fn span_fields_default_when_missing() {
        let span: Span = serde_json::from_str(r#"{"line": 3}"#).unwrap();
        assert_eq!(span, Span::new(3, 0, 0, 0));
    }

    #[test]
    fn source_file_lines() {
        let src = SourceFile::new("prog.json", "one\r\ntwo\nthree");
        assert_eq!(src.line(1), Some("one"));
        assert_eq!(src.line(2), Some("two"));
        assert_eq!(src.line(3), Some("three"));
        assert_eq!(src.line(0), None);
        assert_eq!(src.line(4), None);
        assert_eq!(src.line_count(), 3);
        assert_eq!(src.line_for(Span::default()), "");
    }
}
