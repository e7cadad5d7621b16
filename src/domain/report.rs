use serde::{Deserialize, Serialize};

/// Renderer-agnostic tabular report: an ordered header row, value rows,
/// and ordered key-value metadata. Any renderer (plain text, CSV, JSON,
/// PDF) can consume this without the engines changing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub meta: Vec<(String, String)>,
}

impl ReportTable {
    pub fn new(title: impl Into<String>, headers: Vec<&str>) -> Self {
        Self {
            title: title.into(),
            headers: headers.into_iter().map(String::from).collect(),
            rows: Vec::new(),
            meta: Vec::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.push((key.into(), value.into()));
        self
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.headers.len(), "row width mismatch");
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_preserves_insertion_order() {
        let table = ReportTable::new("Student Marksheet", vec!["Subject", "Score", "Grade"])
            .with_meta("Student", "Alice Johnson (MHS-001)")
            .with_meta("Exam", "Term 1 Opener - 2024")
            .with_meta("Class", "Form 1 A");

        let keys: Vec<&str> = table.meta.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Student", "Exam", "Class"]);
    }

    #[test]
    fn test_push_row() {
        let mut table = ReportTable::new("Test", vec!["A", "B"]);
        table.push_row(vec!["1".into(), "2".into()]);
        assert!(!table.is_empty());
        assert_eq!(table.rows.len(), 1);
    }
}
