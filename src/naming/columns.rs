//! Column naming for one unit: sanitization plus collision suffixes.

use std::collections::HashSet;

use super::sanitize::{MAX_IDENTIFIER_LEN, sanitize, truncate_identifier};

/// One destination column: the header text it came from and its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Header text as read from the source (empty for a missing header).
    pub original: String,
    /// Sanitized, unit-unique identifier.
    pub name: String,
}

/// Ordered, collision-free column list for one unit.
///
/// Position `i` of the list is position `i` of every row: the staging file and the
/// `COPY` column list are both written in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSpec {
    columns: Vec<Column>,
}

impl ColumnSpec {
    /// Build the column list for a header row.
    ///
    /// Blank headers become `column_<n>` (1-based). A sanitized name already used earlier in
    /// the row gets `_1`, `_2`, ... appended until unused; earlier columns always keep the
    /// bare name.
    ///
    /// ```rust
    /// use tabload::naming::ColumnSpec;
    ///
    /// let spec = ColumnSpec::from_header(["A", "a", "A "]);
    /// assert_eq!(spec.names().collect::<Vec<_>>(), ["a", "a_1", "a_2"]);
    /// ```
    pub fn from_header<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut columns = Vec::new();

        for (idx0, raw) in header.into_iter().enumerate() {
            let original = raw.as_ref().to_string();
            let base = if original.trim().is_empty() {
                sanitize(&format!("column_{}", idx0 + 1), false)
            } else {
                sanitize(&original, false)
            };

            let name = unique_name(&base, &seen);
            seen.insert(name.clone());
            columns.push(Column { original, name });
        }

        Self { columns }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// `true` if the header had no cells.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Sanitized identifiers in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Columns whose identifier differs from their header text.
    pub fn renamed(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.original != c.name)
    }
}

fn unique_name(base: &str, seen: &HashSet<String>) -> String {
    if !seen.contains(base) {
        return base.to_string();
    }
    let mut n: usize = 1;
    loop {
        let suffix = format!("_{n}");
        let mut stem = base.to_string();
        truncate_identifier(&mut stem, MAX_IDENTIFIER_LEN - suffix.len());
        let candidate = format!("{stem}{suffix}");
        if !seen.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
