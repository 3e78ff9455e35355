//! Identifier naming: sanitization, column deduplication, and table name derivation.
//!
//! Every name that reaches the destination goes through [`sanitize`]. Column lists are
//! additionally made unique per unit by [`ColumnSpec::from_header`]. Table names are derived
//! from the source file stem (and sheet name, for workbooks) by [`table_target`].

pub mod columns;
pub mod sanitize;

use std::path::Path;

pub use columns::{Column, ColumnSpec};
pub use sanitize::{DEFAULT_NAMESPACE, MAX_IDENTIFIER_LEN, UNNAMED_OBJECT, sanitize};

use crate::types::TableTarget;

/// Sanitize a namespace name (casing preserved, leading digits allowed).
pub fn sanitize_namespace(name: &str) -> String {
    sanitize(name, true)
}

/// Destination table for a unit.
///
/// `namespace` must already be sanitized. The base name is the sanitized file stem; for a
/// sheet it is `stem_sheet`, re-sanitized as a whole so the join cannot produce an invalid
/// identifier.
///
/// ```rust
/// use std::path::Path;
/// use tabload::naming::table_target;
///
/// let t = table_target("public", Path::new("/data/Q1 Sales.xlsx"), Some("North Region"));
/// assert_eq!(t.table, "q1_sales_north_region");
/// ```
pub fn table_target(namespace: &str, path: &Path, sheet: Option<&str>) -> TableTarget {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = sanitize(&stem, false);
    let table = match sheet {
        Some(sheet) => sanitize(&format!("{base}_{}", sanitize(sheet, false)), false),
        None => base,
    };
    TableTarget {
        namespace: namespace.to_string(),
        table,
    }
}
