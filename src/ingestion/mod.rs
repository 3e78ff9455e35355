//! Source discovery and row reading.
//!
//! Most callers only need [`enumerate_sources`] (or a configured [`SourceEnumerator`]),
//! which lists a directory and yields one [`Discovery`] per unit. Each unit's rows are read
//! by [`SourceUnit::load`] into a format-agnostic [`crate::types::RowSet`].
//!
//! Format-specific readers live under:
//! - [`csv`] (delimited files, with encoding fallback)
//! - `excel` (workbooks via `calamine`, behind the `excel` feature)

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod source;

#[cfg(feature = "excel")]
pub use excel::CalamineOpener;
pub use source::{
    Discovery, RowSource, SourceEnumerator, SourceUnit, SourceUnits, Workbook, WorkbookOpener,
    WorkbooksDisabled, default_workbook_opener, enumerate_sources, list_source_files,
};
