//! SQL text for the statements the engine issues.

use crate::naming::ColumnSpec;
use crate::types::TableTarget;

/// Double-quote an identifier, doubling any embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Fully qualified, quoted table name.
pub fn qualified(table: &TableTarget) -> String {
    format!("{}.{}", quote_ident(&table.namespace), quote_ident(&table.table))
}

/// `CREATE SCHEMA IF NOT EXISTS "ns"`.
pub fn create_namespace(namespace: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(namespace))
}

/// `DROP TABLE IF EXISTS "ns"."t" CASCADE`.
pub fn drop_table(table: &TableTarget) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", qualified(table))
}

/// `CREATE TABLE "ns"."t" ("a" TEXT, ...)`. Every column is text.
pub fn create_text_table(table: &TableTarget, columns: &ColumnSpec) -> String {
    let cols = columns
        .names()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({cols})", qualified(table))
}

/// `COPY` statement reading quoted CSV from the client, with an explicit column list in
/// column-spec order.
pub fn copy_csv_from_stdin(table: &TableTarget, columns: &ColumnSpec) -> String {
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT CSV, HEADER FALSE, ENCODING 'UTF8')",
        qualified(table),
        column_list(columns)
    )
}

fn column_list(columns: &ColumnSpec) -> String {
    columns
        .names()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TableTarget {
        TableTarget {
            namespace: "Raw".to_string(),
            table: "people".to_string(),
        }
    }

    #[test]
    fn renders_ddl() {
        let cols = ColumnSpec::from_header(["Name", "Age"]);
        assert_eq!(
            create_text_table(&target(), &cols),
            r#"CREATE TABLE "Raw"."people" ("name" TEXT, "age" TEXT)"#
        );
        assert_eq!(drop_table(&target()), r#"DROP TABLE IF EXISTS "Raw"."people" CASCADE"#);
        assert_eq!(create_namespace("Raw"), r#"CREATE SCHEMA IF NOT EXISTS "Raw""#);
    }

    #[test]
    fn copy_lists_columns_in_spec_order() {
        let cols = ColumnSpec::from_header(["b", "a", "B"]);
        assert_eq!(
            copy_csv_from_stdin(&target(), &cols),
            r#"COPY "Raw"."people" ("b", "a", "b_1") FROM STDIN WITH (FORMAT CSV, HEADER FALSE, ENCODING 'UTF8')"#
        );
    }

    #[test]
    fn quote_ident_escapes_quotes() {
        assert_eq!(quote_ident(r#"a"b"#), r#""a""b""#);
    }
}
