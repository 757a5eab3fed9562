//! Text rendering of fetched rows.
//!
//! Pure functions: ASCII and markdown tables for `pg_query`, CSV for table
//! export, and the `CREATE TABLE` + `INSERT` dump for table backup.

use crate::db::JsonRow;
use crate::sql::identifier::quote_name;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Output format for ad-hoc query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Structured rows (default)
    #[default]
    Json,
    /// ASCII table, psql style
    Table,
    Markdown,
}

impl OutputFormat {
    pub const CHOICES: &'static [&'static str] = &["json", "table", "markdown"];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "table" => Some(Self::Table),
            "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(_) | JsonValue::Object(_) => value.to_string(),
    }
}

pub fn format_as_table(columns: &[String], rows: &[JsonRow], execution_time_ms: u64) -> String {
    if columns.is_empty() {
        return "Empty set".to_string();
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.width()).collect();
    for row in rows {
        for (i, col) in columns.iter().enumerate() {
            if let Some(value) = row.get(col) {
                widths[i] = widths[i].max(format_value(value).width());
            }
        }
    }

    let mut output = String::new();
    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("| {} ", pad(col, *w, Align::Center)))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in rows {
        let line: String = columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| {
                let value = row.get(col).unwrap_or(&JsonValue::Null);
                let align = if value.is_number() {
                    Align::Right
                } else {
                    Align::Left
                };
                format!("| {} ", pad(&format_value(value), *w, align))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&line);
    }

    output.push_str(&separator);

    let row_text = if rows.len() == 1 { "row" } else { "rows" };
    output.push_str(&format!(
        "{} {} in set ({:.2} sec)\n",
        rows.len(),
        row_text,
        execution_time_ms as f64 / 1000.0
    ));

    output
}

enum Align {
    Left,
    Right,
    Center,
}

// `format!` width specifiers count chars, not display columns.
fn pad(text: &str, width: usize, align: Align) -> String {
    let fill = width.saturating_sub(text.width());
    match align {
        Align::Left => format!("{text}{}", " ".repeat(fill)),
        Align::Right => format!("{}{text}", " ".repeat(fill)),
        Align::Center => {
            let left = fill / 2;
            format!("{}{text}{}", " ".repeat(left), " ".repeat(fill - left))
        }
    }
}

pub fn format_as_markdown(columns: &[String], rows: &[JsonRow]) -> String {
    if columns.is_empty() {
        return "*Empty set*".to_string();
    }

    let mut output = String::new();

    let header: String = columns
        .iter()
        .map(|c| format!("| {} ", c))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);

    let sep: String = columns.iter().map(|_| "|---").collect::<String>() + "|\n";
    output.push_str(&sep);

    for row in rows {
        let line: String = columns
            .iter()
            .map(|col| {
                let value = row.get(col).unwrap_or(&JsonValue::Null);
                format!("| {} ", format_value(value).replace('|', "\\|"))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&line);
    }

    output.push_str(&format!("\n*{} rows*", rows.len()));

    output
}

// =============================================================================
// CSV
// =============================================================================

/// Render rows as CSV with a header line. NULL becomes an empty field.
pub fn format_as_csv(columns: &[String], rows: &[JsonRow]) -> String {
    let mut output = String::new();
    push_csv_line(&mut output, columns.iter().map(String::as_str));
    for row in rows {
        let fields: Vec<String> = columns
            .iter()
            .map(|col| match row.get(col) {
                None | Some(JsonValue::Null) => String::new(),
                Some(value) => format_value(value),
            })
            .collect();
        push_csv_line(&mut output, fields.iter().map(String::as_str));
    }
    output
}

fn push_csv_line<'a>(output: &mut String, fields: impl Iterator<Item = &'a str>) {
    let line = fields.map(csv_field).collect::<Vec<_>>().join(",");
    output.push_str(&line);
    output.push_str("\r\n");
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// =============================================================================
// SQL Dump
// =============================================================================

/// Render a JSON value as a SQL literal.
pub fn sql_literal(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(true) => "TRUE".to_string(),
        JsonValue::Bool(false) => "FALSE".to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => quote_literal(s),
        JsonValue::Array(_) | JsonValue::Object(_) => quote_literal(&value.to_string()),
    }
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Build a `CREATE TABLE` statement and one `INSERT` per row.
///
/// `definition` holds `information_schema.columns` rows in ordinal order
/// (`column_name`, `data_type`, `is_nullable`, `column_default`).
pub fn dump_table(schema: &str, table: &str, definition: &[JsonRow], rows: &[JsonRow]) -> String {
    let target = format!("{}.{}", quote_name(schema), quote_name(table));

    let column_defs: Vec<String> = definition
        .iter()
        .map(|col| {
            let name = col.get("column_name").and_then(JsonValue::as_str).unwrap_or_default();
            let data_type = col.get("data_type").and_then(JsonValue::as_str).unwrap_or("text");
            let mut def = format!("  {} {}", quote_name(name), data_type);
            if col.get("is_nullable").and_then(JsonValue::as_str) == Some("NO") {
                def.push_str(" NOT NULL");
            }
            if let Some(default) = col.get("column_default").and_then(JsonValue::as_str) {
                def.push_str(" DEFAULT ");
                def.push_str(default);
            }
            def
        })
        .collect();

    let mut output = format!("CREATE TABLE {} (\n{}\n);\n\n", target, column_defs.join(",\n"));

    let inserts: Vec<String> = rows
        .iter()
        .map(|row| {
            let names: Vec<String> = row.keys().map(|k| quote_name(k)).collect();
            let values: Vec<String> = row.values().map(sql_literal).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({});",
                target,
                names.join(", "),
                values.join(", ")
            )
        })
        .collect();
    output.push_str(&inserts.join("\n"));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: JsonValue) -> JsonRow {
        value.as_object().cloned().unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_table_alignment() {
        let rows = vec![row(json!({"id": 1, "name": "Alice"})), row(json!({"id": 22, "name": null}))];
        let out = format_as_table(&cols(&["id", "name"]), &rows, 1500);
        assert!(out.contains("| id | name  |"));
        assert!(out.contains("|  1 | Alice |"));
        assert!(out.contains("| 22 | NULL  |"));
        assert!(out.ends_with("2 rows in set (1.50 sec)\n"));
    }

    #[test]
    fn test_table_wide_chars() {
        let rows = vec![row(json!({"name": "中文"}))];
        let out = format_as_table(&cols(&["name"]), &rows, 0);
        assert!(out.contains("+------+"));
        assert!(out.contains("| 中文 |"));
    }

    #[test]
    fn test_empty_columns() {
        assert_eq!(format_as_table(&[], &[], 0), "Empty set");
        assert_eq!(format_as_markdown(&[], &[]), "*Empty set*");
    }

    #[test]
    fn test_markdown() {
        let rows = vec![row(json!({"a": "x|y", "b": true}))];
        let out = format_as_markdown(&cols(&["a", "b"]), &rows);
        assert_eq!(out, "| a | b |\n|---|---|\n| x\\|y | true |\n\n*1 rows*");
    }

    #[test]
    fn test_csv_quoting() {
        let rows = vec![
            row(json!({"id": 1, "note": "plain"})),
            row(json!({"id": 2, "note": "a, \"b\""})),
            row(json!({"id": 3, "note": null})),
        ];
        let out = format_as_csv(&cols(&["id", "note"]), &rows);
        assert_eq!(out, "id,note\r\n1,plain\r\n2,\"a, \"\"b\"\"\"\r\n3,\r\n");
    }

    #[test]
    fn test_sql_literal() {
        assert_eq!(sql_literal(&JsonValue::Null), "NULL");
        assert_eq!(sql_literal(&json!(true)), "TRUE");
        assert_eq!(sql_literal(&json!(42)), "42");
        assert_eq!(sql_literal(&json!("O'Brien")), "'O''Brien'");
        assert_eq!(sql_literal(&json!({"k": 1})), "'{\"k\":1}'");
    }

    #[test]
    fn test_dump_table() {
        let definition = vec![
            row(json!({"column_name": "id", "data_type": "integer", "is_nullable": "NO",
                        "column_default": "nextval('t_id_seq'::regclass)"})),
            row(json!({"column_name": "name", "data_type": "text", "is_nullable": "YES",
                        "column_default": null})),
        ];
        let rows = vec![row(json!({"id": 1, "name": "a'b"})), row(json!({"id": 2, "name": null}))];
        let out = dump_table("public", "t", &definition, &rows);
        assert_eq!(
            out,
            "CREATE TABLE \"public\".\"t\" (\n  \"id\" integer NOT NULL DEFAULT nextval('t_id_seq'::regclass),\n  \"name\" text\n);\n\n\
             INSERT INTO \"public\".\"t\" (\"id\", \"name\") VALUES (1, 'a''b');\n\
             INSERT INTO \"public\".\"t\" (\"id\", \"name\") VALUES (2, NULL);"
        );
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("TABLE"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::parse("xml"), None);
    }
}
