//! Output formatting for CLI

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty JSON for `data`
pub fn to_json<T: Serialize + ?Sized>(data: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Render rows as a table
pub fn to_table<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print rows in the requested format; `text` renders one row per line
pub fn print_rows<T, F>(rows: &[T], format: OutputFormat, text: F) -> anyhow::Result<()>
where
    T: Serialize + Tabled,
    F: Fn(&T) -> String,
{
    match format {
        OutputFormat::Json => println!("{}", to_json(rows)?),
        OutputFormat::Table => println!("{}", to_table(rows)),
        OutputFormat::Text => {
            for row in rows {
                println!("{}", text(row));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Tabled)]
    struct Row {
        name: String,
        count: usize,
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::from("whatever"), OutputFormat::Text);
    }

    #[test]
    fn test_table_and_json() {
        let rows = vec![Row {
            name: "Sintel".into(),
            count: 3,
        }];
        let table = to_table(&rows);
        assert!(table.contains("name"));
        assert!(table.contains("Sintel"));

        let json = to_json(&rows).unwrap();
        assert!(json.contains("\"count\": 3"));
    }
}
