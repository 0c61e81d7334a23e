use std::io::IsTerminal;
use std::sync::OnceLock;

use serde::Serialize;
use serde_json::Value;

use crate::cli::{GlobalFlags, OutputFormat};

pub mod table;

static TABLE_OPTIONS: OnceLock<table::TableOptions> = OnceLock::new();

/// Decide table color and width once from the terminal and flags.
pub fn init(flags: &GlobalFlags) {
    let is_tty = std::io::stdout().is_terminal();
    let color = is_tty
        && flags.format == OutputFormat::Table
        && !flags.quiet
        && std::env::var_os("NO_COLOR").is_none();
    let max_width = std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 40);
    let _ = TABLE_OPTIONS.set(table::TableOptions { max_width, color });
}

fn table_options() -> table::TableOptions {
    TABLE_OPTIONS.get().copied().unwrap_or_default()
}

/// Render a serializable response to a string in the requested format.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Table => render_table(&serde_json::to_value(value)?),
        OutputFormat::Raw => Ok(serde_json::to_string(value)?),
    }
}

/// Print a serializable response in the requested format.
pub fn output<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = render(value, format)?;
    println!("{rendered}");
    Ok(())
}

/// Objects become key/value tables; arrays of objects become one row per item
/// with nested objects flattened to dotted columns (`counters.fetched`).
fn render_table(value: &Value) -> anyhow::Result<String> {
    let options = table_options();
    let items: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => {
            let mut rows = Vec::new();
            flatten("", value, &mut rows);
            if map.is_empty() {
                return Ok(String::from("(empty)"));
            }
            return Ok(table::render_table(&["key", "value"], &rows_of(rows), options));
        }
        scalar => return Ok(cell(scalar)),
    };

    if items.is_empty() {
        return Ok(String::from("(no rows)"));
    }

    let flattened: Vec<Vec<(String, String)>> = items
        .iter()
        .map(|item| {
            let mut cells = Vec::new();
            flatten("", item, &mut cells);
            cells
        })
        .collect();

    let mut headers: Vec<String> = Vec::new();
    for cells in &flattened {
        for (key, _) in cells {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows: Vec<Vec<String>> = flattened
        .iter()
        .map(|cells| {
            headers
                .iter()
                .map(|header| {
                    cells
                        .iter()
                        .find(|(key, _)| key == header)
                        .map_or_else(|| String::from("-"), |(_, value)| value.clone())
                })
                .collect()
        })
        .collect();
    let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
    Ok(table::render_table(&header_refs, &rows, options))
}

fn rows_of(pairs: Vec<(String, String)>) -> Vec<Vec<String>> {
    pairs.into_iter().map(|(key, value)| vec![key, value]).collect()
}

/// Flatten one level of nesting at a time, keeping arrays as JSON cells.
fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&name, nested, out);
            }
        }
        other if prefix.is_empty() => out.push((String::from("value"), cell(other))),
        other => out.push((prefix.to_string(), cell(other))),
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("-"),
        Value::Bool(v) => v.to_string(),
        Value::Number(v) => v.to_string(),
        Value::String(v) => v.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| String::from("<invalid-json>")),
    }
}
