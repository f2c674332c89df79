//! Render raw tool output for the terminal
//!
//! A JSON array becomes a short bulleted listing; other JSON is
//! pretty-printed; anything else is shown as a bounded text excerpt.

use serde_json::Value;

use super::history::truncate_chars;

/// Render `raw` with at most `item_cap` list entries or `text_cap` characters
pub fn format_result(raw: &str, item_cap: usize, text_cap: usize) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => format_list(&items, item_cap),
        Ok(other) => serde_json::to_string_pretty(&other).unwrap_or_else(|_| raw.to_string()),
        Err(_) => truncate_chars(raw, text_cap),
    }
}

fn format_list(items: &[Value], item_cap: usize) -> String {
    let mut lines = vec![format!("Found {} item(s):", items.len())];

    for item in items.iter().take(item_cap) {
        lines.push(format!("  • {}", describe_item(item)));
    }

    if items.len() > item_cap {
        lines.push(format!("  ... and {} more", items.len() - item_cap));
    }

    lines.join("\n")
}

fn describe_item(item: &Value) -> String {
    let Some(map) = item.as_object() else {
        return match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    };

    let name = map
        .get("name")
        .and_then(Value::as_str)
        .or_else(|| map.get("kind").and_then(Value::as_str))
        .unwrap_or("Unknown");

    match map.get("namespace").and_then(Value::as_str) {
        Some(ns) if !ns.is_empty() => format!("{} (namespace: {})", name, ns),
        _ => name.to_string(),
    }
}
