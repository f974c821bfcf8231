//! Block builders
//!
//! Helpers that build the JSON block payloads the experiment recorder
//! appends to a page: a metrics table, a system-info code block, and the
//! file child that references a finished upload.

use serde_json::{json, Value};

/// Build a table block from a markdown-style metrics table.
///
/// The input's first line is the header row and the second line is the
/// `|---|---|` separator, which is skipped. Returns `None` when the input
/// has no usable rows.
pub fn table_block(metrics_table: &str) -> Option<Value> {
    let rows: Vec<Vec<&str>> = metrics_table
        .lines()
        .enumerate()
        .filter(|(i, _)| *i != 1)
        .filter_map(|(_, line)| {
            let cells: Vec<&str> = line.split('|').collect();
            if cells.len() < 3 {
                return None;
            }
            // A markdown row is `|a|b|c|`: drop the empty edges
            Some(cells[1..cells.len() - 1].to_vec())
        })
        .collect();

    let width = rows.first()?.len();

    let children: Vec<Value> = rows
        .iter()
        .map(|row| {
            json!({
                "object": "block",
                "type": "table_row",
                "table_row": {
                    "cells": row.iter().map(|cell| {
                        json!([{ "type": "text", "text": { "content": cell } }])
                    }).collect::<Vec<_>>()
                }
            })
        })
        .collect();

    Some(json!({
        "object": "block",
        "type": "table",
        "table": {
            "table_width": width,
            "has_column_header": true,
            "has_row_header": false,
            "children": children,
        }
    }))
}

/// Build a `yaml` code block holding a preformatted text blob
pub fn code_block(content: &str) -> Value {
    json!({
        "object": "block",
        "type": "code",
        "code": {
            "language": "yaml",
            "rich_text": [
                { "type": "text", "text": { "content": content } }
            ]
        }
    })
}

/// Build the file child block referencing a finished upload by id
pub fn file_child(upload_id: &str, display_name: &str) -> Value {
    json!({
        "type": "file",
        "file": {
            "type": "file_upload",
            "file_upload": { "id": upload_id },
            "name": display_name,
        }
    })
}
