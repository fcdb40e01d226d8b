// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::borrow::Cow;

use comfy_table::{Table, presets::ASCII_BORDERS_ONLY_CONDENSED};

use super::QueryResult;

/// Maximum width for raw JSON columns (labels, status)
const MAX_JSON_COLUMN_WIDTH: usize = 60;

const COLUMNS: &[&str] = &["name", "owner", "resource_version", "labels", "status"];

/// Truncate a string to max_len chars, adding "..." if truncated
fn truncate_value(s: &str, max_len: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_len {
        Cow::Borrowed(s)
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        Cow::Owned(format!("{}...", truncated))
    }
}

pub struct TableFormatter;

impl TableFormatter {
    pub fn format(result: &QueryResult, no_headers: bool) -> String {
        if result.resources.is_empty() {
            return "(0 rows)".to_string();
        }

        let mut table = Table::new();
        table.load_preset(ASCII_BORDERS_ONLY_CONDENSED);

        if !no_headers {
            table.set_header(COLUMNS);
        }

        for res in &result.resources {
            let labels = res
                .labels
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(",");
            let status = res.status.as_ref().map(|s| s.get()).unwrap_or("");
            table.add_row(vec![
                res.name.clone(),
                res.owner(&result.owner_label).to_string(),
                res.resource_version.clone().unwrap_or_default(),
                truncate_value(&labels, MAX_JSON_COLUMN_WIDTH).into_owned(),
                truncate_value(status, MAX_JSON_COLUMN_WIDTH).into_owned(),
            ]);
        }

        let output = table.to_string();
        format!("{}\n({} rows)", output, result.resources.len())
    }
}
