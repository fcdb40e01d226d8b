// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use super::QueryResult;

pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format(result: &QueryResult) -> String {
        serde_json::to_string_pretty(&result.documents()).unwrap_or_else(|_| "[]".to_string())
    }
}
