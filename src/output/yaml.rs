// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use super::QueryResult;

pub struct YamlFormatter;

impl YamlFormatter {
    pub fn format(result: &QueryResult) -> String {
        // Raw spec/status only render as YAML once expanded into a Value
        serde_json::to_value(result.documents())
            .ok()
            .and_then(|value| serde_yaml::to_string(&value).ok())
            .unwrap_or_else(|| "[]".to_string())
    }
}
