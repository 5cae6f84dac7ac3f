// Dweve Gridoc - Grid Document Language
//
// Copyright (c) 2025 Dweve IP B.V. and individual contributors.
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository or at: http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Structural decoding of cell text: inline JSON fragments, escape
//! markers, and scalar type inference.

use crate::error::{excerpt, GridocError, GridocResult};
use crate::node::Node;
use crate::value::Value;

/// Decode expanded cell text into a document node.
///
/// `{{...}}` and `[[...]]` unescape to a literal string with the outer
/// marker character stripped. Text starting with `{` decodes as a JSON
/// object unless it is a newline-delimited JSON stream (kept as text);
/// text starting with `[` decodes as a JSON array. Anything else becomes
/// an inferred scalar.
pub fn as_data_structure(text: &str) -> GridocResult<Node> {
    if text.is_empty() {
        return Ok(Node::Null);
    }
    let escaped = text.len() >= 4
        && ((text.starts_with("{{") && text.ends_with("}}"))
            || (text.starts_with("[[") && text.ends_with("]]")));
    if escaped {
        return Ok(Node::String(text[1..text.len() - 1].to_string()));
    }
    if text.starts_with('{') {
        if is_newline_delimited_json(text) {
            return Ok(Node::String(text.to_string()));
        }
        let json: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            GridocError::decode(format!("failed to decode {:?}: {}", excerpt(text), e), 0)
        })?;
        if !json.is_object() {
            return Err(GridocError::decode(
                format!("expected a JSON object: {:?}", excerpt(text)),
                0,
            ));
        }
        return Ok(Node::from_value(&Value::from(json)));
    }
    if text.starts_with('[') {
        let json: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            GridocError::decode(format!("failed to decode {:?}: {}", excerpt(text), e), 0)
        })?;
        if !json.is_array() {
            return Err(GridocError::decode(
                format!("expected a JSON array: {:?}", excerpt(text)),
                0,
            ));
        }
        return Ok(Node::from_value(&Value::from(json)));
    }
    Ok(infer_scalar(text))
}

/// True for text that is a stream of one-object-per-line JSON.
pub fn is_newline_delimited_json(text: &str) -> bool {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines.len() > 1
        && lines
            .iter()
            .all(|l| l.starts_with('{') && l.ends_with('}'))
}

/// Infer a typed scalar from plain cell text.
///
/// Whole-text integers, floats and booleans become typed values; anything
/// else (including zero-padded digit runs, which carry formatting) stays a
/// string.
pub fn infer_scalar(text: &str) -> Node {
    match text {
        "true" => return Node::Bool(true),
        "false" => return Node::Bool(false),
        _ => {}
    }
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    if unsigned.is_empty() || !unsigned.starts_with(|c: char| c.is_ascii_digit()) {
        return Node::String(text.to_string());
    }
    if unsigned.len() > 1 && unsigned.starts_with('0') && !unsigned.starts_with("0.") {
        return Node::String(text.to_string());
    }
    if unsigned.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(n) = text.parse::<i64>() {
            return Node::Int(n);
        }
        return Node::String(text.to_string());
    }
    if unsigned.contains('.') || unsigned.contains('e') || unsigned.contains('E') {
        if let Ok(n) = text.parse::<f64>() {
            if n.is_finite() {
                return Node::Float(n);
            }
        }
    }
    Node::String(text.to_string())
}
