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

//! The value normalizer: expands a cell's text into a typed document node.
//!
//! Pipeline, in order: `$name` virtual lookup, `##` literal escape,
//! `#asset|mapping|...` external inclusion with per-asset template
//! expansion, structural decoding of the expanded text, then placeholder
//! expansion against the ambient scope and the row's virtual objects.

use crate::embed::as_data_structure;
use crate::error::{excerpt, GridocError, GridocResult};
use crate::node::{get_path, new_map, Node, NodeMap};
use crate::scope::{expand_node_with, expand_text_with, Scope};
use crate::source::{resolve_asset, Locator, Storage};
use crate::tag::Tag;

/// Everything normalization needs from the current row.
#[derive(Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub scope: &'a Scope,
    pub storage: &'a dyn Storage,
    pub owner: &'a Locator,
    pub tag: &'a Tag,
    /// The row's virtual scratch mapping; absent for continuation cells.
    pub virtuals: Option<&'a NodeMap>,
    /// Resource repository pattern consulted for unresolved assets.
    pub repository: Option<&'a str>,
}

/// Normalize a cell's text into a document node.
pub fn normalize_value(ctx: &NormalizeContext<'_>, raw: &str) -> GridocResult<Node> {
    // A whole-cell `$name` is a virtual substitution and must resolve.
    if let Some(name) = whole_cell_reference(raw) {
        if let Some(virtuals) = ctx.virtuals {
            if let Some(found) = get_path(virtuals, name) {
                return ctx.scope.expand_node(&found);
            }
            if let Some(found) = ctx.scope.get(name) {
                return Ok(found);
            }
            return Err(GridocError::substitution(format!(
                "failed to resolve ${} as virtual substitution source",
                name
            )));
        }
    }

    let mut value = raw.to_string();
    if raw.starts_with("##") {
        // Literal escape: drop one '#', no resource inclusion.
        value.remove(0);
    } else if raw.starts_with('#') {
        value = include_assets(ctx, raw)?;
    }

    let mut node = as_data_structure(&value)?;
    node = ctx.scope.expand_node(&node)?;
    if let Some(virtuals) = ctx.virtuals {
        if !virtuals.borrow().is_empty() {
            node = expand_node_with(virtuals, &node);
        }
    }
    Ok(node)
}

/// Substitute `${tag}`/`$tag` with the tag name and, while the tag's
/// iterator is active, `${index}`/`$index` with the current index text.
pub fn expand_iterator_markers(tag: &Tag, text: &str) -> String {
    let mut out = text.replace("${tag}", &tag.name).replace("$tag", &tag.name);
    if tag.has_active_iterator() {
        let index = tag.iterator.as_ref().map(|i| i.index()).unwrap_or_default();
        out = out.replace("${index}", &index).replace("$index", &index);
    }
    out
}

/// `$name` (optionally dotted) covering the entire cell.
fn whole_cell_reference(text: &str) -> Option<&str> {
    let name = text.strip_prefix('$')?;
    let mut chars = name.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') && !name.ends_with('.') {
        Some(name)
    } else {
        None
    }
}

/// Expand a `#primary|mapping|...` inclusion into the final text.
fn include_assets(ctx: &NormalizeContext<'_>, reference: &str) -> GridocResult<String> {
    let assets: Vec<&str> = reference.split('|').collect();
    let mut main = load_external_text(ctx, assets[0])?;
    main = main.trim().to_string();
    main = expand_iterator_markers(ctx.tag, &main);

    // Values substituted into a JSON-shaped primary must stay quotable.
    let escape_quotes = main.starts_with('{') || main.starts_with('[');
    for (position, asset) in assets[1..].iter().enumerate() {
        let map = load_map(ctx, asset, escape_quotes, position)?;
        main = expand_text_with(&map, &main).as_text();
    }
    Ok(main)
}

fn load_external_text(ctx: &NormalizeContext<'_>, reference: &str) -> GridocResult<String> {
    let locator = resolve_asset(
        ctx.storage,
        ctx.owner,
        &ctx.tag.subpath,
        reference,
        ctx.repository,
    )?;
    ctx.storage.download_text(&locator).map_err(|e| {
        GridocError::resource(format!(
            "failed to load external resource: {} {}",
            reference, e
        ))
    })
}

/// Load a mapping asset used to template-expand the primary asset text.
///
/// The asset is another external JSON/YAML resource, a `$`-prefixed
/// virtual-object snapshot, or inline JSON text. The whole asset text is
/// additionally published under `argN`, and the text with its outer
/// bracket/brace characters stripped under `argsN`.
fn load_map(
    ctx: &NormalizeContext<'_>,
    asset: &str,
    escape_quotes: bool,
    position: usize,
) -> GridocResult<NodeMap> {
    let trimmed = asset.trim();
    let mut extension = String::new();
    let content = if let Some(name) = trimmed.strip_prefix('$') {
        let found = ctx
            .virtuals
            .and_then(|virtuals| get_path(virtuals, name))
            .or_else(|| ctx.scope.get(name))
            .ok_or_else(|| {
                GridocError::substitution(format!(
                    "failed to resolve ${} as variable substitution source",
                    name
                ))
            })?;
        if found.is_composite() {
            found.to_json_text()
        } else {
            found.as_text()
        }
    } else if trimmed.starts_with('#') {
        extension = locator_extension(trimmed);
        load_external_text(ctx, trimmed)?
    } else {
        trimmed.to_string()
    };

    let content = expand_iterator_markers(ctx.tag, &content);
    let content = content.trim().to_string();

    let map = new_map();
    if extension == "yaml" || extension == "yml" {
        let yaml: serde_yaml::Value = serde_yaml::from_str(&content).map_err(|e| {
            GridocError::decode(format!("failed to decode {:?}: {}", excerpt(&content), e), 0)
        })?;
        fill_from_node(&map, Node::from_value(&crate::Value::from(yaml)), &content)?;
    } else if content.starts_with('{') {
        fill_from_node(&map, as_data_structure(&content)?, &content)?;
    }

    if escape_quotes {
        escape_map_values(&map);
    }

    map.borrow_mut()
        .insert(format!("arg{}", position), Node::String(content.clone()));
    map.borrow_mut().insert(
        format!("args{}", position),
        Node::String(strip_outer_chars(&content)),
    );
    Ok(map)
}

fn fill_from_node(map: &NodeMap, node: Node, content: &str) -> GridocResult<()> {
    let Some(decoded) = node.as_map() else {
        return Err(GridocError::decode(
            format!("mapping asset is not an object: {:?}", excerpt(content)),
            0,
        ));
    };
    let entries: Vec<(String, Node)> = decoded
        .borrow()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    map.borrow_mut().extend(entries);
    Ok(())
}

/// JSON-encode composite values and escape embedded quotes so a value can
/// be substituted inside a JSON-shaped primary asset.
fn escape_map_values(map: &NodeMap) {
    let entries: Vec<(String, Node)> = map
        .borrow()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for (key, value) in entries {
        let text = match &value {
            Node::Null => continue,
            Node::Seq(_) | Node::Map(_) => value.to_json_text(),
            Node::String(s) => s.clone(),
            _ => continue,
        };
        if text.contains('"') {
            let escaped = text.replace('\\', "\\\\").replace('\n', "").replace('"', "\\\"");
            map.borrow_mut().insert(key, Node::String(escaped));
        } else if value.is_composite() {
            map.borrow_mut().insert(key, Node::String(text));
        }
    }
}

fn strip_outer_chars(content: &str) -> String {
    if content.len() >= 2 && content.is_char_boundary(1) && content.is_char_boundary(content.len() - 1)
    {
        content[1..content.len() - 1].to_string()
    } else {
        String::new()
    }
}

fn locator_extension(reference: &str) -> String {
    reference
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}
