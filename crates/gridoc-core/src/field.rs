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

//! Field-path expressions: where and how a cell's value lands in the
//! document.
//!
//! A column expression is parsed once per header. The grammar, left to
//! right: an optional `/` prefix addresses the document root instead of the
//! current tag object; an optional `:` prefix (or a lowercase-initial name)
//! addresses the per-row virtual scratch mapping; an optional `[]` prefix
//! makes the segment a sequence; `.` separates path segments; a numeric
//! child segment under an array parent addresses a sequence slot directly.

use crate::error::{GridocError, GridocResult};
use crate::node::{new_map, new_seq, Node, NodeMap};
use std::rc::Rc;

/// A parsed column expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// The raw expression this field was parsed from.
    pub expression: String,
    /// This segment's key.
    pub name: String,
    /// Child segment when the expression contains a path separator.
    pub child: Option<Box<Field>>,
    /// This segment wraps its value in a sequence.
    pub is_array: bool,
    /// The expression continues below this segment.
    pub has_sub_path: bool,
    /// This segment or any child segment is a sequence.
    pub has_array_component: bool,
    /// Addresses the document root rather than the current tag object.
    pub is_root: bool,
    /// Addresses the per-row virtual scratch mapping.
    pub is_virtual: bool,
    /// Numeric segment addressing a sequence slot.
    pub is_index: bool,
}

impl Field {
    /// Parse a column expression.
    pub fn parse(expression: &str) -> GridocResult<Field> {
        let mut parsed = expression;
        let is_root = parsed.starts_with('/');
        if is_root {
            parsed = &parsed[1..];
        }
        let mut is_virtual = parsed.starts_with(':');
        if is_virtual {
            parsed = &parsed[1..];
        }
        let is_array = parsed.starts_with("[]");
        if is_array {
            parsed = &parsed[2..];
        }
        let first = parsed.chars().next().ok_or_else(|| {
            GridocError::decode(format!("empty field expression: {:?}", expression), 0)
        })?;
        if first.is_lowercase() {
            is_virtual = true;
        }

        let mut field = Field {
            expression: expression.to_string(),
            name: parsed.to_string(),
            child: None,
            is_array,
            has_sub_path: parsed.contains('.'),
            has_array_component: is_array || parsed.contains("[]"),
            is_root,
            is_virtual,
            is_index: false,
        };

        if field.has_sub_path {
            let dot = parsed.find('.').unwrap();
            field.name = parsed[..dot].to_string();
            let mut child = Field::parse(&parsed[dot + 1..])?;
            if field.is_array && child.name.parse::<usize>().is_ok() {
                child.is_index = true;
            }
            field.child = Some(Box::new(child));
        }
        Ok(field)
    }

    /// The terminal field of the chain.
    pub fn leaf(&self) -> &Field {
        match &self.child {
            Some(child) => child.leaf(),
            None => self,
        }
    }

    /// Write `value` into `target` at this field's path.
    ///
    /// `indexes` supplies sequence positions, consumed outermost first; a
    /// missing index defaults to 0. Sequences are padded with empty mappings
    /// so any index is valid. Writes to an occupied singleton leaf merge
    /// mapping-into-mapping and append to sequences; repeated writes
    /// accumulate rather than clobber.
    pub fn set(&self, value: Node, target: &NodeMap, indexes: &[usize]) {
        {
            let mut borrow = target.borrow_mut();
            if !borrow.contains_key(&self.name) {
                if self.is_array {
                    borrow.insert(self.name.clone(), Node::Seq(new_seq()));
                } else if self.has_sub_path {
                    borrow.insert(self.name.clone(), Node::Map(new_map()));
                }
            }
        }

        if self.is_array {
            // A whole sequence replaces the keyed sequence outright.
            if let Node::Seq(seq) = &value {
                if !self.has_sub_path {
                    target
                        .borrow_mut()
                        .insert(self.name.clone(), Node::Seq(Rc::clone(seq)));
                    return;
                }
            }
            let (index, rest) = shift_index(indexes);
            let seq = match target.borrow().get(&self.name).and_then(Node::as_seq) {
                Some(seq) => seq,
                None => return,
            };
            pad_with_maps(&seq, index + 1);

            if !self.has_sub_path {
                seq.borrow_mut()[index] = value;
                return;
            }
            let child = self.child.as_ref().unwrap();
            if child.is_index {
                self.set_at_child_index(child, value, &seq);
                return;
            }
            let element = seq.borrow()[index].as_map();
            if let Some(element) = element {
                child.set(value, &element, rest);
            }
        } else if self.has_sub_path {
            let child = self.child.as_ref().unwrap();
            let inner = match target.borrow().get(&self.name).and_then(Node::as_map) {
                Some(inner) => inner,
                None => return,
            };
            child.set(value, &inner, indexes);
        } else {
            merge_into(target, &self.name, value);
        }
    }

    fn set_at_child_index(&self, child: &Field, value: Node, seq: &crate::node::NodeSeq) {
        let index: usize = child.name.parse().unwrap_or(0);
        pad_with_maps(seq, index + 1);
        seq.borrow_mut()[index] = value;
    }

    /// The dotted path down to (and including) the first array segment.
    pub fn array_path(&self) -> Option<String> {
        if !self.has_array_component {
            return None;
        }
        let mut parts = Vec::new();
        let mut field = self;
        loop {
            parts.push(field.name.as_str());
            if field.is_array || !field.has_sub_path {
                break;
            }
            field = field.child.as_ref().unwrap();
        }
        Some(parts.join("."))
    }

    /// The current length of the sequence this field's array component
    /// addresses within `target`, or 0 when absent.
    pub fn array_size(&self, target: &NodeMap) -> usize {
        if !self.has_array_component {
            return 0;
        }
        let mut current = Rc::clone(target);
        let mut field = self;
        loop {
            let sub = match current.borrow().get(&field.name).cloned() {
                Some(sub) => sub,
                None => return 0,
            };
            if field.is_array {
                return sub.as_seq().map(|s| s.borrow().len()).unwrap_or(0);
            }
            if !field.has_sub_path {
                return 0;
            }
            current = match sub.as_map() {
                Some(map) => map,
                None => return 0,
            };
            field = field.child.as_ref().unwrap();
        }
    }
}

fn shift_index<'a>(indexes: &'a [usize]) -> (usize, &'a [usize]) {
    match indexes.split_first() {
        Some((first, rest)) => (*first, rest),
        None => (0, indexes),
    }
}

fn pad_with_maps(seq: &crate::node::NodeSeq, len: usize) {
    let mut borrow = seq.borrow_mut();
    while borrow.len() < len {
        borrow.push(Node::Map(new_map()));
    }
}

/// Write a value under `key`, accumulating with any existing value:
/// mapping-into-mapping merges key-by-key, sequences append, and a scalar
/// never displaces an existing composite mapping.
fn merge_into(target: &NodeMap, key: &str, value: Node) {
    let existing = target.borrow().get(key).cloned();
    match existing {
        Some(Node::Map(existing_map)) => {
            if let Node::Map(incoming) = &value {
                let entries: Vec<(String, Node)> = incoming
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let mut borrow = existing_map.borrow_mut();
                for (k, v) in entries {
                    borrow.insert(k, v);
                }
            }
            // A scalar does not displace an existing mapping.
        }
        Some(Node::Seq(existing_seq)) => match value {
            Node::Seq(incoming) => {
                let items: Vec<Node> = incoming.borrow().iter().cloned().collect();
                existing_seq.borrow_mut().extend(items);
            }
            other => existing_seq.borrow_mut().push(other),
        },
        _ => {
            target.borrow_mut().insert(key.to_string(), value);
        }
    }
}
