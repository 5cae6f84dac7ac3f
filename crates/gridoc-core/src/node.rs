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

//! Shared-mutable document nodes used while a load is in progress.
//!
//! A container placed in the document and simultaneously captured by the
//! reference ledger must stay aliased: a forward reference resolved with an
//! array tag's collection has to observe elements appended after resolution.
//! Containers are therefore `Rc<RefCell<..>>` during the build; the final
//! [`Value`](crate::Value) is produced by a deep copy once the scan is done.

use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Shared sequence container.
pub type NodeSeq = Rc<RefCell<Vec<Node>>>;
/// Shared mapping container.
pub type NodeMap = Rc<RefCell<BTreeMap<String, Node>>>;

/// A document value under construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Seq(NodeSeq),
    Map(NodeMap),
}

/// Create a new empty shared mapping.
pub fn new_map() -> NodeMap {
    Rc::new(RefCell::new(BTreeMap::new()))
}

/// Create a new empty shared sequence.
pub fn new_seq() -> NodeSeq {
    Rc::new(RefCell::new(Vec::new()))
}

impl Node {
    /// Try to get the shared mapping handle.
    pub fn as_map(&self) -> Option<NodeMap> {
        match self {
            Self::Map(m) => Some(Rc::clone(m)),
            _ => None,
        }
    }

    /// Try to get the shared sequence handle.
    pub fn as_seq(&self) -> Option<NodeSeq> {
        match self {
            Self::Seq(s) => Some(Rc::clone(s)),
            _ => None,
        }
    }

    /// Returns true for sequences and mappings.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Seq(_) | Self::Map(_))
    }

    /// Render a scalar as text; composites render as JSON.
    pub fn as_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::String(s) => s.clone(),
            Self::Seq(_) | Self::Map(_) => self.to_json_text(),
        }
    }

    /// JSON rendering of this node, used when a composite is substituted
    /// into text.
    pub fn to_json_text(&self) -> String {
        serde_json::to_string(&self.to_value()).unwrap_or_default()
    }

    /// Deep-copy this node into an owned [`Value`].
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::Int(*n),
            Self::Float(n) => Value::Float(*n),
            Self::String(s) => Value::String(s.clone()),
            Self::Seq(seq) => {
                Value::Sequence(seq.borrow().iter().map(Node::to_value).collect())
            }
            Self::Map(map) => Value::Mapping(
                map.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        }
    }

    /// Build a node from an owned [`Value`], allocating fresh containers.
    pub fn from_value(value: &Value) -> Node {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Int(n) => Node::Int(*n),
            Value::Float(n) => Node::Float(*n),
            Value::String(s) => Node::String(s.clone()),
            Value::Sequence(items) => {
                let seq = new_seq();
                seq.borrow_mut()
                    .extend(items.iter().map(Node::from_value));
                Node::Seq(seq)
            }
            Value::Mapping(map) => {
                let out = new_map();
                {
                    let mut borrow = out.borrow_mut();
                    for (k, v) in map {
                        borrow.insert(k.clone(), Node::from_value(v));
                    }
                }
                Node::Map(out)
            }
        }
    }

    /// A node is vacant when it carries no information: null, an empty
    /// string, or a mapping whose every entry is itself vacant.
    pub fn is_vacant(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.is_empty(),
            Self::Map(map) => map.borrow().values().all(Node::is_vacant),
            _ => false,
        }
    }

}

/// Look up a value at a `.`-separated path of mapping keys.
pub fn get_path(map: &NodeMap, path: &str) -> Option<Node> {
    let mut current = Node::Map(Rc::clone(map));
    for segment in path.split('.') {
        let next = current.as_map()?.borrow().get(segment).cloned()?;
        current = next;
    }
    Some(current)
}

/// Store a value at a `.`-separated path, creating intermediate mappings.
pub fn set_path(map: &NodeMap, path: &str, value: Node) {
    let mut current = Rc::clone(map);
    let segments: Vec<&str> = path.split('.').collect();
    for segment in &segments[..segments.len() - 1] {
        let next = {
            let mut borrow = current.borrow_mut();
            match borrow.get(*segment).and_then(Node::as_map) {
                Some(existing) => existing,
                None => {
                    let fresh = new_map();
                    borrow.insert((*segment).to_string(), Node::Map(Rc::clone(&fresh)));
                    fresh
                }
            }
        };
        current = next;
    }
    current
        .borrow_mut()
        .insert(segments[segments.len() - 1].to_string(), value);
}

/// Recursively drop vacant trailing sequence elements under a mapping.
///
/// Index padding can leave placeholder mappings at the tail of a sequence
/// when a later row never fills them in; arrays handed to the caller must
/// not carry them.
pub fn prune_trailing_vacant(map: &NodeMap) {
    let values: Vec<Node> = map.borrow().values().cloned().collect();
    for node in values {
        prune_node(&node);
    }
}

fn prune_node(node: &Node) {
    match node {
        Node::Map(map) => prune_trailing_vacant(map),
        Node::Seq(seq) => {
            for item in seq.borrow().iter() {
                if let Node::Map(inner) = item {
                    prune_trailing_vacant(inner);
                }
            }
            let mut borrow = seq.borrow_mut();
            while matches!(borrow.last(), Some(Node::Map(_)) if borrow.last().unwrap().is_vacant())
            {
                borrow.pop();
            }
        }
        _ => {}
    }
}
