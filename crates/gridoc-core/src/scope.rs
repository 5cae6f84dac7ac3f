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

//! The ambient scope: named entries plus a callable (UDF) table, threaded
//! explicitly through every normalization call.
//!
//! Template expansion substitutes `$name`, `${name}` (dotted paths allowed)
//! and `$Func(arg)` placeholders. A placeholder covering an entire string
//! substitutes the resolved value itself, preserving its type; otherwise
//! the value is spliced in as text (composites as JSON). Unresolved
//! placeholders are always left untouched.

use crate::error::GridocResult;
use crate::node::{get_path, new_map, new_seq, Node, NodeMap};
use std::collections::BTreeMap;
use std::rc::Rc;

/// A callable registered in the scope: `(value, ambient scope) -> value`.
pub type Udf = Rc<dyn Fn(&Node, &Scope) -> GridocResult<Node>>;

/// A mutable key/value scope with a callable table.
#[derive(Clone, Default)]
pub struct Scope {
    entries: BTreeMap<String, Node>,
    udfs: BTreeMap<String, Udf>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entry.
    pub fn put(&mut self, key: &str, value: Node) {
        self.entries.insert(key.to_string(), value);
    }

    /// Look up a (possibly dotted) entry path.
    pub fn get(&self, path: &str) -> Option<Node> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let node = self.entries.get(head)?.clone();
        match rest {
            None => Some(node),
            Some(rest) => get_path(&node.as_map()?, rest),
        }
    }

    /// Entry text, empty when absent.
    pub fn get_text(&self, path: &str) -> String {
        self.get(path).map(|n| n.as_text()).unwrap_or_default()
    }

    /// Register a callable under a name.
    pub fn register_udf(&mut self, name: &str, udf: Udf) {
        self.udfs.insert(name.to_string(), udf);
    }

    /// Look up a callable.
    pub fn udf(&self, name: &str) -> Option<&Udf> {
        self.udfs.get(name)
    }

    /// A fresh scope carrying only the callable table, for nested loads:
    /// state must not leak between documents.
    pub fn child_with_udfs(&self) -> Scope {
        Scope {
            entries: BTreeMap::new(),
            udfs: self.udfs.clone(),
        }
    }

    /// Expand placeholders in `text` against this scope.
    pub fn expand_text(&self, text: &str) -> GridocResult<Node> {
        expand(text, &ScopeResolver { scope: self })
    }

    /// Expand entry placeholders only, never invoking callables. Used for
    /// row pre-expansion, where `$Func(arg)` cells must stay intact for
    /// normalization.
    pub fn expand_entries_text(&self, text: &str) -> GridocResult<Node> {
        expand(text, &EntriesResolver { scope: self })
    }

    /// Recursively expand every string inside `node`.
    pub fn expand_node(&self, node: &Node) -> GridocResult<Node> {
        expand_node_inner(node, &ScopeResolver { scope: self })
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("entries", &self.entries)
            .field("udfs", &self.udfs.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Expand placeholders in `text` against a plain mapping (no callables).
pub fn expand_text_with(map: &NodeMap, text: &str) -> Node {
    // Only callables can fail, and a plain mapping has none.
    expand(text, &MapResolver { map }).unwrap_or_else(|_| Node::String(text.to_string()))
}

/// Recursively expand every string inside `node` against a plain mapping.
pub fn expand_node_with(map: &NodeMap, node: &Node) -> Node {
    expand_node_inner(node, &MapResolver { map }).unwrap_or_else(|_| node.clone())
}

trait Resolver {
    fn lookup(&self, path: &str) -> Option<Node>;
    fn call(&self, _name: &str, _arg: &Node) -> Option<GridocResult<Node>> {
        None
    }
    fn has_call(&self, _name: &str) -> bool {
        false
    }
}

struct ScopeResolver<'a> {
    scope: &'a Scope,
}

impl Resolver for ScopeResolver<'_> {
    fn lookup(&self, path: &str) -> Option<Node> {
        self.scope.get(path)
    }

    fn call(&self, name: &str, arg: &Node) -> Option<GridocResult<Node>> {
        self.scope.udf(name).map(|udf| udf(arg, self.scope))
    }

    fn has_call(&self, name: &str) -> bool {
        self.scope.udfs.contains_key(name)
    }
}

struct EntriesResolver<'a> {
    scope: &'a Scope,
}

impl Resolver for EntriesResolver<'_> {
    fn lookup(&self, path: &str) -> Option<Node> {
        self.scope.get(path)
    }
}

struct MapResolver<'a> {
    map: &'a NodeMap,
}

impl Resolver for MapResolver<'_> {
    fn lookup(&self, path: &str) -> Option<Node> {
        get_path(self.map, path)
    }
}

fn expand_node_inner(node: &Node, resolver: &dyn Resolver) -> GridocResult<Node> {
    match node {
        Node::String(text) => expand(text, resolver),
        Node::Seq(seq) => {
            let out = new_seq();
            for item in seq.borrow().iter() {
                let expanded = expand_node_inner(item, resolver)?;
                out.borrow_mut().push(expanded);
            }
            Ok(Node::Seq(out))
        }
        Node::Map(map) => {
            let out = new_map();
            let entries: Vec<(String, Node)> = map
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (key, value) in entries {
                let expanded = expand_node_inner(&value, resolver)?;
                out.borrow_mut().insert(key, expanded);
            }
            Ok(Node::Map(out))
        }
        other => Ok(other.clone()),
    }
}

enum Piece {
    Text(String),
    Value(Node),
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn expand(text: &str, resolver: &dyn Resolver) -> GridocResult<Node> {
    if !text.contains('$') {
        return Ok(Node::String(text.to_string()));
    }
    let chars: Vec<char> = text.chars().collect();
    let mut pieces: Vec<Piece> = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '$' {
            literal.push(chars[i]);
            i += 1;
            continue;
        }
        // `${name}` form
        if i + 1 < chars.len() && chars[i + 1] == '{' {
            if let Some(close) = chars[i + 2..].iter().position(|&c| c == '}') {
                let name: String = chars[i + 2..i + 2 + close].iter().collect();
                if let Some(node) = resolver.lookup(&name) {
                    flush(&mut literal, &mut pieces);
                    pieces.push(Piece::Value(node));
                    i += close + 3;
                    continue;
                }
            }
            literal.push('$');
            i += 1;
            continue;
        }
        // `$name` / `$Func(arg)` form
        let start = i + 1;
        let mut end = start;
        if end < chars.len() && is_ident_start(chars[end]) {
            end += 1;
            while end < chars.len() && is_ident_char(chars[end]) {
                end += 1;
            }
            while end + 1 < chars.len() && chars[end] == '.' && is_ident_start(chars[end + 1]) {
                end += 1;
                while end < chars.len() && is_ident_char(chars[end]) {
                    end += 1;
                }
            }
        }
        if end == start {
            literal.push('$');
            i += 1;
            continue;
        }
        let name: String = chars[start..end].iter().collect();

        if end < chars.len() && chars[end] == '(' && resolver.has_call(&name) {
            if let Some(close) = matching_paren(&chars, end) {
                let inner: String = chars[end + 1..close].iter().collect();
                let arg = expand(&inner, resolver)?;
                if let Some(result) = resolver.call(&name, &arg) {
                    flush(&mut literal, &mut pieces);
                    pieces.push(Piece::Value(result?));
                    i = close + 1;
                    continue;
                }
            }
        }
        if let Some(node) = resolver.lookup(&name) {
            flush(&mut literal, &mut pieces);
            pieces.push(Piece::Value(node));
            i = end;
            continue;
        }
        literal.push('$');
        i += 1;
    }
    flush(&mut literal, &mut pieces);

    // A placeholder covering the whole text keeps its resolved type.
    if pieces.len() == 1 {
        if let Piece::Value(node) = &pieces[0] {
            return Ok(node.clone());
        }
    }
    let mut out = String::new();
    for piece in pieces {
        match piece {
            Piece::Text(t) => out.push_str(&t),
            Piece::Value(node) => out.push_str(&node.as_text()),
        }
    }
    Ok(Node::String(out))
}

fn flush(literal: &mut String, pieces: &mut Vec<Piece>) {
    if !literal.is_empty() {
        pieces.push(Piece::Text(std::mem::take(literal)));
    }
}

fn matching_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0;
    for (offset, &c) in chars[open..].iter().enumerate() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridocError;

    fn scope_with(key: &str, value: Node) -> Scope {
        let mut scope = Scope::new();
        scope.put(key, value);
        scope
    }

    #[test]
    fn test_expand_simple_placeholder() {
        let scope = scope_with("name", Node::String("Acme".into()));
        let node = scope.expand_text("hello $name!").unwrap();
        assert_eq!(node, Node::String("hello Acme!".into()));
    }

    #[test]
    fn test_expand_braced_placeholder() {
        let scope = scope_with("index", Node::String("003".into()));
        let node = scope.expand_text("item-${index}-x").unwrap();
        assert_eq!(node, Node::String("item-003-x".into()));
    }

    #[test]
    fn test_whole_string_placeholder_keeps_type() {
        let map = new_map();
        map.borrow_mut().insert("k".into(), Node::Int(1));
        let scope = scope_with("data", Node::Map(map));
        let node = scope.expand_text("$data").unwrap();
        assert!(matches!(node, Node::Map(_)));
    }

    #[test]
    fn test_composite_splices_as_json() {
        let map = new_map();
        map.borrow_mut().insert("k".into(), Node::Int(1));
        let scope = scope_with("data", Node::Map(map));
        let node = scope.expand_text("payload=$data").unwrap();
        assert_eq!(node, Node::String("payload={\"k\":1}".into()));
    }

    #[test]
    fn test_unresolved_placeholders_are_preserved() {
        let scope = Scope::new();
        assert_eq!(
            scope.expand_text("$missing and ${also.missing}").unwrap(),
            Node::String("$missing and ${also.missing}".into())
        );
        // Non-identifier text after `$` stays literal.
        assert_eq!(
            scope.expand_text("$5.00").unwrap(),
            Node::String("$5.00".into())
        );
    }

    #[test]
    fn test_dotted_path_lookup() {
        let inner = new_map();
        inner.borrow_mut().insert("b".into(), Node::Int(2));
        let scope = scope_with("a", Node::Map(inner));
        assert_eq!(scope.expand_text("$a.b").unwrap(), Node::Int(2));
        assert_eq!(scope.get("a.b"), Some(Node::Int(2)));
    }

    #[test]
    fn test_udf_call() {
        let mut scope = scope_with("x", Node::String("5".into()));
        scope.register_udf(
            "AsInt",
            Rc::new(|value: &Node, _: &Scope| {
                value
                    .as_text()
                    .parse::<i64>()
                    .map(Node::Int)
                    .map_err(|e| GridocError::substitution(format!("not an int: {}", e)))
            }),
        );
        assert_eq!(scope.expand_text("$AsInt($x)").unwrap(), Node::Int(5));
        assert_eq!(scope.expand_text("$AsInt(41)").unwrap(), Node::Int(41));
    }

    #[test]
    fn test_udf_error_propagates() {
        let mut scope = Scope::new();
        scope.register_udf(
            "Fail",
            Rc::new(|_: &Node, _: &Scope| Err(GridocError::substitution("boom"))),
        );
        assert!(scope.expand_text("$Fail(x)").is_err());
    }

    #[test]
    fn test_unknown_call_left_literal() {
        let scope = Scope::new();
        assert_eq!(
            scope.expand_text("$NotAFunc(1)").unwrap(),
            Node::String("$NotAFunc(1)".into())
        );
    }

    #[test]
    fn test_expand_node_recurses() {
        let scope = scope_with("v", Node::String("x".into()));
        let map = new_map();
        map.borrow_mut()
            .insert("key".into(), Node::String("$v".into()));
        let seq = new_seq();
        seq.borrow_mut().push(Node::String("${v}!".into()));
        map.borrow_mut().insert("list".into(), Node::Seq(seq));

        let expanded = scope.expand_node(&Node::Map(map)).unwrap();
        let expanded = expanded.as_map().unwrap();
        assert_eq!(expanded.borrow().get("key"), Some(&Node::String("x".into())));
        let list = expanded.borrow().get("list").unwrap().as_seq().unwrap();
        assert_eq!(list.borrow()[0], Node::String("x!".into()));
    }

    #[test]
    fn test_expand_text_with_map() {
        let map = new_map();
        map.borrow_mut()
            .insert("name".into(), Node::String("neat".into()));
        let node = expand_text_with(&map, "a ${name} b");
        assert_eq!(node, Node::String("a neat b".into()));
    }

    #[test]
    fn test_child_with_udfs_drops_entries() {
        let mut scope = scope_with("state", Node::Int(1));
        scope.register_udf("Noop", Rc::new(|v: &Node, _: &Scope| Ok(v.clone())));
        let child = scope.child_with_udfs();
        assert!(child.get("state").is_none());
        assert!(child.udf("Noop").is_some());
    }
}
