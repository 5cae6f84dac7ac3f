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

//! The standard UDF library: conversion helpers, hashing, resource probes
//! and nested document loading, invoked from cells as `$Name(arg)`.

use gridoc_core::{
    FileStorage, GridocError, GridocResult, Loader, Locator, Node, Scope, Storage, Value,
};
use std::rc::Rc;

/// Register the standard UDFs into a scope.
pub fn register_standard_udfs(scope: &mut Scope) {
    scope.register_udf("AsMap", Rc::new(as_map));
    scope.register_udf("AsInt", Rc::new(as_int));
    scope.register_udf("AsFloat", Rc::new(as_float));
    scope.register_udf("AsBool", Rc::new(as_bool));
    scope.register_udf("Md5", Rc::new(md5_hex));
    scope.register_udf("HasResource", Rc::new(has_resource));
    scope.register_udf("WorkingDirectory", Rc::new(working_directory));
    scope.register_udf("Pwd", Rc::new(working_directory));
    scope.register_udf("Cat", Rc::new(cat));
    scope.register_udf("IsJSON", Rc::new(is_json));
    scope.register_udf("LoadDocument", Rc::new(load_document));
}

fn as_map(value: &Node, _scope: &Scope) -> GridocResult<Node> {
    if value.is_composite() {
        return Ok(value.clone());
    }
    let json: serde_json::Value = serde_json::from_str(&value.as_text())
        .map_err(|e| GridocError::substitution(format!("AsMap: not a JSON object: {}", e)))?;
    if !json.is_object() {
        return Err(GridocError::substitution("AsMap: not a JSON object"));
    }
    Ok(Node::from_value(&Value::from(json)))
}

fn as_int(value: &Node, _scope: &Scope) -> GridocResult<Node> {
    match value {
        Node::Int(n) => Ok(Node::Int(*n)),
        Node::Float(n) => Ok(Node::Int(*n as i64)),
        other => other
            .as_text()
            .trim()
            .parse::<i64>()
            .map(Node::Int)
            .map_err(|e| GridocError::substitution(format!("AsInt: {}", e))),
    }
}

fn as_float(value: &Node, _scope: &Scope) -> GridocResult<Node> {
    match value {
        Node::Float(n) => Ok(Node::Float(*n)),
        Node::Int(n) => Ok(Node::Float(*n as f64)),
        other => other
            .as_text()
            .trim()
            .parse::<f64>()
            .map(Node::Float)
            .map_err(|e| GridocError::substitution(format!("AsFloat: {}", e))),
    }
}

fn as_bool(value: &Node, _scope: &Scope) -> GridocResult<Node> {
    match value {
        Node::Bool(b) => Ok(Node::Bool(*b)),
        other => match other.as_text().trim() {
            "true" | "1" => Ok(Node::Bool(true)),
            "false" | "0" => Ok(Node::Bool(false)),
            text => Err(GridocError::substitution(format!(
                "AsBool: not a boolean: {:?}",
                text
            ))),
        },
    }
}

fn md5_hex(value: &Node, _scope: &Scope) -> GridocResult<Node> {
    let digest = md5::compute(value.as_text().as_bytes());
    Ok(Node::String(format!("{:x}", digest)))
}

/// The directory of the document currently being loaded, from the
/// `ownerURL` scope entry.
fn owner_directory(scope: &Scope) -> Option<Locator> {
    let owner = scope.get_text("ownerURL");
    if owner.is_empty() {
        return None;
    }
    Some(Locator::new(owner).parent())
}

fn resolve_relative(scope: &Scope, reference: &str) -> Locator {
    if reference.contains("://") || reference.starts_with('/') {
        return Locator::new(reference);
    }
    match owner_directory(scope) {
        Some(dir) => dir.join(reference),
        None => Locator::new(reference),
    }
}

fn has_resource(value: &Node, scope: &Scope) -> GridocResult<Node> {
    let locator = resolve_relative(scope, &value.as_text());
    Ok(Node::Bool(FileStorage.exists(&locator)))
}

fn working_directory(value: &Node, _scope: &Scope) -> GridocResult<Node> {
    let mut current = std::env::current_dir()
        .map_err(|e| GridocError::io(format!("WorkingDirectory: {}", e)))?;
    let mut subpath = value.as_text();
    while subpath.starts_with("../") {
        current.pop();
        subpath = subpath[3..].to_string();
    }
    if !subpath.is_empty() {
        current.push(&subpath);
    }
    Ok(Node::String(current.to_string_lossy().into_owned()))
}

fn cat(value: &Node, scope: &Scope) -> GridocResult<Node> {
    let locator = resolve_relative(scope, &value.as_text());
    FileStorage.download_text(&locator).map(Node::String)
}

fn is_json(value: &Node, scope: &Scope) -> GridocResult<Node> {
    let content = cat(value, scope)?;
    Ok(Node::Bool(
        serde_json::from_str::<serde_json::Value>(&content.as_text()).is_ok(),
    ))
}

/// Load another document as a data structure. The nested load runs in a
/// fresh scope carrying only the callable table; state never leaks
/// between documents.
fn load_document(value: &Node, scope: &Scope) -> GridocResult<Node> {
    let locator = resolve_relative(scope, &value.as_text());
    if !FileStorage.exists(&locator) {
        return Err(GridocError::resource(format!(
            "document {} does not exist",
            locator
        )));
    }
    let loader = Loader::default();
    let mut nested_scope = scope.child_with_udfs();
    let document = loader.load(&mut nested_scope, &locator)?;
    Ok(Node::from_value(&document))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, scope: &Scope, value: Node) -> GridocResult<Node> {
        let udf = scope.udf(name).cloned().expect("udf registered");
        udf(&value, scope)
    }

    fn scope() -> Scope {
        let mut scope = Scope::new();
        register_standard_udfs(&mut scope);
        scope
    }

    #[test]
    fn test_as_int() {
        let scope = scope();
        assert_eq!(
            call("AsInt", &scope, Node::String("42".into())).unwrap(),
            Node::Int(42)
        );
        assert_eq!(
            call("AsInt", &scope, Node::Float(3.9)).unwrap(),
            Node::Int(3)
        );
        assert!(call("AsInt", &scope, Node::String("x".into())).is_err());
    }

    #[test]
    fn test_as_float() {
        let scope = scope();
        assert_eq!(
            call("AsFloat", &scope, Node::String("2.5".into())).unwrap(),
            Node::Float(2.5)
        );
        assert_eq!(
            call("AsFloat", &scope, Node::Int(2)).unwrap(),
            Node::Float(2.0)
        );
    }

    #[test]
    fn test_as_bool() {
        let scope = scope();
        assert_eq!(
            call("AsBool", &scope, Node::String("true".into())).unwrap(),
            Node::Bool(true)
        );
        assert_eq!(
            call("AsBool", &scope, Node::String("0".into())).unwrap(),
            Node::Bool(false)
        );
        assert!(call("AsBool", &scope, Node::String("maybe".into())).is_err());
    }

    #[test]
    fn test_as_map() {
        let scope = scope();
        let node = call("AsMap", &scope, Node::String("{\"a\": 1}".into())).unwrap();
        let map = node.as_map().unwrap();
        assert_eq!(map.borrow().get("a"), Some(&Node::Int(1)));
        assert!(call("AsMap", &scope, Node::String("[1]".into())).is_err());
    }

    #[test]
    fn test_md5() {
        let scope = scope();
        let node = call("Md5", &scope, Node::String("hello".into())).unwrap();
        assert_eq!(
            node,
            Node::String("5d41402abc4b2a76b9719d911017c592".into())
        );
    }

    #[test]
    fn test_has_resource_absolute_miss() {
        let scope = scope();
        assert_eq!(
            call(
                "HasResource",
                &scope,
                Node::String("/nonexistent/asset.json".into())
            )
            .unwrap(),
            Node::Bool(false)
        );
    }

    #[test]
    fn test_working_directory() {
        let scope = scope();
        let plain = call("WorkingDirectory", &scope, Node::String("".into())).unwrap();
        let nested = call("WorkingDirectory", &scope, Node::String("sub".into())).unwrap();
        assert!(nested.as_text().starts_with(&plain.as_text()));
        assert!(nested.as_text().ends_with("sub"));
        let parent = call("WorkingDirectory", &scope, Node::String("../".into())).unwrap();
        assert!(plain.as_text().starts_with(&parent.as_text()));
    }
}
