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

//! End-to-end loader scenarios.

use gridoc_core::{
    GridocErrorKind, LoadOptions, Loader, Locator, Node, Scope, Value,
};
use std::fs;
use std::rc::Rc;

fn load(text: &str) -> Value {
    try_load(text).unwrap()
}

fn try_load(text: &str) -> Result<Value, gridoc_core::GridocError> {
    let loader = Loader::default();
    let mut scope = Scope::new();
    loader.load_str(&mut scope, text, &Locator::new("/mem/test.csv"))
}

fn seq_len(value: &Value, key: &str) -> usize {
    value.get(key).unwrap().as_sequence().unwrap().len()
}

#[test]
fn test_singleton_tag_and_root_field() {
    let doc = load(
        "Root\n\
         Info,Name,/Count\n\
         ,Acme,3\n",
    );
    assert_eq!(
        doc.get("Info").unwrap().get("Name"),
        Some(&Value::String("Acme".to_string()))
    );
    assert_eq!(doc.get("Count"), Some(&Value::Int(3)));
}

#[test]
fn test_comments_and_leading_blanks_filtered() {
    let doc = load(
        "\n\
         // a comment\n\
         Root\n\
         Info,Name\n\
         // another comment\n\
         ,Acme\n",
    );
    assert_eq!(
        doc.get("Info").unwrap().get("Name"),
        Some(&Value::String("Acme".to_string()))
    );
}

#[test]
fn test_array_tag_pushes_per_row() {
    let doc = load(
        "Root\n\
         []Orders,Id,Name\n\
         ,1,Order 1\n\
         ,2,Order 2\n",
    );
    let orders = doc.get("Orders").unwrap().as_sequence().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].get("Id"), Some(&Value::Int(1)));
    assert_eq!(
        orders[1].get("Name"),
        Some(&Value::String("Order 2".to_string()))
    );
}

#[test]
fn test_continuation_rows_extend_array_columns() {
    let doc = load(
        "Root\n\
         []Items,Name,[]Tags\n\
         ,x,a\n\
         ,,b\n\
         ,,c\n",
    );
    let items = doc.get("Items").unwrap().as_sequence().unwrap();
    assert_eq!(items.len(), 1);
    let tags = items[0].get("Tags").unwrap().as_sequence().unwrap();
    assert_eq!(
        tags,
        &[
            Value::String("a".to_string()),
            Value::String("b".to_string()),
            Value::String("c".to_string())
        ]
    );
}

#[test]
fn test_continuation_stops_at_header() {
    let doc = load(
        "Root\n\
         []Items,Name,[]Tags\n\
         ,x,a\n\
         Info,Field\n\
         ,v\n",
    );
    let items = doc.get("Items").unwrap().as_sequence().unwrap();
    assert_eq!(seq_len(&items[0], "Tags"), 1);
    assert_eq!(
        doc.get("Info").unwrap().get("Field"),
        Some(&Value::String("v".to_string()))
    );
}

#[test]
fn test_nested_array_columns_share_elements() {
    let doc = load(
        "Root\n\
         []Requests,URL,Req.[]Headers.Name,Req.[]Headers.Value\n\
         ,http://x,Accept,text/plain\n\
         ,,Agent,gridoc\n",
    );
    let requests = doc.get("Requests").unwrap().as_sequence().unwrap();
    assert_eq!(requests.len(), 1);
    let headers = requests[0]
        .get("Req")
        .unwrap()
        .get("Headers")
        .unwrap()
        .as_sequence()
        .unwrap();
    assert_eq!(headers.len(), 2);
    assert_eq!(
        headers[0].get("Name"),
        Some(&Value::String("Accept".to_string()))
    );
    assert_eq!(
        headers[1].get("Value"),
        Some(&Value::String("gridoc".to_string()))
    );
}

#[test]
fn test_accumulation_across_repeated_header_blocks() {
    let doc = load(
        "Root\n\
         Setup,Db.[]Tables.Name\n\
         ,users\n\
         Setup,Db.[]Tables.Name\n\
         ,accounts\n",
    );
    let tables = doc
        .get("Setup")
        .unwrap()
        .get("Db")
        .unwrap()
        .get("Tables")
        .unwrap()
        .as_sequence()
        .unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(
        tables[0].get("Name"),
        Some(&Value::String("users".to_string()))
    );
    assert_eq!(
        tables[1].get("Name"),
        Some(&Value::String("accounts".to_string()))
    );
}

#[test]
fn test_accumulation_merges_singleton_fields() {
    let doc = load(
        "Root\n\
         Config,A\n\
         ,1\n\
         Config,B\n\
         ,2\n",
    );
    let config = doc.get("Config").unwrap();
    assert_eq!(config.get("A"), Some(&Value::Int(1)));
    assert_eq!(config.get("B"), Some(&Value::Int(2)));
}

#[test]
fn test_array_padding_uses_empty_mappings() {
    let doc = load(
        "Root\n\
         Info,Grid.[]Rows.2\n\
         ,x\n",
    );
    let rows = doc
        .get("Info")
        .unwrap()
        .get("Grid")
        .unwrap()
        .get("Rows")
        .unwrap()
        .as_sequence()
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], Value::Mapping(Default::default()));
    assert_eq!(rows[1], Value::Mapping(Default::default()));
    assert_eq!(rows[2], Value::String("x".to_string()));
}

#[test]
fn test_iterator_replays_block() {
    let doc = load(
        "Root\n\
         []Item{1..3},Id,Name\n\
         ,$index,name $index\n",
    );
    let items = doc.get("Item").unwrap().as_sequence().unwrap();
    assert_eq!(items.len(), 3);
    for (position, item) in items.iter().enumerate() {
        assert_eq!(item.get("Id"), Some(&Value::Int(position as i64 + 1)));
        assert_eq!(
            item.get("Name"),
            Some(&Value::String(format!("name {}", position + 1)))
        );
    }
}

#[test]
fn test_iterator_zero_padding() {
    let doc = load(
        "Root\n\
         []Item{01..03},Name\n\
         ,v${index}\n",
    );
    let items = doc.get("Item").unwrap().as_sequence().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].get("Name"), Some(&Value::String("v01".to_string())));
    assert_eq!(items[2].get("Name"), Some(&Value::String("v03".to_string())));
}

#[test]
fn test_iterator_block_followed_by_header() {
    let doc = load(
        "Root\n\
         []Item{1..2},Name\n\
         ,n$index\n\
         Info,Field\n\
         ,v\n",
    );
    assert_eq!(seq_len(&doc, "Item"), 2);
    assert_eq!(
        doc.get("Info").unwrap().get("Field"),
        Some(&Value::String("v".to_string()))
    );
}

#[test]
fn test_forward_reference_resolves_later_tag() {
    let doc = load(
        "Root\n\
         Setup,Payload\n\
         ,%Customers\n\
         []Customers,Name\n\
         ,Smith\n\
         ,Kowalczyk\n",
    );
    // The reference receives the customers collection, including rows
    // appended after the reference resolved.
    let payload = doc
        .get("Setup")
        .unwrap()
        .get("Payload")
        .unwrap()
        .as_sequence()
        .unwrap();
    assert_eq!(payload.len(), 2);
    assert_eq!(
        payload[0].get("Name"),
        Some(&Value::String("Smith".to_string()))
    );
}

#[test]
fn test_unresolved_reference_fails_listing_names() {
    let err = try_load(
        "Root\n\
         Setup,Payload,Other\n\
         ,%Ghost,%Casper\n",
    )
    .unwrap_err();
    assert_eq!(err.kind, GridocErrorKind::Reference);
    assert!(err.message.contains("Ghost"));
    assert!(err.message.contains("Casper"));
}

#[test]
fn test_percent_escape() {
    let doc = load(
        "Root\n\
         Info,Text\n\
         ,%%literal\n",
    );
    assert_eq!(
        doc.get("Info").unwrap().get("Text"),
        Some(&Value::String("%literal".to_string()))
    );
}

#[test]
fn test_hash_escape() {
    let doc = load(
        "Root\n\
         Info,Text\n\
         ,##text\n",
    );
    assert_eq!(
        doc.get("Info").unwrap().get("Text"),
        Some(&Value::String("#text".to_string()))
    );
}

#[test]
fn test_inline_json_embedding() {
    let doc = load(
        "Root\n\
         Info,Payload,Tags\n\
         ,\"{\"\"a\"\": 1}\",\"[1, 2]\"\n",
    );
    let info = doc.get("Info").unwrap();
    assert_eq!(info.get("Payload").unwrap().get("a"), Some(&Value::Int(1)));
    assert_eq!(
        info.get("Tags").unwrap().as_sequence().unwrap(),
        &[Value::Int(1), Value::Int(2)]
    );
}

#[test]
fn test_malformed_json_fails() {
    let err = try_load(
        "Root\n\
         Info,Payload\n\
         ,{broken\n",
    )
    .unwrap_err();
    assert_eq!(err.kind, GridocErrorKind::Decode);
}

#[test]
fn test_virtual_cells_stage_values_for_the_row() {
    let doc = load(
        "Root\n\
         Info,:payload,Name\n\
         ,\"{\"\"k\"\": 1}\",$payload\n",
    );
    let info = doc.get("Info").unwrap();
    // The virtual cell itself is not persisted.
    assert!(info.get("payload").is_none());
    assert_eq!(info.get("Name").unwrap().get("k"), Some(&Value::Int(1)));
}

#[test]
fn test_virtual_objects_reset_per_row() {
    let err = try_load(
        "Root\n\
         []Items,:payload,Name\n\
         ,\"{\"\"k\"\": 1}\",$payload\n\
         Info,Name\n\
         ,$payload\n",
    )
    .unwrap_err();
    assert_eq!(err.kind, GridocErrorKind::Substitution);
}

#[test]
fn test_lowercase_column_is_implicitly_virtual() {
    let doc = load(
        "Root\n\
         Info,alias,Name\n\
         ,staged,$alias\n",
    );
    let info = doc.get("Info").unwrap();
    assert!(info.get("alias").is_none());
    assert_eq!(info.get("Name"), Some(&Value::String("staged".to_string())));
}

#[test]
fn test_unresolved_virtual_reference_fails() {
    let err = try_load(
        "Root\n\
         Info,Name\n\
         ,$missing\n",
    )
    .unwrap_err();
    assert_eq!(err.kind, GridocErrorKind::Substitution);
}

#[test]
fn test_empty_rows_are_skipped() {
    let doc = load(
        "Root\n\
         []Items,Name\n\
         ,,\n\
         ,x\n",
    );
    assert_eq!(seq_len(&doc, "Items"), 1);
}

#[test]
fn test_scalar_inference() {
    let doc = load(
        "Root\n\
         Info,Count,Rate,Flag,Label,Padded\n\
         ,3,2.5,true,Acme,007\n",
    );
    let info = doc.get("Info").unwrap();
    assert_eq!(info.get("Count"), Some(&Value::Int(3)));
    assert_eq!(info.get("Rate"), Some(&Value::Float(2.5)));
    assert_eq!(info.get("Flag"), Some(&Value::Bool(true)));
    assert_eq!(info.get("Label"), Some(&Value::String("Acme".to_string())));
    assert_eq!(info.get("Padded"), Some(&Value::String("007".to_string())));
}

#[test]
fn test_root_array_field_appends_across_rows() {
    let doc = load(
        "Root\n\
         []Items,Name,/[]Names\n\
         ,a,first\n\
         ,b,second\n",
    );
    let names = doc.get("Names").unwrap().as_sequence().unwrap();
    assert_eq!(
        names,
        &[
            Value::String("first".to_string()),
            Value::String("second".to_string())
        ]
    );
}

#[test]
fn test_ambient_scope_entries_expand() {
    let loader = Loader::default();
    let mut scope = Scope::new();
    scope.put("env", Node::String("prod".to_string()));
    let doc = loader
        .load_str(
            &mut scope,
            "Root\n\
             Info,Name\n\
             ,${env}-db\n",
            &Locator::new("/mem/test.csv"),
        )
        .unwrap();
    assert_eq!(
        doc.get("Info").unwrap().get("Name"),
        Some(&Value::String("prod-db".to_string()))
    );
}

#[test]
fn test_scope_udf_invocation() {
    let loader = Loader::default();
    let mut scope = Scope::new();
    scope.register_udf(
        "Double",
        Rc::new(|value: &Node, _: &Scope| {
            let n = value.as_text().parse::<i64>().map_err(|e| {
                gridoc_core::GridocError::substitution(format!("not an int: {}", e))
            })?;
            Ok(Node::Int(n * 2))
        }),
    );
    let doc = loader
        .load_str(
            &mut scope,
            "Root\n\
             Info,Count\n\
             ,$Double(21)\n",
            &Locator::new("/mem/test.csv"),
        )
        .unwrap();
    assert_eq!(doc.get("Info").unwrap().get("Count"), Some(&Value::Int(42)));
}

#[test]
fn test_external_asset_inclusion() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("payload.json"), "{\"a\": 1}").unwrap();
    fs::write(dir.path().join("doc.csv"), "Root\nInfo,Payload\n,#payload.json\n").unwrap();

    let loader = Loader::default();
    let mut scope = Scope::new();
    let doc = loader
        .load(
            &mut scope,
            &Locator::new(format!("{}/doc.csv", dir.path().display())),
        )
        .unwrap();
    assert_eq!(
        doc.get("Info").unwrap().get("Payload").unwrap().get("a"),
        Some(&Value::Int(1))
    );
}

#[test]
fn test_missing_external_asset_fails() {
    let err = try_load(
        "Root\n\
         Info,Payload\n\
         ,#missing.json\n",
    )
    .unwrap_err();
    assert_eq!(err.kind, GridocErrorKind::Resource);
    assert!(err.context.is_some());
}

#[test]
fn test_wildcard_subpath_resolution() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("use_case_alpha")).unwrap();
    fs::write(dir.path().join("use_case_alpha/asset.txt"), "resolved").unwrap();
    fs::write(
        dir.path().join("doc.csv"),
        "Root\nInfo,Subpath,Payload\n,use_case*,#asset.txt\n",
    )
    .unwrap();

    let loader = Loader::default();
    let mut scope = Scope::new();
    let doc = loader
        .load(
            &mut scope,
            &Locator::new(format!("{}/doc.csv", dir.path().display())),
        )
        .unwrap();
    assert_eq!(
        doc.get("Info").unwrap().get("Payload"),
        Some(&Value::String("resolved".to_string()))
    );
}

#[test]
fn test_tag_meta_keys() {
    let loader = Loader::new(LoadOptions::builder().include_tag_meta(true).build());
    let mut scope = Scope::new();
    let doc = loader
        .load_str(
            &mut scope,
            "Root\n\
             []Item{1..2},Name\n\
             ,n$index\n",
            &Locator::new("/mem/test.csv"),
        )
        .unwrap();
    let items = doc.get("Item").unwrap().as_sequence().unwrap();
    assert_eq!(items[0].get("Tag"), Some(&Value::String("Item".to_string())));
    assert_eq!(
        items[0].get("TagIndex"),
        Some(&Value::String("1".to_string()))
    );
    assert_eq!(
        items[1].get("TagIndex"),
        Some(&Value::String("2".to_string()))
    );
    assert!(items[0].get("TagID").is_some());
}

#[test]
fn test_source_meta_key() {
    let loader = Loader::new(LoadOptions::builder().include_source_meta(true).build());
    let mut scope = Scope::new();
    let doc = loader
        .load_str(
            &mut scope,
            "Root\nInfo,Name\n,Acme\n",
            &Locator::new("/data/docs/test.csv"),
        )
        .unwrap();
    let source = doc.get("Source").unwrap();
    assert_eq!(
        source.get("URL"),
        Some(&Value::String("/data/docs/test.csv".to_string()))
    );
    assert_eq!(
        source.get("Name"),
        Some(&Value::String("test.csv".to_string()))
    );
}

#[test]
fn test_custom_delimiter() {
    let loader = Loader::new(LoadOptions::builder().delimiter(b';').build());
    let mut scope = Scope::new();
    let doc = loader
        .load_str(
            &mut scope,
            "Root\nInfo;Name\n;Acme\n",
            &Locator::new("/mem/test.csv"),
        )
        .unwrap();
    assert_eq!(
        doc.get("Info").unwrap().get("Name"),
        Some(&Value::String("Acme".to_string()))
    );
}

#[test]
fn test_replay_marker_stripped() {
    let doc = load(
        "Root\n\
         []Items,Name\n\
         -,x\n",
    );
    let items = doc.get("Items").unwrap().as_sequence().unwrap();
    assert_eq!(items[0].get("Name"), Some(&Value::String("x".to_string())));
}

#[test]
fn test_reparse_is_idempotent() {
    let text = "Root\n\
                []Orders,Id,[]Tags\n\
                ,1,a\n\
                ,,b\n\
                Info,Name,/Count\n\
                ,Acme,3\n";
    assert_eq!(load(text), load(text));
}

#[test]
fn test_owner_url_entry_is_seeded() {
    let loader = Loader::default();
    let mut scope = Scope::new();
    loader
        .load_str(
            &mut scope,
            "Root\nInfo,Name\n,Acme\n",
            &Locator::new("/data/doc.csv"),
        )
        .unwrap();
    assert_eq!(scope.get_text("ownerURL"), "/data/doc.csv");
}
