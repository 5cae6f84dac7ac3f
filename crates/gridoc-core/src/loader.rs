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

//! The document builder: the line-scanning driver that assembles a
//! document from header and data lines.
//!
//! Line 0 is always the root header; the root tag's mapping is the
//! returned document and subsequent tags are placed inside it. Data rows
//! decode against the most recent header's column expressions. A tag with
//! an iterator replays its whole row block once per index value, driven by
//! an explicit block cursor rather than a mutated scan index.

use crate::error::{excerpt, GridocError, GridocResult};
use crate::field::Field;
use crate::limits::Limits;
use crate::node::{
    get_path, new_map, new_seq, prune_trailing_vacant, set_path, Node, NodeMap,
};
use crate::normalize::{expand_iterator_markers, normalize_value, NormalizeContext};
use crate::record::{Decoder, Record};
use crate::reference::ReferenceLedger;
use crate::scope::Scope;
use crate::source::{FileStorage, Locator, Storage};
use crate::tag::Tag;
use crate::value::Value;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Options for a [`Loader`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Column delimiter.
    pub delimiter: u8,
    /// Write `Tag`/`TagIndex`/`Subpath`/`TagID` keys into each tag object.
    pub include_tag_meta: bool,
    /// Merge owning-resource attributes under a reserved `Source` key.
    pub include_source_meta: bool,
    /// Resource repository pattern (`{}` replaced by the asset reference)
    /// consulted when an asset is not found next to the document.
    pub resource_repository: Option<String>,
    /// Resource limits.
    pub limits: Limits,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            include_tag_meta: false,
            include_source_meta: false,
            resource_repository: None,
            limits: Limits::default(),
        }
    }
}

impl LoadOptions {
    /// Create a new builder for LoadOptions.
    pub fn builder() -> LoadOptionsBuilder {
        LoadOptionsBuilder::new()
    }
}

/// Builder for ergonomic construction of [`LoadOptions`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptionsBuilder {
    options: LoadOptions,
}

impl LoadOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.options.delimiter = delimiter;
        self
    }

    pub fn include_tag_meta(mut self, include: bool) -> Self {
        self.options.include_tag_meta = include;
        self
    }

    pub fn include_source_meta(mut self, include: bool) -> Self {
        self.options.include_source_meta = include;
        self
    }

    pub fn resource_repository(mut self, pattern: impl Into<String>) -> Self {
        self.options.resource_repository = Some(pattern.into());
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.options.limits = limits;
        self
    }

    pub fn build(self) -> LoadOptions {
        self.options
    }
}

/// Loads Gridoc documents through a storage backend.
pub struct Loader {
    storage: Box<dyn Storage>,
    options: LoadOptions,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

/// The scan position over the filtered line list. Replay re-enters a tag's
/// block by rewinding to the line after the block's header.
#[derive(Debug)]
struct BlockCursor {
    pos: usize,
    len: usize,
}

impl BlockCursor {
    fn new(len: usize) -> Self {
        Self { pos: 1, len }
    }

    fn has_next(&self) -> bool {
        self.pos < self.len
    }

    fn current(&self) -> usize {
        self.pos
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip(&mut self, lines: usize) {
        self.pos += lines;
    }

    fn rewind_to_block(&mut self, header_line: usize) {
        self.pos = header_line + 1;
    }
}

/// The tag block currently being scanned.
struct ActiveTag {
    tag: Tag,
    columns: Vec<String>,
    parent: NodeMap,
}

impl Loader {
    /// Create a loader over filesystem storage.
    pub fn new(options: LoadOptions) -> Self {
        Self {
            storage: Box::new(FileStorage),
            options,
        }
    }

    /// Create a loader over a custom storage backend.
    pub fn with_storage(storage: Box<dyn Storage>, options: LoadOptions) -> Self {
        Self { storage, options }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Load the document behind `source` into a generic value.
    pub fn load(&self, scope: &mut Scope, source: &Locator) -> GridocResult<Value> {
        let text = self.storage.download_text(source)?;
        self.load_str(scope, &text, source)
    }

    /// Load in-memory document text owned by `owner` (used to resolve
    /// relative asset references).
    pub fn load_str(&self, scope: &mut Scope, text: &str, owner: &Locator) -> GridocResult<Value> {
        let lines = self.read_lines(text)?;
        if lines.is_empty() {
            return Err(GridocError::decode("document has no content lines", 0));
        }
        scope.put("ownerURL", Node::String(owner.as_str().to_string()));

        let decoder = Decoder::new(self.options.delimiter);
        let owner_name = document_name(owner);
        let mut ledger = ReferenceLedger::new();

        let container = new_map();
        let root_columns = decoder.decode_header(&lines[0])?;
        let root_tag = Tag::parse(&root_columns[0], 0, &owner_name, &self.options.limits)?;
        let root_object = new_map();
        container
            .borrow_mut()
            .insert(root_tag.name.clone(), Node::Map(Rc::clone(&root_object)));
        let mut active = ActiveTag {
            tag: root_tag,
            columns: root_columns,
            parent: Rc::clone(&container),
        };

        let mut cursor = BlockCursor::new(lines.len());
        while cursor.has_next() {
            let position = cursor.current();
            let mut line = lines[position].clone();

            let has_active_iterator = active.tag.has_active_iterator();
            if has_active_iterator {
                let index = active.tag.iterator.as_ref().map(|i| i.index()).unwrap_or_default();
                scope.put("index", Node::String(index));
                line = expand_iterator_markers(&active.tag, &line);
            }
            let line = strip_replay_marker(&line, decoder.delimiter_char());

            if !line.starts_with(decoder.delimiter_char()) {
                // Header boundary. An active iterator re-enters its block
                // instead of opening a new one.
                if has_active_iterator
                    && active.tag.iterator.as_mut().map(|i| i.next()).unwrap_or(false)
                {
                    cursor.rewind_to_block(active.tag.line_number);
                    continue;
                }
                let columns = decoder
                    .decode_header(line)
                    .map_err(|e| e.with_line(position))?;
                let tag =
                    Tag::parse(&columns[0], position, &owner_name, &self.options.limits)?;
                place_tag(&tag, &root_object, &mut ledger);
                active = ActiveTag {
                    tag,
                    columns,
                    parent: Rc::clone(&root_object),
                };
                cursor.advance();
                continue;
            }

            let mut record = decoder
                .decode_row(&active.columns, line)
                .map_err(|e| e.with_line(position))?;
            let mut record_height = 0;
            if !record.is_empty() {
                record_height = self.process_row(
                    scope,
                    owner,
                    &lines,
                    &decoder,
                    &mut active,
                    &mut record,
                    position,
                    line.contains('$'),
                    &root_object,
                    &mut ledger,
                )?;
            }
            cursor.skip(record_height);

            let is_last = cursor.current() + 1 == lines.len();
            if is_last
                && active.tag.has_active_iterator()
                && active.tag.iterator.as_mut().map(|i| i.next()).unwrap_or(false)
            {
                cursor.rewind_to_block(active.tag.line_number);
                continue;
            }
            cursor.advance();
        }

        ledger.check_all_used()?;

        if self.options.include_source_meta {
            let source = new_map();
            source
                .borrow_mut()
                .insert("URL".to_string(), Node::String(owner.as_str().to_string()));
            source
                .borrow_mut()
                .insert("Name".to_string(), Node::String(owner.name()));
            source.borrow_mut().insert(
                "Parent".to_string(),
                Node::String(owner.parent().as_str().to_string()),
            );
            root_object
                .borrow_mut()
                .insert("Source".to_string(), Node::Map(source));
        }

        Ok(Node::Map(root_object).to_value())
    }

    /// Process one non-empty data row: select the tag object, stage the
    /// virtual scratch mapping, run the virtual pass then the real pass
    /// over the columns, and prune padding. Returns the number of
    /// continuation lines consumed.
    #[allow(clippy::too_many_arguments)]
    fn process_row(
        &self,
        scope: &mut Scope,
        owner: &Locator,
        lines: &[String],
        decoder: &Decoder,
        active: &mut ActiveTag,
        record: &mut Record,
        position: usize,
        line_has_markers: bool,
        root_object: &NodeMap,
        ledger: &mut ReferenceLedger,
    ) -> GridocResult<usize> {
        if let Some(subpath) = record.get("Subpath") {
            active.tag.subpath =
                active
                    .tag
                    .expand_subpath(self.storage.as_ref(), owner, subpath);
        }
        if let Some(group) = record.get("Group") {
            active.tag.group = group.to_string();
        }
        let tag_object = select_tag_object(active)
            .ok_or_else(|| GridocError::decode("tag container vanished", position))?;
        if self.options.include_tag_meta {
            write_tag_meta(&active.tag, &tag_object);
        }

        if line_has_markers {
            let cells: Vec<(String, String)> = record
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (column, text) in cells {
                if text.contains('$') {
                    let expanded = scope.expand_entries_text(&text)?;
                    record.put(&column, expanded.as_text());
                }
            }
        }

        let virtuals = new_map();
        let mut array_cursor: BTreeMap<String, usize> = BTreeMap::new();
        let mut record_height = 0;

        // Virtual cells run first: they populate the scratch mapping that
        // `$name` substitutions in the same row consume.
        for virtual_pass in [true, false] {
            for column_index in 1..active.columns.len() {
                let column = active.columns[column_index].clone();
                record_height = self.process_cell(
                    scope,
                    owner,
                    lines,
                    decoder,
                    active,
                    record,
                    position,
                    &column,
                    virtual_pass,
                    &tag_object,
                    root_object,
                    &virtuals,
                    &mut array_cursor,
                    ledger,
                    record_height,
                )?;
            }
        }

        prune_trailing_vacant(&tag_object);
        Ok(record_height)
    }

    #[allow(clippy::too_many_arguments)]
    fn process_cell(
        &self,
        scope: &Scope,
        owner: &Locator,
        lines: &[String],
        decoder: &Decoder,
        active: &ActiveTag,
        record: &Record,
        position: usize,
        column: &str,
        virtual_pass: bool,
        tag_object: &NodeMap,
        root_object: &NodeMap,
        virtuals: &NodeMap,
        array_cursor: &mut BTreeMap<String, usize>,
        ledger: &mut ReferenceLedger,
        record_height: usize,
    ) -> GridocResult<usize> {
        if column.is_empty() {
            return Ok(record_height);
        }
        let field = Field::parse(column).map_err(|e| e.with_line(position))?;
        let Some(text) = record.get(column) else {
            return Ok(record_height);
        };
        if virtual_pass != field.is_virtual {
            return Ok(record_height);
        }

        let mut text = text.to_string();
        if text.starts_with("%%") {
            // Escape for a literal leading percent.
            text.remove(0);
        } else if text.starts_with('%') {
            ledger.declare(&text[1..], field, tag_object);
            return Ok(record_height);
        }

        let context = NormalizeContext {
            scope,
            storage: self.storage.as_ref(),
            owner,
            tag: &active.tag,
            virtuals: Some(virtuals),
            repository: self.options.resource_repository.as_deref(),
        };
        let value = normalize_value(&context, &text).map_err(|e| {
            e.with_line(position)
                .with_context(format!("tag {}, cell {:?}", active.tag.tag_id(), excerpt(&text)))
        })?;

        if field.is_root {
            set_root_field(&field, root_object, value);
            return Ok(record_height);
        }
        let target = if field.is_virtual { virtuals } else { tag_object };

        if !field.has_array_component {
            field.set(value, target, &[]);
            return Ok(record_height);
        }

        // Array-component fields keep a per-row write cursor per array path
        // so cells sharing the array land in the same element, while later
        // rows extend it.
        let path = field.array_path().unwrap_or_default();
        let base = *array_cursor
            .entry(path)
            .or_insert_with(|| field.array_size(target));
        field.set(value, target, &[base]);

        let mut items = 0;
        for continuation in &lines[position + 1..] {
            let continuation = strip_replay_marker(continuation, decoder.delimiter_char());
            if !continuation.starts_with(decoder.delimiter_char()) {
                break;
            }
            let continuation_record = decoder
                .decode_row(&active.columns, continuation)
                .map_err(|e| e.with_line(position + items + 1))?;
            let Some(item_text) = continuation_record.get(column) else {
                break;
            };
            items += 1;
            let continuation_context = NormalizeContext {
                virtuals: None,
                ..context
            };
            let item = normalize_value(&continuation_context, item_text).map_err(|e| {
                e.with_line(position + items).with_context(format!(
                    "tag {}, cell {:?}",
                    active.tag.tag_id(),
                    excerpt(item_text)
                ))
            })?;
            field.set(item, target, &[base + items]);
        }
        Ok(record_height.max(items))
    }

    fn read_lines(&self, text: &str) -> GridocResult<Vec<String>> {
        let limits = &self.options.limits;
        if text.len() > limits.max_document_size {
            return Err(GridocError::security(
                format!(
                    "document too large: exceeds limit of {} bytes",
                    limits.max_document_size
                ),
                0,
            ));
        }
        let mut lines = Vec::new();
        for line in text.lines() {
            if lines.is_empty() && line.trim().is_empty() {
                continue;
            }
            if line.starts_with("//") {
                continue;
            }
            if line.len() > limits.max_line_length {
                return Err(GridocError::security(
                    format!(
                        "line too long: exceeds limit of {} bytes",
                        limits.max_line_length
                    ),
                    lines.len(),
                ));
            }
            lines.push(line.to_string());
        }
        Ok(lines)
    }
}

/// Place a tag's container on first encounter and feed it to any forward
/// reference declared under the tag's name. Singleton tags reuse their
/// mapping; array tags reuse their sequence.
fn place_tag(tag: &Tag, parent: &NodeMap, ledger: &mut ReferenceLedger) {
    if parent.borrow().contains_key(&tag.name) {
        return;
    }
    let container = if tag.is_array {
        Node::Seq(new_seq())
    } else {
        Node::Map(new_map())
    };
    parent
        .borrow_mut()
        .insert(tag.name.clone(), container.clone());
    ledger.resolve(&tag.name, &container);
}

/// The object a data row writes into: array tags push a fresh element,
/// singleton tags reuse their mapping.
fn select_tag_object(active: &ActiveTag) -> Option<NodeMap> {
    let holder = active.parent.borrow().get(&active.tag.name).cloned()?;
    if active.tag.is_array {
        let seq = holder.as_seq()?;
        let element = new_map();
        seq.borrow_mut().push(Node::Map(Rc::clone(&element)));
        Some(element)
    } else {
        holder.as_map()
    }
}

fn write_tag_meta(tag: &Tag, object: &NodeMap) {
    let mut borrow = object.borrow_mut();
    borrow.insert("Tag".to_string(), Node::String(tag.name.clone()));
    if tag.has_active_iterator() {
        let index = tag.iterator.as_ref().map(|i| i.index()).unwrap_or_default();
        borrow.insert("TagIndex".to_string(), Node::String(index));
    }
    if !tag.subpath.is_empty() {
        borrow.insert("Subpath".to_string(), Node::String(tag.subpath.clone()));
    }
    borrow.insert("TagID".to_string(), Node::String(tag.tag_id()));
}

/// Root-addressed writes: array-component fields append into the root
/// mapping at the dotted path (flattening sequence values), everything
/// else assigns through the field.
fn set_root_field(field: &Field, root_object: &NodeMap, value: Node) {
    if field.has_array_component {
        let expression = field
            .expression
            .replacen("[]", "", 1)
            .replacen('/', "", 1);
        let bucket = match get_path(root_object, &expression) {
            Some(Node::Seq(existing)) => existing,
            Some(other) => {
                let seq = new_seq();
                seq.borrow_mut().push(other);
                seq
            }
            None => new_seq(),
        };
        match value {
            Node::Seq(items) => {
                let items: Vec<Node> = items.borrow().iter().cloned().collect();
                bucket.borrow_mut().extend(items);
            }
            other => bucket.borrow_mut().push(other),
        }
        set_path(root_object, &expression, Node::Seq(bucket));
    } else {
        field.set(value, root_object, &[]);
    }
}

/// Strip the optional replay marker (`-` immediately before the first
/// delimiter) from a data/continuation line.
fn strip_replay_marker<'a>(line: &'a str, delimiter: char) -> &'a str {
    match line.strip_prefix('-') {
        Some(rest) if rest.starts_with(delimiter) => rest,
        _ => line,
    }
}

fn document_name(owner: &Locator) -> String {
    let name = owner.name();
    match name.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => name,
    }
}
