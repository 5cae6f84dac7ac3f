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

//! Header tags: the named anchors for object/array subtrees.

use crate::error::{GridocError, GridocResult};
use crate::limits::Limits;
use crate::source::{Locator, Storage};

/// A bounded numeric range attached to a tag, driving replay of the tag's
/// row block once per value.
#[derive(Debug, Clone, PartialEq)]
pub struct TagIterator {
    pub min: i64,
    pub max: i64,
    current: i64,
    /// Zero-padding width of the rendered index.
    width: usize,
}

impl TagIterator {
    /// Parse an iterator range such as `1..3` or `001 .. 010`.
    fn parse(range: &str, limits: &Limits) -> GridocResult<Option<TagIterator>> {
        let Some((min_text, max_text)) = range.split_once("..") else {
            return Ok(None);
        };
        let min_text = min_text.trim();
        let max_text = max_text.trim();
        let (Ok(min), Ok(max)) = (min_text.parse::<i64>(), max_text.parse::<i64>()) else {
            return Ok(None);
        };
        if max < min {
            return Err(GridocError::decode(
                format!("iterator range is inverted: {{{}}}", range),
                0,
            ));
        }
        if (max - min) as usize > limits.max_iteration_span {
            return Err(GridocError::security(
                format!(
                    "iterator span {} exceeds limit of {}",
                    max - min,
                    limits.max_iteration_span
                ),
                0,
            ));
        }
        let width = [min_text, max_text]
            .iter()
            .filter(|t| t.len() > 1 && t.starts_with('0'))
            .map(|t| t.len())
            .max()
            .unwrap_or(0);
        Ok(Some(TagIterator {
            min,
            max,
            current: min,
            width,
        }))
    }

    /// Returns true while the iterator still has a value to emit.
    pub fn has(&self) -> bool {
        self.current <= self.max
    }

    /// Advance to the next value; returns false once the range is spent.
    pub fn next(&mut self) -> bool {
        if self.current < self.max {
            self.current += 1;
            true
        } else {
            self.current = self.max + 1;
            false
        }
    }

    /// The current index rendered as (possibly zero-padded) decimal text.
    pub fn index(&self) -> String {
        format!("{:0width$}", self.current, width = self.width)
    }
}

/// A parsed header tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    /// Name of the owning document.
    pub owner_name: String,
    /// Object/array key this tag anchors.
    pub name: String,
    /// Group metadata supplied by a `Group` column.
    pub group: String,
    /// Each appearance creates a new array element.
    pub is_array: bool,
    /// Optional bounded replay range.
    pub iterator: Option<TagIterator>,
    /// Header line position, used as the replay rewind target.
    pub line_number: usize,
    /// Sub-path supplied by a `Subpath` column, possibly wildcard-resolved.
    pub subpath: String,
}

impl Tag {
    /// Parse a header cell into a tag.
    pub fn parse(
        cell: &str,
        line_number: usize,
        owner_name: &str,
        limits: &Limits,
    ) -> GridocResult<Tag> {
        let mut key = cell.trim();
        let mut iterator = None;
        if let Some(open) = key.find('{') {
            if key.ends_with('}') {
                iterator = TagIterator::parse(&key[open + 1..key.len() - 1], limits)
                    .map_err(|e| e.with_line(line_number))?;
                if iterator.is_some() {
                    key = key[..open].trim_end();
                }
            }
        }
        let is_array = key.starts_with("[]") && key.len() > 2;
        let name = if is_array { &key[2..] } else { key };
        if name.is_empty() {
            return Err(GridocError::decode("empty tag name", line_number));
        }
        Ok(Tag {
            owner_name: owner_name.to_string(),
            name: name.to_string(),
            group: String::new(),
            is_array,
            iterator,
            line_number,
            subpath: String::new(),
        })
    }

    /// Returns true if this tag has an iterator with values left.
    pub fn has_active_iterator(&self) -> bool {
        self.iterator.as_ref().map(TagIterator::has).unwrap_or(false)
    }

    /// Deterministic identifier for the current tag instance: owner name,
    /// tag name, group, iteration index and sub-path concatenated, then
    /// reduced to alphanumerics and underscores.
    pub fn tag_id(&self) -> String {
        let index = if self.has_active_iterator() {
            self.iterator.as_ref().unwrap().index()
        } else {
            String::new()
        };
        let raw = format!(
            "{}{}{}{}{}",
            self.owner_name, self.name, self.group, index, self.subpath
        );
        raw.chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect()
    }

    /// Resolve a sub-path value, expanding a trailing `*` wildcard against
    /// the sibling entries of the owning document's location.
    ///
    /// Best effort: when listing fails or no sibling matches, the literal
    /// (unexpanded) sub-path is kept.
    pub fn expand_subpath(
        &self,
        storage: &dyn Storage,
        owner: &Locator,
        subpath: &str,
    ) -> String {
        if !subpath.ends_with('*') {
            return subpath.to_string();
        }
        let mut parent = owner.parent();
        let mut resolved_parent = String::new();
        let mut leaf_prefix = String::new();
        for segment in subpath.split('/') {
            if let Some(prefix) = segment.strip_suffix('*') {
                leaf_prefix = prefix.to_string();
                break;
            }
            parent = parent.join(segment);
            if resolved_parent.is_empty() {
                resolved_parent = segment.to_string();
            } else {
                resolved_parent = format!("{}/{}", resolved_parent, segment);
            }
        }
        if let Ok(candidates) = storage.list(&parent) {
            for candidate in candidates {
                if candidate.as_str() == parent.as_str() {
                    continue;
                }
                let name = candidate.name();
                if name.starts_with(&leaf_prefix) {
                    if resolved_parent.is_empty() {
                        return name;
                    }
                    return format!("{}/{}", resolved_parent, name);
                }
            }
        }
        subpath.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FileStorage;

    #[test]
    fn test_parse_array_tag_with_iterator() {
        let limits = Limits::default();
        let tag = Tag::parse("[]Test{1 .. 003}", 1, "doc", &limits).unwrap();
        assert!(tag.is_array);
        assert_eq!(tag.name, "Test");
        let iterator = tag.iterator.as_ref().unwrap();
        assert_eq!(iterator.min, 1);
        assert_eq!(iterator.max, 3);
        assert_eq!(iterator.index(), "001");
        assert_eq!(tag.line_number, 1);
    }

    #[test]
    fn test_parse_plain_tag() {
        let tag = Tag::parse("Info", 4, "doc", &Limits::default()).unwrap();
        assert!(!tag.is_array);
        assert_eq!(tag.name, "Info");
        assert!(tag.iterator.is_none());
    }

    #[test]
    fn test_iterator_advance_and_exhaust() {
        let tag = Tag::parse("[]Item{1..3}", 0, "doc", &Limits::default()).unwrap();
        let mut iterator = tag.iterator.unwrap();
        assert_eq!(iterator.index(), "1");
        assert!(iterator.has());
        assert!(iterator.next());
        assert_eq!(iterator.index(), "2");
        assert!(iterator.next());
        assert_eq!(iterator.index(), "3");
        assert!(!iterator.next());
        assert!(!iterator.has());
    }

    #[test]
    fn test_iterator_without_padding() {
        let tag = Tag::parse("[]Item{7..10}", 0, "doc", &Limits::default()).unwrap();
        let iterator = tag.iterator.unwrap();
        assert_eq!(iterator.index(), "7");
    }

    #[test]
    fn test_non_numeric_braces_are_not_iterators() {
        let tag = Tag::parse("Weird{a..b}", 0, "doc", &Limits::default()).unwrap();
        assert!(tag.iterator.is_none());
        assert_eq!(tag.name, "Weird{a..b}");
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(Tag::parse("[]Item{5..1}", 0, "doc", &Limits::default()).is_err());
    }

    #[test]
    fn test_iteration_span_limit() {
        let limits = Limits {
            max_iteration_span: 10,
            ..Limits::default()
        };
        assert!(Tag::parse("[]Item{1..100}", 0, "doc", &limits).is_err());
    }

    #[test]
    fn test_tag_id_filters_characters() {
        let mut tag = Tag::parse("[]Use Case", 2, "use_case1", &Limits::default()).unwrap();
        tag.subpath = "sub/dir-1".to_string();
        let id = tag.tag_id();
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        assert!(id.contains("UseCase"));
        assert!(id.contains("subdir1"));
    }

    #[test]
    fn test_expand_subpath_without_wildcard_is_identity() {
        let tag = Tag::parse("Info", 0, "doc", &Limits::default()).unwrap();
        let storage = FileStorage;
        let owner = Locator::new("/nonexistent/doc.csv");
        assert_eq!(tag.expand_subpath(&storage, &owner, "plain/dir"), "plain/dir");
    }

    #[test]
    fn test_expand_subpath_keeps_literal_on_miss() {
        let tag = Tag::parse("Info", 0, "doc", &Limits::default()).unwrap();
        let storage = FileStorage;
        let owner = Locator::new("/nonexistent/doc.csv");
        // Listing fails; the literal wildcard path is preserved.
        assert_eq!(tag.expand_subpath(&storage, &owner, "use_case*"), "use_case*");
    }
}
