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

//! The forward-reference ledger.
//!
//! A cell value starting with a single `%` defers its write: the field and
//! the target mapping are captured, and the value arrives once a tag with
//! the referenced name is first placed in the document. Every declared
//! reference must be resolved by the end of the scan.

use crate::error::{GridocError, GridocResult};
use crate::field::Field;
use crate::node::{Node, NodeMap};
use std::collections::BTreeMap;
use std::rc::Rc;

struct ReferenceEntry {
    field: Field,
    target: NodeMap,
    used: bool,
}

/// Forward references declared so far in the current load.
#[derive(Default)]
pub struct ReferenceLedger {
    entries: BTreeMap<String, ReferenceEntry>,
}

impl ReferenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a forward declaration for `name`, capturing the declaring
    /// field and its target mapping. Nothing is written yet.
    pub fn declare(&mut self, name: &str, field: Field, target: &NodeMap) {
        self.entries.insert(
            name.to_string(),
            ReferenceEntry {
                field,
                target: Rc::clone(target),
                used: false,
            },
        );
    }

    /// Feed a newly placed tag container back into the field that declared
    /// a reference to it. Undeclared names are ignored; the driver calls
    /// this for every first-placed tag name.
    pub fn resolve(&mut self, name: &str, value: &Node) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.field.set(value.clone(), &entry.target, &[]);
            entry.used = true;
        }
    }

    /// Fail if any declared reference was never resolved.
    pub fn check_all_used(&self) -> GridocResult<()> {
        let unused: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.used)
            .map(|(name, _)| name.as_str())
            .collect();
        if unused.is_empty() {
            return Ok(());
        }
        Err(GridocError::reference(
            format!("unresolved references: '{}'", unused.join(",")),
            0,
        ))
    }
}
