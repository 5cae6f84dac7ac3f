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

//! Gridoc - Grid Document Language.
//!
//! A loader for tag-oriented tabular documents: delimiter-separated rows
//! where header tags mark object/array boundaries, loaded into a nested
//! generic [`Value`].
//!
//! # Quick start
//!
//! ```
//! use gridoc::{load_str, Value};
//!
//! let doc = load_str(
//!     "Root\n\
//!      Info,Name,/Count\n\
//!      ,Acme,3\n",
//! )
//! .unwrap();
//! assert_eq!(
//!     doc.get("Info").unwrap().get("Name"),
//!     Some(&Value::String("Acme".to_string()))
//! );
//! assert_eq!(doc.get("Count"), Some(&Value::Int(3)));
//! ```
//!
//! Documents on disk resolve their external assets relative to their own
//! location:
//!
//! ```no_run
//! let doc = gridoc::load_path("testdata/orders.csv").unwrap();
//! ```

pub mod udf;

pub use gridoc_core::{
    FileStorage, Field, GridocError, GridocErrorKind, GridocResult, Limits, LoadOptions,
    LoadOptionsBuilder, Loader, Locator, Mapping, Node, NodeMap, NodeSeq, Scope, Storage, Tag,
    TagIterator, Udf, Value,
};

/// A scope pre-seeded with the standard UDF library.
pub fn standard_scope() -> Scope {
    let mut scope = Scope::new();
    udf::register_standard_udfs(&mut scope);
    scope
}

/// Load a document from a filesystem path with default options and the
/// standard UDFs.
pub fn load_path(path: impl AsRef<str>) -> GridocResult<Value> {
    let loader = Loader::default();
    let mut scope = standard_scope();
    loader.load(&mut scope, &Locator::new(path.as_ref()))
}

/// Load in-memory document text with default options and the standard
/// UDFs. Relative asset references resolve against the current directory.
pub fn load_str(text: &str) -> GridocResult<Value> {
    let loader = Loader::default();
    let mut scope = standard_scope();
    loader.load_str(&mut scope, text, &Locator::new("memory.csv"))
}
