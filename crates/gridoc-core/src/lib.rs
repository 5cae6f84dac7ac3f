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

//! Core loader and data model for the Gridoc document format.
//!
//! Gridoc documents are delimiter-separated rows where header lines carry
//! tags marking object/array boundaries and data lines carry cell values
//! addressed by field-path expressions. The loader assembles them into a
//! nested generic [`Value`]: mappings, ordered sequences and scalars.
//!
//! The engine is single-threaded and synchronous: one document is scanned
//! top to bottom by a single block cursor, with rewinds for tag iterators.
//! All per-load state (the ambient [`Scope`], the forward-reference
//! ledger, per-row virtual objects) is owned by the load invocation, so
//! independent loads may run concurrently on separate loaders.

mod embed;
mod error;
mod field;
mod limits;
mod loader;
mod node;
mod normalize;
mod record;
mod reference;
mod scope;
mod source;
mod tag;
mod value;

pub use error::{GridocError, GridocErrorKind, GridocResult};
pub use field::Field;
pub use limits::Limits;
pub use loader::{LoadOptions, LoadOptionsBuilder, Loader};
pub use node::{Node, NodeMap, NodeSeq};
pub use scope::{Scope, Udf};
pub use source::{FileStorage, Locator, Storage};
pub use tag::{Tag, TagIterator};
pub use value::{Mapping, Value};
