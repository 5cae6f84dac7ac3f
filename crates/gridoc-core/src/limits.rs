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

//! Resource limits enforced while loading documents.

/// Limits applied to a single load.
///
/// Iterator replay makes document size a multiplier on work performed, so
/// both the input size and the iteration span are bounded.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum document text size in bytes.
    pub max_document_size: usize,
    /// Maximum length of a single line in bytes.
    pub max_line_length: usize,
    /// Maximum `max - min` span of a tag iterator.
    pub max_iteration_span: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_document_size: 64 * 1024 * 1024,
            max_line_length: 1024 * 1024,
            max_iteration_span: 100_000,
        }
    }
}
