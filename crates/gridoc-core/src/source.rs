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

//! Document and asset locations, and the storage seam behind them.
//!
//! The engine never interprets locator syntax beyond the scheme/absolute
//! detection needed to route an asset reference; everything else goes
//! through the [`Storage`] trait.

use crate::error::{GridocError, GridocResult};
use std::fmt;
use std::fs;
use std::path::Path;

/// A document or asset location: a plain path or a `scheme://` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    url: String,
}

impl Locator {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The raw locator text.
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// True for `scheme://` locators.
    pub fn has_scheme(&self) -> bool {
        self.url.contains("://")
    }

    /// The locator as a filesystem path (any `file://` prefix stripped).
    pub fn path(&self) -> &str {
        self.url.strip_prefix("file://").unwrap_or(&self.url)
    }

    /// Last path segment.
    pub fn name(&self) -> String {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("")
            .to_string()
    }

    /// Parent directory locator.
    pub fn parent(&self) -> Locator {
        match self.url.trim_end_matches('/').rfind('/') {
            Some(pos) => Locator::new(&self.url[..pos]),
            None => Locator::new(""),
        }
    }

    /// Append a path segment.
    pub fn join(&self, segment: &str) -> Locator {
        if self.url.is_empty() {
            return Locator::new(segment);
        }
        Locator::new(format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            segment.trim_start_matches('/')
        ))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// The storage backend the engine loads document text and assets through.
pub trait Storage {
    /// Download the full text behind a locator.
    fn download_text(&self, locator: &Locator) -> GridocResult<String>;
    /// List the entries under a directory-like locator.
    fn list(&self, locator: &Locator) -> GridocResult<Vec<Locator>>;
    /// True when the locator points at an existing entry.
    fn exists(&self, locator: &Locator) -> bool;
}

/// Filesystem-backed storage.
#[derive(Debug, Clone, Default)]
pub struct FileStorage;

impl Storage for FileStorage {
    fn download_text(&self, locator: &Locator) -> GridocResult<String> {
        fs::read_to_string(locator.path())
            .map_err(|e| GridocError::io(format!("failed to read {}: {}", locator, e)))
    }

    fn list(&self, locator: &Locator) -> GridocResult<Vec<Locator>> {
        let entries = fs::read_dir(locator.path())
            .map_err(|e| GridocError::io(format!("failed to list {}: {}", locator, e)))?;
        let mut result = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| GridocError::io(format!("failed to list {}: {}", locator, e)))?;
            result.push(locator.join(&entry.file_name().to_string_lossy()));
        }
        result.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(result)
    }

    fn exists(&self, locator: &Locator) -> bool {
        Path::new(locator.path()).exists()
    }
}

/// Resolve an asset reference against the owning document's location.
///
/// Full locators (`scheme://`, absolute path) pass through unchanged. A
/// leading `#` is stripped. Relative references try, in order: owner
/// directory + sub-path, owner directory, the configured resource
/// repository pattern (`{}` replaced by the reference); the first existing
/// candidate wins, falling back to the sub-path candidate.
pub fn resolve_asset(
    storage: &dyn Storage,
    owner: &Locator,
    subpath: &str,
    reference: &str,
    repository: Option<&str>,
) -> GridocResult<Locator> {
    if reference.is_empty() {
        return Err(GridocError::resource("asset reference was empty"));
    }
    if reference.contains("://") || reference.starts_with('/') {
        return Ok(Locator::new(reference));
    }
    let reference = reference.strip_prefix('#').unwrap_or(reference);
    let owner_dir = owner.parent();

    let subpath_candidate = if subpath.is_empty() {
        None
    } else {
        Some(owner_dir.join(subpath).join(reference))
    };
    if let Some(candidate) = &subpath_candidate {
        if storage.exists(candidate) {
            return Ok(candidate.clone());
        }
    }
    let plain_candidate = owner_dir.join(reference);
    if storage.exists(&plain_candidate) {
        return Ok(plain_candidate);
    }
    if let Some(pattern) = repository {
        let candidate = Locator::new(pattern.replace("{}", reference));
        if storage.exists(&candidate) {
            return Ok(candidate);
        }
    }
    Ok(subpath_candidate.unwrap_or(plain_candidate))
}
