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

//! Error types for Gridoc loading.

use std::fmt;
use thiserror::Error;

/// The kind of error that occurred during a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridocErrorKind {
    /// Malformed delimited line or embedded JSON/YAML fragment.
    Decode,
    /// Forward-reference bookkeeping violation.
    Reference,
    /// External asset unreachable or empty locator.
    Resource,
    /// Virtual `$name` lookup miss or template expansion failure.
    Substitution,
    /// Error converting between document representations.
    Conversion,
    /// I/O error from the storage backend.
    Io,
    /// Resource limit exceeded.
    Security,
}

impl fmt::Display for GridocErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode => write!(f, "DecodeError"),
            Self::Reference => write!(f, "ReferenceError"),
            Self::Resource => write!(f, "ResourceError"),
            Self::Substitution => write!(f, "SubstitutionError"),
            Self::Conversion => write!(f, "ConversionError"),
            Self::Io => write!(f, "IOError"),
            Self::Security => write!(f, "SecurityError"),
        }
    }
}

/// An error that occurred while loading a Gridoc document.
///
/// Carries the source line (0-based position in the filtered line list)
/// where known, and optional context such as the current tag id or an
/// excerpt of the offending cell.
#[derive(Debug, Clone, Error)]
#[error("{kind} at line {line}: {message}")]
pub struct GridocError {
    /// The kind of error.
    pub kind: GridocErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// Line number in the filtered line list (0-based).
    pub line: usize,
    /// Additional context (e.g., tag id, cell excerpt).
    pub context: Option<String>,
}

impl GridocError {
    /// Create a new error.
    pub fn new(kind: GridocErrorKind, message: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
            context: None,
        }
    }

    /// Attach a line number.
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Attach context information.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    // Convenience constructors for each error kind
    pub fn decode(message: impl Into<String>, line: usize) -> Self {
        Self::new(GridocErrorKind::Decode, message, line)
    }

    pub fn reference(message: impl Into<String>, line: usize) -> Self {
        Self::new(GridocErrorKind::Reference, message, line)
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::new(GridocErrorKind::Resource, message, 0)
    }

    pub fn substitution(message: impl Into<String>) -> Self {
        Self::new(GridocErrorKind::Substitution, message, 0)
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::new(GridocErrorKind::Conversion, message, 0)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(GridocErrorKind::Io, message, 0)
    }

    pub fn security(message: impl Into<String>, line: usize) -> Self {
        Self::new(GridocErrorKind::Security, message, line)
    }
}

/// Result type for Gridoc operations.
pub type GridocResult<T> = Result<T, GridocError>;

/// Clamp a text excerpt used in diagnostics to a bounded length.
pub(crate) fn excerpt(text: &str) -> String {
    const MAX: usize = 128;
    if text.len() <= MAX {
        return text.to_string();
    }
    let mut end = MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(format!("{}", GridocErrorKind::Decode), "DecodeError");
        assert_eq!(format!("{}", GridocErrorKind::Reference), "ReferenceError");
        assert_eq!(format!("{}", GridocErrorKind::Resource), "ResourceError");
        assert_eq!(
            format!("{}", GridocErrorKind::Substitution),
            "SubstitutionError"
        );
        assert_eq!(
            format!("{}", GridocErrorKind::Conversion),
            "ConversionError"
        );
        assert_eq!(format!("{}", GridocErrorKind::Io), "IOError");
        assert_eq!(format!("{}", GridocErrorKind::Security), "SecurityError");
    }

    #[test]
    fn test_error_display() {
        let err = GridocError::decode("unexpected cell", 42);
        let msg = format!("{}", err);
        assert!(msg.contains("DecodeError"));
        assert!(msg.contains("line 42"));
        assert!(msg.contains("unexpected cell"));
    }

    #[test]
    fn test_error_builders() {
        let err = GridocError::resource("missing asset")
            .with_line(7)
            .with_context("tag RootInfo");
        assert_eq!(err.kind, GridocErrorKind::Resource);
        assert_eq!(err.line, 7);
        assert_eq!(err.context, Some("tag RootInfo".to_string()));
    }

    #[test]
    fn test_error_is_std_error() {
        fn accepts_error<E: std::error::Error>(_: E) {}
        accepts_error(GridocError::decode("test", 1));
    }

    #[test]
    fn test_excerpt_short_text_unchanged() {
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn test_excerpt_bounded() {
        let long = "x".repeat(1000);
        let cut = excerpt(&long);
        assert!(cut.len() < 140);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_excerpt_respects_char_boundary() {
        let long = "日".repeat(200);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
    }
}
