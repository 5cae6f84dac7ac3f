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

//! Delimited line decoding.

use crate::error::{excerpt, GridocError, GridocResult};
use std::collections::BTreeMap;

/// Per-line delimited decoder honoring quoting and a configurable
/// delimiter.
#[derive(Debug, Clone)]
pub struct Decoder {
    delimiter: u8,
}

/// A decoded data line: column expression to cell text.
#[derive(Debug, Clone, Default)]
pub struct Record {
    values: BTreeMap<String, String>,
}

impl Record {
    /// Cell text for a column expression, if present and non-empty.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Replace a cell's text.
    pub fn put(&mut self, column: &str, value: String) {
        self.values.insert(column.to_string(), value);
    }

    /// Iterate over (column, text) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    /// True when every decoded cell is blank.
    pub fn is_empty(&self) -> bool {
        self.values.values().all(|v| v.trim().is_empty())
    }
}

impl Decoder {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// The delimiter as a char, used for line classification.
    pub fn delimiter_char(&self) -> char {
        self.delimiter as char
    }

    fn cells(&self, line: &str) -> GridocResult<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(line.as_bytes());
        match reader.records().next() {
            Some(Ok(record)) => Ok(record.iter().map(str::to_string).collect()),
            Some(Err(e)) => Err(GridocError::decode(
                format!("malformed line {:?}: {}", excerpt(line), e),
                0,
            )),
            None => Ok(Vec::new()),
        }
    }

    /// Decode a header line into its ordered column expressions.
    pub fn decode_header(&self, line: &str) -> GridocResult<Vec<String>> {
        let columns = self.cells(line)?;
        if columns.is_empty() || columns[0].is_empty() {
            return Err(GridocError::decode(
                format!("header line has no tag cell: {:?}", excerpt(line)),
                0,
            ));
        }
        Ok(columns)
    }

    /// Decode a data line against a header's column expressions.
    pub fn decode_row(&self, columns: &[String], line: &str) -> GridocResult<Record> {
        let cells = self.cells(line)?;
        let mut record = Record::default();
        for (column, cell) in columns.iter().zip(cells.into_iter()) {
            if !column.is_empty() {
                record.values.insert(column.clone(), cell);
            }
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_header() {
        let decoder = Decoder::new(b',');
        let columns = decoder.decode_header("[]Requests,URL,Method").unwrap();
        assert_eq!(columns, vec!["[]Requests", "URL", "Method"]);
    }

    #[test]
    fn test_decode_header_trims_cells() {
        let decoder = Decoder::new(b',');
        let columns = decoder.decode_header("Root, Name, []Tags").unwrap();
        assert_eq!(columns, vec!["Root", "Name", "[]Tags"]);
    }

    #[test]
    fn test_decode_row() {
        let decoder = Decoder::new(b',');
        let columns = decoder.decode_header("Tag,Name,Count").unwrap();
        let record = decoder.decode_row(&columns, ",Acme,3").unwrap();
        assert_eq!(record.get("Name"), Some("Acme"));
        assert_eq!(record.get("Count"), Some("3"));
        assert_eq!(record.get("Tag"), None);
        assert!(!record.is_empty());
    }

    #[test]
    fn test_decode_row_quoting() {
        let decoder = Decoder::new(b',');
        let columns = decoder.decode_header("Tag,Text").unwrap();
        let record = decoder
            .decode_row(&columns, ",\"a, quoted, value\"")
            .unwrap();
        assert_eq!(record.get("Text"), Some("a, quoted, value"));
    }

    #[test]
    fn test_decode_row_short_line() {
        let decoder = Decoder::new(b',');
        let columns = decoder.decode_header("Tag,A,B,C").unwrap();
        let record = decoder.decode_row(&columns, ",x").unwrap();
        assert_eq!(record.get("A"), Some("x"));
        assert_eq!(record.get("B"), None);
    }

    #[test]
    fn test_empty_record() {
        let decoder = Decoder::new(b',');
        let columns = decoder.decode_header("Tag,A,B").unwrap();
        let record = decoder.decode_row(&columns, ",,").unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_custom_delimiter() {
        let decoder = Decoder::new(b';');
        let columns = decoder.decode_header("Tag;A;B").unwrap();
        let record = decoder.decode_row(&columns, ";1;2").unwrap();
        assert_eq!(record.get("A"), Some("1"));
        assert_eq!(record.get("B"), Some("2"));
    }

    #[test]
    fn test_header_requires_tag_cell() {
        let decoder = Decoder::new(b',');
        assert!(decoder.decode_header(",Name").is_err());
        assert!(decoder.decode_header("").is_err());
    }
}
