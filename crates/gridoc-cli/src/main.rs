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

//! Gridoc command-line interface: load a document and print it as JSON
//! or YAML.

use clap::{Parser, ValueEnum};
use colored::Colorize;
use gridoc::{GridocError, GridocResult, LoadOptions, Loader, Locator, Value};
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

/// Gridoc - Grid Document Language toolkit
#[derive(Parser)]
#[command(name = "gridoc")]
#[command(author, version, about = "Load a Gridoc document and print it as JSON or YAML", long_about = None)]
struct Cli {
    /// Path to the Gridoc document.
    input: String,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Column delimiter.
    #[arg(short, long, default_value = ",")]
    delimiter: char,

    /// Include Tag/TagIndex/Subpath/TagID keys in tag objects.
    #[arg(long)]
    tag_meta: bool,

    /// Include owning-resource attributes under a `Source` key.
    #[arg(long)]
    source_meta: bool,
}

fn run(cli: &Cli) -> GridocResult<String> {
    if !cli.delimiter.is_ascii() {
        return Err(GridocError::decode(
            format!("delimiter must be an ASCII character: {:?}", cli.delimiter),
            0,
        ));
    }
    let options = LoadOptions::builder()
        .delimiter(cli.delimiter as u8)
        .include_tag_meta(cli.tag_meta)
        .include_source_meta(cli.source_meta)
        .build();
    let loader = Loader::new(options);
    let mut scope = gridoc::standard_scope();
    let document = loader.load(&mut scope, &Locator::new(cli.input.as_str()))?;
    render(&document, cli.format)
}

fn render(document: &Value, format: OutputFormat) -> GridocResult<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(document)
            .map_err(|e| GridocError::conversion(format!("failed to render JSON: {}", e))),
        OutputFormat::Yaml => serde_yaml::to_string(document)
            .map_err(|e| GridocError::conversion(format!("failed to render YAML: {}", e))),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            if let Some(context) = &e.context {
                eprintln!("  {}", context.as_str().dimmed());
            }
            ExitCode::FAILURE
        }
    }
}
