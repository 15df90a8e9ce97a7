// fcs-gateway is a federated corpus search gateway.
// Copyright (C) 2024 fcs-gateway contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use tracing_subscriber::prelude::*;

use fcs_core::config::ApiConfig;
use fcs_core::corpus::{self, CorpusResource};
use fcs_core::entrypoint;
use fcsql::resource::{Layer, PosAttr, StructureMapping};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Args {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the SRU/FCS gateway.
    Api { config_path: String },

    /// Load and validate a config file, including every corpus resource.
    Check { config_path: String },

    /// Interactive query translation: reads FCS-QL from stdin, prints the
    /// CQL it compiles to.
    Transform {
        #[clap(value_enum)]
        dialect: Dialect,

        /// Translate against this corpus resource file instead of the
        /// built-in word/lemma/pos resource.
        #[clap(long)]
        resource: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Dialect {
    Basic,
    Advanced,
}

fn load_toml_config<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let raw_config = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: '{}'", path.display()))?;
    toml::from_str(&raw_config)
        .with_context(|| format!("Failed to parse config: '{}'", path.display()))
}

fn builtin_resource() -> (Vec<PosAttr>, StructureMapping) {
    let attrs = vec![
        PosAttr {
            id: 1,
            name: "word".to_string(),
            layer: Layer::Text,
            is_layer_default: true,
        },
        PosAttr {
            id: 2,
            name: "lemma".to_string(),
            layer: Layer::Lemma,
            is_layer_default: true,
        },
        PosAttr {
            id: 3,
            name: "pos".to_string(),
            layer: Layer::Pos,
            is_layer_default: true,
        },
    ];
    let structures = StructureMapping {
        sentence: Some("s".to_string()),
        paragraph: Some("p".to_string()),
        text: Some("doc".to_string()),
        ..Default::default()
    };
    (attrs, structures)
}

fn transform_repl(dialect: Dialect, resource: Option<String>) -> Result<()> {
    let (attrs, structures) = match resource {
        Some(path) => {
            let resource: CorpusResource = load_toml_config(path)?;
            (resource.pos_attrs, resource.structure_mapping)
        }
        None => builtin_resource(),
    };

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;
        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            println!("Bye.");
            return Ok(());
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let parsed = match dialect {
            Dialect::Basic => fcsql::parse_basic(input, &attrs, &structures),
            Dialect::Advanced => fcsql::parse_advanced(input, &attrs, &structures),
        };
        match parsed {
            Ok(ast) => {
                let generated = ast.generate();
                println!("{}", generated.cql);
                for error in &generated.errors {
                    println!("! {error}");
                }
            }
            Err(err) => println!("! {err}"),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .finish()
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Api { config_path } => {
            let config: ApiConfig = load_toml_config(config_path)?;

            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(entrypoint::api::run(config))?
        }
        Commands::Check { config_path } => {
            let config: ApiConfig = load_toml_config(config_path)?;
            let registry = corpus::load_resources(&config.resources_dir)?;
            tracing::info!(
                corpora = registry.list_all().len(),
                workers = config.workers.len(),
                "config OK"
            );
        }
        Commands::Transform { dialect, resource } => transform_repl(dialect, resource)?,
    }

    Ok(())
}
