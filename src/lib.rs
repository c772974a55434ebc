pub mod cli;
pub mod dataset;
pub mod docs;
pub mod engine;
pub mod envelope;
pub mod intent;
pub mod io_utils;
pub mod narrative;
pub mod normalize;
pub mod render;
pub mod resolve;
pub mod service;
pub mod snapshot;

use std::{env, sync::Arc, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{AskArgs, Cli, Commands, ProbeArgs};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_inquire", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Ask(args) => handle_ask(&args),
        Commands::Probe(args) => handle_probe(&args),
    }
}

fn handle_ask(args: &AskArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let storage = snapshot::FsStorage::new(args.input.clone(), args.docs.clone(), encoding);
    let store = snapshot::Store::open(Box::new(storage), args.delimiter)
        .with_context(|| format!("Loading dataset from {:?}", args.input))?;
    let service = service::QueryService::new(
        Arc::new(store),
        Box::new(narrative::DisabledNarrator),
    );

    info!("Answering question: {}", args.question);
    let envelope = service.answer(&args.question);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        print!("{}", render::render_envelope(&envelope));
    }
    Ok(())
}

fn handle_probe(args: &ProbeArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let data = dataset::Dataset::load(&args.input, args.delimiter, encoding)
        .with_context(|| format!("Loading dataset from {:?}", args.input))?;
    let headers = vec!["column".to_string(), "type".to_string()];
    let rows = data
        .columns
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                match c.data_type {
                    dataset::ColumnType::Numeric => "numeric".to_string(),
                    dataset::ColumnType::Text => "text".to_string(),
                },
            ]
        })
        .collect::<Vec<_>>();
    let table = envelope::NamedTable {
        title: format!("{} column(s), {} row(s)", data.columns.len(), data.rows.len()),
        columns: headers,
        rows,
    };
    let envelope = envelope::ResponseEnvelope {
        ok: true,
        general: format!("Probed {:?}", args.input),
        lists: Vec::new(),
        tables: vec![table],
    };
    print!("{}", render::render_envelope(&envelope));
    info!("Inferred types for {} column(s)", data.columns.len());
    Ok(())
}
