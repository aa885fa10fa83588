// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `pulse-crash`: group stack traces and manage mapping files from the shell.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::SqlitePool;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pulse_crash_core::{ArtifactKind, EventMeta, Group, Lane};
use pulse_server_config::{LogFormat, LoggingConfig, ServerConfig};
use pulse_server_crash::{
	ErrorGroupingService, InMemorySink, InMemorySymbolFileStore, IngestRecord,
	SqliteSymbolFileStore, StackTraceEvent, SymbolFileService, SymbolFileStore, Symbolicator,
	UploadEntry, UploadedFile,
};

/// Pulse error grouping - symbolicate and fingerprint crash stack traces.
#[derive(Parser, Debug)]
#[command(name = "pulse-crash", about = "Pulse error grouping tool", version)]
struct Cli {
	/// Config file (defaults to /etc/pulse/server.toml)
	#[arg(long, global = true, env = "PULSE_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Group one stack trace and print the group as JSON
	Group(GroupArgs),
	/// Group a JSON array of ingest records and print the analytics rows
	Ingest(IngestArgs),
	/// Store a mapping file in a SQLite database
	Upload(UploadArgs),
}

#[derive(Args, Debug, Clone)]
struct BuildArgs {
	#[arg(long)]
	platform: String,
	#[arg(long)]
	app_version: String,
	#[arg(long)]
	version_code: String,
}

impl BuildArgs {
	fn meta(&self) -> EventMeta {
		EventMeta::new(&self.platform, &self.app_version, &self.version_code)
	}
}

#[derive(Args, Debug)]
struct GroupArgs {
	#[command(flatten)]
	build: BuildArgs,
	/// JavaScript source map for this build
	#[arg(long)]
	source_map: Option<PathBuf>,
	/// ProGuard / R8 mapping file for this build
	#[arg(long)]
	proguard_map: Option<PathBuf>,
	/// SQLite database holding uploaded mapping files
	#[arg(long)]
	database: Option<PathBuf>,
	/// Trace file, or `-` for stdin
	#[arg(default_value = "-")]
	trace: PathBuf,
}

#[derive(Args, Debug)]
struct IngestArgs {
	/// SQLite database holding uploaded mapping files
	#[arg(long)]
	database: Option<PathBuf>,
	/// JSON file with an array of records, or `-` for stdin
	#[arg(default_value = "-")]
	records: PathBuf,
}

#[derive(Args, Debug)]
struct UploadArgs {
	#[command(flatten)]
	build: BuildArgs,
	/// Artifact type: JS (source map) or JAVA (ProGuard mapping)
	#[arg(long = "type")]
	kind: String,
	#[arg(long)]
	database: PathBuf,
	file: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GroupOutput {
	primary_lane: Lane,
	group: Group,
	symbolicated_trace: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = match &cli.config {
		Some(path) => pulse_server_config::load_config_with_file(path.clone()),
		None => pulse_server_config::load_config(),
	}
	.context("failed to load configuration")?;

	init_logging(&config.logging);

	match cli.command {
		Command::Group(args) => {
			let output = match &args.database {
				Some(db) => run_group(Arc::new(open_store(db).await?), &config, &args).await?,
				None => run_group(Arc::new(InMemorySymbolFileStore::new()), &config, &args).await?,
			};
			println!("{}", serde_json::to_string_pretty(&output)?);
		}
		Command::Ingest(args) => {
			let records: Vec<IngestRecord> = serde_json::from_str(&read_input(&args.records)?)
				.context("failed to parse ingest records")?;
			let events = match &args.database {
				Some(db) => run_ingest(Arc::new(open_store(db).await?), &config, &records).await?,
				None => {
					let store = Arc::new(InMemorySymbolFileStore::new());
					run_ingest(store, &config, &records).await?
				}
			};
			println!("{}", serde_json::to_string_pretty(&events)?);
		}
		Command::Upload(args) => {
			let store = Arc::new(open_store(&args.database).await?);
			run_upload(store, &args).await?;
		}
	}

	Ok(())
}

fn init_logging(config: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
	let builder = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr);
	match config.format {
		LogFormat::Json => builder.json().init(),
		LogFormat::Text => builder.compact().init(),
	}
}

async fn open_store(path: &Path) -> Result<SqliteSymbolFileStore> {
	let url = format!("sqlite:{}?mode=rwc", path.display());
	let pool = SqlitePool::connect(&url)
		.await
		.with_context(|| format!("failed to open database {}", path.display()))?;
	let store = SqliteSymbolFileStore::new(pool);
	store.ensure_schema().await?;
	Ok(store)
}

fn read_input(path: &Path) -> Result<String> {
	if path.as_os_str() == "-" {
		let mut buf = String::new();
		std::io::stdin()
			.read_to_string(&mut buf)
			.context("failed to read stdin")?;
		return Ok(buf);
	}
	std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn grouping_service<S: SymbolFileStore + 'static>(
	store: Arc<S>,
	config: &ServerConfig,
) -> ErrorGroupingService<S> {
	let symbolicator = Symbolicator::from_config(store, &config.symbolication);
	ErrorGroupingService::from_config(Arc::new(symbolicator), &config.grouping)
}

async fn seed<S: SymbolFileStore>(
	store: &S,
	meta: &EventMeta,
	kind: ArtifactKind,
	path: Option<&Path>,
) -> Result<()> {
	if let Some(path) = path {
		let data =
			std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
		store.upload_file(&meta.upload_metadata(kind), &data).await?;
	}
	Ok(())
}

async fn run_group<S: SymbolFileStore + 'static>(
	store: Arc<S>,
	config: &ServerConfig,
	args: &GroupArgs,
) -> Result<GroupOutput> {
	let meta = args.build.meta();
	seed(&*store, &meta, ArtifactKind::SourceMap, args.source_map.as_deref()).await?;
	seed(&*store, &meta, ArtifactKind::ProguardMap, args.proguard_map.as_deref()).await?;

	let trace = read_input(&args.trace)?;
	let service = grouping_service(store, config);
	let result = service.process(Some(&trace), &meta).await;

	Ok(GroupOutput {
		primary_lane: pulse_crash_core::choose_primary(&result.parsed),
		symbolicated_trace: result.symbolicated_trace(),
		group: result.group,
	})
}

async fn run_ingest<S: SymbolFileStore + 'static>(
	store: Arc<S>,
	config: &ServerConfig,
	records: &[IngestRecord],
) -> Result<Vec<StackTraceEvent>> {
	let service = grouping_service(store, config);
	let sink = InMemorySink::new();
	let inserted = service.ingest(records, &sink).await?;
	info!(inserted, "Grouped records");
	Ok(sink.events())
}

async fn run_upload<S: SymbolFileStore + 'static>(store: Arc<S>, args: &UploadArgs) -> Result<()> {
	let kind: ArtifactKind = args
		.kind
		.to_ascii_uppercase()
		.parse()
		.with_context(|| format!("unknown artifact type {}", args.kind))?;
	let file_name = args
		.file
		.file_name()
		.map(|n| n.to_string_lossy().into_owned())
		.context("upload path has no file name")?;
	let data = std::fs::read(&args.file)
		.with_context(|| format!("failed to read {}", args.file.display()))?;

	let service = SymbolFileService::new(store);
	let ok = service
		.upload_files(
			vec![UploadedFile {
				file_name: Some(file_name.clone()),
				data,
			}],
			vec![UploadEntry {
				file_name,
				metadata: args.build.meta().upload_metadata(kind),
			}],
		)
		.await;
	if !ok {
		bail!("upload of {} failed", args.file.display());
	}
	info!(file = %args.file.display(), "Mapping file uploaded");
	Ok(())
}
