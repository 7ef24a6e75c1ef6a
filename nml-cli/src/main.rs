//! NewsML-G2 codec command-line tool
//!
//! Inspects news items, checks that they survive an import/export cycle and
//! builds snapshots from change logs.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};

use clap::{Parser, Subcommand};
use newsml_codec::{
    ChangeRecord, CodecConfig, Exporter, Importer, PluginConfig, SnapshotBuilder, XmlDocument,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// NewsML-G2 document codec
#[derive(Parser)]
#[command(name = "nml")]
#[command(version)]
#[command(about = "NewsML-G2 document codec and snapshot builder", long_about = None)]
struct Cli {
    /// Plugin configuration file (JSON)
    #[arg(short = 'c', long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the article model of a news item as JSON
    #[command(visible_alias = "i")]
    Import {
        /// News item file
        file: String,
    },

    /// Import and re-export a news item
    #[command(visible_alias = "r")]
    Roundtrip {
        /// News item file
        file: String,
        /// Output file (default: stdout)
        output: Option<String>,
    },

    /// Replay a change log and write the resulting snapshot
    #[command(visible_alias = "s")]
    Snapshot {
        /// Change log file (JSON array of change records)
        changes: String,
        /// Output file (default: stdout)
        output: Option<String>,

        /// Base news item (default: the configured template)
        #[arg(short = 'b', long)]
        base: Option<String>,

        /// Write the replay log to this file
        #[arg(short = 'l', long)]
        log: Option<String>,
    },
}

fn main() -> std::process::ExitCode {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("newsml_codec=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Import { file } => run_import(config, &file),
        Commands::Roundtrip { file, output } => run_roundtrip(config, &file, output.as_deref()),
        Commands::Snapshot {
            changes,
            output,
            base,
            log,
        } => run_snapshot(
            config,
            base.as_deref(),
            &changes,
            output.as_deref(),
            log.as_deref(),
        ),
    });

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&str>) -> Result<CodecConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            tracing::debug!(path, "reading configuration");
            let plugins = PluginConfig::from_file(path)?;
            Ok(CodecConfig::from_accessor(&plugins))
        }
        None => Ok(CodecConfig::default()),
    }
}

fn open_output(path: Option<&str>) -> io::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout()),
    })
}

/// Prints the document summary.
fn run_import(config: CodecConfig, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let xml = fs::read_to_string(path)?;
    let doc = Importer::new(config).import_document(&xml)?;

    let mut output = io::stdout();
    serde_json::to_writer_pretty(&mut output, &doc.summary())?;
    writeln!(output)?;
    Ok(())
}

/// Imports and exports a file against its own skeleton.
fn run_roundtrip(
    config: CodecConfig,
    path: &str,
    output_path: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let xml = fs::read_to_string(path)?;
    let skeleton = XmlDocument::parse(&xml)?;
    let doc = Importer::new(config.clone()).import_parsed(&skeleton)?;
    let exported = Exporter::new(config).export_document(&doc, Some(&skeleton))?;

    let mut output = open_output(output_path)?;
    output.write_all(exported.as_bytes())?;
    output.flush()?;

    if exported == xml {
        eprintln!("Round trip complete, output identical.");
    } else {
        eprintln!("Round trip complete, output differs from input.");
    }
    Ok(())
}

/// Replays a change log against a base item or the template.
fn run_snapshot(
    config: CodecConfig,
    base_path: Option<&str>,
    changes_path: &str,
    output_path: Option<&str>,
    log_path: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = base_path.map(fs::read_to_string).transpose()?;
    let changes = ChangeRecord::parse_list(&fs::read_to_string(changes_path)?)?;

    let snapshot = SnapshotBuilder::new(config).build_snapshot(base.as_deref(), &changes)?;

    let mut output = open_output(output_path)?;
    output.write_all(snapshot.xml.as_bytes())?;
    output.flush()?;

    if let Some(path) = log_path {
        let mut log = BufWriter::new(File::create(path)?);
        snapshot.log.write_xml(&mut log)?;
        log.flush()?;
    }

    eprintln!(
        "Snapshot complete: {} changes applied, digest {}.",
        snapshot.log.len(),
        snapshot.digest
    );
    Ok(())
}
