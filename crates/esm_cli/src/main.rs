use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use esm_core::config::ReadOptions;
use esm_core::core_api::{Engine, RecordSummary, Session, Summary};
use esm_core::layout::FileLayout;
use esm_core::strings::StringTable;
use esm_core::{Dialect, Tag};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Expected dialect; the file magic must agree.
    #[arg(
        long,
        global = true,
        value_name = "morrowind|skyrim|tes3|tes4",
        value_parser = parse_dialect
    )]
    dialect: Option<Dialect>,
    /// JSON file with read options.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// String table (.STRINGS, .DLSTRINGS or .ILSTRINGS) used to check
    /// localized indices. May be repeated.
    #[arg(long = "strings", global = true, value_name = "FILE")]
    strings: Vec<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// File header fields and record counts.
    Summary {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Byte ranges of the file header and top-level entries.
    Layout {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// One line per record after the file header.
    Records {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        #[arg(long)]
        tag: Option<Tag>,
        #[arg(long)]
        json: bool,
    },
    /// Parse, re-serialize and compare with the input.
    Roundtrip {
        #[arg(value_name = "FILE")]
        path: PathBuf,
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

impl Command {
    fn path(&self) -> &Path {
        match self {
            Self::Summary { path, .. }
            | Self::Layout { path, .. }
            | Self::Records { path, .. }
            | Self::Roundtrip { path, .. } => path,
        }
    }
}

fn parse_dialect(value: &str) -> Result<Dialect, String> {
    match value.to_ascii_lowercase().as_str() {
        "morrowind" | "mw" | "tes3" => Ok(Dialect::Morrowind),
        "skyrim" | "sr" | "tes4" => Ok(Dialect::Skyrim),
        _ => Err(format!(
            "unknown dialect {value:?}; expected morrowind, skyrim, tes3 or tes4"
        )),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_options(path: &Path) -> Result<ReadOptions, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Error reading config {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("Error in config {}: {e}", path.display()))
}

fn load_strings(paths: &[PathBuf]) -> Result<Option<StringTable>, String> {
    if paths.is_empty() {
        return Ok(None);
    }
    let mut table = StringTable::new();
    for path in paths {
        let loaded = StringTable::read_file(path)
            .map_err(|e| format!("Error reading string table {}: {e}", path.display()))?;
        debug!(path = %path.display(), entries = loaded.len(), "loaded string table");
        table.merge(loaded);
    }
    Ok(Some(table))
}

/// Also catches two spellings of one existing file, such as `x.esp` and `./x.esp`.
fn same_file(a: &Path, b: &Path) -> bool {
    a == b
        || matches!(
            (fs::canonicalize(a), fs::canonicalize(b)),
            (Ok(a), Ok(b)) if a == b
        )
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    if let Command::Roundtrip {
        path,
        output: Some(output),
        ..
    } = &cli.command
    {
        if same_file(output, path) {
            eprintln!("--output must not be the input file");
            process::exit(2);
        }
    }

    let options = match &cli.global.config {
        Some(path) => load_options(path).unwrap_or_else(|e| {
            eprintln!("{e}");
            process::exit(1);
        }),
        None => ReadOptions::default(),
    };
    let strings = load_strings(&cli.global.strings).unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    let path = cli.command.path();
    let bytes = fs::read(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", path.display());
        process::exit(1);
    });

    let mut engine = Engine::new().with_options(options);
    if let Some(table) = strings {
        engine = engine.with_strings(table);
    }
    let session = engine
        .open_bytes(&bytes, cli.global.dialect)
        .unwrap_or_else(|e| {
            eprintln!("Error parsing plugin file: {}", path.display());
            eprintln!("  {e}");
            process::exit(1);
        });
    info!(path = %path.display(), dialect = session.dialect().name(), "opened");

    match &cli.command {
        Command::Summary { json, .. } => print_summary(&session.summary(), *json),
        Command::Layout { json, .. } => print_layout(session.layout(), *json),
        Command::Records { tag, json, .. } => print_records(&session.records(*tag), *json),
        Command::Roundtrip { output, json, .. } => {
            run_roundtrip(&session, &bytes, output.as_deref(), *json)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Error serializing JSON output: {e}");
            process::exit(1);
        }
    }
}

fn print_summary(summary: &Summary, json: bool) {
    if json {
        print_json(summary);
        return;
    }
    println!("Dialect:     {}", summary.dialect.name());
    println!("Version:     {:.2}", summary.file_version);
    println!("Author:      {}", summary.author);
    if let Some(description) = &summary.description {
        println!("Description: {description}");
    }
    println!("Master file: {}", if summary.is_master { "yes" } else { "no" });
    println!("Localized:   {}", if summary.localized { "yes" } else { "no" });
    if !summary.masters.is_empty() {
        println!("Masters:");
        for master in &summary.masters {
            println!("  {master}");
        }
    }
    println!("Records:     {}", summary.record_count);
    println!("Groups:      {}", summary.group_count);
    for (tag, count) in &summary.records_by_tag {
        println!("  {tag}  {count}");
    }
}

fn print_layout(layout: &FileLayout, json: bool) {
    if json {
        print_json(layout);
        return;
    }
    println!("File length: {} bytes", layout.file_len);
    println!("Sections:    {}", layout.section_count());
    for section in &layout.sections {
        println!(
            "  {:>10}..{:<10} {:>8}  {:?}",
            section.range.start,
            section.range.end,
            section.range.len(),
            section.id
        );
    }
}

fn print_records(records: &[RecordSummary], json: bool) {
    if json {
        print_json(&records);
        return;
    }
    for record in records {
        let form_id = record
            .form_id
            .map(|id| format!("{id:08X}"))
            .unwrap_or_else(|| "-".to_string());
        let mut notes = Vec::new();
        if record.generic {
            notes.push("generic");
        }
        if record.deleted {
            notes.push("deleted");
        }
        if record.compressed {
            notes.push("compressed");
        }
        println!(
            "{}  {form_id}  flags={:08X}  size={:<6}  {}{}",
            record.tag,
            record.flags,
            record.size,
            record.editor_id.as_deref().unwrap_or(""),
            if notes.is_empty() {
                String::new()
            } else {
                format!("  [{}]", notes.join(", "))
            }
        );
    }
}

fn run_roundtrip(session: &Session, input: &[u8], output: Option<&Path>, json: bool) {
    let (bytes, report) = session.round_trip(input).unwrap_or_else(|e| {
        eprintln!("Error serializing plugin: {e}");
        process::exit(1);
    });
    if let Some(path) = output {
        if let Err(e) = fs::write(path, &bytes) {
            eprintln!("Error writing {}: {e}", path.display());
            process::exit(1);
        }
    }

    if json {
        print_json(&report);
        return;
    }
    println!("Input:     {} bytes", report.input_len);
    println!("Output:    {} bytes", report.output_len);
    match report.first_difference {
        None => println!("Identical: yes"),
        Some(offset) => println!("Identical: no (first difference at byte {offset})"),
    }
}
