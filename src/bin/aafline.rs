use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "aafline", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the compositions in a decoded container graph.
    Compositions(CompositionsArgs),
    /// Extract essence and emit the selected composition as timeline JSON.
    Import(ImportArgs),
}

#[derive(Parser, Debug)]
struct CompositionsArgs {
    /// Decoded container graph JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct ImportArgs {
    /// Decoded container graph JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Directory for extracted embedded essence.
    #[arg(long, default_value = "sources")]
    target: PathBuf,

    /// Composition index (0-based).
    #[arg(long, default_value_t = 0)]
    composition: usize,

    /// Output timeline JSON path; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Compositions(args) => cmd_compositions(args),
        Command::Import(args) => cmd_import(args),
    }
}

fn read_graph_json(path: &Path) -> anyhow::Result<aafline::AafFile> {
    let f = File::open(path).with_context(|| format!("open graph '{}'", path.display()))?;
    let r = BufReader::new(f);
    let file: aafline::AafFile =
        serde_json::from_reader(r).with_context(|| "parse container graph JSON")?;
    Ok(file)
}

fn cmd_compositions(args: CompositionsArgs) -> anyhow::Result<()> {
    let file = read_graph_json(&args.in_path)?;
    for (index, name) in file.composition_names().iter().enumerate() {
        println!("{index}. {name}");
    }
    Ok(())
}

fn cmd_import(args: ImportArgs) -> anyhow::Result<()> {
    let file = read_graph_json(&args.in_path)?;

    let mut report = |message: &str| eprintln!("{message}");
    let doc = aafline::import_timeline(&file, &args.target, args.composition, Some(&mut report))?;

    let json = serde_json::to_string_pretty(&doc).with_context(|| "serialize timeline JSON")?;
    match &args.out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            std::fs::write(out, json)
                .with_context(|| format!("write timeline '{}'", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
