use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use procard::{Block, Config, TaskData};

#[derive(Parser)]
#[command(name = "procard")]
#[command(about = "Render step-by-step task solutions with inline math")]
struct Cli {
    /// Input task file (JSON)
    #[arg(required_unless_present = "text")]
    input: Option<PathBuf>,

    /// Annotated text to render instead of a task file
    #[arg(long, conflicts_with = "input")]
    text: Option<String>,

    /// Output file (defaults to input name with the format's extension, or stdout for text formats)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file
    #[arg(short, long, default_value = "procard.toml")]
    config: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Format::Pdf)]
    format: Format,

    /// Show only the first N steps of each subtask
    #[arg(long)]
    steps: Option<usize>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pdf,
    Typst,
    Json,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Typst => "typ",
            Format::Json => "json",
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = Config::load(&cli.config);
    let engine = config.math.engine();
    if let Err(e) = engine.load() {
        eprintln!("Warning: {}", e);
    }

    let blocks = match (&cli.text, &cli.input) {
        (Some(text), _) => vec![Block::Paragraph {
            content: procard::parse(text),
        }],
        (None, Some(input)) => {
            let json = fs::read_to_string(input)
                .map_err(|e| format!("reading {}: {}", input.display(), e))?;
            let task = TaskData::from_json(&json).map_err(|e| e.to_string())?;
            tracing::debug!(subtasks = task.subtasks.len(), "task loaded");
            procard::task_to_blocks(&task, cli.steps, &config.labels)
        }
        (None, None) => return Err("no input given".to_string()),
    };

    let bytes = match cli.format {
        Format::Json => serde_json::to_string_pretty(&blocks)
            .map_err(|e| e.to_string())?
            .into_bytes(),
        Format::Typst => procard::blocks_to_typst(&blocks, &config, engine.renderer()).into_bytes(),
        Format::Pdf => {
            procard::typst_to_pdf(procard::blocks_to_typst(&blocks, &config, engine.renderer()))?
        }
    };

    let output = cli.output.clone().or_else(|| match (cli.format, &cli.input) {
        (Format::Pdf, Some(input)) => Some(input.with_extension(cli.format.extension())),
        (Format::Pdf, None) => Some(PathBuf::from("procard.pdf")),
        _ => None,
    });

    match output {
        Some(path) => write_output(&path, &bytes),
        None => {
            print!("{}", String::from_utf8_lossy(&bytes));
            Ok(())
        }
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), String> {
    fs::write(path, bytes).map_err(|e| format!("writing {}: {}", path.display(), e))?;
    println!("Created {}", path.display());
    Ok(())
}
