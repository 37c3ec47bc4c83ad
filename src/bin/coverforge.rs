use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "coverforge", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every row of a batch CSV to PNG files.
    Batch(BatchArgs),
    /// Render a reduced-resolution preview of one CSV row.
    Preview(PreviewArgs),
    /// Create the template directory with the default template.
    Init(InitArgs),
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Template directory (*.json).
    #[arg(long)]
    templates: PathBuf,

    /// Batch CSV path.
    #[arg(long)]
    csv: PathBuf,

    /// Output directory for PNG files.
    #[arg(long)]
    out: PathBuf,

    /// Render rows on a thread pool.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Override worker threads (parallel mode only).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Template directory (*.json).
    #[arg(long)]
    templates: PathBuf,

    /// Batch CSV path.
    #[arg(long)]
    csv: PathBuf,

    /// 1-based CSV data row to preview.
    #[arg(long, default_value_t = 1)]
    row: usize,

    /// Longest output edge in pixels.
    #[arg(long, default_value_t = 480)]
    max_size: u32,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct InitArgs {
    /// Template directory to bootstrap.
    #[arg(long)]
    templates: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Batch(args) => cmd_batch(args),
        Command::Preview(args) => cmd_preview(args),
        Command::Init(args) => cmd_init(args),
    }
}

fn load_registry(dir: &Path) -> anyhow::Result<coverforge::TemplateRegistry> {
    let mut registry = coverforge::TemplateRegistry::new();
    registry
        .load_with_default(dir)
        .with_context(|| format!("load templates from '{}'", dir.display()))?;
    Ok(registry)
}

fn cmd_batch(args: BatchArgs) -> anyhow::Result<()> {
    let registry = load_registry(&args.templates)?;
    let rows = coverforge::read_rows(&args.csv)?;
    let total = rows.len();

    let report = coverforge::run_batch(
        &registry,
        rows,
        &args.out,
        coverforge::BatchOpts {
            parallel: args.parallel,
            threads: args.threads,
        },
    )?;

    for failure in &report.failures {
        eprintln!("row {}: {}", failure.row, failure.error);
    }
    for rendered in &report.rendered {
        for issue in &rendered.issues {
            eprintln!(
                "row {}: {} skipped: {}",
                rendered.row, issue.element, issue.error
            );
        }
    }
    eprintln!("rendered {}/{}", report.rendered.len(), total);
    Ok(())
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let registry = load_registry(&args.templates)?;
    let rows = coverforge::read_rows(&args.csv)?;
    let parsed = rows
        .into_iter()
        .find(|r| r.row == args.row)
        .with_context(|| format!("csv has no data row {}", args.row))?;
    let input = parsed.input?;

    let template = registry.require(&input.template_key)?;
    let preview = coverforge::build_preview(&input, template, args.max_size)?;
    for issue in &preview.issues {
        eprintln!("{} skipped: {}", issue.element, issue.error);
    }

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    preview.layer.save_png(&args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_init(args: InitArgs) -> anyhow::Result<()> {
    let registry = load_registry(&args.templates)?;
    eprintln!(
        "template dir '{}' has: {}",
        args.templates.display(),
        registry.keys().join(", ")
    );
    Ok(())
}
