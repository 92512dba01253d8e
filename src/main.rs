use clap::{Args, Parser, Subcommand};
use lvsde::{
    config::{parse_hex_colour, SpecificationFile, DEFAULT_COLOURS},
    error::{EmbedError, Result},
    evaluation::{evaluate_all, write_report_csv},
    pipeline,
    render::{render_snapshot, save_png, Colouring},
    snapshot::IterationSnapshot,
};
use std::path::PathBuf;
use tracing::{info, Level};

/// Layered vertex-splitting data embedding
#[derive(Parser, Debug)]
#[command(
    name = "lvsde",
    about = "Embed labelled high-dimensional data in 2-D with red/gray layers and vertex splitting",
    version,
    propagate_version = true,
    arg_required_else_help = true
)]
struct Cli {
    /// Log debug detail (phase changes, demotions, split failures)
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every embedding in a specification file
    Run(RunArgs),
    /// k-NN accuracy of a saved iteration snapshot
    Evaluate(EvaluateArgs),
    /// Render a saved iteration snapshot to PNG
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Path to the JSON specification file
    #[arg(value_name = "SPEC_FILE")]
    spec_file: PathBuf,
    /// Hide progress bars
    #[arg(long, default_value_t = false)]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// Snapshot JSON, e.g. last_iteration.json
    #[arg(long, value_name = "JSON")]
    snapshot: PathBuf,
    /// Neighbourhood sizes to evaluate
    #[arg(short = 'k', long = "neighbours", value_name = "K", required = true, num_args = 1..)]
    neighbours: Vec<usize>,
    /// Write the report as CSV here instead of printing it
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Snapshot JSON, e.g. last_iteration.json
    #[arg(long, value_name = "JSON")]
    snapshot: PathBuf,
    /// Class colours as #RRGGBB, in class order
    #[arg(long, value_name = "COLOUR", value_delimiter = ',')]
    colours: Vec<String>,
    /// 0: class colours by layer, 1: layer colours, 2: split markers
    #[arg(long, default_value_t = 0)]
    colouring: usize,
    /// Path to output PNG file
    #[arg(long, value_name = "FILE")]
    output: PathBuf,
}

fn run(args: RunArgs) -> Result<()> {
    let specifications = SpecificationFile::load(&args.spec_file)?;
    info!(count = specifications.len(), "embedding specifications loaded");
    for spec in &specifications {
        let summary = pipeline::run_specification(spec, !args.no_progress)?;
        println!(
            "{}: {} points, {} gray, {} split",
            summary.output_directory.display(),
            summary.points,
            summary.gray,
            summary.split
        );
    }
    Ok(())
}

fn evaluate(args: EvaluateArgs) -> Result<()> {
    let snapshot = IterationSnapshot::load(&args.snapshot)?;
    let records = evaluate_all(&snapshot.points, &args.neighbours);
    match args.output {
        Some(path) => write_report_csv(&path, &records)?,
        None => {
            for record in &records {
                println!(
                    "{},{},{}",
                    record.evaluation_type, record.neighbourhood_size, record.outcome
                );
            }
        }
    }
    Ok(())
}

fn render(args: RenderArgs) -> Result<()> {
    let snapshot = IterationSnapshot::load(&args.snapshot)?;
    let codes: Vec<String> = if args.colours.is_empty() {
        DEFAULT_COLOURS.iter().map(|c| c.to_string()).collect()
    } else {
        args.colours
    };
    let palette = codes
        .iter()
        .map(|code| parse_hex_colour(code))
        .collect::<Result<Vec<_>>>()?;
    let colouring = Colouring::from_index(args.colouring).ok_or_else(|| {
        EmbedError::InvalidSpecification(format!(
            "colouring must be 0, 1 or 2, got {}",
            args.colouring
        ))
    })?;
    let image = render_snapshot(&snapshot.points, &palette, colouring)?;
    save_png(&image, &args.output)?;
    info!(output = %args.output.display(), "snapshot rendered");
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Command::Run(args) => run(args),
        Command::Evaluate(args) => evaluate(args),
        Command::Render(args) => render(args),
    };

    if let Err(err) = outcome {
        eprintln!("[lvsde error] {}", err);
        std::process::exit(1);
    }
}
