use clap::{Parser, Subcommand};
use imgsquash::config::{self, AppConfig, Overrides};
use imgsquash::imaging::{Dimensions, OutputFormat, ResizeMode, RustBackend, plan_dimensions};
use imgsquash::output::{self, NoticeKind};
use imgsquash::pipeline::{FailurePolicy, RunOptions, plan_one};
use imgsquash::session::Session;
use imgsquash::{inputs, report};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Resize and output flags shared by `compress` and `plan`.
#[derive(clap::Args, Clone, Default)]
struct ResizeArgs {
    /// How target dimensions are derived from the source
    #[arg(long, value_enum)]
    resize: Option<ResizeMode>,

    /// Custom target width in pixels (implies --resize custom)
    #[arg(long)]
    width: Option<u32>,

    /// Custom target height in pixels (implies --resize custom)
    #[arg(long)]
    height: Option<u32>,
}

#[derive(clap::Args, Clone)]
struct CompressArgs {
    /// Image files or directories to compress
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Directory compressed files are written to
    #[arg(long, default_value = "compressed")]
    out_dir: PathBuf,

    /// Encoder quality, 1-100
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    quality: Option<u32>,

    #[command(flatten)]
    resize: ResizeArgs,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// What a failed image does to the rest of the batch. Either way the
    /// exit status is 1 when any image failed
    #[arg(long, value_enum)]
    on_error: Option<FailurePolicy>,

    /// Compress images on a worker pool
    #[arg(long)]
    parallel: bool,

    /// Maximum parallel workers (implies --parallel)
    #[arg(long)]
    jobs: Option<usize>,

    /// Write a JSON report of the batch to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Validate, decode, and plan without encoding or writing anything
    #[arg(long)]
    dry_run: bool,
}

impl CompressArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            quality: self.quality,
            resize: self.resize.resize,
            width: self.resize.width,
            height: self.resize.height,
            format: self.format,
            on_error: self.on_error,
            parallel: self.parallel || self.jobs.is_some(),
            max_processes: self.jobs,
        }
    }
}

#[derive(Parser)]
#[command(name = "imgsquash")]
#[command(about = "Batch image compressor with before/after statistics")]
#[command(long_about = "\
Batch image compressor with before/after statistics

Each image is decoded, resized according to the resize mode, and re-encoded
at the chosen quality and format. Results are written as
<name>_compressed.<ext> next to a summary of how much each file shrank
(or grew).

Resize modes:
  original         keep the source dimensions
  half             50% of each side, rounded down
  three-quarters   75% of each side, rounded down
  custom           --width and/or --height; with only one of them the other
                   follows the source aspect ratio

Settings are read from stock defaults, then imgsquash.toml in the working
directory (or --config FILE), then command-line flags.

Exit status is 0 only when every image was compressed. With --on-error skip
the images that did compress are still written.

Run 'imgsquash gen-config' to generate a documented imgsquash.toml.
Set RUST_LOG=debug for per-stage diagnostics.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./imgsquash.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress images and write the results
    Compress(CompressArgs),
    /// Print the target dimensions for a source size, e.g. `plan 4000x3000 --resize half`
    Plan {
        /// Source dimensions as WIDTHxHEIGHT
        #[arg(value_parser = parse_dimensions)]
        size: Dimensions,

        #[command(flatten)]
        resize: ResizeArgs,
    },
    /// Print a stock imgsquash.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Compress(args) => {
            let config = load_config(cli.config.as_deref(), &args.overrides())?;
            if !compress(&args, &config)? {
                std::process::exit(1);
            }
        }
        Command::Plan { size, resize } => {
            let overrides = Overrides {
                resize: resize.resize,
                width: resize.width,
                height: resize.height,
                ..Default::default()
            };
            let config = load_config(cli.config.as_deref(), &overrides)?;
            let target = plan_dimensions(size.as_tuple(), &config.compression);
            println!("{}", output::format_plan(size, target.into()));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_config(
    explicit: Option<&Path>,
    overrides: &Overrides,
) -> Result<AppConfig, config::ConfigError> {
    let cwd = std::env::current_dir()?;
    config::load_layered(explicit, &cwd, overrides)
}

/// Run the `compress` command. Returns `false` when the batch did not complete.
fn compress(args: &CompressArgs, config: &AppConfig) -> Result<bool, Box<dyn std::error::Error>> {
    let (candidates, unreadable) = inputs::collect_candidates(&args.paths);
    for err in &unreadable {
        output::print_notice(NoticeKind::Failure, &err.to_string());
    }

    let mut session = Session::new(config.limits.max_file_size);
    let selection = session.select(candidates);
    output::print_selection(&selection);
    if !selection.replaced() {
        return Ok(false);
    }

    let backend = RustBackend::new();

    if args.dry_run {
        let mut planned = Vec::new();
        let mut ok = true;
        for input in session.inputs() {
            match plan_one(&backend, input, &config.compression) {
                Ok(item) => planned.push(item),
                Err(err) => {
                    tracing::error!(name = %input.name, error = %err, "decode failed");
                    output::print_notice(
                        NoticeKind::Failure,
                        &format!("{} could not be decoded", input.name),
                    );
                    ok = false;
                }
            }
        }
        output::print_planned_items(&planned);
        return Ok(ok);
    }

    let options = RunOptions::from_config(&config.processing);
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_pipeline_event(&event) {
                println!("{}", line);
            }
        }
    });
    let run = session.run(&backend, &config.compression, &options, Some(tx));
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;

    if let Err(err) = run {
        tracing::error!(error = %err, "batch aborted");
        output::print_notice(
            NoticeKind::Failure,
            "Compression failed, nothing was written. Run with RUST_LOG=debug for details",
        );
        return Ok(false);
    }

    println!();
    output::print_results(session.results(), session.summary().as_ref());
    for failure in session.failures() {
        output::print_notice(
            NoticeKind::Failure,
            &format!("{} could not be compressed", failure.name),
        );
    }

    let complete = session.failures().is_empty();
    if complete {
        output::print_notice(NoticeKind::Success, "Compression complete");
    } else {
        output::print_notice(
            NoticeKind::Failure,
            &format!(
                "Compressed {} of {} images",
                session.results().len(),
                session.inputs().len()
            ),
        );
    }

    if !session.results().is_empty() {
        let written = session.download_all(&args.out_dir)?;
        output::print_notice(
            NoticeKind::Success,
            &format!(
                "Saved {} to {}",
                if written.len() == 1 {
                    "1 file".to_string()
                } else {
                    format!("{} files", written.len())
                },
                args.out_dir.display()
            ),
        );
    }

    if let Some(path) = &args.report {
        report::write_report(path, session.results(), session.failures())?;
        output::print_notice(
            NoticeKind::Success,
            &format!("Report written to {}", path.display()),
        );
    }

    Ok(complete)
}

/// Parse `WIDTHxHEIGHT`.
fn parse_dimensions(s: &str) -> Result<Dimensions, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let width = w.trim().parse::<u32>().map_err(|e| format!("bad width: {e}"))?;
    let height = h.trim().parse::<u32>().map_err(|e| format!("bad height: {e}"))?;
    Ok(Dimensions { width, height })
}
