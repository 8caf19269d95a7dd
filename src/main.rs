use clap::{Parser, Subcommand};
use pixelsieve::codec::ImageCodec;
use pixelsieve::config::{PipelineConfig, stock_config_toml};
use pixelsieve::fetch::HttpTransport;
use pixelsieve::orchestrator::{PipelineOrchestrator, RunOptions, inspect};
use pixelsieve::output::{
    print_inspect_report, print_run_summary, spawn_progress_printer, write_report,
};
use pixelsieve::package::DirPackager;
use pixelsieve::source::reader_for;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;

#[derive(Parser)]
#[command(name = "pixelsieve", version, about = "Resumable batch image pipeline")]
struct Cli {
    /// Path to the config file (defaults apply when absent)
    #[arg(short, long, global = true, default_value = "pixelsieve.toml")]
    config: PathBuf,

    /// Directory for spooled intermediates, catalog, and checkpoints
    #[arg(long, global = true, default_value = ".pixelsieve-work")]
    work_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a source; re-running the same command resumes
    Run {
        /// Directory of images, or a `.urls` manifest of remote images
        source: String,

        /// Destination for packaged images, manifest, and report
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Discard prior progress for this source and start over
        #[arg(long)]
        force_restart: bool,
    },
    /// Show resumable state for a source without processing anything
    Inspect { source: String },
    /// Print a stock config file with every option documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    match cli.command {
        Command::Run {
            source,
            output,
            force_restart,
        } => cmd_run(&cli.config, &cli.work_dir, source, output, force_restart),
        Command::Inspect { source } => {
            let config = PipelineConfig::load(&cli.config)?;
            let report = inspect(&cli.work_dir, &source, &config)?;
            print_inspect_report(&report);
            Ok(ExitCode::SUCCESS)
        }
        Command::GenConfig => {
            print!("{}", stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn cmd_run(
    config_path: &PathBuf,
    work_dir: &PathBuf,
    source: String,
    output: PathBuf,
    force_restart: bool,
) -> Result<ExitCode, Box<dyn Error>> {
    let config = PipelineConfig::load(config_path)?;
    let reader = reader_for(&source);
    let codec = ImageCodec::new();
    let packager = DirPackager::new(&output);

    let (tx, rx) = mpsc::channel();
    let printer = spawn_progress_printer(rx);

    let options = RunOptions {
        source,
        work_dir: work_dir.clone(),
        output_dir: output.clone(),
        force_restart,
    };
    // Scope the orchestrator so its progress sender drops and the printer
    // thread sees the channel close.
    let result = {
        let orchestrator = PipelineOrchestrator::new(
            config,
            reader.as_ref(),
            &codec,
            HttpTransport::default(),
            &packager,
        )
        .with_progress(tx);
        orchestrator.run(&options)
    };
    let _ = printer.join();
    let result = result?;

    print_run_summary(&result);
    let report_path = write_report(&result, &output)?;
    println!("report written to {}", report_path.display());

    Ok(if result.completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
