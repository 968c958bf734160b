use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use rpa_mail::pipeline::{self, NormalizeRequest, SaveTarget, SourceKind};
use rpa_mail::storage::{self, CacheCleanup};

#[derive(Parser)]
#[command(name = "rpa-mail", version, about = "Normalize mails for RPA workflows")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize messages and print them as JSON together with a status record
    Normalize(NormalizeArgs),
    /// Print the default attachments cache directory
    CacheRoot,
    /// Delete the default attachments cache
    CleanCache,
}

#[derive(clap::Args)]
struct NormalizeArgs {
    /// Settings file (.json, .yaml or .yml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Shape of the input files
    #[arg(long, value_enum, default_value_t = SourceArg::Mime)]
    source: SourceArg,

    /// Only keep attachments with this extension
    #[arg(short, long)]
    extension: Option<String>,

    /// Save attachments below the configured cache root, or the default cache
    #[arg(long, conflicts_with = "save_to")]
    save: bool,

    /// Save attachments below this directory
    #[arg(long, value_name = "DIR")]
    save_to: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Input files: raw .eml messages, or JSON exports for --source cloud
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    /// RFC 5322 messages as stored by a local mail client
    Mime,
    /// JSON exports from the cloud mail API
    Cloud,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Mime => SourceKind::Mime,
            SourceArg::Cloud => SourceKind::Cloud,
        }
    }
}

impl NormalizeArgs {
    fn to_request(&self) -> NormalizeRequest {
        let save = match (&self.save_to, self.save) {
            (Some(dir), _) => SaveTarget::Directory(dir.clone()),
            (None, true) => SaveTarget::Configured,
            (None, false) => SaveTarget::Skip,
        };

        NormalizeRequest {
            source: self.source.into(),
            extension: self.extension.clone(),
            save,
            inputs: self.inputs.clone(),
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Normalize(args) => return normalize_command(&args),
        Command::CacheRoot => {
            println!("{}", storage::default_cache_root().display());
            Ok(())
        }
        Command::CleanCache => clean_cache_command(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        // Route `log` records from dependencies into the subscriber.
        let _ = tracing_log::LogTracer::init();
    }
}

fn normalize_command(args: &NormalizeArgs) -> ExitCode {
    let report = pipeline::run_normalize(args.config.as_deref(), &args.to_request());

    match report.to_json(args.pretty) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error: failed to render output: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn clean_cache_command() -> anyhow::Result<()> {
    match storage::clean_default_cache() {
        CacheCleanup::Failed(e) => Err(e).with_context(|| {
            format!(
                "failed to clear {}",
                storage::default_cache_root().display()
            )
        }),
        outcome => {
            println!("{}", pipeline::describe_cleanup(&outcome));
            Ok(())
        }
    }
}
