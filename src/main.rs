//! claude-code-stream - Stream a Claude Code turn as typed chunks.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use claude_code_stream::adapter::{ClaudeCodeHandler, StopReasonPolicy};
use claude_code_stream::config::ConfigLoader;
use claude_code_stream::conversation::MessageParam;
use claude_code_stream::display;

#[derive(Parser)]
#[command(
    name = "claude-code-stream",
    about = "Stream a Claude Code turn as typed chunks",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt and stream the response.
    Run {
        /// The user prompt.
        prompt: String,
        /// System prompt for the session.
        #[arg(short, long, default_value = "")]
        system_prompt: String,
        /// Model identifier.
        #[arg(short, long)]
        model: Option<String>,
        /// Path to the Claude Code executable.
        #[arg(long)]
        path: Option<PathBuf>,
        /// Working directory for the session.
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// When a stop reason ends the session.
        #[arg(long, value_enum)]
        stop_policy: Option<StopReasonPolicy>,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli.config.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let mut config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Run {
            prompt,
            system_prompt,
            model,
            path,
            cwd,
            stop_policy,
        } => {
            if model.is_some() {
                config.model = model;
            }
            if let Some(path) = path {
                config.path = Some(path.display().to_string());
            }
            if let Some(policy) = stop_policy {
                config.stop_reason_policy = policy;
            }

            let mut handler = ClaudeCodeHandler::new(config);
            if let Some(dir) = cwd {
                handler = handler.with_working_dir(dir);
            }

            let mut stream =
                handler.create_message(&system_prompt, vec![MessageParam::user(prompt)]);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(chunk) => display::print_chunk(&chunk),
                    Err(e) => {
                        display::print_error(&e.to_string());
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::SUCCESS
        }
    }
}
