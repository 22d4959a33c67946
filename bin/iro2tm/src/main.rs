mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "iro2tm")]
#[command(about = "Convert Iro tokenizer grammars to TextMate via the hosted Iro workbench", long_about = None)]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// URL of the Iro workbench. Grammar is read from stdin, the converted
    /// grammar is written to stdout.
    url: Option<String>,

    /// Browser engine to drive (chrome, edge, firefox)
    #[arg(long)]
    browser: Option<String>,

    /// Explicit browser binary path (overrides engine discovery)
    #[arg(long)]
    binary: Option<String>,

    /// Launch a visible browser window instead of headless
    #[arg(long)]
    headed: bool,

    /// Read the grammar from a file instead of stdin
    #[arg(short, long)]
    input: Option<String>,

    /// Write the converted grammar to a file instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// How to wait for the compile result: 'fixed' (sleep a fixed interval)
    /// or 'poll' (wait until the output editor changes)
    #[arg(long)]
    wait: Option<String>,

    /// Fixed compile wait in milliseconds (wait mode 'fixed')
    #[arg(long)]
    compile_wait_ms: Option<u64>,

    /// Settle delay after the workbench editors appear, in milliseconds
    #[arg(long)]
    page_settle_ms: Option<u64>,

    /// Settle delay after each UI action, in milliseconds
    #[arg(long)]
    action_settle_ms: Option<u64>,

    /// Bound on waiting for the workbench editors to appear, in milliseconds
    #[arg(long)]
    resolve_timeout_ms: Option<u64>,

    /// Bound on waiting for the output editor to change, in milliseconds
    /// (wait mode 'poll')
    #[arg(long)]
    output_poll_timeout_ms: Option<u64>,

    /// Config file path (default: ~/.iro2tm/config.json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run environment diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing. Logs go to stderr: stdout carries the converted grammar.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Doctor) => {
            commands::doctor::run(cli.config.as_deref()).await?;
        }
        None => {
            let url = match cli.url {
                Some(url) => url,
                None => {
                    anyhow::bail!("Usage: iro2tm <URL> (see --help)");
                }
            };
            let opts = commands::convert::Options {
                url,
                browser: cli.browser,
                binary: cli.binary,
                headed: cli.headed,
                input: cli.input,
                output: cli.output,
                wait: cli.wait,
                compile_wait_ms: cli.compile_wait_ms,
                page_settle_ms: cli.page_settle_ms,
                action_settle_ms: cli.action_settle_ms,
                resolve_timeout_ms: cli.resolve_timeout_ms,
                output_poll_timeout_ms: cli.output_poll_timeout_ms,
                config: cli.config,
            };
            commands::convert::run(opts).await?;
        }
    }

    Ok(())
}
