use iro2tm_browser::{workbench, BrowserEngine, BrowserSession, CdpPage};
use iro2tm_core::{Config, Paths, WaitMode};
use tokio::io::AsyncReadExt;
use tracing::debug;

pub struct Options {
    pub url: String,
    pub browser: Option<String>,
    pub binary: Option<String>,
    pub headed: bool,
    pub input: Option<String>,
    pub output: Option<String>,
    pub wait: Option<String>,
    pub compile_wait_ms: Option<u64>,
    pub page_settle_ms: Option<u64>,
    pub action_settle_ms: Option<u64>,
    pub resolve_timeout_ms: Option<u64>,
    pub output_poll_timeout_ms: Option<u64>,
    pub config: Option<String>,
}

/// Run one conversion: stdin (or --input) through the workbench to stdout
/// (or --output).
pub async fn run(opts: Options) -> anyhow::Result<()> {
    let paths = Paths::new();
    let mut config = match &opts.config {
        Some(path) => Config::load_from(std::path::Path::new(path))?,
        None => Config::load_or_default(&paths)?,
    };
    apply_overrides(&mut config, &opts)?;

    // Read the grammar in full before any browser interaction begins.
    let input = match &opts.input {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };
    debug!(bytes = input.len(), "Read input grammar");

    let engine = BrowserEngine::from_str(&config.browser.engine);
    let session = BrowserSession::launch(
        engine,
        config.browser.headed,
        config.browser.binary.as_deref(),
        &paths.profiles_dir(),
    )
    .await?;

    let output = workbench::convert(CdpPage::new(session), &opts.url, &input, &config).await?;

    match &opts.output {
        Some(path) => tokio::fs::write(path, &output).await?,
        None => {
            use std::io::Write;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
            if !output.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, opts: &Options) -> anyhow::Result<()> {
    if let Some(engine) = &opts.browser {
        config.browser.engine = engine.clone();
    }
    if let Some(binary) = &opts.binary {
        config.browser.binary = Some(binary.clone());
    }
    if opts.headed {
        config.browser.headed = true;
    }
    if let Some(mode) = &opts.wait {
        config.wait_mode = WaitMode::from_str(mode)?;
    }
    if let Some(ms) = opts.compile_wait_ms {
        config.timing.compile_wait_ms = ms;
    }
    if let Some(ms) = opts.page_settle_ms {
        config.timing.page_settle_ms = ms;
    }
    if let Some(ms) = opts.action_settle_ms {
        config.timing.action_settle_ms = ms;
    }
    if let Some(ms) = opts.resolve_timeout_ms {
        config.timing.resolve_timeout_ms = ms;
    }
    if let Some(ms) = opts.output_poll_timeout_ms {
        config.timing.output_poll_timeout_ms = ms;
    }
    Ok(())
}
