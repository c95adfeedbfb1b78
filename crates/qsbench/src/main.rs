use anyhow::{Context, Result};
use clap::Parser;
use qsbench::config::Cli;
use qsbench::driver::TracingSink;
use qsbench::{load_artifacts, report, Driver, Registry};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let artifacts = load_artifacts(cli.artifacts.as_deref()).context("loading artifacts")?;
    let params = cli.params();
    let registry = Registry::build(&artifacts, &cli.selection(), &params);

    if cli.list {
        for case in registry.cases() {
            match &case.skip {
                None => println!("{}", case.name),
                Some(reason) => println!("{} (skipped: {reason})", case.name),
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let driver = Driver::new(cli.driver_options())
        .with_context(|| format!("invalid workload {params}"))?;
    tracing::info!(
        %params,
        expected = driver.expected(),
        cases = registry.enabled().count(),
        "starting run"
    );

    let summary = driver.run_all(&registry, &mut TracingSink);
    print!("{}", report::render_table(&summary));
    if let Some(path) = &cli.json {
        report::write_json(&summary, path)?;
        tracing::info!(path = %path.display(), "wrote summary");
    }

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
