use clap::{Args, Parser, Subcommand};
use layerwatt::config::Config;
use layerwatt::model::{self, Sequential};
use layerwatt::sink::{self, FileSink, ResultSink};
use layerwatt::{build_run_id, telemetry, ExecutionUnit, Profiler};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "layerwatt", version, about = "Layer-wise power sampling and energy attribution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Profile every unit of the configured model
    Profile(ConfigArgs),
    /// Serve the latest board power reading for scraping
    Export(ExportArgs),
    /// Print the report of a persisted run summary
    Report(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the TOML run configuration
    #[arg(short, long, default_value = "run.toml")]
    config: PathBuf,
}

#[derive(Args)]
struct ExportArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Address to listen on, overriding `exporter.bind`
    #[arg(short, long)]
    bind: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Profile(args) => profile(&load_config(&args.config)?),
        Commands::Export(args) => export(load_config(&args.config.config)?, args.bind),
        Commands::Report(args) => report(&load_config(&args.config)?),
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = if path.exists() {
        Config::from_toml(&fs::read_to_string(path)?)?
    } else {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

fn profile(config: &Config) -> anyhow::Result<()> {
    let network = Sequential::from_config(&config.model);
    let model_name = network.name().to_string();
    let mut units = model::decompose(network, &model::sample_batch(&config.model));
    let names: Vec<&str> = units.iter().map(|u| u.id().name.as_str()).collect();
    let run_id = build_run_id(config, &names)?;

    let source = telemetry::from_config(&config.telemetry);
    let mut profiler = Profiler::new(config.clone(), source)?;
    tracing::info!(run_id = %run_id, units = units.len(), "starting profiling run");
    let run = profiler.run(&run_id, &model_name, &mut units)?;

    println!("{}", run.summary.report());
    FileSink::new(config.output.clone()).persist(&run)?;
    Ok(())
}

fn export(config: Config, bind: Option<String>) -> anyhow::Result<()> {
    let bind = bind.unwrap_or_else(|| config.exporter.bind.clone());
    let refresh = config.exporter.refresh_interval()?;
    let source = telemetry::from_config(&config.telemetry);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(layerwatt::exporter::serve(source, &bind, refresh))
}

fn report(config: &Config) -> anyhow::Result<()> {
    let Some(path) = &config.output.summary_json_path else {
        anyhow::bail!("output.summary_json_path is not set");
    };
    let summary = sink::read_summary_json(path)?;
    println!("run {}", summary.run_id());
    println!("{}", summary.report());
    Ok(())
}
