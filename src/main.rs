use anyhow::Context;
use canopy::{clap_args, config::Config, model::System, summary};
use colored::Colorize;
use std::path::Path;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args = clap_args::parse();

    match args.command {
        clap_args::Commands::Init => {
            init_tracing(args.verbose, None);
            match Config::write_example_to_file(Path::new("./canopy.toml")) {
                Ok(_) => {
                    println!("{}", "canopy.toml created!".green());
                }
                Err(err) => {
                    println!("{}\n{}", "Error creating config.".red(), err);
                }
            }
        }

        clap_args::Commands::Validate { config } => {
            let config = load_config(&config, args.verbose)?;
            let system = System::resolve(&config)?;
            println!(
                "{} system '{}' resolves: {} usage patterns, {} servers",
                "ok".green(),
                system.name,
                system.patterns.len(),
                system.servers.len()
            );
        }

        clap_args::Commands::Summary { config } => {
            let config = load_config(&config, args.verbose)?;
            let system = System::resolve(&config)?;
            println!("{}", format!(" {} ", system.name).reversed().green());
            summary::print_patterns(&system);
            summary::print_servers(&system);
        }

        clap_args::Commands::Usage { config, pattern } => {
            let config = load_config(&config, args.verbose)?;
            let system = System::resolve(&config)?;
            let pattern = system.find_pattern(&pattern)?;
            summary::print_usage(pattern);
        }

        clap_args::Commands::Assumptions { config } => {
            let config = load_config(&config, args.verbose)?;
            let system = System::resolve(&config)?;
            summary::print_assumptions(&system);
        }
    }

    Ok(())
}

fn load_config(path: &Path, verbose: bool) -> anyhow::Result<Config> {
    let config = Config::try_from_path(path)
        .with_context(|| format!("unable to load scenario config {}", path.display()))?;
    init_tracing(verbose, config.system.debug_level.as_deref());
    info!("loaded scenario config {}", path.display());
    Ok(config)
}

/// Sets the tracing level from the verbose flag or the config's debug_level
/// entry. RUST_LOG takes priority when set.
fn init_tracing(verbose: bool, debug_level: Option<&str>) {
    let level = if verbose {
        Level::DEBUG
    } else {
        match debug_level {
            Some(level_str) => match level_str.to_lowercase().as_str() {
                "trace" => Level::TRACE,
                "debug" => Level::DEBUG,
                "info" => Level::INFO,
                "warn" => Level::WARN,
                "error" => Level::ERROR,
                _ => {
                    eprintln!(
                        "Error with config debug level: {}, setting debug level to \"error\"",
                        level_str
                    );
                    Level::ERROR
                }
            },
            None => Level::INFO,
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
