use clap::Parser;
use memocall::cli::{Cli, Commands};
use memocall::types::config::Config;
use memocall::MemoResult;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> MemoResult<()> {
    let cli = Cli::parse();

    // Load configuration first (no logging yet)
    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default_config()
    };

    // Determine log level: CLI flags take precedence over config
    let log_level = if cli.quiet {
        "error".to_string()
    } else if cli.verbose {
        "debug".to_string()
    } else {
        config.general.log_level.clone()
    };

    let filter = EnvFilter::from_default_env().add_directive(
        format!("memocall={}", log_level)
            .parse()
            .unwrap_or_else(|_| "memocall=info".parse().expect("fallback directive is valid")),
    );

    if config.general.log_format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    tracing::debug!("Configuration loaded from: {}", cli.config.display());

    match cli.command {
        Commands::Init { path } => {
            memocall::cli::commands::init(path).await?;
        }
        Commands::Fib { n } => {
            memocall::cli::commands::fib(n, &config)?;
        }
        Commands::Square { values } => {
            memocall::cli::commands::square(&values, &config)?;
        }
        Commands::Stress { callers, delay_ms } => {
            memocall::cli::commands::stress(callers, delay_ms, &config).await?;
        }
        Commands::Config => {
            memocall::cli::commands::config_cmd(&config)?;
        }
        Commands::Version => {
            memocall::cli::commands::version();
        }
    }

    Ok(())
}
