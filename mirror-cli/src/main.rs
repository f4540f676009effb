mod cli;
mod commands;
mod config;
mod error;
mod output;
mod server;

use crate::{
    cli::{Args, Commands},
    commands::CommandExecutor,
    config::AppConfig,
    error::Result,
};
use clap::Parser;
use colored::*;
use std::process;
use tracing::{Level, debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        error!("Application error: {}", e);
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(timeout) = args.timeout {
        config.resolver.request_timeout = timeout;
    }
    if let Some(proxy) = args.proxy {
        config.resolver.outbound_proxy = Some(mirror_resolver::config::ProxyConfig {
            url: proxy,
            username: None,
            password: None,
        });
    }
    config.resolver.validate()?;
    debug!("Loaded configuration: {:?}", config.server);

    let executor = CommandExecutor::new(config);

    match args.command {
        Commands::Resolve {
            input,
            content_id,
            name,
            privileged,
            output,
            output_file,
        } => {
            executor
                .resolve(
                    &input,
                    &content_id,
                    name,
                    privileged,
                    &output,
                    output_file.as_deref(),
                )
                .await?;
        }

        Commands::Sign { url, referer } => executor.sign(&url, referer.as_deref())?,

        Commands::Verify { token } => executor.verify(&token)?,

        Commands::Providers { detailed } => executor.list_providers(detailed)?,

        Commands::Serve { bind } => executor.serve(bind.as_deref()).await?,

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Args::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        }

        Commands::Config { show, reset } => {
            if reset {
                let path = AppConfig::reset(args.config.as_deref())?;
                println!("✓ Configuration reset to defaults at {}", path.display());
            } else if show {
                let config = AppConfig::load(args.config.as_deref())?;
                println!("{}", config.show()?);
            } else {
                println!(
                    "Use --show to display current configuration or --reset to reset to defaults"
                );
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_level(verbose).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
