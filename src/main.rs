use anyhow::Context;
use clap::Parser;
use pipeline_lsp::{
    Engine,
    cli::{Cli, Commands},
    commands,
    config::ServerConfig,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::from_env();
    telemetry::init_tracing(config.log_format);

    match cli.command {
        Commands::Serve { port } => {
            commands::execute_serve(&config, port)
                .await
                .context("language server failed")?;
        }
        Commands::Check { files, task, json } => {
            let engine = Engine::new(config.providers());
            let has_errors = tokio::task::spawn_blocking(move || {
                commands::execute_check(&engine, &files, task, json)
            })
            .await??;
            if has_errors {
                std::process::exit(1);
            }
        }
        Commands::Outline { file, task } => {
            commands::execute_outline(&Engine::default(), &file, task)
                .with_context(|| format!("cannot outline {}", file.display()))?;
        }
    }

    Ok(())
}
