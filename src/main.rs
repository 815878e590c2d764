//! vidscribe CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vidscribe::cli::{commands, Cli, Commands};
use vidscribe::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = Settings::load_from(cli.config.as_ref())?;

    // Initialize logging; -v flags win over the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vidscribe={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    match cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings, cli.config.as_ref()).await?;
        }

        Commands::Transcribe { input, model, format, output } => {
            commands::run_transcribe(&input, model.as_deref(), format.as_deref(), output, settings).await?;
        }

        Commands::Search { query, video, limit, min_score } => {
            commands::run_search(&query, video, limit, min_score, settings).await?;
        }

        Commands::List { limit, offset } => {
            commands::run_list(limit, offset, settings).await?;
        }

        Commands::Show { video_id, format, output } => {
            commands::run_show(&video_id, &format, output, settings).await?;
        }

        Commands::Delete { video_id } => {
            commands::run_delete(&video_id, settings).await?;
        }

        Commands::Reprocess { video_id, model } => {
            commands::run_reprocess(&video_id, model.as_deref(), settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, cli.config.as_ref(), settings)?;
        }
    }

    Ok(())
}
