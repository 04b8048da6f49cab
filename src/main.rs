use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use twisted_board_watcher::{
    config::Config,
    fetch::{build_client, HttpFetcher},
    notify::DiscordNotifier,
    run_watcher, Watcher,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let config = Config::parse();
    let client = build_client()?;

    let watcher = Watcher::new(
        HttpFetcher::new(client.clone()),
        DiscordNotifier::new(client, config.discord_token.clone(), config.channel_id),
        config.board_url.clone(),
        config.mentions(),
    );

    info!(
        "Watching {} for channel {}",
        config.board_url, config.channel_id
    );

    if config.once {
        let mut watcher = watcher;
        let outcome = watcher.check().await;
        info!("Check finished: {:?}", outcome);
        return Ok(());
    }

    tokio::select! {
        _ = run_watcher(watcher) => {}
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    Ok(())
}
