use pinpoint::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), PinpointError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::load()?;
    let server = PinpointServerBuilder::from_config(&config).build().await?;
    let game = server.game();
    tracing::info!(
        addr = %config.listen_addr,
        max_players = config.rooms.max_players,
        "pinpoint server starting"
    );

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = game.shutdown().await;
    Ok(())
}
