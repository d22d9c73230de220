use std::sync::Arc;

use pva_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::load()?);
    let level: log::Level = config.log.level.parse().unwrap_or(log::Level::Info);
    simple_logger::init_with_level(level)?;

    if config.debug {
        log::debug!("starting with config: {config:?}");
    }

    pva_server::server_main(config).await
}
