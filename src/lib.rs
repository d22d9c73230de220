pub mod channel_provider;
pub mod config;
pub mod discovery;
pub mod server;
pub mod statistics;

use std::sync::Arc;

use config::Config;

/// Opened up so integration tests (and the binary's `main`) can start the
/// server without going through the CLI, mirroring the teacher's
/// `server_main`.
pub async fn server_main(config: Arc<Config>) -> anyhow::Result<()> {
    let provider: Arc<dyn service::server::ChannelProvider> =
        Arc::new(channel_provider::StaticChannelProvider::new(Vec::new()));
    server::run(config, provider).await
}
