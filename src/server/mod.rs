pub mod session;
pub mod tcp;
pub mod udp;

use std::sync::Arc;

use service::security::{AnonymousPlugin, CaPlugin, PluginRegistry};
use service::server::ChannelProvider;

use crate::config::Config;
use crate::discovery::Discovery;
use crate::statistics::Statistics;

/// Default plugin set every deployment gets for free (§4.10).
fn default_plugins() -> Arc<PluginRegistry> {
    let registry = PluginRegistry::new();
    registry.add(0, Arc::new(AnonymousPlugin));
    registry.add(10, Arc::new(CaPlugin));
    Arc::new(registry)
}

/// Binds the TCP and UDP listeners and runs until either errors out.
/// Mirrors the teacher's `server_main`: one call that starts every
/// transport and returns only on failure.
pub async fn run(config: Arc<Config>, provider: Arc<dyn ChannelProvider>) -> anyhow::Result<()> {
    let statistics = Statistics::new();
    let discovery = Arc::new(Discovery::new());
    let plugins = default_plugins();

    // `addr_list`/`auto_addr_list` are client-side search targets (§6); the
    // server's own TCP bind port is the conventional pvAccess one.
    let tcp_addr: std::net::SocketAddr = ([0, 0, 0, 0], 5075).into();
    let udp_addr: std::net::SocketAddr = ([0, 0, 0, 0], config.net.broadcast_port).into();

    let tcp = tokio::spawn(tcp::listen(
        tcp_addr,
        provider,
        plugins,
        statistics,
        config.net.max_array_bytes.min(1 << 20),
    ));

    let beacon_period = std::time::Duration::from_secs(config.net.beacon_period_secs);
    let udp = tokio::spawn(udp::listen(udp_addr, discovery, beacon_period, "tcp"));

    tokio::select! {
        result = tcp => result??,
        result = udp => result??,
    }

    Ok(())
}
