//! TCP transport: accepts connections and drives one `Session` per
//! socket, grounded on the accept-then-spawn-then-select loop the
//! teacher's TCP listener uses.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use service::error::Error as ServiceError;
use service::security::PluginRegistry;
use service::server::ChannelProvider;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::server::session::Session;
use crate::statistics::Statistics;

pub async fn listen(
    addr: SocketAddr,
    provider: Arc<dyn ChannelProvider>,
    plugins: Arc<PluginRegistry>,
    statistics: Statistics,
    max_segment_payload: usize,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    log::info!("pva server listening: listen={local_addr}, transport=TCP");

    loop {
        let (mut socket, remote) = listener.accept().await?;
        let provider = provider.clone();
        let plugins = plugins.clone();
        let reporter = statistics.get_reporter(remote);

        if let Err(e) = socket.set_nodelay(true) {
            log::warn!("tcp socket set nodelay failed: addr={remote}, err={e}");
        }

        tokio::spawn(async move {
            log::info!("tcp socket accept: addr={remote}");

            let mut session = Session::new(remote, provider, plugins, reporter.clone(), max_segment_payload);
            match session.on_socket_open() {
                Ok(bytes) => {
                    if socket.write_all(&bytes).await.is_err() {
                        return;
                    }
                    reporter.add_sent(bytes.len());
                }
                Err(_) => return,
            }

            let mut buffer = BytesMut::zeroed(max_segment_payload);
            loop {
                let size = match socket.read(&mut buffer).await {
                    Ok(0) => break,
                    Ok(size) => size,
                    Err(e) => {
                        log::warn!("tcp socket read error: addr={remote}, err={e}");
                        break;
                    }
                };
                reporter.add_received(size);

                let outbound = match session.on_bytes(&buffer[..size]) {
                    Ok(outbound) => outbound,
                    Err(err) => {
                        log::warn!("tcp socket protocol error: addr={remote}, err={err}");
                        if matches!(err, ServiceError::InvalidDataStream | ServiceError::ConnectionClosed) {
                            break;
                        }
                        continue;
                    }
                };

                for frame in outbound {
                    if socket.write_all(&frame).await.is_err() {
                        break;
                    }
                    reporter.add_sent(frame.len());
                }

                if session.is_closed() {
                    break;
                }
            }

            session.on_disconnect();
            statistics.remove(remote);
            log::info!("tcp socket disconnect: addr={remote}");
        });
    }
}
