//! Security plugin registries (§4.10): client and server each keep a
//! priority+name keyed table of authentication plugins, plus the two
//! built-ins every deployment gets for free.

use std::sync::Arc;

use parking_lot::RwLock;

/// What the transport learns about the remote peer once a plugin
/// completes authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub identity: String,
    pub identified: bool,
    pub host: Option<String>,
}

impl PeerInfo {
    pub fn anonymous() -> Self {
        Self {
            identity: "anonymous".to_string(),
            identified: false,
            host: None,
        }
    }
}

/// Completion callback a plugin session uses to signal the transport,
/// possibly after several `AUTHNZ` round trips.
pub trait SecurityControl: Send + Sync {
    fn authentication_completed(&self, status: Result<(), String>, peer: PeerInfo);
}

/// One authentication attempt's state, created per-connection by a
/// `SecurityPlugin`.
pub trait SecuritySession: Send + Sync {
    /// Bytes to embed in the transport's validation reply (or a
    /// subsequent `AUTHNZ` message), if the plugin has more to send.
    fn initialization_data(&self) -> Option<Vec<u8>> {
        None
    }

    /// Feed an `AUTHNZ` round trip's payload from the peer into the
    /// session. Plugins that complete in one step can ignore this.
    fn process_authnz(&mut self, _control: &dyn SecurityControl, _data: &[u8]) {}
}

pub trait SecurityPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn create_session(
        &self,
        peer_address: std::net::SocketAddr,
        control: Arc<dyn SecurityControl>,
        init_data: &[u8],
    ) -> Box<dyn SecuritySession>;
}

struct Entry {
    priority: i32,
    plugin: Arc<dyn SecurityPlugin>,
}

/// Priority+name keyed registry of plugins, shared by the client and
/// server sides (§4.10).
#[derive(Default)]
pub struct PluginRegistry {
    entries: RwLock<Vec<Entry>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, priority: i32, plugin: Arc<dyn SecurityPlugin>) {
        let mut entries = self.entries.write();
        entries.push(Entry { priority, plugin });
        entries.sort_by_key(|entry| entry.priority);
    }

    pub fn remove(&self, name: &str) {
        self.entries.write().retain(|entry| entry.plugin.name() != name);
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn SecurityPlugin>> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.plugin.name() == name)
            .map(|entry| entry.plugin.clone())
    }

    /// Names in priority order, as offered to the peer in a
    /// connection-validation-request.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.plugin.name().to_string())
            .collect()
    }
}

/// No credentials; peer identified as `"anonymous"`, `identified = false`.
pub struct AnonymousPlugin;

struct AnonymousSession;

impl SecuritySession for AnonymousSession {}

impl SecurityPlugin for AnonymousPlugin {
    fn name(&self) -> &str {
        "anonymous"
    }

    fn create_session(
        &self,
        _peer_address: std::net::SocketAddr,
        control: Arc<dyn SecurityControl>,
        _init_data: &[u8],
    ) -> Box<dyn SecuritySession> {
        control.authentication_completed(Ok(()), PeerInfo::anonymous());
        Box::new(AnonymousSession)
    }
}

/// Sends `{user, host}` as init data; the server copies it into the
/// peer-info structure, `identified = true`.
pub struct CaPlugin;

struct CaSession;

impl SecuritySession for CaSession {}

impl SecurityPlugin for CaPlugin {
    fn name(&self) -> &str {
        "ca"
    }

    fn create_session(
        &self,
        _peer_address: std::net::SocketAddr,
        control: Arc<dyn SecurityControl>,
        init_data: &[u8],
    ) -> Box<dyn SecuritySession> {
        let text = String::from_utf8_lossy(init_data);
        let mut parts = text.splitn(2, '@');
        let user = parts.next().unwrap_or_default().to_string();
        let host = parts.next().map(str::to_string);
        control.authentication_completed(
            Ok(()),
            PeerInfo {
                identity: user,
                identified: true,
                host,
            },
        );
        Box::new(CaSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingControl(Mutex<Option<(Result<(), String>, PeerInfo)>>);

    impl SecurityControl for RecordingControl {
        fn authentication_completed(&self, status: Result<(), String>, peer: PeerInfo) {
            *self.0.lock().unwrap() = Some((status, peer));
        }
    }

    #[test]
    fn registry_orders_by_priority() {
        let registry = PluginRegistry::new();
        registry.add(10, Arc::new(CaPlugin));
        registry.add(1, Arc::new(AnonymousPlugin));
        assert_eq!(registry.snapshot(), vec!["anonymous", "ca"]);
    }

    #[test]
    fn anonymous_plugin_completes_unidentified() {
        let control = Arc::new(RecordingControl(Mutex::new(None)));
        let plugin = AnonymousPlugin;
        let _session = plugin.create_session(
            "127.0.0.1:1".parse().unwrap(),
            control.clone(),
            &[],
        );
        let (status, peer) = control.0.lock().unwrap().take().unwrap();
        assert!(status.is_ok());
        assert!(!peer.identified);
        assert_eq!(peer.identity, "anonymous");
    }

    #[test]
    fn ca_plugin_parses_user_and_host() {
        let control = Arc::new(RecordingControl(Mutex::new(None)));
        let plugin = CaPlugin;
        let _session = plugin.create_session(
            "127.0.0.1:1".parse().unwrap(),
            control.clone(),
            b"alice@host.example",
        );
        let (status, peer) = control.0.lock().unwrap().take().unwrap();
        assert!(status.is_ok());
        assert!(peer.identified);
        assert_eq!(peer.identity, "alice");
        assert_eq!(peer.host.as_deref(), Some("host.example"));
    }

    #[test]
    fn remove_drops_plugin_by_name() {
        let registry = PluginRegistry::new();
        registry.add(1, Arc::new(AnonymousPlugin));
        registry.remove("anonymous");
        assert!(registry.lookup("anonymous").is_none());
    }
}
