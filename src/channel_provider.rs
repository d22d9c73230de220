//! A minimal `ChannelProvider` used as the server binary's default
//! backing store: channels by a fixed allow-list exist and destroy
//! trivially. A real deployment replaces this with a provider backed by
//! an actual database or directory service (§1: out of scope for this
//! crate, interface only).

use std::collections::HashSet;
use std::sync::Arc;

use service::server::{ChannelProvider, ProviderChannel};

struct StaticChannel;

impl ProviderChannel for StaticChannel {
    fn destroy(&self) {}
}

pub struct StaticChannelProvider {
    names: HashSet<String>,
}

impl StaticChannelProvider {
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }
}

impl ChannelProvider for StaticChannelProvider {
    fn create_channel(&self, name: &str) -> Option<Arc<dyn ProviderChannel>> {
        if self.names.contains(name) {
            Some(Arc::new(StaticChannel))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_channels_only_for_known_names() {
        let provider = StaticChannelProvider::new(["x".to_string()]);
        assert!(provider.create_channel("x").is_some());
        assert!(provider.create_channel("y").is_none());
    }
}
