use std::sync::Arc;

use crate::{
    config::Config,
    connect::{Connector, MemoryConnector, RedisConnector},
    store::{FactStore, Storage},
};

pub struct State {
    pub config: Config,
    pub storage: Storage,
}

impl State {
    /// State with a disconnected store; [`State::connector`] brings it up.
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config,
            storage: Storage::new(),
        })
    }

    /// State around an already connected store.
    pub fn with_store(config: Config, store: Arc<dyn FactStore>) -> Arc<Self> {
        Arc::new(Self {
            config,
            storage: Storage::ready(store),
        })
    }

    pub fn connector(&self) -> Box<dyn Connector> {
        let policy = self.config.vote_policy;

        match &self.config.redis_url {
            Some(url) => Box::new(RedisConnector {
                url: url.clone(),
                policy,
            }),
            None => Box::new(MemoryConnector { policy }),
        }
    }
}
