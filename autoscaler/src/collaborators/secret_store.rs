use std::collections::HashMap;

use tokio::sync::OnceCell;

use crate::util::Error;

/// Consulted at cold start and cached for the process lifetime; rotation
/// requires a restart or an explicit `invalidate`.
pub struct SecretStore {
    client: reqwest::Client,
    base_url: String,
    cache: OnceCell<HashMap<String, String>>,
}

impl SecretStore {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            cache: OnceCell::new(),
        }
    }

    async fn load(&self) -> Result<HashMap<String, String>, Error> {
        let url = format!("{}/secrets", self.base_url);
        let map: HashMap<String, String> = self.client.get(&url).send().await?.error_for_status()?.json().await?;
        Ok(map)
    }

    pub async fn get(&self, name: &str) -> Result<Option<String>, Error> {
        let cache = self.cache.get_or_try_init(|| self.load()).await?;
        Ok(cache.get(name).cloned())
    }
}
