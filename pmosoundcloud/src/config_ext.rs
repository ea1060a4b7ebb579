//! Extension pour intégrer SoundCloud dans pmoconfig
//!
//! Keys live under `sources.soundcloud.*`. Getters persist their default
//! when the key is missing.
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmosoundcloud::SoundCloudConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let client = get_config().get_soundcloud_client_builder()?.build()?;
//! println!("Using {}", client.base_url());
//! # Ok(())
//! # }
//! ```

use crate::client::{ClientBuilder, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::Value;
use std::time::Duration;

/// Trait d'extension pour gérer la configuration SoundCloud dans pmoconfig
pub trait SoundCloudConfigExt {
    /// Configured client id, `None` when empty
    fn get_soundcloud_client_id(&self) -> Result<Option<String>>;

    fn set_soundcloud_client_id(&self, client_id: &str) -> Result<()>;

    fn get_soundcloud_api_base_url(&self) -> Result<String>;

    fn set_soundcloud_api_base_url(&self, url: &str) -> Result<()>;

    fn get_soundcloud_timeout_secs(&self) -> Result<u64>;

    fn set_soundcloud_timeout_secs(&self, secs: u64) -> Result<()>;

    /// Client builder pre-filled from the configuration
    fn get_soundcloud_client_builder(&self) -> Result<ClientBuilder>;
}

impl SoundCloudConfigExt for Config {
    fn get_soundcloud_client_id(&self) -> Result<Option<String>> {
        let id = self.get_string_or(&["sources", "soundcloud", "client_id"], "")?;
        Ok(Some(id).filter(|id| !id.trim().is_empty()))
    }

    fn set_soundcloud_client_id(&self, client_id: &str) -> Result<()> {
        self.set_value(
            &["sources", "soundcloud", "client_id"],
            Value::String(client_id.to_string()),
        )
    }

    fn get_soundcloud_api_base_url(&self) -> Result<String> {
        self.get_string_or(&["sources", "soundcloud", "api_base_url"], DEFAULT_BASE_URL)
    }

    fn set_soundcloud_api_base_url(&self, url: &str) -> Result<()> {
        self.set_value(
            &["sources", "soundcloud", "api_base_url"],
            Value::String(url.to_string()),
        )
    }

    fn get_soundcloud_timeout_secs(&self) -> Result<u64> {
        self.get_u64_or(
            &["sources", "soundcloud", "timeout_secs"],
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )
    }

    fn set_soundcloud_timeout_secs(&self, secs: u64) -> Result<()> {
        self.set_u64(&["sources", "soundcloud", "timeout_secs"], secs)
    }

    fn get_soundcloud_client_builder(&self) -> Result<ClientBuilder> {
        let mut builder = ClientBuilder::new()
            .base_url(self.get_soundcloud_api_base_url()?)
            .timeout(Duration::from_secs(self.get_soundcloud_timeout_secs()?));
        if let Some(id) = self.get_soundcloud_client_id()? {
            builder = builder.client_id(id);
        }
        Ok(builder)
    }
}
