//! Download and decryption of the connector profile
//!
//! The file reference of a setup token is resolved against the configured
//! base URL, the encrypted payload is fetched with a single GET and then
//! decrypted with the token password. Nothing is retried; every failure is
//! returned to the caller.

use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;
use zeroize::Zeroizing;

use crate::config::ConnectorConfig;
use crate::crypto::{DecryptParams, ProfileDecryptor};
use crate::error::{ConnectorError, ConnectorResult};
use crate::token::SetupToken;

/// Fetches the encrypted profile referenced by a setup token
pub struct ProfileFetch {
    token: SetupToken,
    base_url: String,
    params: DecryptParams,
    client: reqwest::Client,
    profile: Option<Zeroizing<Vec<u8>>>,
}

impl ProfileFetch {
    pub fn new(token: SetupToken, config: &ConnectorConfig) -> ConnectorResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| ConnectorError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            token,
            base_url: config.base_url.clone(),
            params: config.decrypt,
            client,
            profile: None,
        })
    }

    pub fn token(&self) -> &SetupToken {
        &self.token
    }

    /// URL the profile is requested from
    pub fn download_url(&self) -> String {
        match self.resolve_url() {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}{}", self.base_url, self.token.file_ref()),
        }
    }

    fn resolve_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)?.join(self.token.file_ref())
    }

    /// Download and decrypt the profile, keeping the plaintext in memory
    pub async fn download(&mut self) -> ConnectorResult<()> {
        let password = Zeroizing::new(self.token.key()?);

        let dl_url = self.download_url();
        let url = self.resolve_url().map_err(|e| ConnectorError::Download {
            message: format!("invalid URL ({})", e),
            url: dl_url.clone(),
        })?;

        debug!("Downloading profile from {}", dl_url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| ConnectorError::Download {
                message: e.to_string(),
                url: dl_url.clone(),
            })?;

        let body = response.text().await.map_err(|e| ConnectorError::Download {
            message: format!("failed reading response ({})", e),
            url: dl_url.clone(),
        })?;
        debug!("Received {} bytes of encoded profile", body.len());

        let decryptor = ProfileDecryptor::with_params(&password, self.params);
        let plaintext = decryptor.retrieve(&body)?;
        info!("Profile decrypted ({} bytes)", plaintext.len());

        self.profile = Some(Zeroizing::new(plaintext));
        Ok(())
    }

    pub fn is_fetched(&self) -> bool {
        self.profile.is_some()
    }

    /// Decrypted profile bytes
    pub fn plaintext(&self) -> ConnectorResult<&[u8]> {
        self.profile
            .as_deref()
            .map(|p| p.as_slice())
            .ok_or_else(|| {
                ConnectorError::InvalidState("Profile has not been downloaded".to_string())
            })
    }

    /// Decrypted profile as text
    pub fn profile(&self) -> ConnectorResult<&str> {
        std::str::from_utf8(self.plaintext()?).map_err(|e| {
            ConnectorError::InvalidParameter(format!("Profile is not valid UTF-8: {}", e))
        })
    }

    /// Write the decrypted profile to `dest`, readable by the owner only
    pub async fn save(&self, dest: &Path) -> ConnectorResult<()> {
        let profile = self.plaintext()?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(dest).await?;
        file.write_all(profile).await?;
        file.flush().await?;

        debug!("Saved profile to {:?}", dest);
        Ok(())
    }
}
