use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use labsync_config::secrets::ElisCredentials;
use labsync_config::ElisSettings;
use labsync_schemas::{Accession, AccessionEvent};

use crate::ports::AccessionSource;

/// Fetches accession documents from the lab system over HTTP.
///
/// Credentials are resolved by the caller and passed in; do not log them.
#[derive(Debug, Clone)]
pub struct HttpAccessionSource {
    http: reqwest::Client,
    elis: ElisSettings,
    credentials: Option<ElisCredentials>,
}

impl HttpAccessionSource {
    pub fn new(settings: &ElisSettings, credentials: Option<ElisCredentials>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .context("build lab system http client failed")?;
        Ok(Self {
            http,
            elis: settings.clone(),
            credentials,
        })
    }

    /// The event content is a path relative to the lab system root.
    pub fn url_for(&self, event: &AccessionEvent) -> String {
        self.elis.accession_url(&event.content)
    }
}

#[async_trait]
impl AccessionSource for HttpAccessionSource {
    async fn fetch(&self, event: &AccessionEvent) -> Result<Accession> {
        let url = self.url_for(event);

        let mut req = self.http.get(&url).header("accept", "application/json");
        if let Some(c) = &self.credentials {
            req = req.basic_auth(&c.username, Some(&c.password));
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("lab system http error status={} url={url}", status.as_u16()));
        }

        let accession: Accession = resp
            .json()
            .await
            .with_context(|| format!("accession json decode failed url={url}"))?;
        Ok(accession)
    }
}
