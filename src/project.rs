//! Configured projects
//!
//! A project couples an annotation container with the text repository its
//! annotations point into.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;

use crate::anno::AnnoRepoClient;
use crate::config::{Config, HttpConfig, ProjectConfig};
use crate::resolver::OffsetResolver;
use crate::text::TextRepoClient;

pub struct Project {
    pub resolver: OffsetResolver,
    pub iiif_manifest: Option<String>,
}

impl Project {
    pub fn new(resolver: OffsetResolver, iiif_manifest: Option<String>) -> Self {
        Self {
            resolver,
            iiif_manifest,
        }
    }

    /// Build a project backed by AnnoRepo and TextRepo over `client`
    pub fn from_config(
        config: &ProjectConfig,
        http: &HttpConfig,
        client: reqwest::Client,
    ) -> anyhow::Result<Self> {
        let store = AnnoRepoClient::new(
            client.clone(),
            &config.annorepo.url,
            config.annorepo.api_key.clone(),
            http.retry_policy(),
        )
        .with_context(|| format!("project {}", config.name))?;
        let text = TextRepoClient::new(client, &config.textrepo.url, config.textrepo.api_key.clone());

        let resolver = OffsetResolver::new(Arc::new(store), Arc::new(text), &config.annorepo.container)
            .with_max_pages(http.max_pages);

        Ok(Self::new(resolver, config.iiif_manifest.clone()))
    }
}

/// Build every configured project, sharing one connection pool
pub fn build_projects(config: &Config) -> anyhow::Result<BTreeMap<String, Project>> {
    let client = reqwest::Client::builder()
        .timeout(config.http.timeout())
        .build()
        .context("Failed to build HTTP client")?;

    config
        .projects
        .iter()
        .map(|p| {
            tracing::debug!(
                "project {}: annorepo={} container={} textrepo={}",
                p.name,
                p.annorepo.url,
                p.annorepo.container,
                p.textrepo.url
            );
            Ok((p.name.clone(), Project::from_config(p, &config.http, client.clone())?))
        })
        .collect()
}
