//! Configuration management for Broccoli

use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::anno::RetryPolicy;
use crate::resolver::DEFAULT_MAX_PAGES;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub http: HttpConfig,
    pub projects: Vec<ProjectConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub external_base_url: Option<String>,
}

/// Upstream client settings shared by all projects
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Total attempts for idempotent AnnoRepo calls
    pub retries: u32,
    pub backoff_ms: u64,
    /// Bound on pages walked per range query
    pub max_pages: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub annorepo: AnnoRepoConfig,
    pub textrepo: TextRepoConfig,
    /// Manifest URL template; `{bodyId}` is substituted
    pub iiif_manifest: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnoRepoConfig {
    pub url: String,
    pub container: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextRepoConfig {
    pub url: String,
    pub api_key: Option<String>,
}

/// Every variable `from_env` reads outside the per-project ones
const ENVIRONMENT_VARIABLES: &[&str] = &[
    "BR_SERVER_HOST",
    "BR_SERVER_PORT",
    "BR_EXTERNAL_BASE_URL",
    "BR_HTTP_TIMEOUT_SECS",
    "BR_HTTP_RETRIES",
    "BR_HTTP_BACKOFF_MS",
    "BR_MAX_PAGES",
    "BR_PROJECTS",
];

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                external_base_url: None,
            },
            http: HttpConfig::default(),
            projects: vec![ProjectConfig::republic()],
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_secs: 30,
            retries: 3,
            backoff_ms: 200,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retries.max(1),
            base_delay: Duration::from_millis(self.backoff_ms),
        }
    }
}

impl Config {
    /// Load from `BR_` environment variables.
    ///
    /// Without `BR_PROJECTS` the republic project is served; once projects
    /// are named, each one's required variables must be set.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Config::default();

        let projects = match lookup("BR_PROJECTS") {
            None => {
                tracing::warn!("BR_PROJECTS not set, serving the default republic project");
                defaults.projects
            }
            Some(names) => {
                let names: Vec<&str> = names
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .collect();
                if names.is_empty() {
                    bail!("BR_PROJECTS is set but names no projects");
                }
                names
                    .into_iter()
                    .map(|name| ProjectConfig::from_lookup(name, &lookup))
                    .collect::<anyhow::Result<Vec<_>>>()?
            }
        };

        Ok(Config {
            server: ServerConfig {
                host: lookup("BR_SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_or(&lookup, "BR_SERVER_PORT", defaults.server.port),
                external_base_url: lookup("BR_EXTERNAL_BASE_URL"),
            },
            http: HttpConfig {
                timeout_secs: parse_or(&lookup, "BR_HTTP_TIMEOUT_SECS", defaults.http.timeout_secs),
                retries: parse_or(&lookup, "BR_HTTP_RETRIES", defaults.http.retries),
                backoff_ms: parse_or(&lookup, "BR_HTTP_BACKOFF_MS", defaults.http.backoff_ms),
                max_pages: parse_or(&lookup, "BR_MAX_PAGES", defaults.http.max_pages),
            },
            projects,
        })
    }

    /// Log every known variable, masking credentials
    pub fn log_environment(&self) {
        let mut names: Vec<String> = ENVIRONMENT_VARIABLES.iter().map(|s| s.to_string()).collect();
        for project in &self.projects {
            names.extend(project_variables(&project.name));
        }

        let report = names
            .iter()
            .map(|name| {
                let value = match env::var(name) {
                    Ok(_) if name.ends_with("_API_KEY") => "********".to_string(),
                    Ok(value) => value,
                    Err(_) => "(not set, using default)".to_string(),
                };
                format!(" {}:\t{}", name, value)
            })
            .collect::<Vec<_>>()
            .join("\n");

        tracing::info!("BR_ environment variables:\n\n{}\n", report);
    }
}

impl ProjectConfig {
    fn republic() -> Self {
        ProjectConfig {
            name: "republic".to_string(),
            annorepo: AnnoRepoConfig {
                url: "https://annorepo.republic-caf.diginfra.org".to_string(),
                container: "volume-1728-7".to_string(),
                api_key: None,
            },
            textrepo: TextRepoConfig {
                url: "https://textrepo.republic-caf.diginfra.org".to_string(),
                api_key: None,
            },
            iiif_manifest: None,
        }
    }

    fn from_lookup(name: &str, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let optional = |suffix: &str| lookup(&project_var(name, suffix));
        let required = |suffix: &str| {
            let var = project_var(name, suffix);
            lookup(&var).with_context(|| format!("project '{}' requires {}", name, var))
        };

        Ok(ProjectConfig {
            name: name.to_string(),
            annorepo: AnnoRepoConfig {
                url: required("ANNOREPO_URL")?,
                container: required("ANNOREPO_CONTAINER")?,
                api_key: optional("ANNOREPO_API_KEY"),
            },
            textrepo: TextRepoConfig {
                url: required("TEXTREPO_URL")?,
                api_key: optional("TEXTREPO_API_KEY"),
            },
            iiif_manifest: optional("IIIF_MANIFEST"),
        })
    }
}

/// `BR_<PROJECT>_<SUFFIX>` with the project name upper-cased
fn project_var(project: &str, suffix: &str) -> String {
    format!("BR_{}_{}", project.to_uppercase().replace('-', "_"), suffix)
}

fn project_variables(project: &str) -> Vec<String> {
    [
        "ANNOREPO_URL",
        "ANNOREPO_CONTAINER",
        "ANNOREPO_API_KEY",
        "TEXTREPO_URL",
        "TEXTREPO_API_KEY",
        "IIIF_MANIFEST",
    ]
    .iter()
    .map(|suffix| project_var(project, suffix))
    .collect()
}

/// Parse an optional variable, falling back on absence or garbage
fn parse_or<T>(lookup: impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("ignoring unparsable {}={:?}, using {}", name, raw, default);
            default
        }),
    }
}
