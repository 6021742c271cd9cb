//! # Sources Module
//!
//! Services that turn a user-supplied URL into playable [`Track`]s.
//!
//! Every service declares which URLs it understands through
//! [`Service::matches`]. The [`ServiceRegistry`] routes a URL to the first
//! registered service that matches it; that service's answer is final, even
//! when it fails.

pub mod direct_url;
pub mod youtube;

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{audio::track::Track, user::User};

pub use direct_url::DirectUrlService;
pub use youtube::YouTubeService;

/// Trait común para todas las fuentes de música
#[async_trait]
pub trait Service: Send + Sync {
    /// Nombre de la fuente, guardado en cada track resuelto
    fn name(&self) -> &'static str;

    /// Verifica si la URL es válida para esta fuente
    fn matches(&self, url: &str) -> bool;

    /// Resolves the URL into tracks, in source order. `requester` is stamped
    /// as the submitter of every track.
    async fn resolve(&self, url: &str, requester: &User) -> anyhow::Result<Vec<Track>>;
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no service supports the URL {url}")]
    NoMatchingService { url: String },

    #[error("{service} could not resolve {url}: {cause}")]
    ResolutionFailed {
        url: String,
        service: &'static str,
        #[source]
        cause: anyhow::Error,
    },
}

/// Registro ordenado de servicios. El primero que coincide gana.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<Arc<dyn Service>>,
    timeout: Option<Duration>,
}

impl ServiceRegistry {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            services: Vec::new(),
            timeout,
        }
    }

    /// Services registered earlier take priority when patterns overlap.
    pub fn register(&mut self, service: Arc<dyn Service>) {
        info!("🔌 Servicio registrado: {}", service.name());
        self.services.push(service);
    }

    pub fn find(&self, url: &str) -> Option<&Arc<dyn Service>> {
        let url = normalize_url(url);
        self.services.iter().find(|s| s.matches(url))
    }

    /// Resolves a URL with the single service it routes to.
    pub async fn resolve(&self, url: &str, requester: &User) -> Result<Vec<Track>, ServiceError> {
        let url = normalize_url(url);
        let service = self
            .find(url)
            .ok_or_else(|| ServiceError::NoMatchingService {
                url: url.to_string(),
            })?;

        debug!("🔗 Resolviendo {} con {}", url, service.name());

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, service.resolve(url, requester)).await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("timed out after {}s", limit.as_secs())),
            },
            None => service.resolve(url, requester).await,
        };

        match result {
            Ok(tracks) => {
                info!("✅ {} resolvió {} track(s) de {}", service.name(), tracks.len(), url);
                Ok(tracks)
            }
            Err(cause) => {
                warn!("❌ {} falló resolviendo {}: {}", service.name(), url, cause);
                Err(ServiceError::ResolutionFailed {
                    url: url.to_string(),
                    service: service.name(),
                    cause,
                })
            }
        }
    }
}

/// Strips chat decorations around a URL, e.g. `<https://...>` used to suppress embeds.
pub fn normalize_url(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(trimmed)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;

    /// Servicio en memoria: URL -> tracks, o error si la URL está en `failing`.
    pub struct StaticService {
        pub name: &'static str,
        pub prefix: &'static str,
        pub tracks: HashMap<String, Vec<(String, u64)>>,
        pub failing: Vec<String>,
        pub delay: Option<Duration>,
    }

    impl StaticService {
        pub fn new(name: &'static str, prefix: &'static str) -> Self {
            Self {
                name,
                prefix,
                tracks: HashMap::new(),
                failing: Vec::new(),
                delay: None,
            }
        }

        /// Registers `url` resolving to tracks given as `(title, seconds)`.
        pub fn with(mut self, url: &str, tracks: &[(&str, u64)]) -> Self {
            self.tracks.insert(
                url.to_string(),
                tracks.iter().map(|(t, d)| (t.to_string(), *d)).collect(),
            );
            self
        }

        pub fn failing(mut self, url: &str) -> Self {
            self.failing.push(url.to_string());
            self
        }
    }

    #[async_trait]
    impl Service for StaticService {
        fn name(&self) -> &'static str {
            self.name
        }

        fn matches(&self, url: &str) -> bool {
            url.starts_with(self.prefix)
        }

        async fn resolve(&self, url: &str, requester: &User) -> anyhow::Result<Vec<Track>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.iter().any(|u| u == url) {
                anyhow::bail!("simulated failure");
            }

            let entries = self
                .tracks
                .get(url)
                .ok_or_else(|| anyhow::anyhow!("not found"))?;

            Ok(entries
                .iter()
                .enumerate()
                .map(|(i, (title, secs))| {
                    Track::new(format!("{url}#{i}"), url, title.as_str(), self.name, &requester.name)
                        .with_duration(Duration::from_secs(*secs))
                })
                .collect())
        }
    }
}
