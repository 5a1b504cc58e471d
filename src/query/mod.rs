//! Read-only lookups against the package registry and the local pacman
//! database.
//!
//! Lookups are independent per package name, so [`collect`] runs them
//! concurrently and joins every result before classification starts.

mod aur;
mod local;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::Error;

pub use aur::{AurRegistry, DEFAULT_AUR_URL};
pub use local::{DEFAULT_PACMAN_DB, PacmanLocal};

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_QUERY_CONCURRENCY: usize = 8;

/// Source of the latest published version of a package.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Registry: Send + Sync {
    /// `Ok(None)` when the registry does not know the package.
    async fn latest_version(&self, name: &str) -> Result<Option<String>>;
}

/// Versions installed on this machine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalQuery: Send + Sync {
    /// `Ok(None)` when the package is not installed.
    async fn installed_version(&self, name: &str) -> Result<Option<String>>;
}

/// What the registry said about one package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Upstream {
    #[default]
    NotQueried,
    Found(String),
    NotFound,
    /// The lookup failed or ran out of time
    Unavailable(String),
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upstream::NotQueried => write!(f, "not queried"),
            Upstream::Found(version) => write!(f, "{}", version),
            Upstream::NotFound => write!(f, "not found"),
            Upstream::Unavailable(reason) => write!(f, "unavailable ({})", reason),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_QUERY_TIMEOUT,
            concurrency: DEFAULT_QUERY_CONCURRENCY,
        }
    }
}

/// Joined results of the query phase.
#[derive(Debug, Default)]
pub struct QueryResults {
    /// Installed versions; `None` when the local database was not queried
    pub installed: Option<BTreeMap<String, String>>,
    /// Registry answer per name; names that were not queried are absent
    pub upstream: BTreeMap<String, Upstream>,
}

/// Query `registry` and `local` for every name in `names`.
///
/// Each lookup is bounded by `options.timeout`. Failures never escape: a
/// registry failure becomes [`Upstream::Unavailable`] and a failed local
/// lookup leaves the name out of the installed map.
#[tracing::instrument(skip_all, fields(names = names.len()))]
pub async fn collect(
    names: &[String],
    registry: Option<&dyn Registry>,
    local: Option<&dyn LocalQuery>,
    options: QueryOptions,
) -> QueryResults {
    let concurrency = options.concurrency.max(1);

    let upstream = async {
        let Some(registry) = registry else {
            return BTreeMap::new();
        };
        stream::iter(names.iter().cloned())
            .map(|name| async move {
                let status = query_registry(registry, &name, options.timeout).await;
                (name, status)
            })
            .buffer_unordered(concurrency)
            .collect::<BTreeMap<_, _>>()
            .await
    };

    let installed = async {
        let local = local?;
        let found = stream::iter(names.iter().cloned())
            .map(|name| async move {
                let version = query_local(local, &name, options.timeout).await;
                (name, version)
            })
            .buffer_unordered(concurrency)
            .filter_map(|(name, version)| async move { version.map(|v| (name, v)) })
            .collect::<BTreeMap<_, _>>()
            .await;
        Some(found)
    };

    let (upstream, installed) = tokio::join!(upstream, installed);
    debug!(
        "Query phase done: {} registry answer(s), {} installed",
        upstream.len(),
        installed.as_ref().map_or(0, |m| m.len())
    );
    QueryResults {
        installed,
        upstream,
    }
}

async fn query_registry(registry: &dyn Registry, name: &str, limit: Duration) -> Upstream {
    match timeout(limit, registry.latest_version(name)).await {
        Ok(Ok(Some(version))) => Upstream::Found(version),
        Ok(Ok(None)) => Upstream::NotFound,
        Ok(Err(e)) => {
            let error = Error::RegistryUnavailable {
                name: name.to_string(),
                reason: format!("{:#}", e),
            };
            debug!("{}", error);
            Upstream::Unavailable(error.to_string())
        }
        Err(_) => {
            let error = Error::QueryCancelled {
                name: name.to_string(),
                seconds: limit.as_secs(),
            };
            debug!("{}", error);
            Upstream::Unavailable(error.to_string())
        }
    }
}

async fn query_local(local: &dyn LocalQuery, name: &str, limit: Duration) -> Option<String> {
    match timeout(limit, local.installed_version(name)).await {
        Ok(Ok(version)) => version,
        Ok(Err(e)) => {
            warn!("Cannot tell whether {} is installed: {:#}", name, e);
            None
        }
        Err(_) => {
            warn!("Local query for {} cancelled after {:?}", name, limit);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test_log::test(tokio::test)]
    async fn test_collect_registry_outcomes() {
        let mut registry = MockRegistry::new();
        registry
            .expect_latest_version()
            .with(eq("found"))
            .returning(|_| Ok(Some("2.0-1".to_string())));
        registry
            .expect_latest_version()
            .with(eq("gone"))
            .returning(|_| Ok(None));
        registry
            .expect_latest_version()
            .with(eq("broken"))
            .returning(|_| Err(anyhow::anyhow!("HTTP 502")));

        let results = collect(
            &names(&["found", "gone", "broken"]),
            Some(&registry),
            None,
            QueryOptions::default(),
        )
        .await;

        assert!(results.installed.is_none());
        assert_eq!(results.upstream["found"], Upstream::Found("2.0-1".to_string()));
        assert_eq!(results.upstream["gone"], Upstream::NotFound);
        match &results.upstream["broken"] {
            Upstream::Unavailable(reason) => assert!(reason.contains("HTTP 502")),
            other => panic!("unexpected {:?}", other),
        }
    }

    struct SlowRegistry;

    #[async_trait]
    impl Registry for SlowRegistry {
        async fn latest_version(&self, name: &str) -> Result<Option<String>> {
            if name == "slow" {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(Some("1.0-1".to_string()))
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_collect_timeout_degrades_to_unavailable() {
        let options = QueryOptions {
            timeout: Duration::from_millis(100),
            concurrency: 2,
        };
        let results = collect(&names(&["slow", "fast"]), Some(&SlowRegistry), None, options).await;

        assert_eq!(results.upstream["fast"], Upstream::Found("1.0-1".to_string()));
        match &results.upstream["slow"] {
            Upstream::Unavailable(reason) => assert!(reason.contains("cancelled")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_collect_installed() {
        let mut local = MockLocalQuery::new();
        local
            .expect_installed_version()
            .with(eq("foo"))
            .returning(|_| Ok(Some("1.0-1".to_string())));
        local
            .expect_installed_version()
            .with(eq("bar"))
            .returning(|_| Ok(None));
        local
            .expect_installed_version()
            .with(eq("baz"))
            .returning(|_| Err(anyhow::anyhow!("permission denied")));

        let results = collect(
            &names(&["foo", "bar", "baz"]),
            None,
            Some(&local),
            QueryOptions::default(),
        )
        .await;

        assert!(results.upstream.is_empty());
        let installed = results.installed.unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed["foo"], "1.0-1");
    }

    #[tokio::test]
    async fn test_collect_nothing() {
        let results = collect(&[], None, None, QueryOptions::default()).await;
        assert!(results.installed.is_none());
        assert!(results.upstream.is_empty());
    }
}
