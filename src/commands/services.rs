//! Construction of the adapters a command talks to.
//!
//! Services are built from configuration values but are not part of the
//! configuration itself.

use anyhow::Result;
use log::debug;
use reqwest::Client;

use crate::{
    http::HttpClient,
    index::{PacmanDatabase, RepoAddWriter},
    query::{AurRegistry, PacmanLocal},
    runtime::Runtime,
};

use super::config::Config;

const USER_AGENT: &str = concat!("repoctl/", env!("REPOCTL_VERSION"));

/// Build the HTTP client used for registry queries
pub fn build_http_client() -> Result<HttpClient> {
    let client = Client::builder().user_agent(USER_AGENT).build()?;
    debug!("HTTP client configured with user agent {}", USER_AGENT);
    Ok(HttpClient::new(client))
}

pub fn build_registry(config: &Config) -> Result<AurRegistry> {
    Ok(AurRegistry::new(build_http_client()?, &config.aur_url))
}

pub fn build_local<'a, R: Runtime>(runtime: &'a R, config: &Config) -> PacmanLocal<'a, R> {
    PacmanLocal::new(runtime, &config.pacman_db)
}

pub fn build_reader<'a, R: Runtime>(runtime: &'a R, config: &Config) -> PacmanDatabase<'a, R> {
    PacmanDatabase::new(runtime, &config.database)
}

pub fn build_writer<'a, R: Runtime>(runtime: &'a R, config: &Config) -> RepoAddWriter<'a, R> {
    RepoAddWriter::new(runtime, &config.database)
        .with_commands(&config.add_command, &config.remove_command)
        .with_params(config.add_params.clone(), config.rm_params.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::config::{ConfigFile, Overrides};
    use crate::runtime::MockRuntime;
    use mockito::{Matcher, Server};
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn config(aur_url: &str) -> Config {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_current_dir()
            .returning(|| Ok(PathBuf::from("/")));
        let file = ConfigFile {
            repo: Some(PathBuf::from("/srv/repo/custom.db.tar.gz")),
            aur_url: Some(aur_url.to_string()),
            add_command: Some("/opt/bin/repo-add".to_string()),
            add_params: Some(vec!["--new".to_string()]),
            ..Default::default()
        };
        Config::resolve(&runtime, file, &Overrides::default()).unwrap()
    }

    #[tokio::test]
    async fn test_http_client_sends_user_agent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_header("User-Agent", Matcher::Regex("^repoctl/".to_string()))
            .create();

        let client = build_http_client().unwrap();
        let _ = client.inner().get(server.url()).send().await;

        mock.assert();
    }

    #[test]
    fn test_registry_uses_configured_url() {
        let registry = build_registry(&config("https://aur.example.org/")).unwrap();
        assert_eq!(registry.base_url(), "https://aur.example.org");
    }

    #[test]
    fn test_writer_uses_configured_command() {
        let config = config("https://aur.example.org");
        let mut runtime = MockRuntime::new();
        runtime
            .expect_run()
            .withf(|program, args| {
                program == "/opt/bin/repo-add"
                    && args
                        == [
                            OsString::from("--new"),
                            OsString::from("/srv/repo/custom.db.tar.gz"),
                            OsString::from("/srv/repo/foo-1.0-1-any.pkg.tar.zst"),
                        ]
            })
            .returning(|_, _| {
                Ok(crate::runtime::ProcessOutput {
                    code: Some(0),
                    stdout: String::new(),
                    stderr: String::new(),
                })
            });

        let writer = build_writer(&runtime, &config);
        crate::index::IndexWriter::add_entry(
            &writer,
            std::path::Path::new("/srv/repo/foo-1.0-1-any.pkg.tar.zst"),
        )
        .unwrap();
    }
}
