use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    error::Error,
    index::{DEFAULT_ADD_COMMAND, DEFAULT_REMOVE_COMMAND, repository_name},
    query::{
        DEFAULT_AUR_URL, DEFAULT_PACMAN_DB, DEFAULT_QUERY_CONCURRENCY, DEFAULT_QUERY_TIMEOUT,
        QueryOptions,
    },
    repo::{ImportMode, Policy},
    runtime::Runtime,
};

/// Directory name under the user's configuration directory
const CONFIG_DIR_NAME: &str = "repoctl";
const CONFIG_FILE_NAME: &str = "config.toml";
/// Backup directory used when `backup_dir` is not set, relative to the repository
const DEFAULT_BACKUP_DIR: &str = "backup";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Path to the repository database, e.g. `/srv/repo/custom.db.tar.gz`
    pub repo: Option<PathBuf>,
    pub add_params: Option<Vec<String>>,
    pub rm_params: Option<Vec<String>>,
    pub add_command: Option<String>,
    pub remove_command: Option<String>,
    pub backup_dir: Option<PathBuf>,
    pub aur_url: Option<String>,
    pub pacman_db: Option<PathBuf>,
    pub query_timeout_secs: Option<u64>,
    pub query_concurrency: Option<usize>,
    pub interactive: Option<bool>,
    pub backup: Option<bool>,
}

impl ConfigFile {
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("{}: {}", origin.display(), e)).into())
    }

    #[tracing::instrument(skip(runtime))]
    fn read<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content, path)
    }
}

/// Values given on the command line or through the environment.
///
/// Flags only ever switch behavior on; a flag left off defers to the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub repo: Option<PathBuf>,
    pub quiet: bool,
    pub columns: bool,
    pub interactive: bool,
    pub backup: bool,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: PathBuf,
    pub repo_dir: PathBuf,
    pub add_command: String,
    pub remove_command: String,
    pub add_params: Vec<String>,
    pub rm_params: Vec<String>,
    pub backup_dir: PathBuf,
    pub backup: bool,
    pub interactive: bool,
    pub aur_url: String,
    pub pacman_db: PathBuf,
    pub query: QueryOptions,
    pub quiet: bool,
    pub columns: bool,
}

impl Config {
    /// Load the config file and apply `overrides` on top of it.
    ///
    /// An explicitly named file must exist; the default one is optional.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, overrides: &Overrides) -> Result<Self> {
        let file = match &overrides.config {
            Some(path) => {
                if !runtime.exists(path) {
                    return Err(Error::Config(format!(
                        "config file {} does not exist",
                        path.display()
                    ))
                    .into());
                }
                ConfigFile::read(runtime, path)?
            }
            None => match default_config_path(runtime) {
                Some(path) if runtime.exists(&path) => ConfigFile::read(runtime, &path)?,
                Some(path) => {
                    debug!("No config file at {:?}, using defaults", path);
                    ConfigFile::default()
                }
                None => ConfigFile::default(),
            },
        };
        Self::resolve(runtime, file, overrides)
    }

    pub fn resolve<R: Runtime>(
        runtime: &R,
        file: ConfigFile,
        overrides: &Overrides,
    ) -> Result<Self> {
        let repo = overrides.repo.clone().or(file.repo).ok_or_else(|| {
            Error::Config(
                "no repository configured; set `repo` in the config file or pass --repo"
                    .to_string(),
            )
        })?;
        let cwd = runtime.current_dir()?;
        let database = absolute(runtime, &cwd, &repo);
        if repository_name(&database).is_none() {
            return Err(Error::Config(format!(
                "{} does not name a repository database (expected <repo>.db.tar.*)",
                database.display()
            ))
            .into());
        }
        let repo_dir = database
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone());

        let backup_dir = match file.backup_dir {
            Some(dir) => absolute(runtime, &repo_dir, &dir),
            None => repo_dir.join(DEFAULT_BACKUP_DIR),
        };

        let timeout = match file.query_timeout_secs {
            Some(0) => {
                return Err(Error::Config("query_timeout_secs must be positive".into()).into());
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_QUERY_TIMEOUT,
        };
        let concurrency = match file.query_concurrency {
            Some(0) => {
                return Err(Error::Config("query_concurrency must be positive".into()).into());
            }
            Some(n) => n,
            None => DEFAULT_QUERY_CONCURRENCY,
        };

        let config = Self {
            database,
            repo_dir,
            add_command: file
                .add_command
                .unwrap_or_else(|| DEFAULT_ADD_COMMAND.to_string()),
            remove_command: file
                .remove_command
                .unwrap_or_else(|| DEFAULT_REMOVE_COMMAND.to_string()),
            add_params: file.add_params.unwrap_or_default(),
            rm_params: file.rm_params.unwrap_or_default(),
            backup_dir,
            backup: overrides.backup || file.backup.unwrap_or(false),
            interactive: overrides.interactive || file.interactive.unwrap_or(false),
            aur_url: file.aur_url.unwrap_or_else(|| DEFAULT_AUR_URL.to_string()),
            pacman_db: file
                .pacman_db
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PACMAN_DB)),
            query: QueryOptions {
                timeout,
                concurrency,
            },
            quiet: overrides.quiet,
            columns: overrides.columns,
        };
        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }

    /// Name of the repository, from the database filename.
    pub fn repo_name(&self) -> &str {
        repository_name(&self.database).unwrap_or_default()
    }

    pub fn policy(&self, import_mode: ImportMode) -> Policy {
        Policy {
            backup_dir: self.backup.then(|| self.backup_dir.clone()),
            interactive: self.interactive,
            import_mode,
        }
    }
}

/// `$XDG_CONFIG_HOME/repoctl/config.toml` or the platform equivalent.
pub fn default_config_path<R: Runtime>(runtime: &R) -> Option<PathBuf> {
    runtime
        .config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Expand a leading `~/` and anchor relative paths at `base`.
fn absolute<R: Runtime>(runtime: &R, base: &Path, path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Ok(home) = runtime.env_var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    fn runtime_in(cwd: &'static str) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_current_dir()
            .returning(move || Ok(PathBuf::from(cwd)));
        runtime
            .expect_env_var()
            .with(eq("HOME"))
            .returning(|_| Ok("/home/user".to_string()));
        runtime
    }

    #[test]
    fn test_parse_all_keys() {
        let file = ConfigFile::parse(
            r#"
repo = "/srv/repo/custom.db.tar.gz"
add_params = ["--sign"]
rm_params = ["--verify"]
add_command = "/usr/bin/repo-add"
remove_command = "/usr/bin/repo-remove"
backup_dir = "old"
aur_url = "https://aur.example.org"
pacman_db = "/tmp/pacman/local"
query_timeout_secs = 3
query_concurrency = 2
interactive = true
backup = true
"#,
            Path::new("config.toml"),
        )
        .unwrap();

        assert_eq!(file.repo, Some(PathBuf::from("/srv/repo/custom.db.tar.gz")));
        assert_eq!(file.add_params, Some(vec!["--sign".to_string()]));
        assert_eq!(file.query_timeout_secs, Some(3));
        assert_eq!(file.backup, Some(true));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ConfigFile::parse("colour = true\n", Path::new("/etc/repoctl.toml")).unwrap_err();
        let typed = err.downcast_ref::<Error>().unwrap();
        assert!(matches!(typed, Error::Config(msg) if msg.contains("colour")));
    }

    #[test]
    fn test_defaults() {
        let runtime = runtime_in("/");
        let file = ConfigFile {
            repo: Some(PathBuf::from("/srv/repo/custom.db.tar.zst")),
            ..Default::default()
        };
        let config = Config::resolve(&runtime, file, &Overrides::default()).unwrap();

        assert_eq!(config.repo_dir, PathBuf::from("/srv/repo"));
        assert_eq!(config.repo_name(), "custom");
        assert_eq!(config.backup_dir, PathBuf::from("/srv/repo/backup"));
        assert_eq!(config.add_command, "repo-add");
        assert_eq!(config.remove_command, "repo-remove");
        assert_eq!(config.aur_url, DEFAULT_AUR_URL);
        assert_eq!(config.pacman_db, PathBuf::from(DEFAULT_PACMAN_DB));
        assert_eq!(config.query.timeout, DEFAULT_QUERY_TIMEOUT);
        assert!(!config.backup);
        assert!(config.policy(ImportMode::Copy).backup_dir.is_none());
    }

    #[test]
    fn test_flags_override_file() {
        let runtime = runtime_in("/home/user/build");
        let file = ConfigFile {
            repo: Some(PathBuf::from("/srv/repo/custom.db.tar.gz")),
            backup_dir: Some(PathBuf::from("~/repo-backup")),
            ..Default::default()
        };
        let overrides = Overrides {
            repo: Some(PathBuf::from("local/test.db.tar.gz")),
            backup: true,
            interactive: true,
            ..Default::default()
        };
        let config = Config::resolve(&runtime, file, &overrides).unwrap();

        assert_eq!(
            config.database,
            PathBuf::from("/home/user/build/local/test.db.tar.gz")
        );
        assert_eq!(config.repo_dir, PathBuf::from("/home/user/build/local"));
        assert!(config.interactive);
        let policy = config.policy(ImportMode::Move);
        assert_eq!(policy.backup_dir, Some(PathBuf::from("/home/user/repo-backup")));
        assert_eq!(policy.import_mode, ImportMode::Move);
    }

    #[test]
    fn test_missing_repo_is_config_error() {
        let runtime = runtime_in("/");
        let err = Config::resolve(&runtime, ConfigFile::default(), &Overrides::default())
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));
    }

    #[test]
    fn test_repo_must_name_database() {
        let runtime = runtime_in("/");
        let overrides = Overrides {
            repo: Some(PathBuf::from("/srv/repo")),
            ..Default::default()
        };
        let err = Config::resolve(&runtime, ConfigFile::default(), &overrides).unwrap_err();
        assert!(err.to_string().contains("does not name a repository database"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let runtime = runtime_in("/");
        let file = ConfigFile {
            repo: Some(PathBuf::from("/srv/repo/custom.db.tar.gz")),
            query_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(Config::resolve(&runtime, file, &Overrides::default()).is_err());
    }

    #[test]
    fn test_load_default_file() {
        let mut runtime = runtime_in("/");
        let path = PathBuf::from("/home/user/.config/repoctl/config.toml");
        runtime
            .expect_config_dir()
            .returning(|| Some(PathBuf::from("/home/user/.config")));
        runtime
            .expect_exists()
            .with(eq(path.clone()))
            .returning(|_| true);
        runtime
            .expect_read_to_string()
            .with(eq(path))
            .returning(|_| Ok("repo = \"/srv/repo/custom.db.tar.gz\"\nbackup = true\n".into()));

        let config = Config::load(&runtime, &Overrides::default()).unwrap();
        assert_eq!(config.database, PathBuf::from("/srv/repo/custom.db.tar.gz"));
        assert!(config.backup);
    }

    #[test]
    fn test_missing_default_file_is_fine() {
        let mut runtime = runtime_in("/");
        runtime
            .expect_config_dir()
            .returning(|| Some(PathBuf::from("/home/user/.config")));
        runtime.expect_exists().returning(|_| false);

        let overrides = Overrides {
            repo: Some(PathBuf::from("/srv/repo/custom.db.tar.gz")),
            ..Default::default()
        };
        assert!(Config::load(&runtime, &overrides).is_ok());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let mut runtime = runtime_in("/");
        runtime.expect_exists().returning(|_| false);

        let overrides = Overrides {
            config: Some(PathBuf::from("/nowhere/config.toml")),
            repo: Some(PathBuf::from("/srv/repo/custom.db.tar.gz")),
            ..Default::default()
        };
        let err = Config::load(&runtime, &overrides).unwrap_err();
        assert!(err.to_string().contains("/nowhere/config.toml"));
    }
}
