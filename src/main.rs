use anyhow::Result;
use clap::Parser;
use repoctl::{
    Error,
    commands::{self, Config, ListOptions, Overrides},
    repo::ImportMode,
    runtime::RealRuntime,
};
use std::path::PathBuf;

/// repoctl - manage a local pacman repository
///
/// Keeps the package files of a repository directory, its database and the
/// AUR in agreement. Settings are read from
/// $XDG_CONFIG_HOME/repoctl/config.toml unless --config is given.
///
/// Examples:
///   repoctl status             # Show packages that need attention
///   repoctl add ./foo-1.0-1-x86_64.pkg.tar.zst
///   repoctl update -b          # Sync the database, back up old files
#[derive(Parser, Debug)]
#[command(author, version = env!("REPOCTL_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (also via REPOCTL_CONFIG)
    #[arg(
        long,
        short = 'c',
        env = "REPOCTL_CONFIG",
        value_name = "PATH",
        global = true
    )]
    config: Option<PathBuf>,

    /// Repository database, e.g. /srv/repo/custom.db.tar.gz (also via REPOCTL_REPO)
    #[arg(long, env = "REPOCTL_REPO", value_name = "PATH", global = true)]
    repo: Option<PathBuf>,

    /// Suppress warnings and progress messages
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Print package names in columns
    #[arg(long, short = 's', global = true)]
    columns: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List packages in the repository
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Show packages whose files, database entry or upstream disagree
    Status(NamesArgs),

    /// List packages matching every criterion
    Filter(FilterArgs),

    /// Add package files to the repository
    Add(AddArgs),

    /// Remove packages from the repository
    #[command(visible_alias = "rm")]
    Remove(RemoveArgs),

    /// Add new package files to the database, drop entries without files
    Update(MutateArgs),

    /// Recreate the database from the package files
    Reset(MutateArgs),

    #[command(external_subcommand)]
    External(Vec<String>),
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    /// Show versions
    #[arg(long, short = 'v')]
    versioned: bool,

    /// Mark pending changes to the database
    #[arg(long, short = 'p')]
    pending: bool,

    /// Mark packages with obsolete files
    #[arg(long, short = 'd')]
    duplicates: bool,

    /// Mark installed packages
    #[arg(long, short = 'l')]
    installed: bool,

    /// Mark packages with a newer version upstream
    #[arg(long, short = 'u')]
    outdated: bool,

    /// All of -v -p -d -l -u
    #[arg(long, short = 'a')]
    all: bool,

    /// Restrict the listing to these packages
    #[arg(value_name = "NAME")]
    names: Vec<String>,
}

impl ListArgs {
    fn options(&self) -> ListOptions {
        if self.all {
            return ListOptions::all();
        }
        ListOptions {
            versioned: self.versioned,
            pending: self.pending,
            duplicates: self.duplicates,
            installed: self.installed,
            outdated: self.outdated,
        }
    }
}

#[derive(clap::Args, Debug)]
struct NamesArgs {
    #[arg(value_name = "NAME")]
    names: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// duplicates, pending, outdated, missing, local, local-only or in-sync; prefix with ! to negate
    #[arg(value_name = "CRITERION", required = true)]
    criteria: Vec<String>,

    /// Only consider these packages
    #[arg(last = true, value_name = "NAME")]
    names: Vec<String>,
}

#[derive(clap::Args, Debug, Default)]
struct MutateArgs {
    /// Ask before deleting files or changing the database
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Move discarded files to the backup directory instead of deleting them
    #[arg(long, short = 'b')]
    backup: bool,
}

#[derive(clap::Args, Debug)]
struct AddArgs {
    /// Package files, or names of packages already in the repository
    #[arg(value_name = "FILE", required = true)]
    files: Vec<String>,

    /// Move files into the repository instead of copying them
    #[arg(long = "move", short = 'm')]
    move_files: bool,

    #[command(flatten)]
    mutate: MutateArgs,
}

#[derive(clap::Args, Debug)]
struct RemoveArgs {
    #[arg(value_name = "NAME", required = true)]
    names: Vec<String>,

    #[command(flatten)]
    mutate: MutateArgs,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        let none = MutateArgs::default();
        let mutate = match &self.command {
            Commands::Add(args) => &args.mutate,
            Commands::Remove(args) => &args.mutate,
            Commands::Update(args) | Commands::Reset(args) => args,
            _ => &none,
        };
        Overrides {
            config: self.config.clone(),
            repo: self.repo.clone(),
            quiet: self.quiet,
            columns: self.columns,
            interactive: mutate.interactive,
            backup: mutate.backup,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = RealRuntime;
    let overrides = cli.overrides();
    let load = || Config::load(&runtime, &overrides);

    match cli.command {
        Commands::List(args) => {
            commands::list(&runtime, &load()?, args.options(), &args.names).await?
        }
        Commands::Status(args) => commands::status(&runtime, &load()?, &args.names).await?,
        Commands::Filter(args) => {
            commands::filter(&runtime, &load()?, &args.criteria, &args.names).await?
        }
        Commands::Add(args) => {
            let mode = if args.move_files {
                ImportMode::Move
            } else {
                ImportMode::Copy
            };
            commands::add(&runtime, &load()?, &args.files, mode)?
        }
        Commands::Remove(args) => commands::remove(&runtime, &load()?, &args.names)?,
        Commands::Update(_) => commands::update(&runtime, &load()?)?,
        Commands::Reset(_) => commands::reset(&runtime, &load()?)?,
        Commands::External(args) => {
            let operation = args.into_iter().next().unwrap_or_default();
            return Err(Error::UnknownOperation(operation).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_list_parsing() {
        let cli = Cli::try_parse_from(["repoctl", "ls", "-v", "-p", "foo"]).unwrap();
        match cli.command {
            Commands::List(args) => {
                let options = args.options();
                assert!(options.versioned);
                assert!(options.pending);
                assert!(!options.outdated);
                assert_eq!(args.names, vec!["foo"]);
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_cli_list_all() {
        let cli = Cli::try_parse_from(["repoctl", "list", "-a"]).unwrap();
        match cli.command {
            Commands::List(args) => assert_eq!(args.options(), ListOptions::all()),
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_cli_filter_parsing() {
        let cli =
            Cli::try_parse_from(["repoctl", "filter", "pending", "!outdated", "--", "foo"])
                .unwrap();
        match cli.command {
            Commands::Filter(args) => {
                assert_eq!(args.criteria, vec!["pending", "!outdated"]);
                assert_eq!(args.names, vec!["foo"]);
            }
            _ => panic!("Expected Filter command"),
        }
    }

    #[test]
    fn test_cli_filter_requires_criterion() {
        assert!(Cli::try_parse_from(["repoctl", "filter"]).is_err());
    }

    #[test]
    fn test_cli_add_parsing() {
        let cli = Cli::try_parse_from(["repoctl", "add", "-m", "-b", "foo-1-1-any.pkg.tar.zst"])
            .unwrap();
        let overrides = cli.overrides();
        assert!(overrides.backup);
        assert!(!overrides.interactive);
        match cli.command {
            Commands::Add(args) => {
                assert!(args.move_files);
                assert_eq!(args.files, vec!["foo-1-1-any.pkg.tar.zst"]);
            }
            _ => panic!("Expected Add command"),
        }
    }

    #[test]
    fn test_cli_remove_alias() {
        let cli = Cli::try_parse_from(["repoctl", "rm", "-i", "foo", "bar"]).unwrap();
        assert!(cli.overrides().interactive);
        match cli.command {
            Commands::Remove(args) => assert_eq!(args.names, vec!["foo", "bar"]),
            _ => panic!("Expected Remove command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from([
            "repoctl",
            "update",
            "--repo",
            "/srv/repo/custom.db.tar.gz",
            "-q",
            "-c",
            "/tmp/repoctl.toml",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.repo, Some(PathBuf::from("/srv/repo/custom.db.tar.gz")));
        assert_eq!(overrides.config, Some(PathBuf::from("/tmp/repoctl.toml")));
        assert!(overrides.quiet);
        assert!(!overrides.backup);
    }

    #[test]
    fn test_cli_unknown_operation() {
        let cli = Cli::try_parse_from(["repoctl", "frobnicate", "foo"]).unwrap();
        match cli.command {
            Commands::External(args) => assert_eq!(args, vec!["frobnicate", "foo"]),
            _ => panic!("Expected External command"),
        }
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["repoctl"]).is_err());
    }
}
