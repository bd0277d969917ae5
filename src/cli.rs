//! Command-line surface of the `supermarket-import` binary.

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "supermarket-import")]
#[command(about = "Import supermarket price transparency XML dumps")]
#[command(version)]
pub struct Cli {
    /// Defaults to `import-all`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// List implemented and skeleton providers
    ListParsers,

    /// Print record counts per collection
    Stats,

    /// Create backend indexes
    CreateIndexes,

    /// Import one provider
    Import {
        /// Provider name or alias, e.g. SuperPharm or super-pharm
        provider: String,

        /// Delete the provider's existing data first
        #[arg(long)]
        clear: bool,
    },

    /// Import every implemented provider
    ImportAll {
        /// Import every provider folder found in the dumps folder
        #[arg(long)]
        all: bool,

        /// Drop indexes for the run and recreate them afterwards
        #[arg(long)]
        fast: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::ImportAll {
            all: false,
            fast: false,
        })
    }
}

impl Commands {
    /// Folds command flags into the loaded configuration.
    pub fn apply_to(&self, config: &mut AppConfig) {
        match self {
            Commands::Import { clear, .. } => {
                if *clear {
                    config.import.clear_existing = true;
                }
            }
            Commands::ImportAll { all, fast } => {
                if *all {
                    config.import.implemented_only = false;
                }
                if *fast {
                    config.import.fast_mode = true;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_import_requires_provider() {
        let err = Cli::try_parse_from(["supermarket-import", "import", "--clear"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from(["supermarket-import", "import", "super-pharm", "--clear"]).unwrap();
        assert_eq!(
            cli.command(),
            Commands::Import {
                provider: "super-pharm".into(),
                clear: true
            }
        );
    }

    #[test]
    fn test_unknown_flags_are_rejected() {
        let err = Cli::try_parse_from(["supermarket-import", "import-all", "--fats"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);

        assert!(Cli::try_parse_from(["supermarket-import", "stats", "--all"]).is_err());
        assert!(Cli::try_parse_from(["supermarket-import", "import-everything"]).is_err());
    }

    #[test]
    fn test_no_command_means_import_all() {
        let cli = Cli::try_parse_from(["supermarket-import"]).unwrap();
        assert_eq!(cli.command(), Commands::ImportAll { all: false, fast: false });

        let cli = Cli::try_parse_from(["supermarket-import", "import-all", "--all", "--fast"]).unwrap();
        assert_eq!(cli.command(), Commands::ImportAll { all: true, fast: true });
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = AppConfig::default();
        Commands::ImportAll { all: true, fast: true }.apply_to(&mut config);
        assert!(!config.import.implemented_only);
        assert!(config.import.fast_mode);

        let mut config = AppConfig::default();
        let cleared = config.import.clear_existing;
        Commands::Stats.apply_to(&mut config);
        assert_eq!(config.import.clear_existing, cleared);
        Commands::Import { provider: "Victory".into(), clear: true }.apply_to(&mut config);
        assert!(config.import.clear_existing);
    }
}
