use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fotree_source::InvocationConfig;
use tracing::Level;

use crate::Error;

/// Builds typed trees of source units (files, directories, archive
/// members, network resources) and prints them.
///
/// The CLI interface is not stable and subject to change.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, default_value_t=Level::INFO)]
    pub log_level: Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Builds the source tree for a list of names (paths or URLs) and
    /// prints it.
    Characterize {
        #[clap(value_name = "NAME")]
        names: Vec<String>,

        /// Where constructed sources are persisted, see
        /// `fotree_source::persist::from_addr`.
        #[arg(long, env = "FOTREE_PERSISTER", default_value = "passthrough://")]
        persister: String,

        /// Expand tarballs (`.tar`, `.tar.gz`, `.tgz`) found in the tree into
        /// their members.
        #[arg(long)]
        expand_archives: bool,

        #[clap(flatten)]
        invocation: InvocationArgs,
    },
}

/// Settings for materializing temp files.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct InvocationArgs {
    /// A JSON file holding the invocation config. Flags override its values.
    #[arg(long, env = "FOTREE_INVOCATION_CONFIG")]
    pub invocation_config: Option<PathBuf>,

    /// Directory temp files are created in. Defaults to the system temp dir.
    #[arg(long, env = "FOTREE_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    #[arg(long, env = "FOTREE_TEMP_PREFIX")]
    pub temp_prefix: Option<String>,

    #[arg(long, env = "FOTREE_TEMP_SUFFIX")]
    pub temp_suffix: Option<String>,

    /// Buffer size used when copying into temp files, in bytes.
    #[arg(long, env = "FOTREE_BUFFER_SIZE")]
    pub buffer_size: Option<usize>,
}

impl InvocationArgs {
    pub fn to_config(&self) -> Result<InvocationConfig, Error> {
        let mut config = match &self.invocation_config {
            Some(path) => {
                let data = std::fs::read(path).map_err(|e| Error::ReadConfig(path.clone(), e))?;
                serde_json::from_slice(&data).map_err(|e| Error::ParseConfig(path.clone(), e))?
            }
            None => InvocationConfig::default(),
        };

        if let Some(temp_dir) = &self.temp_dir {
            config.temp_dir = temp_dir.clone();
        }
        if let Some(temp_prefix) = &self.temp_prefix {
            config.temp_prefix = temp_prefix.clone();
        }
        if let Some(temp_suffix) = &self.temp_suffix {
            config.temp_suffix = temp_suffix.clone();
        }
        if let Some(buffer_size) = self.buffer_size {
            config.buffer_size = buffer_size;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tempfile::TempDir;

    use super::{Cli, Commands, InvocationArgs};
    use crate::Error;

    #[test]
    fn parse_characterize() {
        let cli = Cli::try_parse_from([
            "fotree",
            "characterize",
            "--temp-prefix",
            "x",
            "--expand-archives",
            "a",
            "https://example.com/b",
        ])
        .expect("must parse");

        let Commands::Characterize {
            names,
            expand_archives,
            invocation,
            ..
        } = cli.command;
        assert_eq!(vec!["a", "https://example.com/b"], names);
        assert!(expand_archives);
        assert_eq!(Some("x".to_string()), invocation.temp_prefix);
    }

    #[test]
    fn flags_override_config_file() {
        let tmpdir = TempDir::new().unwrap();
        let path = tmpdir.path().join("config.json");
        std::fs::write(&path, r#"{"temp_prefix": "file", "buffer_size": 4096}"#).unwrap();

        let args = InvocationArgs {
            invocation_config: Some(path),
            temp_prefix: Some("flag".to_string()),
            ..Default::default()
        };
        let config = args.to_config().expect("must succeed");

        assert_eq!("flag", config.temp_prefix);
        assert_eq!(4096, config.buffer_size);
    }

    #[test]
    fn invalid_config_file() {
        let tmpdir = TempDir::new().unwrap();
        let path = tmpdir.path().join("config.json");
        std::fs::write(&path, r#"{"unknown": 1}"#).unwrap();

        let args = InvocationArgs {
            invocation_config: Some(path),
            ..Default::default()
        };

        assert!(matches!(args.to_config(), Err(Error::ParseConfig(..))));
    }
}
