use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;

use crate::config::{Config, Overrides, Settings};
use crate::prompt::ConsolePrompt;
use crate::providers::tfs::TfsClient;
use crate::reports::builds::{
    generate_build_report, BuildReportOptions, DEFAULT_DEFINITION_FILTER, DEFAULT_OUTPUT_FILE,
    DEFAULT_PROJECT,
};
use crate::reports::changesets::{export_changesets, ExportOptions};

#[derive(Parser)]
#[command(name = "tfs-query")]
#[command(author, version, about = "TFS build and changeset reports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file providing defaultCollectionURI and outputFolder
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Team project collection URI, overrides defaultCollectionURI
    #[arg(long, global = true, env = "TFS_COLLECTION_URI")]
    collection_uri: Option<String>,

    /// Folder for changeset exports, overrides outputFolder
    #[arg(long, global = true, env = "TFS_OUTPUT_FOLDER")]
    output_folder: Option<PathBuf>,

    /// Personal access token (optional)
    #[arg(long, global = true, env = "TFS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Changeset export filters: -author:<name> -sortAscending:<true|false>
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "-NAME:VALUE"
    )]
    tokens: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write build and queue times of completed builds to a CSV file
    Builds {
        /// Team project whose builds are reported
        #[arg(short = 'P', long, default_value = DEFAULT_PROJECT)]
        project: String,

        /// Substring the build definition name must contain
        #[arg(short, long, default_value = DEFAULT_DEFINITION_FILTER)]
        definition: String,

        /// Output file path
        #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE)]
        output: PathBuf,
    },
}

/// Filters of the changeset export, given as `-name:value` tokens.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExportArgs {
    pub author: Option<String>,
    pub sort_ascending: bool,
}

impl ExportArgs {
    /// The first token is the author, the second the sort direction. Names
    /// before the colon are not checked.
    pub fn from_tokens(tokens: &[String]) -> Self {
        let author = tokens
            .first()
            .map(|t| token_value(t))
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let sort_ascending = tokens
            .get(1)
            .and_then(|t| parse_bool(token_value(t)))
            .unwrap_or(false);

        if tokens.len() > 2 {
            warn!("Ignoring extra arguments: {:?}", &tokens[2..]);
        }

        Self {
            author,
            sort_ascending,
        }
    }
}

fn token_value(token: &str) -> &str {
    token.split_once(':').map_or(token, |(_, value)| value)
}

fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let settings =
            Settings::discover(self.config.as_deref()).context("Failed to load settings")?;
        let mut config = Config::resolve(
            settings,
            Overrides {
                collection_uri: self.collection_uri.clone(),
                output_folder: self.output_folder.clone(),
                token: self.token.clone(),
            },
        )?;
        let client = TfsClient::new(&config.collection_uri, config.token.take())?;

        match &self.command {
            Some(Commands::Builds {
                project,
                definition,
                output,
            }) => {
                println!("\nTFS Build Queue");
                println!("===============\n");
                println!(
                    "Connecting to: {} and querying builds...",
                    client.collection_url()
                );

                let options = BuildReportOptions {
                    project: project.clone(),
                    definition_filter: definition.clone(),
                    output: output.clone(),
                };
                let report = generate_build_report(&client, &options).await?;
                info!(
                    "Build report: {} rows, {} skipped for missing timestamps",
                    report.rows, report.skipped
                );

                println!("{}", report.confirmation());
            }
            None => {
                let args = ExportArgs::from_tokens(&self.tokens);
                let options = ExportOptions {
                    author: args.author,
                    sort_ascending: args.sort_ascending,
                    output_folder: config.output_folder()?.to_path_buf(),
                    now: Local::now(),
                };

                info!(
                    "Exporting changesets from {} (author: {}, ascending: {})",
                    client.collection_url(),
                    options.author.as_deref().unwrap_or("any"),
                    options.sort_ascending
                );

                let mut prompt = ConsolePrompt::stdio();
                let outcome = export_changesets(&client, &mut prompt, &options).await?;

                println!("{outcome}");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_export_args_author_and_sort() {
        let args = ExportArgs::from_tokens(&tokens(&["-author:Alice", "-sortAscending:true"]));

        assert_eq!(
            args,
            ExportArgs {
                author: Some("Alice".to_string()),
                sort_ascending: true,
            }
        );
    }

    #[test]
    fn test_export_args_defaults() {
        assert_eq!(ExportArgs::from_tokens(&[]), ExportArgs::default());

        let args = ExportArgs::from_tokens(&tokens(&["-author:ICI\\HutchinsonS"]));
        assert_eq!(args.author.as_deref(), Some("ICI\\HutchinsonS"));
        assert!(!args.sort_ascending);
    }

    #[test]
    fn test_export_args_malformed_bool_is_false() {
        for value in ["-sortAscending:maybe", "-sortAscending:", "-sortAscending:1"] {
            let args = ExportArgs::from_tokens(&tokens(&["-author:Alice", value]));
            assert!(!args.sort_ascending, "token {value}");
        }
    }

    #[test]
    fn test_export_args_bool_ignores_case_and_whitespace() {
        let args = ExportArgs::from_tokens(&tokens(&["-author:Alice", "-sortAscending: TRUE "]));

        assert!(args.sort_ascending);
    }

    #[test]
    fn test_export_args_empty_author_means_everyone() {
        let args = ExportArgs::from_tokens(&tokens(&["-author:", "-sortAscending:false"]));

        assert_eq!(args.author, None);
    }

    #[test]
    fn test_token_value_takes_text_after_first_colon() {
        assert_eq!(token_value("-author:DOMAIN:user"), "DOMAIN:user");
        assert_eq!(token_value("Alice"), "Alice");
    }

    #[test]
    fn test_cli_collects_legacy_tokens() {
        let cli =
            Cli::try_parse_from(["tfs-query", "-author:Alice", "-sortAscending:true"]).unwrap();

        assert!(cli.command.is_none());
        assert_eq!(cli.tokens, ["-author:Alice", "-sortAscending:true"]);
    }

    #[test]
    fn test_cli_builds_subcommand_defaults() {
        let cli = Cli::try_parse_from(["tfs-query", "builds"]).unwrap();

        match cli.command {
            Some(Commands::Builds {
                project,
                definition,
                output,
            }) => {
                assert_eq!(project, "DART");
                assert_eq!(definition, "NG-DART-VS2012");
                assert_eq!(output, PathBuf::from("BuildResults.csv"));
            }
            None => panic!("expected builds subcommand"),
        }
        assert!(cli.tokens.is_empty());
    }

    #[test]
    fn test_cli_settings_file_before_tokens() {
        let cli =
            Cli::try_parse_from(["tfs-query", "--config", "tfs.toml", "-author:Alice"]).unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("tfs.toml")));
        assert_eq!(cli.tokens, ["-author:Alice"]);
    }
}
