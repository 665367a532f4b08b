use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indexmap::IndexMap;
use log::{info, warn};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::archive::{self, sanitize_component};
use crate::auth::Token;
use crate::config::Config;
use crate::hr_api::HrApiClient;
use crate::output::{
    export_report, export_roster_csv, print_roster_summary, print_summary, roster_file_name,
    TerminalProgress,
};
use crate::pipeline::{
    CollectionPipeline, PeriodSelection, PipelineOptions, RunMode, RunRequest, RunResult,
};

#[derive(Parser)]
#[command(name = "payslips")]
#[command(author, version, about = "Payslip collection tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./payslips.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory receiving archives, exports and reports
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Args)]
struct CollectArgs {
    #[arg(short, long, env = "PAYSLIPS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// 0-based page kept from each payslip
    #[arg(long)]
    page_index: Option<u32>,

    /// Collaborators processed at the same time
    #[arg(long)]
    concurrency: Option<usize>,

    /// Also export the collaborator roster as CSV
    #[arg(long, default_value_t = false)]
    roster: bool,

    /// Also write the extracted PDFs as individual files
    #[arg(long, default_value_t = false)]
    extract: bool,

    /// Write run_report.json next to the archive
    #[arg(long, default_value_t = false)]
    report: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect one month's payslip for every collaborator
    Monthly {
        #[arg(short, long)]
        year: i32,

        #[arg(short, long)]
        month: u32,

        #[command(flatten)]
        args: CollectArgs,
    },
    /// Collect every payslip of a year, grouped by collaborator
    Yearly {
        #[arg(short, long)]
        year: i32,

        /// Also write one archive per collaborator
        #[arg(long, default_value_t = false)]
        per_collaborator: bool,

        #[command(flatten)]
        args: CollectArgs,
    },
    /// Export the collaborator roster without touching payslips
    Roster {
        #[arg(short, long, env = "PAYSLIPS_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Write a configuration file with the default settings
    Init {
        #[arg(default_value = "payslips.toml")]
        path: PathBuf,

        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

impl Cli {
    pub async fn execute(&mut self) -> Result<()> {
        if let Commands::Init { path, force } = &self.command {
            return execute_init(path, *force);
        }

        let mut config = Config::load(self.config.as_deref())?;
        let token = resolve_token(self.command.take_token(), &mut config);

        match &self.command {
            Commands::Monthly { year, month, args } => {
                let request = RunRequest {
                    token,
                    year: Some(*year),
                    month: Some(*month),
                    mode: RunMode::Monthly,
                };
                self.execute_collect(&config, request, args, false).await
            }
            Commands::Yearly {
                year,
                per_collaborator,
                args,
            } => {
                let request = RunRequest {
                    token,
                    year: Some(*year),
                    month: None,
                    mode: RunMode::Yearly,
                };
                self.execute_collect(&config, request, args, *per_collaborator)
                    .await
            }
            Commands::Roster { .. } => self.execute_roster(&config, token).await,
            Commands::Init { .. } => Ok(()),
        }
    }

    fn output_dir(&self, config: &Config) -> Result<PathBuf> {
        let dir = self
            .output
            .clone()
            .unwrap_or_else(|| config.output.directory.clone());
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        Ok(dir)
    }

    async fn execute_collect(
        &self,
        config: &Config,
        request: RunRequest,
        args: &CollectArgs,
        per_collaborator: bool,
    ) -> Result<()> {
        let options = PipelineOptions {
            page_index: args.page_index.unwrap_or(config.run.page_index),
            concurrency: args.concurrency.unwrap_or(config.run.concurrency).max(1),
        };
        let client = build_client(config)?;

        let progress = TerminalProgress::start();
        let result = CollectionPipeline::new(&client, options)
            .with_progress(&progress)
            .with_cancellation(cancel_on_ctrl_c())
            .run(request)
            .await?;

        let dir = self.output_dir(config)?;
        let pretty = self.pretty || config.output.pretty;
        let mut written = write_archives(&dir, &result, per_collaborator)?;

        if args.extract || config.output.extract {
            written.push(write_extracted(&dir, &result)?);
        }

        if args.roster {
            written.push(write_roster(&dir, &result.company, &result.collaborators)?);
        }

        if args.report || config.output.report {
            let path = dir.join("run_report.json");
            let mut file = File::create(&path)
                .with_context(|| format!("Failed to create report: {}", path.display()))?;
            export_report(&result, pretty, &mut file)?;
            info!("Run report written to: {}", path.display());
            written.push(path);
        }

        print_summary(&result, &written);
        Ok(())
    }

    async fn execute_roster(&self, config: &Config, token: Option<Token>) -> Result<()> {
        let token =
            token.context("An API token is required: pass --token or set PAYSLIPS_TOKEN")?;
        let client = build_client(config)?;

        let progress = TerminalProgress::start();
        let roster = CollectionPipeline::new(&client, PipelineOptions::default())
            .with_progress(&progress)
            .with_cancellation(cancel_on_ctrl_c())
            .fetch_roster(token)
            .await?;

        let dir = self.output_dir(config)?;
        let path = write_roster(&dir, &roster.company, &roster.collaborators)?;

        print_roster_summary(&roster, &[path]);
        Ok(())
    }
}

impl Commands {
    /// Moves the command-line token out of the parsed arguments.
    fn take_token(&mut self) -> Option<String> {
        match self {
            Self::Monthly { args, .. } | Self::Yearly { args, .. } => args.token.take(),
            Self::Roster { token } => token.take(),
            Self::Init { .. } => None,
        }
    }
}

/// Command-line token first, then the configuration file.
///
/// Both strings are moved, never copied, so only the returned [`Token`] holds
/// the secret and the unused one is zeroed here.
fn resolve_token(flag: Option<String>, config: &mut Config) -> Option<Token> {
    let configured = config.api.token.take().map(Token::from);
    match flag {
        Some(token) => Some(Token::from(token)),
        None => configured,
    }
}

fn build_client(config: &Config) -> Result<HrApiClient> {
    let client = HrApiClient::new(
        &config.api.base_url,
        &config.api.auth_url,
        Duration::from_secs(config.api.timeout_secs),
    )
    .context("Failed to create the HR API client")?;
    Ok(client)
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the run");
            on_signal.cancel();
        }
    });
    cancel
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Written: {}", path.display());
    Ok(())
}

fn write_archives(dir: &Path, result: &RunResult, per_collaborator: bool) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let Some(bundle) = &result.archive else {
        warn!("No payslip extracted for {}, no archive written", result.selection);
        return Ok(written);
    };

    let path = dir.join(format!("payslips_{}.zip", result.selection.label()));
    write_file(&path, bundle)?;
    written.push(path);

    if per_collaborator {
        let year = result.selection.year();
        for (name, months) in result.grouped_items() {
            let items: IndexMap<String, archive::ArchiveItem> = months
                .into_iter()
                .map(|(month, item)| (month.to_string(), item))
                .collect();
            let bytes = archive::build(&items)?;
            let path = dir.join(format!("{}_payslips_{year}.zip", sanitize_component(&name)));
            write_file(&path, &bytes)?;
            written.push(path);
        }
    }

    Ok(written)
}

fn write_extracted(dir: &Path, result: &RunResult) -> Result<PathBuf> {
    let target = dir.join(format!("payslips_{}", result.selection.label()));
    let count = match result.selection {
        PeriodSelection::Monthly { .. } => archive::write_to_dir(&target, &result.flat_items()),
        PeriodSelection::Yearly { .. } => {
            archive::write_grouped_to_dir(&target, &result.grouped_items())
        }
    }
    .with_context(|| format!("Failed to extract payslips to {}", target.display()))?;

    info!("Extracted {count} payslip(s) to {}", target.display());
    Ok(target)
}

fn write_roster(
    dir: &Path,
    company: &crate::hr_api::Company,
    collaborators: &[crate::hr_api::Collaborator],
) -> Result<PathBuf> {
    let path = dir.join(roster_file_name(company, chrono::Local::now().date_naive()));
    let mut file = File::create(&path)
        .with_context(|| format!("Failed to create roster export: {}", path.display()))?;
    export_roster_csv(collaborators, &mut file)?;
    info!("Roster written to: {}", path.display());
    Ok(path)
}

fn execute_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        );
    }
    Config::default().save(path)?;
    println!("Configuration written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{CollaboratorPayslips, ExtractedPayslip};
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_token_flag_overrides_config() {
        let mut config = Config::default();
        config.api.token = Some("from-config".to_string());

        let token = resolve_token(Some("from-flag".to_string()), &mut config).unwrap();
        assert_eq!(token.as_str(), "from-flag");
        assert!(config.api.token.is_none());

        let mut config = Config::default();
        config.api.token = Some("from-config".to_string());
        let token = resolve_token(None, &mut config).unwrap();
        assert_eq!(token.as_str(), "from-config");
    }

    #[test]
    fn test_parse_yearly_command() {
        let cli = Cli::try_parse_from([
            "payslips",
            "--output",
            "out",
            "yearly",
            "--year",
            "2024",
            "--per-collaborator",
            "--concurrency",
            "4",
        ])
        .unwrap();

        assert_eq!(cli.output, Some(PathBuf::from("out")));
        match cli.command {
            Commands::Yearly {
                year,
                per_collaborator,
                args,
            } => {
                assert_eq!(year, 2024);
                assert!(per_collaborator);
                assert_eq!(args.concurrency, Some(4));
                assert!(args.page_index.is_none());
            }
            _ => panic!("expected the yearly command"),
        }
    }

    #[test]
    fn test_token_is_moved_out_of_arguments() {
        let mut cli = Cli::try_parse_from([
            "payslips", "monthly", "--year", "2024", "--month", "4", "--token", "secret",
        ])
        .unwrap();

        assert_eq!(cli.command.take_token().as_deref(), Some("secret"));
        match &cli.command {
            Commands::Monthly { args, .. } => assert!(args.token.is_none()),
            _ => panic!("expected the monthly command"),
        }

        let mut cli = Cli::try_parse_from(["payslips", "roster", "-t", "secret"]).unwrap();
        assert_eq!(cli.command.take_token().as_deref(), Some("secret"));
        assert!(cli.command.take_token().is_none());
    }

    fn payslip(id: &str, name: &str, file_name: &str, month: u32) -> ExtractedPayslip {
        let content = format!("{id}{month}").into_bytes();
        ExtractedPayslip {
            collaborator_id: id.to_string(),
            collaborator_name: name.to_string(),
            file_name: file_name.to_string(),
            month,
            size_bytes: content.len(),
            content,
        }
    }

    /// Two collaborators named Sam Lee with payslips for January and February.
    fn yearly_result() -> RunResult {
        let mut payslips = IndexMap::new();
        for (id, suffix) in [("a", ""), ("b", "_b")] {
            let months = [1, 2]
                .into_iter()
                .map(|month| {
                    let file_name = format!("Sam_Lee_2024_{month:02}{suffix}.pdf");
                    (month, payslip(id, "Sam Lee", &file_name, month))
                })
                .collect();
            payslips.insert(
                id.to_string(),
                CollaboratorPayslips {
                    name: "Sam Lee".to_string(),
                    months,
                },
            );
        }

        let mut result = RunResult {
            company: serde_json::from_value(serde_json::json!({"id": "c1", "name": "Acme"}))
                .unwrap(),
            selection: PeriodSelection::Yearly { year: 2024 },
            collected_at: chrono::Utc::now(),
            collaborators: Vec::new(),
            with_match: Vec::new(),
            without_match: Vec::new(),
            failures: Vec::new(),
            payslips,
            archive: None,
        };
        result.archive = Some(archive::build_grouped(&result.grouped_items()).unwrap());
        result
    }

    fn zip_entries(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_archives_per_collaborator() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = yearly_result();

        let written = write_archives(temp_dir.path(), &result, true).unwrap();
        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "payslips_2024.zip",
                "Sam_Lee_a_payslips_2024.zip",
                "Sam_Lee_b_payslips_2024.zip",
            ]
        );

        assert_eq!(
            zip_entries(&written[0]),
            vec![
                "Sam_Lee_a/Sam_Lee_2024_01.pdf",
                "Sam_Lee_a/Sam_Lee_2024_02.pdf",
                "Sam_Lee_b/Sam_Lee_2024_01_b.pdf",
                "Sam_Lee_b/Sam_Lee_2024_02_b.pdf",
            ]
        );
        assert_eq!(
            zip_entries(&written[1]),
            vec!["Sam_Lee_2024_01.pdf", "Sam_Lee_2024_02.pdf"]
        );
        assert_eq!(
            zip_entries(&written[2]),
            vec!["Sam_Lee_2024_01_b.pdf", "Sam_Lee_2024_02_b.pdf"]
        );
    }

    #[test]
    fn test_write_archives_without_archive_writes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut result = yearly_result();
        result.archive = None;

        assert!(write_archives(temp_dir.path(), &result, true).unwrap().is_empty());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_extracted_layouts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = yearly_result();

        let target = write_extracted(temp_dir.path(), &result).unwrap();
        assert_eq!(target, temp_dir.path().join("payslips_2024"));
        assert_eq!(
            std::fs::read(target.join("Sam_Lee_b").join("Sam_Lee_2024_02_b.pdf")).unwrap(),
            b"b2"
        );
        assert!(target.join("Sam_Lee_a").join("Sam_Lee_2024_01.pdf").is_file());

        let mut monthly = yearly_result();
        monthly.selection = PeriodSelection::Monthly { year: 2024, month: 1 };
        for payslips in monthly.payslips.values_mut() {
            payslips.months.retain(|month, _| *month == 1);
        }
        let target = write_extracted(temp_dir.path(), &monthly).unwrap();
        assert_eq!(target, temp_dir.path().join("payslips_2024_01"));
        let mut files: Vec<_> = std::fs::read_dir(&target)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        assert_eq!(files, vec!["Sam_Lee_2024_01.pdf", "Sam_Lee_2024_01_b.pdf"]);
    }

    #[test]
    fn test_monthly_requires_month() {
        assert!(Cli::try_parse_from(["payslips", "monthly", "--year", "2024"]).is_err());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("payslips.toml");

        execute_init(&path, false).unwrap();
        assert!(execute_init(&path, false).is_err());
        execute_init(&path, true).unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("partner-api.payfit.com"));
    }
}
