//! Command-line interface module for dirsort.
//!
//! Parses arguments, loads configuration, picks the filesystem backend
//! (simulated unless `--execute` is given) and wires the scanner, duplicate
//! finder and organizer together. All rendering is delegated to
//! [`OutputFormatter`].

use crate::config::{CompiledFilters, Config};
use crate::dedupe::{DuplicateFinder, plan_duplicate_removal, reclaimable_bytes};
use crate::entities::{ActionRecord, DuplicateGroups, FileRecord};
use crate::file_organizer::{ExecutionReport, Organizer};
use crate::fs_provider::{DryRunFileSystem, FileSystem, RealFileSystem};
use crate::hashing::HashService;
use crate::logging::LogSink;
use crate::output::OutputFormatter;
use crate::rules::{DestinationRule, RuleKind};
use crate::scanner::DirectoryScanner;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Find duplicate files and sort files into folders.
///
/// Runs as a dry run unless --execute is given.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Perform filesystem changes instead of simulating them.
    #[arg(long, global = true)]
    pub execute: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (defaults to ./.dirsort.toml or ~/.config/dirsort/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scan a directory and report file statistics.
    Scan {
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Find files with identical content.
    Dedupe {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Hash on the calling thread instead of a worker pool.
        #[arg(long)]
        serial: bool,
        /// Worker pool size (0 = number of CPUs).
        #[arg(long)]
        workers: Option<usize>,
        /// Delete every duplicate except the first of each group.
        #[arg(long)]
        delete: bool,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Move files into folders chosen by a rule.
    Organize {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long, value_enum)]
        rule: Option<RuleKind>,
        /// Remove directories left empty afterwards.
        #[arg(long)]
        cleanup: bool,
        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },
}

impl Command {
    fn root(&self) -> &Path {
        match self {
            Command::Scan { root } | Command::Dedupe { root, .. } | Command::Organize { root, .. } => {
                root.as_path()
            }
        }
    }
}

/// Runs a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("Error loading configuration")?;
    let filters = config
        .compile_filters()
        .context("Error compiling scan filters")?;

    let dry_run = !cli.execute;
    let root = std::path::absolute(cli.command.root())
        .with_context(|| format!("Invalid root {}", cli.command.root().display()))?;

    if dry_run {
        let fs = DryRunFileSystem::new(LogSink::shared("dirsort::dryrun"));
        run_command(&cli.command, &root, &config, &filters, fs, true)
    } else {
        run_command(&cli.command, &root, &config, &filters, RealFileSystem::new(), false)
    }
}

fn run_command<F: FileSystem>(
    command: &Command,
    root: &Path,
    config: &Config,
    filters: &CompiledFilters,
    fs: F,
    dry_run: bool,
) -> Result<()> {
    let json_output = matches!(
        command,
        Command::Dedupe { json: true, .. } | Command::Organize { json: true, .. }
    );
    if !json_output {
        OutputFormatter::banner(dry_run, root);
    }

    let (records, errors) = collect_records(&fs, filters, root)?;

    let execution = match command {
        Command::Scan { .. } => {
            let total: u64 = records.iter().map(|r| r.size).sum();
            OutputFormatter::scan_summary(records.len(), total, &errors);
            None
        }
        Command::Dedupe {
            serial,
            workers,
            delete,
            json,
            ..
        } => {
            let settings = DedupeOptions {
                parallel: config.dedupe.parallel && !serial,
                workers: workers.unwrap_or(config.dedupe.workers),
                delete: *delete,
            };
            let outcome = dedupe(fs, records, errors, &settings, dry_run, *json);
            if *json {
                OutputFormatter::json(&outcome)?;
            }
            outcome.execution
        }
        Command::Organize {
            rule,
            cleanup,
            json,
            ..
        } => {
            let rule = DestinationRule::from(rule.unwrap_or(config.organize.rule));
            let cleanup = *cleanup || config.organize.cleanup;
            let outcome = organize(fs, records, &rule, root, cleanup, dry_run, *json)?;
            if *json {
                OutputFormatter::json(&outcome)?;
            }
            outcome.execution
        }
    };

    match execution {
        Some(report) if !report.is_complete_success() => bail!(
            "{} of {} operations failed",
            report.failed(),
            report.total()
        ),
        _ => Ok(()),
    }
}

/// Duplicate-finder settings after merging flags over configuration.
struct DedupeOptions {
    parallel: bool,
    workers: usize,
    delete: bool,
}

/// Everything `dedupe` reports, in the shape printed by `--json`.
#[derive(Debug, Serialize)]
struct DedupeOutcome {
    groups: DuplicateGroups,
    reclaimable_bytes: u64,
    scan_errors: Vec<String>,
    /// Present when `--delete` ran the removal plan.
    execution: Option<ExecutionReport>,
}

/// Everything `organize` reports, in the shape printed by `--json`.
#[derive(Debug, Serialize)]
struct OrganizeOutcome {
    plan: Vec<ActionRecord>,
    execution: Option<ExecutionReport>,
    removed_dirs: Option<usize>,
}

fn dedupe<F: FileSystem>(
    fs: F,
    records: Vec<FileRecord>,
    scan_errors: Vec<String>,
    options: &DedupeOptions,
    dry_run: bool,
    json: bool,
) -> DedupeOutcome {
    let finder = DuplicateFinder::new(Arc::new(HashService::new()))
        .with_parallel(options.parallel)
        .with_workers(options.workers)
        .with_sink(LogSink::shared("dirsort::dedupe"));
    let groups = finder.find_duplicates(records);
    let reclaimable = reclaimable_bytes(&groups);

    if !json {
        OutputFormatter::duplicate_report(&groups, reclaimable);
    }

    let execution = if options.delete {
        let plan = plan_duplicate_removal(&groups);
        let mut organizer = Organizer::new(fs).with_sink(LogSink::shared("dirsort::organizer"));
        Some(execute(&mut organizer, &plan, dry_run, json))
    } else {
        None
    };

    DedupeOutcome {
        groups,
        reclaimable_bytes: reclaimable,
        scan_errors,
        execution,
    }
}

fn organize<F: FileSystem>(
    fs: F,
    records: Vec<FileRecord>,
    rule: &DestinationRule,
    root: &Path,
    cleanup: bool,
    dry_run: bool,
    json: bool,
) -> Result<OrganizeOutcome> {
    let mut organizer = Organizer::new(fs).with_sink(LogSink::shared("dirsort::organizer"));
    let plan = organizer.plan_organization(records, rule, root)?;

    if !json {
        OutputFormatter::plan_listing(&plan);
    }

    let execution = execute(&mut organizer, &plan, dry_run, json);
    let removed_dirs = cleanup.then(|| organizer.cleanup_empty_dirs(root));
    if let Some(removed) = removed_dirs
        && !json
    {
        OutputFormatter::info(&format!("Removed {} empty directories", removed));
    }

    Ok(OrganizeOutcome {
        plan,
        execution: Some(execution),
        removed_dirs,
    })
}

/// Scans `root`, treating a missing root as a fatal error for the CLI.
fn collect_records<F: FileSystem>(
    fs: &F,
    filters: &CompiledFilters,
    root: &Path,
) -> Result<(Vec<FileRecord>, Vec<String>)> {
    let scanner = DirectoryScanner::new(fs)
        .with_filters(filters)
        .with_sink(LogSink::shared("dirsort::scanner"));
    let mut scan = scanner.scan(root);
    let records: Vec<FileRecord> = scan.by_ref().collect();

    if scan.root_missing() {
        bail!("Root path does not exist: {}", root.display());
    }
    Ok((records, scan.errors().to_vec()))
}

fn execute<F: FileSystem>(
    organizer: &mut Organizer<F>,
    plan: &[ActionRecord],
    dry_run: bool,
    json: bool,
) -> ExecutionReport {
    if plan.is_empty() {
        return ExecutionReport::default();
    }

    let pb = if json {
        indicatif::ProgressBar::hidden()
    } else {
        OutputFormatter::create_progress_bar(plan.len() as u64)
    };
    let report = organizer.execute_plan_with_progress(plan, |_, action| {
        if let Some(name) = action.source.file_name() {
            pb.set_message(name.to_string_lossy().into_owned());
        }
        pb.inc(1);
    });
    pb.finish_and_clear();

    if !json {
        OutputFormatter::execution_summary(&report, dry_run);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_provider::DirListing;
    use clap::CommandFactory;
    use std::io;
    use tempfile::TempDir;

    /// Real backend whose deletes always fail.
    struct ReadOnlyFs(RealFileSystem);

    impl FileSystem for ReadOnlyFs {
        fn list(&self, dir: &Path) -> io::Result<DirListing> {
            self.0.list(dir)
        }
        fn move_file(&mut self, source: &Path, destination: &Path) -> io::Result<()> {
            self.0.move_file(source, destination)
        }
        fn copy_file(&mut self, source: &Path, destination: &Path) -> io::Result<()> {
            self.0.copy_file(source, destination)
        }
        fn delete(&mut self, _: &Path) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
        fn exists(&self, path: &Path) -> bool {
            self.0.exists(path)
        }
        fn mkdir(&mut self, path: &Path) -> io::Result<()> {
            self.0.mkdir(path)
        }
        fn rmdir(&mut self, path: &Path) -> io::Result<()> {
            self.0.rmdir(path)
        }
    }

    fn duplicate_pair() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("one.txt"), "same").unwrap();
        std::fs::write(temp_dir.path().join("two.txt"), "same").unwrap();
        temp_dir
    }

    fn no_filters() -> CompiledFilters {
        Config::default().compile_filters().unwrap()
    }

    fn delete_command(root: &Path) -> Command {
        Command::Dedupe {
            root: root.to_path_buf(),
            serial: true,
            workers: None,
            delete: true,
            json: true,
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_organize_defaults_to_dry_run() {
        let cli = Cli::try_parse_from(["dirsort", "organize", "--root", "/data"]).unwrap();
        assert!(!cli.execute);
        match cli.command {
            Command::Organize { root, rule, cleanup, json } => {
                assert_eq!(root, PathBuf::from("/data"));
                assert_eq!(rule, None);
                assert!(!cleanup);
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dirsort", "dedupe", "--serial", "--workers", "3", "--execute", "-vv",
        ])
        .unwrap();
        assert!(cli.execute);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Dedupe {
                serial, workers, ..
            } => {
                assert!(serial);
                assert_eq!(workers, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_rule_value() {
        let cli = Cli::try_parse_from(["dirsort", "organize", "--rule", "date"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Organize {
                rule: Some(RuleKind::Date),
                ..
            }
        ));
    }

    #[test]
    fn test_run_missing_root_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("empty.toml");
        std::fs::write(&config_path, "").unwrap();
        let cli = Cli {
            execute: false,
            verbose: 0,
            quiet: true,
            config: Some(config_path),
            command: Command::Scan {
                root: temp_dir.path().join("missing"),
            },
        };
        assert!(run(cli).is_err());
    }

    #[test]
    fn test_dedupe_json_report_includes_delete_failures() {
        let temp_dir = duplicate_pair();
        let fs = ReadOnlyFs(RealFileSystem::new());
        let (records, errors) =
            collect_records(&fs, &no_filters(), temp_dir.path()).unwrap();
        let options = DedupeOptions {
            parallel: false,
            workers: 0,
            delete: true,
        };

        let outcome = dedupe(fs, records, errors, &options, false, true);
        let report = outcome.execution.as_ref().unwrap();
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed(), 1);

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["execution"]["succeeded"], 0);
        assert_eq!(value["execution"]["failures"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_deletes_make_the_command_fail() {
        let temp_dir = duplicate_pair();
        let root = temp_dir.path();
        let result = run_command(
            &delete_command(root),
            root,
            &Config::default(),
            &no_filters(),
            ReadOnlyFs(RealFileSystem::new()),
            false,
        );

        let message = result.unwrap_err().to_string();
        assert_eq!(message, "1 of 1 operations failed");
        assert!(root.join("one.txt").exists());
        assert!(root.join("two.txt").exists());
    }

    #[test]
    fn test_successful_deletes_are_reported() {
        let temp_dir = duplicate_pair();
        let root = temp_dir.path();
        let fs = RealFileSystem::new();
        let (records, errors) = collect_records(&fs, &no_filters(), root).unwrap();
        let options = DedupeOptions {
            parallel: true,
            workers: 2,
            delete: true,
        };

        let outcome = dedupe(fs, records, errors, &options, false, true);
        let report = outcome.execution.unwrap();
        assert_eq!(report.succeeded, 1);
        assert!(report.is_complete_success());
        assert_eq!(std::fs::read_dir(root).unwrap().count(), 1);
    }

    #[test]
    fn test_dedupe_without_delete_has_no_execution() {
        let temp_dir = duplicate_pair();
        let fs = RealFileSystem::new();
        let (records, errors) =
            collect_records(&fs, &no_filters(), temp_dir.path()).unwrap();
        let options = DedupeOptions {
            parallel: false,
            workers: 0,
            delete: false,
        };

        let outcome = dedupe(fs, records, errors, &options, false, true);
        assert!(outcome.execution.is_none());
        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(outcome.reclaimable_bytes, 4);
    }
}
