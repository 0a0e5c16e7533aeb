//! Output formatting and styling module.
//!
//! All terminal output of the binary goes through [`OutputFormatter`]: colored
//! status lines, the duplicate report, plan listings, progress bars and JSON
//! rendering. Library code never prints.

use crate::entities::{ActionKind, ActionRecord, DuplicateGroups};
use crate::file_organizer::ExecutionReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

const MB: f64 = 1024.0 * 1024.0;

pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Banner printed before every command.
    pub fn banner(dry_run: bool, root: &std::path::Path) {
        Self::header("--- dirsort ---");
        if dry_run {
            println!("Mode: {}", "DRY RUN (safe)".yellow());
        } else {
            println!("Mode: {}", "EXECUTE (live)".red().bold());
        }
        println!("Target: {}\n", root.display());
    }

    /// Progress bar for plan execution.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    pub fn scan_summary(count: usize, total_bytes: u64, errors: &[String]) {
        Self::header("Scan complete");
        println!("Total files: {}", count.to_string().green());
        println!("Total size:  {:.2} MB", total_bytes as f64 / MB);
        if !errors.is_empty() {
            Self::warning(&format!(
                "Encountered {} access errors.",
                errors.len()
            ));
        }
    }

    /// Prints every duplicate group, largest waste first.
    pub fn duplicate_report(groups: &DuplicateGroups, reclaimable: u64) {
        if groups.is_empty() {
            Self::success("No duplicates found.");
            return;
        }

        Self::header("DUPLICATES");
        let mut ordered: Vec<_> = groups.iter().collect();
        ordered.sort_by_key(|(_, members)| {
            let size = members.first().map(|m| m.size).unwrap_or(0);
            std::cmp::Reverse(size * (members.len() as u64 - 1))
        });

        for (hash, members) in ordered {
            let size = members.first().map(|m| m.size).unwrap_or(0);
            println!(
                "{} {} x {} bytes",
                hash.get(..12).unwrap_or(hash).dimmed(),
                members.len().to_string().yellow(),
                size
            );
            for (index, member) in members.iter().enumerate() {
                let marker = if index == 0 { "keep".green() } else { "dup ".red() };
                println!("  [{}] {}", marker, member.path.display());
            }
        }

        let duplicate_files: usize = groups.values().map(|g| g.len() - 1).sum();
        println!("{}", "-".repeat(40));
        println!(
            "{} groups, {} redundant files, {:.2} MB reclaimable",
            groups.len().to_string().bold(),
            duplicate_files.to_string().bold(),
            reclaimable as f64 / MB
        );
    }

    /// Lists a plan, one line per action.
    pub fn plan_listing(plan: &[ActionRecord]) {
        if plan.is_empty() {
            Self::success("Nothing to do.");
            return;
        }

        Self::header("PLAN");
        for action in plan {
            let kind = match action.kind {
                ActionKind::Move => action.kind.to_string().cyan(),
                ActionKind::Copy => action.kind.to_string().blue(),
                ActionKind::Delete => action.kind.to_string().red(),
            };
            match &action.destination {
                Some(destination) => println!(
                    "{:<6} {} → {}",
                    kind,
                    action.source.display(),
                    destination.display()
                ),
                None => println!("{:<6} {}", kind, action.source.display()),
            }
            println!("       {}", action.reason.dimmed());
        }
    }

    pub fn execution_summary(report: &ExecutionReport, dry_run: bool) {
        Self::header("Execution summary");
        println!("  Successful: {}", report.succeeded.to_string().green());
        println!("  Failed:     {}", report.failed().to_string().red());
        for (path, reason) in &report.failures {
            eprintln!("    - {}: {}", path.display(), reason);
        }
        if dry_run {
            Self::dry_run_notice("No files were modified. Re-run with --execute to apply.");
        }
    }

    /// Pretty-printed JSON on stdout.
    pub fn json<T: Serialize>(value: &T) -> serde_json::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
