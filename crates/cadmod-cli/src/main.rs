//! cadmod command line
//!
//! Subcommands:
//! - `validate`: check a modification document without touching any assembly
//! - `apply`: run a document against an assembly in a disposable workspace
//! - `sweep`: delete workspaces left behind by earlier runs

use anyhow::{bail, Context, Result};
use cadmod_bridge::SimulatedCad;
use cadmod_core::{ChangeRunner, ProcessingState, RunConfig, RunReport};
use cadmod_descriptor::parse_document;
use cadmod_workspace::CleanupOutcome;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};

fn cli() -> Command {
    Command::new("cadmod")
        .version(cadmod_core::VERSION)
        .about("Apply engineering changes to CAD assemblies inside isolated workspaces")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML run configuration"),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a modification document")
                .arg(
                    Arg::new("changes")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Modification document (JSON)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the validated descriptors as JSON"),
                ),
        )
        .subcommand(
            Command::new("apply")
                .about("Apply a modification document to an assembly copy")
                .arg(
                    Arg::new("assembly")
                        .long("assembly")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Source assembly document"),
                )
                .arg(
                    Arg::new("changes")
                        .long("changes")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Modification document (JSON)"),
                )
                .arg(
                    Arg::new("commit")
                        .long("commit")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("discard")
                        .help("Pack the modified copy into the output folder"),
                )
                .arg(
                    Arg::new("discard")
                        .long("discard")
                        .action(ArgAction::SetTrue)
                        .help("Remove the workspace without keeping the result"),
                )
                .arg(
                    Arg::new("revert")
                        .long("revert")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("commit")
                        .help("Restore captured originals before discarding"),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the run report as JSON"),
                ),
        )
        .subcommand(Command::new("sweep").about("Delete orphaned workspaces under the working root"))
}

fn load_config(matches: &ArgMatches) -> Result<RunConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}

fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn print_cleanup(outcome: &CleanupOutcome) {
    if let Some(warning) = &outcome.warning {
        eprintln!("warning: {warning}");
    } else {
        println!("Workspace removed ({} attempt(s))", outcome.attempts);
    }
}

fn print_report(report: &RunReport) {
    for error in &report.validation_errors {
        println!("  skipped: {error}");
    }
    for result in &report.results {
        let mark = if result.success { "ok  " } else { "FAIL" };
        match &result.error_message {
            Some(message) => println!("  {mark} {}: {message}", result.feature_name),
            None => println!(
                "  {mark} {}: {} -> {}{}",
                result.feature_name,
                result.old_value,
                result.new_value,
                result.units.as_deref().unwrap_or("")
            ),
        }
    }
    for line in &report.scale_log {
        println!(
            "  scaled {}:{} {} -> {}",
            line.component, line.dimension, line.old_value, line.new_value
        );
    }
    if report.cancelled {
        println!("Run cancelled before every change was attempted");
    }
    println!("{}", report.summary);
}

fn validate(args: &ArgMatches) -> Result<()> {
    let Some(path) = args.get_one::<PathBuf>("changes") else {
        bail!("missing modification document");
    };
    let report = parse_document(&read_document(path)?);

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report.descriptors)?);
    } else {
        for descriptor in &report.descriptors {
            println!("  {} {}", descriptor.kind(), descriptor.display_name());
        }
    }
    for message in report.error_messages() {
        eprintln!("  error: {message}");
    }

    if report.is_valid() {
        println!("{} modification(s) valid", report.descriptors.len());
        Ok(())
    } else {
        bail!(
            "{} error(s), {} valid modification(s)",
            report.errors.len(),
            report.descriptors.len()
        )
    }
}

async fn apply(args: &ArgMatches, config: RunConfig) -> Result<()> {
    let (Some(assembly), Some(changes)) = (
        args.get_one::<PathBuf>("assembly"),
        args.get_one::<PathBuf>("changes"),
    ) else {
        bail!("--assembly and --changes are required");
    };
    let document = read_document(changes)?;
    let runner = ChangeRunner::new(SimulatedCad::new(), config);

    let cancel = runner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current change");
            cancel.cancel();
        }
    });

    println!("Applying {} to {}", changes.display(), assembly.display());
    let report = runner
        .run(assembly, &document, |update| {
            if update.status.state == ProcessingState::Running {
                println!(
                    "[{}/{}] {}",
                    update.index + 1,
                    update.total,
                    update.status.feature_name
                );
            }
        })
        .await?;
    print_report(&report);

    if let Some(out) = args.get_one::<PathBuf>("report") {
        std::fs::write(out, report.to_json()?)
            .with_context(|| format!("writing report to {}", out.display()))?;
        println!("Report written to {}", out.display());
    }

    if args.get_flag("revert") {
        let restored = runner.revert(|_| {}).await?;
        println!("Restored {} original value(s)", restored.len());
    }

    if args.get_flag("commit") {
        let commit = runner.commit().await?;
        println!(
            "Committed {} file(s) to {}",
            commit.files.len(),
            commit.destination.display()
        );
        print_cleanup(&commit.cleanup);
    } else {
        if !args.get_flag("discard") {
            tracing::info!("no --commit given, discarding workspace {}", report.workspace.display());
        }
        print_cleanup(&runner.discard().await?);
    }

    if report.summary.failure_count() > 0 {
        bail!("{} change(s) failed", report.summary.failure_count());
    }
    Ok(())
}

async fn sweep(config: RunConfig) -> Result<()> {
    let root = config.working_root.clone();
    let runner = ChangeRunner::new(SimulatedCad::new(), config);
    let report = runner.sweep_orphans().await?;
    for path in &report.removed {
        println!("  removed {}", path.display());
    }
    for path in &report.skipped {
        eprintln!("  could not remove {}", path.display());
    }
    println!(
        "Swept {}: {} removed, {} skipped",
        root.display(),
        report.removed.len(),
        report.skipped.len()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("validate", args)) => validate(args),
        Some(("apply", args)) => apply(args, config).await,
        Some(("sweep", _)) => sweep(config).await,
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn commit_and_discard_conflict() {
        let result = cli().try_get_matches_from([
            "cadmod", "apply", "--assembly", "a.json", "--changes", "c.json", "--commit",
            "--discard",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn config_flag_is_global() {
        let matches = cli()
            .try_get_matches_from(["cadmod", "sweep", "--config", "run.toml"])
            .expect("parse");
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("run.toml"))
        );
    }
}
