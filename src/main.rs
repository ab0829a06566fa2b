use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

mod dialect;
mod error;
mod interaction;
mod loader;
mod logging;
mod mailer;
mod matcher;
mod models;
mod report;
mod workflow;

use interaction::{Interaction, Notification, PrefilledInteraction, TerminalInteraction};
use logging::{LineFormat, LogConfig};
use mailer::{Connector, MessageTemplate, SmtpConnector};
use models::RunOutcome;

#[derive(Parser)]
#[command(name = "report-mailer")]
#[command(about = "Email report-card PDFs to parents listed in a student CSV", long_about = None)]
struct Cli {
    /// Append-only log file
    #[arg(long, global = true, env = "REPORT_MAILER_LOG", default_value = logging::DEFAULT_LOG_FILE)]
    log_file: PathBuf,
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LineFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match reports to students and email them to parents.
    /// Anything not given on the command line is prompted for.
    Send {
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        reports_dir: Option<PathBuf>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = "SMTP_HOST")]
        smtp_host: Option<String>,
        #[arg(long, env = "SMTP_PORT")]
        smtp_port: Option<u16>,
        /// Closing line of every email
        #[arg(long, default_value = mailer::DEFAULT_SIGNATURE)]
        signature: String,
        /// Write a markdown delivery report after a completed run
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Load and match without sending anything
    Check {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        reports_dir: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&LogConfig {
        destination: cli.log_file,
        min_level: cli.log_level,
        line_format: cli.log_format,
    })?;

    match cli.command {
        Commands::Send {
            csv,
            reports_dir,
            email,
            smtp_host,
            smtp_port,
            signature,
            report,
        } => {
            let mut ui = PrefilledInteraction::new(TerminalInteraction::stdio())
                .csv_file(csv)
                .reports_dir(reports_dir)
                .email(email)
                .password(std::env::var("SMTP_PASSWORD").ok())
                .smtp_host(smtp_host)
                .smtp_port(smtp_port);
            let template = MessageTemplate { signature };

            let connector = SmtpConnector::default();
            if let Err(err) = send(&mut ui, &connector, &template, report.as_deref()) {
                error!("Application error: {err:#}");
                ui.notify(&Notification::error(
                    "Error",
                    format!("An error occurred:\n\n{err:#}"),
                ));
            }
        }
        Commands::Check {
            csv,
            reports_dir,
            out,
            json,
        } => check(&csv, &reports_dir, out.as_deref(), json)?,
    }

    Ok(())
}

/// Runs the workflow and writes the delivery report. Expected failures are
/// already reported to the user by the workflow; anything returned here is an
/// application error.
fn send<I: Interaction, C: Connector>(
    ui: &mut I,
    connector: &C,
    template: &MessageTemplate,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    let outcome = workflow::run(ui, connector, template);
    match &outcome {
        RunOutcome::Cancelled => info!("Run cancelled by user"),
        RunOutcome::Aborted(reason) => info!("Run stopped: {reason}"),
        RunOutcome::Completed { .. } => {}
    }

    if let (
        RunOutcome::Completed {
            csv_path,
            reports_dir,
            load,
            matches,
            summary,
        },
        Some(out),
    ) = (&outcome, report_path)
    {
        let text = report::build_report(csv_path, reports_dir, load, matches, Some(summary));
        std::fs::write(out, text)
            .with_context(|| format!("failed to write report to {}", out.display()))?;
        println!("Report written to {}.", out.display());
    }

    Ok(())
}

#[derive(serde::Serialize)]
struct CheckOutput<'a> {
    load: &'a models::StudentLoad,
    matches: &'a models::MatchReport,
}

fn check(csv: &Path, reports_dir: &Path, out: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let load = loader::load_with_report(csv)
        .with_context(|| format!("failed to load students from {}", csv.display()))?;
    let matches = matcher::match_students(reports_dir, &load.records);

    if json {
        let body = CheckOutput {
            load: &load,
            matches: &matches,
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!(
            "{} students loaded, {} rows skipped.",
            load.records.len(),
            load.skipped.len()
        );
        println!(
            "{} of {} matched, {} without a report.",
            matches.matched.len(),
            matches.total(),
            matches.unmatched.len()
        );
        for name in matches.unmatched_names() {
            println!("- missing: {name}");
        }
    }

    if let Some(out) = out {
        let text = report::build_report(csv, reports_dir, &load, &matches, None);
        std::fs::write(out, text)
            .with_context(|| format!("failed to write report to {}", out.display()))?;
        println!("Report written to {}.", out.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::mailer::testing::MemoryConnector;

    type Prompts = PrefilledInteraction<TerminalInteraction<Cursor<Vec<u8>>, Vec<u8>>>;

    fn answered(dir: &Path) -> Prompts {
        let csv = dir.join("students.csv");
        std::fs::write(&csv, "student_name,parent_email\nJohn Smith,john@example.com\n")
            .expect("write csv");
        std::fs::write(dir.join("John_Smith.pdf"), b"%PDF-1.4").expect("write pdf");

        PrefilledInteraction::new(TerminalInteraction::new(Cursor::new(Vec::new()), Vec::new()))
            .csv_file(Some(csv))
            .reports_dir(Some(dir.to_path_buf()))
            .email(Some("office@school.example".to_string()))
            .password(Some("app-password".to_string()))
            .smtp_host(Some("smtp.school.example".to_string()))
            .smtp_port(Some(587))
    }

    #[test]
    fn completed_run_writes_delivery_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ui = answered(dir.path());
        let out = dir.path().join("delivery.md");

        send(&mut ui, &MemoryConnector::default(), &MessageTemplate::default(), Some(&out))
            .expect("send");

        let report = std::fs::read_to_string(&out).expect("report");
        assert!(report.contains("## Delivery"));
        assert!(report.contains("- sent 1 of 1 reports (1 attempted)"));
    }

    #[test]
    fn unwritable_report_surfaces_as_application_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ui = answered(dir.path());
        let out = dir.path().join("missing").join("delivery.md");

        let err = send(&mut ui, &MemoryConnector::default(), &MessageTemplate::default(), Some(&out))
            .unwrap_err();

        assert!(format!("{err:#}").contains("failed to write report"));
    }

    #[test]
    fn aborted_run_is_not_an_application_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ui = answered(dir.path());
        let connector = MemoryConnector {
            fail_auth: true,
            ..Default::default()
        };
        let out = dir.path().join("delivery.md");

        send(&mut ui, &connector, &MessageTemplate::default(), Some(&out)).expect("send");
        assert!(!out.exists());
    }
}
