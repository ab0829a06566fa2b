//! End-to-end run: pick inputs, load, match, ask for credentials, send.

use tracing::{error, info, warn};

use crate::error::LoadError;
use crate::interaction::{titles, Interaction, Notification, CSV_FILES};
use crate::mailer::{self, Connector, MessageTemplate, SessionConfig};
use crate::models::{AbortReason, RunOutcome};
use crate::{loader, matcher, report};

pub fn run<I: Interaction, C: Connector>(
    ui: &mut I,
    connector: &C,
    template: &MessageTemplate,
) -> RunOutcome {
    let Some(csv_path) = ui.pick_file(titles::CSV_FILE, CSV_FILES) else {
        return RunOutcome::Cancelled;
    };
    let Some(reports_dir) = ui.pick_directory(titles::REPORTS_DIR) else {
        return RunOutcome::Cancelled;
    };

    let load = match loader::load_with_report(&csv_path) {
        Ok(load) => load,
        Err(err) => {
            error!("Failed to load CSV: {err}");
            ui.notify(&Notification::error("CSV Error", csv_error_message(&err)));
            return RunOutcome::Aborted(AbortReason::Load(err.to_string()));
        }
    };
    if load.records.is_empty() {
        warn!("No usable student rows in {}", csv_path.display());
        ui.notify(&Notification::error(
            "CSV Error",
            "No students with both a student_name and a parent_email were found.",
        ));
        return RunOutcome::Aborted(AbortReason::NoRecords);
    }

    let matches = matcher::match_students(&reports_dir, &load.records);
    info!(
        "Matched {} of {} students to reports in {}",
        matches.matched.len(),
        load.records.len(),
        reports_dir.display()
    );

    if matches.matched.is_empty() {
        let names = matches.unmatched_names();
        warn!("No reports matched; {} students missing", names.len());
        ui.notify(&Notification::error(
            "No Matches",
            report::no_match_message(&matches),
        ));
        return RunOutcome::Aborted(AbortReason::NoMatches {
            sample: names
                .iter()
                .take(report::UNMATCHED_SAMPLE)
                .map(|name| name.to_string())
                .collect(),
            missing: names.len(),
        });
    }

    let config = match ask_credentials(ui) {
        Credentials::Provided(config) => config,
        Credentials::Cancelled => return RunOutcome::Cancelled,
        Credentials::InvalidPort(port) => {
            ui.notify(&Notification::error(
                "Port",
                format!("{port} is not a valid SMTP port (1-65535)"),
            ));
            return RunOutcome::Aborted(AbortReason::InvalidPort(port));
        }
    };

    match mailer::dispatch(
        connector,
        &config,
        template,
        &matches.matched,
        load.records.len(),
    ) {
        Ok(summary) => {
            ui.notify(&Notification::info(
                "Complete",
                report::summary_message(&summary),
            ));
            RunOutcome::Completed {
                csv_path,
                reports_dir,
                load,
                matches,
                summary,
            }
        }
        Err(err) => {
            error!("SMTP Error: {err}");
            ui.notify(&Notification::error(
                "Email Error",
                format!("Failed to send emails:\n\n{err}"),
            ));
            RunOutcome::Aborted(AbortReason::Session(err.to_string()))
        }
    }
}

fn csv_error_message(err: &LoadError) -> String {
    format!(
        "Could not read student data:\n\n{err}\n\n\
         Please check:\n\
         - File is a valid CSV\n\
         - Contains 'student_name' and 'parent_email' columns\n\
         - No empty rows in data"
    )
}

enum Credentials {
    Provided(SessionConfig),
    Cancelled,
    InvalidPort(i64),
}

/// An empty answer counts as cancelling, as does port 0.
fn ask_credentials<I: Interaction>(ui: &mut I) -> Credentials {
    let Some((email, password, host, port)) = prompt_credentials(ui) else {
        return Credentials::Cancelled;
    };
    match u16::try_from(port) {
        Ok(port) => Credentials::Provided(SessionConfig {
            email,
            password,
            host,
            port,
        }),
        Err(_) => Credentials::InvalidPort(port),
    }
}

fn prompt_credentials<I: Interaction>(ui: &mut I) -> Option<(String, String, String, i64)> {
    let email = non_empty(ui.ask_text(titles::EMAIL, "Your email address"))?;
    let password = non_empty(ui.ask_secret(titles::PASSWORD, "Your email password"))?;
    let host = non_empty(ui.ask_text_with_default(
        titles::SMTP_HOST,
        "SMTP server",
        mailer::DEFAULT_SMTP_HOST,
    ))?;
    let port = ui
        .ask_integer_with_default(
            titles::SMTP_PORT,
            "SMTP port",
            i64::from(mailer::DEFAULT_SMTP_PORT),
        )
        .filter(|port| *port != 0)?;
    Some((email, password, host, port))
}

fn non_empty(answer: Option<String>) -> Option<String> {
    answer.filter(|value| !value.is_empty())
}
