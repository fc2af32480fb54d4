use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use framewire::demo::{ProbeMessage, TextMessage};
use framewire_codec::Message;
use framewire_session::Session;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One received message, flattened for display.
#[derive(Debug, Serialize)]
pub struct MessageOutput {
    pub session: u64,
    pub peer: Option<String>,
    pub sequence: u64,
    pub type_id: i32,
    pub kind: &'static str,
    pub summary: String,
    pub timestamp: String,
}

impl MessageOutput {
    /// Describe `message` as just received on `session`.
    pub fn describe(session: &Session, message: &dyn Message) -> Self {
        let (kind, summary) = if let Some(text) = message.downcast_ref::<TextMessage>() {
            ("text", format!("{}: {}", text.sender, text.body))
        } else if let Some(probe) = message.downcast_ref::<ProbeMessage>() {
            let summary = if probe.is_intact() {
                "intact".to_string()
            } else {
                format!("mismatched {}", probe.mismatches().join(","))
            };
            ("probe", summary)
        } else {
            ("other", format!("{message:?}"))
        };

        Self {
            session: session.id(),
            peer: session.peer_addr().map(|addr| addr.to_string()),
            sequence: session.in_count().saturating_sub(1),
            type_id: message.message_type(),
            kind,
            summary,
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_message(out: &MessageOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SESSION", "SEQ", "TYPE", "PEER", "MESSAGE"])
                .add_row(vec![
                    out.session.to_string(),
                    out.sequence.to_string(),
                    format!("{} ({})", out.type_id, out.kind),
                    out.peer.clone().unwrap_or_else(|| "-".to_string()),
                    out.summary.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "session={} seq={} type={} ({}) peer={} {}",
                out.session,
                out.sequence,
                out.type_id,
                out.kind,
                out.peer.as_deref().unwrap_or("-"),
                out.summary
            );
        }
    }
}

/// Outcome of a loopback self test.
#[derive(Debug, Default, Serialize)]
pub struct SelftestReport {
    pub rounds: u64,
    pub sent: u64,
    pub received: u64,
    pub intact: u64,
    pub server_received: u64,
    pub anomalies: u64,
    pub elapsed_ms: u64,
    pub passed: bool,
}

pub fn print_report(report: &SelftestReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHECK", "VALUE"]);
            for (name, value) in [
                ("rounds", report.rounds.to_string()),
                ("sent", report.sent.to_string()),
                ("received", report.received.to_string()),
                ("intact", report.intact.to_string()),
                ("server received", report.server_received.to_string()),
                ("anomalies", report.anomalies.to_string()),
                ("elapsed", format!("{} ms", report.elapsed_ms)),
                ("result", pass_label(report.passed).to_string()),
            ] {
                table.add_row(vec![name.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "selftest {}: rounds={} sent={} received={} intact={} server_received={} anomalies={} elapsed={}ms",
                pass_label(report.passed),
                report.rounds,
                report.sent,
                report.received,
                report.intact,
                report.server_received,
                report.anomalies,
                report.elapsed_ms
            );
        }
    }
}

fn pass_label(passed: bool) -> &'static str {
    if passed {
        "PASS"
    } else {
        "FAIL"
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_serializes_all_fields() {
        let report = SelftestReport {
            rounds: 2,
            sent: 4,
            received: 4,
            intact: 2,
            server_received: 4,
            anomalies: 0,
            elapsed_ms: 7,
            passed: true,
        };
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["passed"], true);
        assert_eq!(json["server_received"], 4);
    }

    #[test]
    fn pass_labels() {
        assert_eq!(pass_label(true), "PASS");
        assert_eq!(pass_label(false), "FAIL");
    }
}
