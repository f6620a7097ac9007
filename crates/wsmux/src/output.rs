use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use wsmux_client::{ConnectionInfo, InitialReply, TopicEvent};

#[derive(Clone, Debug, Copy, ValueEnum)]
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

#[derive(Serialize)]
struct EventOutput<'a> {
    schema_id: &'a str,
    subscription: u64,
    tag: &'a str,
    received_at: String,
    data: Value,
}

pub fn print_event(subscription: u64, event: &TopicEvent, format: OutputFormat) {
    let data = event.to_json().unwrap_or(Value::Null);
    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                schema_id: "https://schemas.3leaps.dev/wsmux/cli/v1/topic-event.schema.json",
                subscription,
                tag: event.tag(),
                received_at: now_unix_seconds(),
                data,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TAG", "SUBSCRIPTION", "DATA"])
                .add_row(vec![
                    event.tag().to_string(),
                    subscription.to_string(),
                    data.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} #{}\n{}",
                event.tag(),
                subscription,
                serde_json::to_string_pretty(&data).unwrap_or_default()
            );
        }
    }
}

/// Print the payload of a subscribe reply. Bare acknowledgements print nothing.
pub fn print_reply(reply: &InitialReply, format: OutputFormat) {
    let Ok(Some(data)) = reply.to_json() else {
        return;
    };
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "schema_id": "https://schemas.3leaps.dev/wsmux/cli/v1/subscribe-reply.schema.json",
                "data": data,
            })
        ),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "Subscribed:\n{}",
            serde_json::to_string_pretty(&data).unwrap_or_default()
        ),
    }
}

#[derive(Serialize)]
struct InfoOutput<'a> {
    schema_id: &'a str,
    endpoint: &'a str,
    client_id: i64,
    instance: Option<&'a str>,
    processor: Option<&'a str>,
    connected: bool,
}

pub fn print_connection_info(endpoint: &str, info: &ConnectionInfo, format: OutputFormat) {
    let out = InfoOutput {
        schema_id: "https://schemas.3leaps.dev/wsmux/cli/v1/connection-info.schema.json",
        endpoint,
        client_id: info.client_id,
        instance: info.instance.as_ref().map(|i| i.name.as_str()),
        processor: info.processor.as_ref().map(|p| p.name.as_str()),
        connected: true,
    };
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let client_id = out.client_id.to_string();
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["Endpoint", out.endpoint])
                .add_row(vec!["Client ID", client_id.as_str()])
                .add_row(vec!["Instance", out.instance.unwrap_or("-")])
                .add_row(vec!["Processor", out.processor.unwrap_or("-")]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Connection Info:");
            println!("  Endpoint:   {}", out.endpoint);
            println!("  Client ID:  {}", out.client_id);
            println!("  Instance:   {}", out.instance.unwrap_or("-"));
            println!("  Processor:  {}", out.processor.unwrap_or("-"));
        }
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
