use std::io::{self, IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dmlcap_dml::{Fields, Message, Middleware, MiddlewareError};
use serde::Serialize;

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
struct MessageOutput<'a> {
    name: &'a str,
    message: &'a Fields,
}

/// Writes each delivered message as `{"name": ..., "message": {...}}`.
pub struct JsonSink<W> {
    out: W,
    compact: bool,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(out: W, compact: bool) -> Self {
        Self { out, compact }
    }
}

impl<W: Write + Send> Middleware for JsonSink<W> {
    fn observe(&mut self, message: &Message) -> Result<(), MiddlewareError> {
        let record = MessageOutput {
            name: &message.name,
            message: &message.fields,
        };
        // Surface the writer's io::Error so exit codes can see its kind.
        if self.compact {
            serde_json::to_writer(&mut self.out, &record).map_err(io::Error::from)?;
        } else {
            serde_json::to_writer_pretty(&mut self.out, &record).map_err(io::Error::from)?;
        }
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), MiddlewareError> {
        self.out.flush()?;
        Ok(())
    }
}

/// One row of the `frames` listing.
#[derive(Serialize)]
pub struct FrameRow {
    pub index: u64,
    pub kind: &'static str,
    pub opcode: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control: Option<&'static str>,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<u8>,
}

pub fn print_frames(rows: &[FrameRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for row in rows {
                println!(
                    "{}",
                    serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "KIND", "OPCODE", "SIZE", "SERVICE", "ORDER"]);
            for row in rows {
                table.add_row(vec![
                    row.index.to_string(),
                    row.kind.to_string(),
                    match row.control {
                        Some(name) => format!("{} ({name})", row.opcode),
                        None => row.opcode.to_string(),
                    },
                    row.size.to_string(),
                    optional(row.service_id),
                    optional(row.order_number),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                match (row.control, row.service_id, row.order_number) {
                    (Some(name), _, _) => println!(
                        "#{} {} opcode={} ({name}) size={}",
                        row.index, row.kind, row.opcode, row.size
                    ),
                    (None, Some(service_id), Some(order_number)) => println!(
                        "#{} {} service={service_id} order={order_number} size={}",
                        row.index, row.kind, row.size
                    ),
                    _ => println!("#{} {} size={} (no envelope)", row.index, row.kind, row.size),
                }
            }
        }
    }
}

/// One message kind in the `services` listing.
#[derive(Serialize)]
pub struct ServiceRow {
    pub service_id: u8,
    pub service: String,
    pub order_number: u8,
    pub name: String,
    pub fields: Vec<String>,
}

pub fn print_services(rows: &[ServiceRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(rows).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SERVICE", "ORDER", "MESSAGE", "FIELDS"]);
            for row in rows {
                table.add_row(vec![
                    format!("{} ({})", row.service, row.service_id),
                    row.order_number.to_string(),
                    row.name.clone(),
                    row.fields.join(", "),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let mut current = None;
            for row in rows {
                if current != Some(row.service_id) {
                    println!("{} (service {}):", row.service, row.service_id);
                    current = Some(row.service_id);
                }
                println!(
                    "  {:>3}  {}  [{}]",
                    row.order_number,
                    row.name,
                    row.fields.join(", ")
                );
            }
        }
    }
}

fn optional(value: Option<u8>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
