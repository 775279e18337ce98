use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pyshell_channel::{ExitInfo, Message, StreamKind};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Raw
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EventOutput<'a> {
    Message {
        stream: &'a str,
        kind: &'a str,
        message: serde_json::Value,
    },
    Close {
        exit_code: Option<i32>,
        signal: Option<String>,
    },
}

/// Renders channel output in the selected format.
///
/// Table output is buffered and printed when the channel closes; every other
/// format prints as messages arrive.
pub struct Printer {
    format: OutputFormat,
    rows: Vec<[String; 3]>,
}

impl Printer {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            rows: Vec::new(),
        }
    }

    pub fn message(&mut self, stream: StreamKind, message: &Message) {
        match self.format {
            OutputFormat::Json => print_json(&EventOutput::Message {
                stream: stream.as_str(),
                kind: message.kind(),
                message: message_value(message),
            }),
            OutputFormat::Table => {
                self.rows.push([
                    stream.to_string(),
                    message.kind().to_string(),
                    message.to_string(),
                ]);
            }
            OutputFormat::Pretty => match stream {
                StreamKind::Stderr => eprintln!("{stream} | {message}"),
                _ => println!("{stream} | {message}"),
            },
            OutputFormat::Raw => match stream {
                StreamKind::Stderr => {
                    let mut err = std::io::stderr();
                    let _ = write_raw(&mut err, message);
                }
                _ => {
                    let mut out = std::io::stdout();
                    let _ = write_raw(&mut out, message);
                }
            },
        }
    }

    pub fn close(&mut self, exit: &ExitInfo) {
        match self.format {
            OutputFormat::Json => print_json(&EventOutput::Close {
                exit_code: exit.code,
                signal: exit.signal.map(|signal| signal.to_string()),
            }),
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec!["STREAM", "KIND", "MESSAGE"]);
                for row in self.rows.drain(..) {
                    table.add_row(row.to_vec());
                }
                table.add_row(vec!["exit".to_string(), String::new(), exit.to_string()]);
                println!("{table}");
            }
            OutputFormat::Pretty => println!("-- {exit}"),
            OutputFormat::Raw => {}
        }
    }
}

/// Print a single result record, e.g. a syntax check or version report.
pub fn print_record<T: Serialize>(record: &T, fields: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in fields {
                table.add_row(vec![name.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (name, value) in fields {
                println!("{name}: {value}");
            }
        }
        OutputFormat::Raw => {
            for (_, value) in fields {
                println!("{value}");
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn message_value(message: &Message) -> serde_json::Value {
    match message {
        Message::Json(value) => value.clone(),
        other => serde_json::Value::String(other.to_string()),
    }
}

/// Text and JSON messages get their line back; binary chunks are written as is.
fn write_raw(out: &mut impl Write, message: &Message) -> std::io::Result<()> {
    match message {
        Message::Binary(bytes) => out.write_all(bytes)?,
        other => writeln!(out, "{other}")?,
    }
    out.flush()
}
