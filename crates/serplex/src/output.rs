use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serplex_frame::{stream_name, Frame};

#[derive(Clone, Debug, Copy, ValueEnum)]
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
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    stream: String,
    stream_key: u32,
    role: &'a str,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

#[derive(Serialize)]
struct SendOutput<'a> {
    stream: String,
    bytes: usize,
    wire_bytes: usize,
    framed: bool,
    socket: &'a str,
}

pub fn print_frame(frame: &Frame, format: OutputFormat) {
    let role = stream_name(frame.stream);
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                stream: frame.stream.to_string(),
                stream_key: frame.stream.as_u32(),
                role,
                payload_size: frame.payload.len(),
                payload: payload_preview(frame.payload.as_ref()),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STREAM", "ROLE", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    frame.stream.to_string(),
                    role.to_string(),
                    frame.payload.len().to_string(),
                    payload_preview(frame.payload.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "[{}] {}",
                frame.stream,
                payload_preview(frame.payload.as_ref()).trim_end_matches('\n')
            );
        }
        OutputFormat::Raw => {
            print_raw(frame.payload.as_ref());
        }
    }
}

pub fn print_send_summary(
    stream: &str,
    bytes: usize,
    wire_bytes: usize,
    framed: bool,
    socket: &str,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&SendOutput {
            stream: stream.to_string(),
            bytes,
            wire_bytes,
            framed,
            socket,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["STREAM", "BYTES", "WIRE", "FRAMED"])
                .add_row(vec![
                    stream.to_string(),
                    bytes.to_string(),
                    wire_bytes.to_string(),
                    framed.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("sent {bytes} bytes on {stream} ({wire_bytes} on the wire)");
        }
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
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
    fn binary_payloads_are_summarised() {
        assert_eq!(payload_preview(b"text"), "text");
        assert_eq!(payload_preview(&[0xff, 0xfe]), "<binary 2 bytes>");
    }
}
