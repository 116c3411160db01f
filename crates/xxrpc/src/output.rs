use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use xxrpc_core::{Codec, CodecKind, Response};

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
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct CallOutput<'a> {
    method: &'a str,
    codec: &'a str,
    ok: bool,
    data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    elapsed_us: u128,
}

/// Print one call result. `data` is decoded with the call's codec into a
/// JSON value; bytes that do not decode are shown as a size summary.
pub fn print_response(
    method: &str,
    codec: CodecKind,
    resp: &Response,
    elapsed_us: u128,
    format: OutputFormat,
) {
    let data = decode_data(codec, &resp.data);
    let error = resp.is_error().then_some(resp.error.as_str());

    match format {
        OutputFormat::Json => {
            let out = CallOutput {
                method,
                codec: codec.name(),
                ok: error.is_none(),
                data,
                error,
                elapsed_us,
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
                .set_header(vec!["METHOD", "STATUS", "DATA", "ERROR", "ELAPSED"])
                .add_row(vec![
                    method.to_string(),
                    status(error).to_string(),
                    data.to_string(),
                    error.unwrap_or("").to_string(),
                    format!("{elapsed_us}us"),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match error {
            None => println!("{method} ok ({elapsed_us}us)\n{data:#}"),
            Some(error) => println!("{method} error ({elapsed_us}us): {error}"),
        },
        OutputFormat::Raw => print_raw(&resp.data),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn status(error: Option<&str>) -> &'static str {
    if error.is_some() {
        "ERROR"
    } else {
        "OK"
    }
}

fn decode_data(codec: CodecKind, data: &[u8]) -> serde_json::Value {
    if data.is_empty() {
        return serde_json::Value::Null;
    }
    codec
        .unmarshal::<serde_json::Value>(data)
        .unwrap_or_else(|_| serde_json::Value::String(format!("<binary {} bytes>", data.len())))
}
