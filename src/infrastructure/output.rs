//! Terminal and file rendering of a response envelope.

use crate::domain::entities::{ResponseData, ResponseEnvelope};
use anyhow::{Result, anyhow};
use colored::Colorize;
use std::io::Write;

pub fn print_response(envelope: &ResponseEnvelope, verbose: bool) -> Result<()> {
    if verbose {
        println!(
            "{}",
            format!("Status: {} {}", envelope.status, envelope.status_text).cyan()
        );
        for (name, value) in &envelope.headers {
            println!("{}", format!("{name}: {value}").cyan());
        }
        println!(
            "{}",
            format!("Elapsed: {} ms", envelope.timings.duration.as_millis()).cyan()
        );
        println!();
    }
    print_body(&envelope.data)
}

fn print_body(data: &ResponseData) -> Result<()> {
    match data {
        ResponseData::Json(value) => {
            let pretty = serde_json::to_string_pretty(value)
                .map_err(|e| anyhow!("failed to format JSON: {e}"))?;
            println!("{}", pretty.green());
        }
        ResponseData::Text(text) => println!("{}", text.white()),
        ResponseData::Binary(bytes) => {
            std::io::stdout().write_all(bytes)?;
        }
    }
    Ok(())
}

/// Writes the raw response body to a file; JSON is written compact unless
/// `pretty` asks for formatting.
pub fn write_response(path: &str, envelope: &ResponseEnvelope, pretty: bool) -> Result<()> {
    std::fs::write(path, render_file_bytes(&envelope.data, pretty)?)?;
    Ok(())
}

fn render_file_bytes(data: &ResponseData, pretty: bool) -> Result<Vec<u8>> {
    Ok(match data {
        ResponseData::Json(value) if pretty => serde_json::to_vec_pretty(value)?,
        ResponseData::Json(value) => serde_json::to_vec(value)?,
        ResponseData::Text(text) => text.clone().into_bytes(),
        ResponseData::Binary(bytes) => bytes.clone(),
    })
}
