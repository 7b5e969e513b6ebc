use crate::application::builders::request_builder::RequestBuilder;
use crate::application::services::Client;
use crate::domain::entities::{ContentMode, RequestDescriptor};
use crate::domain::errors::ClientError;
use crate::infrastructure::output;
use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::time::Duration;

/// CLI configuration for qurl
#[derive(Parser, Debug)]
#[command(name = "qurl", version)]
#[command(about = "qurl: terse key=value HTTP requests", long_about = None)]
pub struct Cli {
    /// [METHOD] URL followed by request items:
    /// header:value, key=value, key:=json, key==query, key@file
    #[arg(required = true, num_args = 1..)]
    pub args: Vec<String>,

    /// Serialize data items as JSON (the default when data items are present)
    #[arg(short = 'j', long, overrides_with_all = ["form", "multipart"])]
    pub json: bool,

    /// Serialize data items as application/x-www-form-urlencoded
    #[arg(short = 'f', long, overrides_with_all = ["json", "multipart"])]
    pub form: bool,

    /// Serialize data items as multipart/form-data
    #[arg(short = 'm', long, overrides_with_all = ["json", "form"])]
    pub multipart: bool,

    /// Additional header as 'Name: value' (repeatable); an empty value unsets
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Basic auth credentials as user:password
    #[arg(short = 'a', long)]
    pub auth: Option<String>,

    /// Bearer token for the Authorization header
    #[arg(short = 'b', long)]
    pub bearer: Option<String>,

    /// Request timeout in seconds (fractions allowed)
    #[arg(short = 't', long, allow_negative_numbers = true)]
    pub timeout: Option<f64>,

    /// Write the response body to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Pretty-print JSON bodies written with -o (terminal output is always
    /// formatted)
    #[arg(long)]
    pub pretty: bool,

    #[arg(short, long)]
    pub verbose: bool,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,
}

impl Cli {
    /// Content mode from the serialization flags; clap's override rules make
    /// the last flag on the command line win.
    pub fn content_mode(&self) -> Option<ContentMode> {
        if self.json {
            Some(ContentMode::Json)
        } else if self.form {
            Some(ContentMode::Form)
        } else if self.multipart {
            Some(ContentMode::Multipart)
        } else {
            None
        }
    }

    /// Compiles positional tokens and flags into a request descriptor,
    /// returning any classification warnings alongside it.
    pub fn build_descriptor(&self) -> Result<(RequestDescriptor, Vec<String>), ClientError> {
        let mut builder = RequestBuilder::from_tokens(&self.args)?;
        if let Some(mode) = self.content_mode() {
            builder = builder.content_mode(mode);
        }
        for raw in &self.headers {
            let (name, value) = raw.split_once(':').ok_or_else(|| {
                ClientError::InvalidArgument(format!("invalid header '{raw}', use 'Name: value'"))
            })?;
            builder = builder.header(name.trim(), value.trim());
        }
        if let Some(credentials) = &self.auth {
            builder = builder.basic_auth(credentials);
        }
        if let Some(token) = &self.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(secs) = self.timeout {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ClientError::InvalidArgument(format!(
                    "invalid timeout '{secs}'"
                )));
            }
            builder = builder.timeout(Duration::from_secs_f64(secs));
        }
        let warnings = builder.warnings().to_vec();
        Ok((builder.build()?, warnings))
    }

    pub async fn run(&self, client: &Client) -> Result<()> {
        let (descriptor, warnings) = self.build_descriptor()?;
        for warning in &warnings {
            eprintln!("{}", warning.yellow());
        }

        let verbose = self.verbose || client.config().verbose;
        let envelope = client.send(&descriptor).await?;

        match &self.output {
            Some(path) => {
                output::write_response(path, &envelope, self.pretty)?;
                if verbose {
                    println!("Saved response to {path}");
                }
            }
            None => output::print_response(&envelope, verbose)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Method;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("qurl").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn last_mode_flag_wins() {
        let cli = parse(&["example.com", "-j", "-f"]);
        assert_eq!(cli.content_mode(), Some(ContentMode::Form));
        let cli = parse(&["example.com", "-f", "-m", "-j"]);
        assert_eq!(cli.content_mode(), Some(ContentMode::Json));
    }

    #[test]
    fn json_scenario_builds_expected_descriptor() {
        let cli = parse(&["post", "example.com/users", "name=John", "age:=25", "-j"]);
        let (descriptor, warnings) = cli.build_descriptor().unwrap();
        assert!(warnings.is_empty());
        assert_eq!(descriptor.method, Method::Post);
        assert_eq!(descriptor.url, "https://example.com/users");
        assert_eq!(descriptor.content_mode, ContentMode::Json);
    }

    #[test]
    fn header_flag_requires_colon() {
        let cli = parse(&["example.com", "-H", "NoColonHere"]);
        assert!(matches!(
            cli.build_descriptor(),
            Err(ClientError::InvalidArgument(_))
        ));
    }

    #[test]
    fn timeout_flag_converts_to_duration() {
        let cli = parse(&["example.com", "-t", "0.05"]);
        let (descriptor, _) = cli.build_descriptor().unwrap();
        assert_eq!(descriptor.timeout, Some(Duration::from_millis(50)));
    }

    #[test]
    fn pretty_flag_is_accepted() {
        let cli = parse(&["example.com", "--pretty"]);
        assert!(cli.pretty);
        assert!(!parse(&["example.com"]).pretty);
    }

    #[test]
    fn negative_timeout_is_rejected() {
        let cli = parse(&["example.com", "-t", "-1"]);
        assert!(matches!(
            cli.build_descriptor(),
            Err(ClientError::InvalidArgument(_))
        ));
    }
}
