use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use nokey_client::{ApiClient, CallArgs, ResponseKind};
use nokey_core::Config;
use serde_json::Value;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "nokey")]
#[command(propagate_version = true)]
struct Cli {
  #[command(subcommand)]
  command: Commands,

  /// Verbose output
  #[arg(short, long, global = true)]
  verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Print the categorized catalog of known APIs
  List,
  /// Print the documentation URL for an API
  Docs { api: String },
  /// Print a short description of an API
  About { api: String },
  /// Call an endpoint and print the JSON result
  Call {
    api: String,
    endpoint: String,

    /// Endpoint arguments as key=value pairs; values are parsed as JSON
    /// when possible, otherwise taken as strings
    #[arg(short, long = "arg")]
    args: Vec<String>,

    /// Give up instead of waiting longer than this for a throttle slot
    #[arg(long)]
    wait_budget_secs: Option<u64>,

    /// Write raw-content responses to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  dotenv().ok();

  let cli = Cli::parse();

  let log_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt().with_env_filter(log_level).init();

  let config = Config::from_env()?;
  let client = ApiClient::new(&config)?;

  match cli.command {
    Commands::List => {
      print!("{}", nokey_client::listing::render(client.catalog()));
    }
    Commands::Docs { api } => {
      println!("{}", client.docs_url(&api)?);
    }
    Commands::About { api } => {
      println!("{}", client.about(&api)?);
    }
    Commands::Call { api, endpoint, args, wait_budget_secs, output } => {
      let args = parse_args(&args)?;
      debug!(?args, "parsed endpoint arguments");
      let response =
        client.catalog().api(&api)?.endpoint(&endpoint)?.response;
      info!(api = %api, endpoint = %endpoint, "calling endpoint");

      match response {
        ResponseKind::Json => {
          let value = match wait_budget_secs {
            Some(secs) => {
              client
                .call_within(&api, &endpoint, args, Duration::from_secs(secs))
                .await?
            }
            None => client.call(&api, &endpoint, args).await?,
          };
          println!("{}", serde_json::to_string_pretty(&value)?);
        }
        ResponseKind::Bytes => {
          let body = client.fetch_bytes(&api, &endpoint, args).await?;
          eprintln!("{} bytes received", body.len());
          match bytes_sink(output, std::io::stdout().is_terminal()) {
            BytesSink::File(file) => {
              std::fs::write(&file, &body)
                .with_context(|| format!("failed to write {}", file.display()))?;
              info!(bytes = body.len(), file = %file.display(), "wrote response body");
            }
            BytesSink::Stdout => {
              std::io::stdout().write_all(&body)?;
            }
            BytesSink::Discard => {
              eprintln!("refusing to write raw content to a terminal; pass -o FILE or redirect stdout");
            }
          }
        }
      }
    }
  }

  Ok(())
}

/// Where a raw-content response body goes.
#[derive(Debug, PartialEq)]
enum BytesSink {
  File(PathBuf),
  Stdout,
  /// Stdout is an interactive terminal and no file was given; keep the raw
  /// bytes off the screen
  Discard,
}

fn bytes_sink(output: Option<PathBuf>, stdout_is_terminal: bool) -> BytesSink {
  match output {
    Some(file) => BytesSink::File(file),
    None if stdout_is_terminal => BytesSink::Discard,
    None => BytesSink::Stdout,
  }
}

/// Split `key=value` pairs, parsing each value as JSON when it is valid
/// JSON and falling back to a plain string otherwise.
fn parse_args(pairs: &[String]) -> Result<CallArgs> {
  let mut args = CallArgs::new();
  for pair in pairs {
    let Some((key, value)) = pair.split_once('=') else {
      bail!("argument `{pair}` is not of the form key=value");
    };
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    args.insert(key.to_string(), value);
  }
  Ok(args)
}
