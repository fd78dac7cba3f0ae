// CLI layer: argument surface and per-command flows. All printing lives
// here; the handlers validate their inputs, establish a session and
// delegate the actual call to `api`.

use std::io::{self, Read};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{ApiReply, EditEntry, NewEntry, RentryClient, ServiceConfig, ServiceError};

const EXAMPLES: &str = "\
Examples:
  rentry new 'markdown text'               # new entry with random url and edit code
  rentry new -p pw -u example 'text'       # with custom edit code and url
  rentry edit -p pw -u example 'text'      # edit the example entry
  cat FILE | rentry new                    # read from FILE and paste it to rentry
  cat FILE | rentry edit -p pw -u example  # read from FILE and edit the example entry
  rentry raw -u example                    # get raw markdown text
  rentry raw -u https://rentry.co/example  # -u accepts absolute and relative urls
  rentry fetch -u example -p pw            # fetch all details about an entry
  rentry delete -u example -p pw           # delete an entry";

#[derive(Parser, Debug)]
#[command(name = "rentry")]
#[command(about = "Command line client for the rentry.co pastebin", version)]
#[command(after_help = EXAMPLES)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new entry
    New {
        /// Markdown text for the entry, read from stdin when omitted
        text: Option<String>,

        /// Url for the entry, random if not specified
        #[arg(short, long)]
        url: Option<String>,

        /// Edit code for the entry, random if not specified
        #[arg(short = 'p', long = "edit-code")]
        edit_code: Option<String>,

        /// Metadata for the entry
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Edit an existing entry
    Edit {
        /// Markdown text for the entry, read from stdin when omitted
        text: Option<String>,

        /// Url of the entry
        #[arg(short, long)]
        url: Option<String>,

        /// Edit code of the entry
        #[arg(short = 'p', long = "edit-code")]
        edit_code: Option<String>,

        /// Metadata for the entry
        #[arg(short, long)]
        metadata: Option<String>,
    },

    /// Get raw markdown text of an existing entry
    Raw {
        /// Url of the entry
        #[arg(short, long)]
        url: Option<String>,

        /// Authentication header for the raw endpoint
        #[arg(short, long)]
        auth: Option<String>,
    },

    /// Fetch details about an entry
    Fetch {
        /// Url of the entry
        #[arg(short, long)]
        url: Option<String>,

        /// Edit code of the entry
        #[arg(short = 'p', long = "edit-code")]
        edit_code: Option<String>,
    },

    /// Delete an entry
    Delete {
        /// Url of the entry
        #[arg(short, long)]
        url: Option<String>,

        /// Edit code of the entry
        #[arg(short = 'p', long = "edit-code")]
        edit_code: Option<String>,
    },
}

/// Parse the command line. Help and version exit 0; every parse failure
/// (unknown command, unrecognized option) exits 1 after clap prints its
/// usage error.
pub fn parse() -> Cli {
    Cli::try_parse().unwrap_or_else(|err| {
        let code = match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
            _ => 1,
        };
        let _ = err.print();
        std::process::exit(code);
    })
}

/// Dispatch the parsed command. The service endpoint is read from the
/// environment exactly once, here.
pub fn run(cli: Cli) -> Result<()> {
    let config = ServiceConfig::from_env();
    match cli.command {
        Commands::New {
            text,
            url,
            edit_code,
            metadata,
        } => handle_new(&config, text, url, edit_code, metadata),
        Commands::Edit {
            text,
            url,
            edit_code,
            metadata,
        } => handle_edit(&config, text, url, edit_code, metadata),
        Commands::Raw { url, auth } => handle_raw(&config, url, auth),
        Commands::Fetch { url, edit_code } => handle_fetch(&config, url, edit_code),
        Commands::Delete { url, edit_code } => handle_delete(&config, url, edit_code),
    }
}

fn handle_new(
    config: &ServiceConfig,
    text: Option<String>,
    url: Option<String>,
    edit_code: Option<String>,
    metadata: Option<String>,
) -> Result<()> {
    let params = NewEntry {
        text: text_or_stdin(text)?,
        url: url.as_deref().map(extract_slug).unwrap_or_default(),
        edit_code: edit_code.unwrap_or_default(),
        metadata: metadata.unwrap_or_default(),
    };

    let reply = with_spinner("Creating entry...", || {
        let client = RentryClient::new(config)?;
        client.create(&params)
    })?;
    match reply {
        ApiReply::Success(created) => {
            println!("Url:        {}", created.url);
            println!("Edit code:  {}", created.edit_code);
            Ok(())
        }
        ApiReply::Failure(err) => service_failure(&err),
    }
}

fn handle_edit(
    config: &ServiceConfig,
    text: Option<String>,
    url: Option<String>,
    edit_code: Option<String>,
    metadata: Option<String>,
) -> Result<()> {
    let slug = require_url(url.as_deref())?;
    let params = EditEntry {
        edit_code: require_edit_code(edit_code)?,
        text: text_or_stdin(text)?,
        metadata: metadata.unwrap_or_default(),
        update_mode: String::new(),
    };

    let reply = with_spinner("Editing entry...", || {
        let client = RentryClient::new(config)?;
        client.edit(&slug, &params)
    })?;
    match reply {
        ApiReply::Success(()) => {
            println!("Ok");
            Ok(())
        }
        ApiReply::Failure(err) => service_failure(&err),
    }
}

fn handle_raw(config: &ServiceConfig, url: Option<String>, auth: Option<String>) -> Result<()> {
    let slug = require_url(url.as_deref())?;
    let auth = auth.filter(|a| !a.is_empty());

    let reply = with_spinner("Fetching raw text...", || {
        let client = RentryClient::new(config)?;
        client.raw(&slug, auth.as_deref())
    })?;
    match reply {
        ApiReply::Success(text) => {
            println!("{text}");
            Ok(())
        }
        // The raw endpoint reports plain error text in `content`; there
        // are no sub-messages to print.
        ApiReply::Failure(err) => {
            eprintln!("error: {}", err.content);
            std::process::exit(1);
        }
    }
}

fn handle_fetch(
    config: &ServiceConfig,
    url: Option<String>,
    edit_code: Option<String>,
) -> Result<()> {
    let slug = require_url(url.as_deref())?;
    let edit_code = require_edit_code(edit_code)?;

    let reply = with_spinner("Fetching entry details...", || {
        let client = RentryClient::new(config)?;
        client.fetch(&slug, &edit_code)
    })?;
    match reply {
        ApiReply::Success(content) => {
            let pretty = serde_json::to_string_pretty(&content)
                .context("Failed to format the entry details")?;
            println!("{pretty}");
            Ok(())
        }
        ApiReply::Failure(err) => service_failure(&err),
    }
}

fn handle_delete(
    config: &ServiceConfig,
    url: Option<String>,
    edit_code: Option<String>,
) -> Result<()> {
    let slug = require_url(url.as_deref())?;
    let edit_code = require_edit_code(edit_code)?;

    let reply = with_spinner("Deleting entry...", || {
        let client = RentryClient::new(config)?;
        client.delete(&slug, &edit_code)
    })?;
    match reply {
        ApiReply::Success(()) => {
            println!("Entry deleted successfully");
            Ok(())
        }
        ApiReply::Failure(err) => service_failure(&err),
    }
}

/// Reduce a `-u` value to the slug used in request paths. Accepts an
/// absolute URL or a bare slug: the path component is kept; scheme, host,
/// query and fragment are discarded; surrounding slashes are trimmed.
pub fn extract_slug(input: &str) -> String {
    let input = input.split(['?', '#']).next().unwrap_or("");
    let path = match input.find("://") {
        Some(scheme_end) => {
            let rest = &input[scheme_end + 3..];
            match rest.find('/') {
                Some(path_start) => &rest[path_start..],
                None => "",
            }
        }
        None => input,
    };
    path.trim_matches('/').to_string()
}

fn require_url(url: Option<&str>) -> Result<String> {
    let slug = url.map(extract_slug).unwrap_or_default();
    if slug.is_empty() {
        bail!("url is required");
    }
    Ok(slug)
}

fn require_edit_code(edit_code: Option<String>) -> Result<String> {
    match edit_code {
        Some(code) if !code.is_empty() => Ok(code),
        _ => bail!("edit code is required"),
    }
}

/// Take the text from the positional argument or, when absent, from
/// stdin (trimmed). Empty text is a validation error either way.
fn text_or_stdin(text: Option<String>) -> Result<String> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read text from stdin")?;
            buf.trim().to_string()
        }
    };
    if text.is_empty() {
        bail!("text is required");
    }
    Ok(text)
}

/// Show a spinner on stderr while the request is in flight. Hidden when
/// stderr is not a terminal, cleared before anything else is printed.
fn with_spinner<T>(msg: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.set_message(msg);
    spinner.enable_steady_tick(Duration::from_millis(80));
    let result = f();
    spinner.finish_and_clear();
    result
}

/// Print a failed service reply and exit: the content line first, then
/// each non-empty `.`-separated sub-message from the errors field.
fn service_failure(err: &ServiceError) -> ! {
    eprintln!("error: {}", err.content);
    for part in err.sub_messages() {
        eprintln!("{part}");
    }
    std::process::exit(1);
}
