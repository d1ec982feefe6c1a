mod application;
mod interrupt;
mod logging;

use std::{
    future::Future,
    io::IsTerminal as _,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{ColorChoice, CommandFactory as _, Parser, Subcommand};
use govsync_client::{Body, CancellationToken, Client, Method};
use govsync_patch::Patch;
use govsync_runner::{
    options::ConnectionOptions,
    records::{self, Kind},
};
use serde_json::Value;
use tracing::info;

fn main() {
    let args = Args::parse();
    application::handle_result(run_args(args));
}

fn run_args(args: Args) -> Result<()> {
    match &args.command {
        Commands::GenerateMan => {
            let cmd = Args::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buffer: Vec<u8> = Default::default();
            man.render(&mut buffer)?;
            println!("{}", String::from_utf8(buffer)?);
            Ok(())
        }
        Commands::GenerateMarkdown => {
            let opts = clap_markdown::MarkdownOptions::new().show_footer(false);
            let markdown: String = clap_markdown::help_markdown_custom::<Args>(&opts);
            println!("{}", markdown);
            Ok(())
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Args::command();
            clap_complete::generate(*shell, &mut cmd, "govsync-runner", &mut std::io::stdout());
            Ok(())
        }
        Commands::Diff { kind, old, new } => {
            let _logger = set_up_logging(&args.options)?;
            let patch = records::diff_files(*kind, old, new)?;
            application::print_json(&serde_json::to_value(&patch)?)
        }
        Commands::Token { connection } => {
            with_api(&args.options, |cancel| token(connection, cancel))
        }
        Commands::Request {
            connection,
            method,
            path,
            body,
        } => with_api(&args.options, |cancel| {
            request(connection, method, path, body.as_deref(), cancel)
        }),
        Commands::Apply {
            connection,
            kind,
            id,
            path,
            old,
            new,
        } => {
            let path = match (path, id) {
                (Some(path), _) => path.clone(),
                (None, Some(id)) => kind.object_path(id).with_context(|| {
                    format!("--path is required for {}", kind.collection())
                })?,
                (None, None) => bail!("Either --id or --path is required"),
            };
            with_api(&args.options, |cancel| {
                apply(connection, *kind, &path, old, new, cancel)
            })
        }
    }
}

fn set_up_logging(options: &Options) -> Result<Box<dyn logging::Frontend>> {
    let color = match options.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stderr().is_terminal(),
    };
    logging::set_up(logging::Options {
        verbose: options.verbose,
        color,
    })
}

/// Run a command that talks to the API, on a runtime whose root
/// cancellation token fires on interrupt.
fn with_api<F, Fut>(options: &Options, f: F) -> Result<()>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let _logger = set_up_logging(options)?;
    let cancel = interrupt::set_up_process_interrupt_handler()?;
    application::runtime()?.block_on(f(cancel))
}

async fn token(connection: &ConnectionOptions, cancel: CancellationToken) -> Result<()> {
    let client = Client::new(connection.to_config())?;
    let token = client.credential(&cancel).await?;
    println!("{}", token);
    Ok(())
}

async fn request(
    connection: &ConnectionOptions,
    method: &str,
    path: &str,
    body: Option<&Path>,
    cancel: CancellationToken,
) -> Result<()> {
    let client = Client::new(connection.to_config())?;
    let method = Method::from_bytes(method.to_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method: {}", method))?;
    let body = match body {
        Some(file) => read_body(&method, file)?,
        None => Body::Empty,
    };
    let response = client.execute(&cancel, method, path, body).await?;
    info!(status = %response.status, "Response received");
    match response.json::<Value>() {
        Ok(value) => application::print_json(&value),
        Err(_) => {
            print!("{}", response.text());
            Ok(())
        }
    }
}

async fn apply(
    connection: &ConnectionOptions,
    kind: Kind,
    path: &str,
    old: &Path,
    new: &Path,
    cancel: CancellationToken,
) -> Result<()> {
    let patch = records::diff_files(kind, old, new)?;
    let client = Client::new(connection.to_config())?;
    info!(operations = patch.0.len(), path, "Applying patch");
    match client.patch_object::<Value>(&cancel, path, &patch).await? {
        Some(updated) => application::print_json(&updated),
        None => {
            eprintln!("No changes.");
            Ok(())
        }
    }
}

/// A PATCH body is read as a JSON Patch document, anything else as plain JSON.
fn read_body(method: &Method, file: &Path) -> Result<Body> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Could not read request body {}", file.display()))?;
    if *method == Method::PATCH {
        let patch: Patch = serde_json::from_str(&text)
            .with_context(|| format!("{} is not a JSON Patch document", file.display()))?;
        Ok(Body::JsonPatch(patch))
    } else {
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("Could not parse request body {}", file.display()))?;
        Ok(Body::Json(value))
    }
}

/// Access the identity-governance API and compute object patches
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: Options,
}

#[derive(Parser, Debug, Clone)]
struct Options {
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Obtain an access token and print it
    Token {
        #[command(flatten)]
        connection: ConnectionOptions,
    },

    /// Send one authenticated request and print the response body
    Request {
        #[command(flatten)]
        connection: ConnectionOptions,

        /// HTTP method, e.g. GET
        #[arg(long, default_value = "GET")]
        method: String,

        /// Resource path relative to the base URL, e.g. v3/roles
        #[arg(long)]
        path: String,

        /// File holding the JSON request body
        #[arg(long)]
        body: Option<PathBuf>,
    },

    /// Print the JSON Patch that turns the OLD record into the NEW one
    Diff {
        /// Object type of both records
        #[arg(long)]
        kind: Kind,

        /// Record file of the last-observed object
        old: PathBuf,

        /// Record file of the desired object
        new: PathBuf,
    },

    /// Compute the patch from OLD to NEW and send it to PATH
    Apply {
        #[command(flatten)]
        connection: ConnectionOptions,

        /// Object type of both records
        #[arg(long)]
        kind: Kind,

        /// Object id; the resource path is derived from KIND
        #[arg(long, required_unless_present = "path", conflicts_with = "path")]
        id: Option<String>,

        /// Resource path of the object, e.g. v3/roles/2c91808a
        #[arg(long)]
        path: Option<String>,

        /// Record file of the last-observed object
        old: PathBuf,

        /// Record file of the desired object
        new: PathBuf,
    },

    /// Generate markdown documentation for govsync-runner
    #[command(hide = true)]
    GenerateMarkdown,

    /// Generate a manpage for govsync-runner
    #[command(hide = true)]
    GenerateMan,

    /// Generate shell completion for govsync-runner
    #[command(hide = true)]
    GenerateCompletion {
        /// The shell to generate completion for
        #[arg(long)]
        shell: clap_complete::Shell,
    },
}
