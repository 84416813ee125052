use std::env;
use std::io::{self, BufRead, Write};

use atty::Stream;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use pipstash_core::{
    to_json_response, CommandStatus, Config, ExecutionOutcome, InventorySource, ListRequest,
    RedisStore, RestoreRequest, SignupRequest, UploadRequest, Workflow,
};
use serde_json::{json, Value};

mod style;

use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = PipstashCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let config = Config::from_env().map_err(|err| eyre!("{err:?}"))?;
    let (command, outcome) = run(&cli, &config)?;
    let code = emit_output(&cli, command, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!(
        "pipstash_cli={level},pipstash_core={level},pipstash_domain={level}"
    );
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(cli: &PipstashCli, config: &Config) -> Result<(&'static str, ExecutionOutcome)> {
    match &cli.command {
        Command::List(args) => {
            let outcome = pipstash_core::list_installed_outcome(
                &config.tools,
                &ListRequest {
                    source: args.source.into(),
                },
            );
            Ok(("list", outcome))
        }
        Command::Signup(args) => {
            let mut workflow = match open_workflow(config) {
                Ok(workflow) => workflow,
                Err(outcome) => return Ok(("signup", outcome)),
            };
            let password = resolve_password(&args.auth)?;
            let outcome = workflow.signup(&SignupRequest {
                username: args.username.clone(),
                password,
            });
            Ok(("signup", outcome))
        }
        Command::Upload(args) => {
            let mut workflow = match open_workflow(config) {
                Ok(workflow) => workflow,
                Err(outcome) => return Ok(("upload", outcome)),
            };
            match log_in(&mut workflow, &args.username, &args.auth)? {
                Some(outcome) => Ok(("upload", outcome)),
                None => {
                    let outcome = workflow.upload(&UploadRequest {
                        packages: args.packages.clone(),
                        source: args.source.into(),
                    });
                    Ok(("upload", outcome))
                }
            }
        }
        Command::Restore(args) => {
            let mut workflow = match open_workflow(config) {
                Ok(workflow) => workflow,
                Err(outcome) => return Ok(("restore", outcome)),
            };
            match log_in(&mut workflow, &args.username, &args.auth)? {
                Some(outcome) => Ok(("restore", outcome)),
                None => {
                    let quiet = cli.quiet;
                    let mut progress = move |message: &str| {
                        if !quiet {
                            eprintln!("pipstash ▸ {message}");
                        }
                    };
                    let outcome = workflow.restore(
                        &RestoreRequest {
                            packages: args.packages.clone(),
                        },
                        &mut progress,
                    );
                    Ok(("restore", outcome))
                }
            }
        }
        Command::Show(args) => {
            let mut workflow = match open_workflow(config) {
                Ok(workflow) => workflow,
                Err(outcome) => return Ok(("show", outcome)),
            };
            match log_in(&mut workflow, &args.username, &args.auth)? {
                Some(outcome) => Ok(("show", outcome)),
                None => Ok(("show", workflow.show())),
            }
        }
    }
}

fn open_workflow(config: &Config) -> std::result::Result<Workflow, ExecutionOutcome> {
    match RedisStore::connect(&config.store) {
        Ok(store) => Ok(Workflow::new(Box::new(store), config.tools.clone())),
        Err(err) => Err(ExecutionOutcome::failure(
            err.to_string(),
            json!({ "reason": "store_unavailable" }),
        )),
    }
}

/// Authenticates the workflow session; `Some` carries the failed outcome.
fn log_in(
    workflow: &mut Workflow,
    username: &str,
    auth: &AuthArgs,
) -> Result<Option<ExecutionOutcome>> {
    let password = resolve_password(auth)?;
    let outcome = workflow.login(username, &password);
    if outcome.status == CommandStatus::Ok {
        Ok(None)
    } else {
        Ok(Some(outcome))
    }
}

fn resolve_password(auth: &AuthArgs) -> Result<String> {
    if let Ok(password) = env::var(&auth.password_env) {
        return Ok(password);
    }
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn emit_output(cli: &PipstashCli, command: &str, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.exit_code();
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        let payload = to_json_response(command, outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !cli.quiet {
        println!("{}", style.status(&outcome.status, &outcome.message));
        for line in package_lines(&outcome.details) {
            println!("{line}");
        }
        for name in failed_names(&outcome.details) {
            println!("{}", style.info(&format!("install failed: {name}")));
        }
    } else if outcome.status != CommandStatus::Ok {
        // Quiet suppresses stdout only; failures still reach stderr.
        eprintln!("{}", outcome.message);
    }

    Ok(code)
}

fn package_lines(details: &Value) -> Vec<String> {
    let Some(packages) = details.get("packages").and_then(Value::as_array) else {
        return Vec::new();
    };
    packages
        .iter()
        .filter_map(|package| {
            let name = package.get("name")?.as_str()?;
            Some(match package.get("version").and_then(Value::as_str) {
                Some(version) => format!("{name}=={version}"),
                None => name.to_string(),
            })
        })
        .collect()
}

fn failed_names(details: &Value) -> Vec<String> {
    details
        .get("failed")
        .and_then(Value::as_array)
        .map(|failed| {
            failed
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Stash your pip package list in a shared store and replay it elsewhere",
    after_help = "Examples:\n  pipstash signup alice\n  pipstash upload alice\n  pipstash restore alice requests flask\n  pipstash --json show alice"
)]
struct PipstashCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)"
    )]
    quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q")]
    trace: bool,
    #[arg(long, help = "Emit {status,message,details} JSON envelopes")]
    json: bool,
    #[arg(long, help = "Disable colored human output")]
    no_color: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(
        about = "Create an account in the shared store.",
        after_help = "Example:\n  pipstash signup alice\n"
    )]
    Signup(SignupArgs),
    #[command(
        about = "List packages installed on this machine.",
        after_help = "Examples:\n  pipstash list\n  pipstash list --source metadata\n"
    )]
    List(ListArgs),
    #[command(
        about = "Capture the local package list and store it under your account.",
        override_usage = "pipstash upload <USERNAME> [PACKAGE ...]",
        after_help = "Examples:\n  pipstash upload alice\n  pipstash upload alice requests flask\n"
    )]
    Upload(UploadArgs),
    #[command(
        about = "Install packages from your stored list, one at a time.",
        override_usage = "pipstash restore <USERNAME> [PACKAGE ...]",
        after_help = "Examples:\n  pipstash restore alice\n  pipstash restore alice requests\n"
    )]
    Restore(RestoreArgs),
    #[command(
        about = "Print the package list stored under your account.",
        after_help = "Example:\n  pipstash show alice\n"
    )]
    Show(ShowArgs),
}

#[derive(Args, Debug)]
struct AuthArgs {
    #[arg(
        long = "password-env",
        value_name = "VAR",
        default_value = "PIPSTASH_PASSWORD",
        help = "Environment variable holding the account password (prompts when unset)"
    )]
    password_env: String,
}

#[derive(Args, Debug)]
struct SignupArgs {
    #[arg(value_name = "USERNAME")]
    username: String,
    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(
        long,
        value_enum,
        default_value_t = SourceArg::PipFreeze,
        help = "Where to enumerate installed packages from"
    )]
    source: SourceArg,
}

#[derive(Args, Debug)]
struct UploadArgs {
    #[arg(value_name = "USERNAME")]
    username: String,
    #[arg(value_name = "PACKAGE", help = "Upload only these packages (default: all)")]
    packages: Vec<String>,
    #[arg(long, value_enum, default_value_t = SourceArg::PipFreeze)]
    source: SourceArg,
    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Args, Debug)]
struct RestoreArgs {
    #[arg(value_name = "USERNAME")]
    username: String,
    #[arg(value_name = "PACKAGE", help = "Install only these packages (default: all)")]
    packages: Vec<String>,
    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Args, Debug)]
struct ShowArgs {
    #[arg(value_name = "USERNAME")]
    username: String,
    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SourceArg {
    Metadata,
    PipFreeze,
}

impl From<SourceArg> for InventorySource {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::Metadata => InventorySource::Metadata,
            SourceArg::PipFreeze => InventorySource::PipFreeze,
        }
    }
}
