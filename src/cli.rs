use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use serde::Serialize;

use crate::config::{Cli, Command, Config, DecodeArgs, ProfilesArgs, ProvisionArgs};
use crate::panel::build_http_client;
use crate::profile::{ProfileField, ProfileRegistry};
use crate::provision::{ProvisionError, ProvisionOutcome, Provisioner};
use crate::session::SessionStore;
use crate::vmess;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&ProvisionError> for ExitError {
    fn from(err: &ProvisionError) -> Self {
        let code = match err {
            ProvisionError::Configuration(_) | ProvisionError::InvalidLabel => 2,
            ProvisionError::Authentication(_) => 3,
            ProvisionError::Negotiation(_) => 4,
            ProvisionError::HttpClient { .. } => 5,
        };
        let message = match err.hint() {
            Some(hint) => format!("{}: {err}\nhint: {hint}", err.kind()),
            None => format!("{}: {err}", err.kind()),
        };
        Self::new(code, message)
    }
}

pub async fn run() -> i32 {
    let cli = Cli::parse();

    let res = match cli.command {
        Command::Provision(args) => cmd_provision(&cli.config, args).await,
        Command::Profiles(args) => cmd_profiles(&cli.config, args),
        Command::Decode(args) => cmd_decode(args),
    };

    match res {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e.message);
            e.code
        }
    }
}

pub fn build_provisioner(config: &Config) -> Result<Provisioner, ProvisionError> {
    let registry = ProfileRegistry::from_env(&config.profile_keys());
    let http = build_http_client(config.verify_tls).map_err(|e| ProvisionError::HttpClient {
        reason: e.to_string(),
    })?;
    Ok(Provisioner::new(
        registry,
        http,
        SessionStore::new(),
        config.timeouts(),
        config.provision_defaults(),
    ))
}

async fn cmd_provision(config: &Config, args: ProvisionArgs) -> Result<(), ExitError> {
    let provisioner = build_provisioner(config).map_err(|e| ExitError::from(&e))?;

    let outcome = match provisioner.provision(&args.profile, &args.label).await {
        Ok(outcome) => outcome,
        Err(err) => {
            if args.json {
                print_json(&err.to_failure())?;
            }
            return Err(ExitError::from(&err));
        }
    };

    if let Some(dir) = &args.out_dir {
        let path = write_document(dir, &outcome)
            .map_err(|e| ExitError::new(5, format!("filesystem_error: {e:#}")))?;
        eprintln!("wrote {}", path.display());
    }

    if args.json {
        print_json(&outcome)?;
    } else {
        print!("{}", outcome.summary());
    }
    Ok(())
}

fn write_document(dir: &Path, outcome: &ProvisionOutcome) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(outcome.document_file_name());
    std::fs::write(&path, outcome.document().as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

#[derive(Debug, Serialize)]
struct ProfileStatus<'a> {
    name: &'a str,
    base_url: &'a str,
    username: &'a str,
    inbound_id: u64,
    public_host: &'a str,
    complete: bool,
    missing: Vec<ProfileField>,
}

fn cmd_profiles(config: &Config, args: ProfilesArgs) -> Result<(), ExitError> {
    let registry = ProfileRegistry::from_env(&config.profile_keys());
    let statuses: Vec<ProfileStatus<'_>> = registry
        .iter()
        .map(|p| {
            let missing = p.missing_fields();
            ProfileStatus {
                name: &p.name,
                base_url: &p.base_url,
                username: &p.username,
                inbound_id: p.inbound_id,
                public_host: &p.public_host,
                complete: missing.is_empty(),
                missing,
            }
        })
        .collect();

    if args.json {
        return print_json(&statuses);
    }

    if statuses.is_empty() {
        println!("no profiles configured");
        return Ok(());
    }
    for s in &statuses {
        if s.complete {
            println!(
                "{}\tok\t{} inbound={} host={}",
                s.name, s.base_url, s.inbound_id, s.public_host
            );
        } else {
            let missing: Vec<&str> = s.missing.iter().map(|m| m.as_str()).collect();
            println!("{}\tincomplete\tmissing: {}", s.name, missing.join(", "));
        }
    }
    Ok(())
}

fn cmd_decode(args: DecodeArgs) -> Result<(), ExitError> {
    let descriptor =
        vmess::decode(&args.uri).map_err(|e| ExitError::new(2, format!("invalid_args: {e}")))?;
    let out = serde_json::to_string_pretty(&descriptor)
        .map_err(|e| ExitError::new(1, format!("serialize: {e}")))?;
    println!("{out}");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ExitError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| ExitError::new(1, format!("serialize: {e}")))?;
    println!("{out}");
    Ok(())
}
