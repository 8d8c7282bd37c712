use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::provision::{ProvisionDefaults, Timeouts};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "xpanel",
    about = "Mint vmess clients on 3x-ui / x-ui panels",
    version = crate::version::VERSION,
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub config: Config,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a client on a profile's inbound and print its vmess link.
    Provision(ProvisionArgs),

    /// List configured profiles and whether they are complete.
    Profiles(ProfilesArgs),

    /// Print the JSON carried by a vmess link.
    Decode(DecodeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ProvisionArgs {
    /// Profile key, e.g. AIS.
    #[arg(long, value_name = "KEY")]
    pub profile: String,

    /// Client remark; also used as the panel email field and the document file name.
    #[arg(long, value_name = "LABEL")]
    pub label: String,

    /// Print the outcome (or failure) as JSON instead of the text summary.
    #[arg(long)]
    pub json: bool,

    /// Also write `<label>.txt` with the link and descriptor into this directory.
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ProfilesArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    #[arg(value_name = "URI")]
    pub uri: String,
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Profile keys; each key `P` is read from `P_PANEL_BASE`, `P_USERNAME`, `P_PASSWORD`,
    /// `P_INBOUND_ID` and `P_PUBLIC_HOST`.
    #[arg(
        long,
        global = true,
        env = "XPANEL_PROFILES",
        value_name = "KEYS",
        value_delimiter = ',',
        default_value = "AIS,TRUE"
    )]
    pub profiles: Vec<String>,

    #[arg(
        long = "verify-tls",
        global = true,
        env = "VERIFY_TLS",
        value_name = "BOOL",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub verify_tls: bool,

    /// Quota for new clients in GiB; 0 is unlimited.
    #[arg(
        long = "default-total-gb",
        global = true,
        env = "DEFAULT_TOTAL_GB",
        value_name = "GB",
        default_value_t = 0
    )]
    pub default_total_gb: u64,

    /// Accepted for compatibility; new clients are currently created without expiry.
    #[arg(
        long = "default-expire-days",
        global = true,
        env = "DEFAULT_EXPIRE_DAYS",
        value_name = "DAYS",
        default_value_t = 0
    )]
    pub default_expire_days: u64,

    #[arg(
        long = "login-timeout-secs",
        global = true,
        env = "XPANEL_LOGIN_TIMEOUT_SECS",
        value_name = "SECS",
        default_value_t = 20,
        value_parser = clap::value_parser!(u64).range(1..=120)
    )]
    pub login_timeout_secs: u64,

    #[arg(
        long = "request-timeout-secs",
        global = true,
        env = "XPANEL_REQUEST_TIMEOUT_SECS",
        value_name = "SECS",
        default_value_t = 25,
        value_parser = clap::value_parser!(u64).range(1..=120)
    )]
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn profile_keys(&self) -> Vec<String> {
        self.profiles
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            login: Duration::from_secs(self.login_timeout_secs),
            request: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn provision_defaults(&self) -> ProvisionDefaults {
        ProvisionDefaults {
            total_gb: self.default_total_gb,
            expire_days: self.default_expire_days,
            flow: String::new(),
        }
    }
}
