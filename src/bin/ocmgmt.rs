//! ocmgmt - ocserv management CLI
//!
//! Command-line front end for the libocmgmt library: group profiles,
//! occtl session control and ocpasswd accounts.
//!
//! # Usage
//!
//! ```bash
//! # List groups with their parsed configuration
//! sudo ocmgmt group list
//!
//! # Create a group and reload ocserv
//! sudo ocmgmt group create staff --set mtu=1400 --dns 1.1.1.1 --dns 8.8.8.8 --reload
//!
//! # Create an account (password read from stdin)
//! echo 's3cret' | sudo ocmgmt account create alice --group staff
//! ```

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand};
use libocmgmt::codec::GROUP_CONFIG_KEYS;
use libocmgmt::{
    AccountManager, GroupManager, OcGroup, OcUser, Occtl, OcservConfig, OpContext, SessionControl,
    ShellRunner, WriteMap,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// ocserv management CLI
#[derive(Parser, Debug)]
#[command(name = "ocmgmt")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "ocserv management - group profiles, sessions and accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Operation timeout in seconds (overrides the configuration)
    #[arg(long)]
    timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Group profile management
    #[command(subcommand)]
    Group(GroupCommands),
    /// Live session control through occtl
    #[command(subcommand)]
    Session(SessionCommands),
    /// Local accounts through ocpasswd
    #[command(subcommand)]
    Account(AccountCommands),
}

#[derive(Subcommand, Debug)]
enum GroupCommands {
    /// List groups with their configuration
    List,
    /// List group names
    Names,
    /// Create a group
    Create {
        name: String,
        #[command(flatten)]
        values: GroupValues,
    },
    /// Rewrite an existing group
    Update {
        name: String,
        #[command(flatten)]
        values: GroupValues,
    },
    /// Rewrite the defaults group
    UpdateDefault {
        #[command(flatten)]
        values: GroupValues,
    },
    /// Delete a group
    Delete {
        name: String,
        /// Reload ocserv afterwards
        #[arg(long)]
        reload: bool,
    },
}

#[derive(ClapArgs, Debug)]
struct GroupValues {
    /// Directive as key=value (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// DNS server (repeatable, order kept)
    #[arg(long = "dns", value_name = "IP")]
    dns: Vec<String>,

    /// Reload ocserv afterwards
    #[arg(long)]
    reload: bool,
}

#[derive(Subcommand, Debug)]
enum SessionCommands {
    /// Connected users
    Users,
    /// Sessions of one user
    User { username: String },
    /// Disconnect a user
    Disconnect { username: String },
    /// Banned IPs
    Bans,
    /// IPs with ban points
    BanPoints,
    /// Lift an IP ban
    Unban { ip: String },
    /// Server status
    Status,
    /// User announced routes
    Iroutes,
    /// Reload server configuration
    Reload,
}

#[derive(Subcommand, Debug)]
enum AccountCommands {
    /// Create an account (password read from stdin)
    Create {
        username: String,
        #[arg(short, long, default_value = "")]
        group: String,
    },
    /// Update an account (password read from stdin)
    Update {
        username: String,
        #[arg(short, long, default_value = "")]
        group: String,
    },
    /// Lock an account
    Lock { username: String },
    /// Unlock an account
    Unlock { username: String },
    /// Delete an account
    Delete { username: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => OcservConfig::load(path)?,
        None => OcservConfig::default(),
    };

    #[cfg(target_os = "linux")]
    {
        let uid = unsafe { libc::geteuid() };
        if uid != 0 {
            warn!("Not running as root - ocserv files and tools may be inaccessible");
        }
    }

    let timeout = cli
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.timeouts.default_timeout());
    let ctx = OpContext::with_timeout(timeout);

    // Ctrl+C cancels whatever is in flight
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let runner = Arc::new(ShellRunner::new(&config.commands.shell));
    let occtl = Occtl::new(runner.clone(), &config.commands.occtl);

    match cli.command {
        Commands::Group(cmd) => handle_group(cmd, &ctx, &config, &occtl).await,
        Commands::Session(cmd) => handle_session(cmd, &ctx, &occtl).await,
        Commands::Account(cmd) => {
            let users = OcUser::new(runner, &config.commands.ocpasswd, &config.paths.passwd_file);
            handle_account(cmd, &ctx, &users).await
        }
    }
}

async fn handle_group(cmd: GroupCommands, ctx: &OpContext, config: &OcservConfig, occtl: &Occtl) -> anyhow::Result<()> {
    let groups = OcGroup::from_config(config);

    let reload = match cmd {
        GroupCommands::List => return print_json(&groups.list(ctx).await?),
        GroupCommands::Names => {
            for name in groups.name_list(ctx).await? {
                println!("{}", name);
            }
            return Ok(());
        }
        GroupCommands::Create { name, values } => {
            groups.create(ctx, &name, &values.to_write_map()?).await?;
            values.reload
        }
        GroupCommands::Update { name, values } => {
            groups.update(ctx, &name, &values.to_write_map()?).await?;
            values.reload
        }
        GroupCommands::UpdateDefault { values } => {
            groups.update_default(ctx, &values.to_write_map()?).await?;
            values.reload
        }
        GroupCommands::Delete { name, reload } => {
            groups.delete(ctx, &name).await?;
            reload
        }
    };

    if reload {
        occtl.reload(ctx).await.context("group saved but reload failed")?;
    }
    Ok(())
}

async fn handle_session(cmd: SessionCommands, ctx: &OpContext, occtl: &Occtl) -> anyhow::Result<()> {
    match cmd {
        SessionCommands::Users => print_json(&occtl.online_users(ctx).await?),
        SessionCommands::User { username } => print_json(&occtl.show_user(ctx, &username).await?),
        SessionCommands::Disconnect { username } => Ok(occtl.disconnect(ctx, &username).await?),
        SessionCommands::Bans => print_json(&occtl.show_ip_bans(ctx).await?),
        SessionCommands::BanPoints => print_json(&occtl.show_ip_bans_points(ctx).await?),
        SessionCommands::Unban { ip } => Ok(occtl.unban_ip(ctx, &ip).await?),
        SessionCommands::Status => {
            print!("{}", occtl.show_status(ctx).await?);
            Ok(())
        }
        SessionCommands::Iroutes => print_json(&occtl.show_iroutes(ctx).await?),
        SessionCommands::Reload => Ok(occtl.reload(ctx).await?),
    }
}

async fn handle_account(cmd: AccountCommands, ctx: &OpContext, users: &OcUser) -> anyhow::Result<()> {
    match cmd {
        AccountCommands::Create { username, group } => {
            let password = read_password()?;
            Ok(users.create(ctx, &username, &password, &group).await?)
        }
        AccountCommands::Update { username, group } => {
            let password = read_password()?;
            Ok(users.update(ctx, &username, &password, &group).await?)
        }
        AccountCommands::Lock { username } => Ok(users.lock(ctx, &username).await?),
        AccountCommands::Unlock { username } => Ok(users.unlock(ctx, &username).await?),
        AccountCommands::Delete { username } => Ok(users.delete(ctx, &username).await?),
    }
}

impl GroupValues {
    fn to_write_map(&self) -> anyhow::Result<WriteMap> {
        let mut map = WriteMap::new();
        for entry in &self.set {
            let Some((key, raw)) = entry.split_once('=') else {
                bail!("expected KEY=VALUE, got '{}'", entry);
            };
            let key = key.trim();
            if key == "dns" {
                bail!("use --dns for DNS servers");
            }
            if !GROUP_CONFIG_KEYS.contains(&key) {
                warn!("'{}' is not a recognised group directive, writing it anyway", key);
            }
            map.insert(key.to_string(), typed_value(raw.trim()));
        }
        if !self.dns.is_empty() {
            map.insert("dns".to_string(), Value::from(self.dns.clone()));
        }
        debug!("write-map: {:?}", map);
        Ok(map)
    }
}

/// Numbers and booleans keep their type only when they print back exactly as
/// typed, so `1.50`, `1e3` and `null` stay strings
fn typed_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) if v.to_string() == raw => v,
        _ => Value::String(raw.to_string()),
    }
}

fn read_password() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\n', '\r']).to_string();
    if password.is_empty() {
        bail!("no password given on stdin");
    }
    Ok(password)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize logging based on command-line arguments
fn init_logging(cli: &Cli) {
    let log_level = if cli.verbose { "debug" } else { cli.log_level.as_str() };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ocmgmt={},libocmgmt={}", log_level, log_level)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .init();
}
