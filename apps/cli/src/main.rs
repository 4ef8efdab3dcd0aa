//! `tether`: take, hold and release lease locks from the command line.

mod commands;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use humantime_serde::re::humantime;
use tether_lock::RedisConfig;

#[derive(Debug, Parser)]
#[command(name = "tether", version, about = "Lease locks over Redis")]
struct Cli {
    #[command(flatten)]
    redis: RedisArgs,

    #[command(subcommand)]
    command: Command,
}

/// Connection flags; anything unset falls back to `TETHER_REDIS_*`.
#[derive(Debug, Args)]
struct RedisArgs {
    /// Redis `host:port`
    #[arg(long, global = true)]
    addr: Option<String>,

    /// Logical database index
    #[arg(long, global = true)]
    db: Option<i64>,

    /// ACL username
    #[arg(long, global = true)]
    username: Option<String>,

    /// Password
    #[arg(long, global = true)]
    password: Option<String>,
}

impl RedisArgs {
    fn config(&self) -> Result<RedisConfig> {
        let mut config = RedisConfig::from_env()?;
        if let Some(addr) = &self.addr {
            config.address.clone_from(addr);
        }
        if let Some(db) = self.db {
            config.db = db;
        }
        if self.username.is_some() || self.password.is_some() {
            config = config.with_credentials(
                self.username.as_deref().unwrap_or_default(),
                self.password.as_deref().unwrap_or_default(),
            );
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Race several handles on one client for the same lock
    Contend {
        /// Lock name
        #[arg(long)]
        name: String,
        /// Number of competing handles
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
        contenders: u16,
        /// Lease duration
        #[arg(long, default_value = "10s", value_parser = parse_duration)]
        lease: Duration,
    },

    /// Acquire a lock through the default client and hold it while it renews
    Hold {
        /// Lock name
        #[arg(long)]
        name: String,
        /// Lease duration
        #[arg(long, default_value = "10s", value_parser = parse_duration)]
        lease: Duration,
        /// How long to hold before releasing
        #[arg(long = "for", default_value = "30s", value_parser = parse_duration)]
        hold: Duration,
    },

    /// Run a command while holding a lock
    Run {
        /// Lock name
        #[arg(long)]
        name: String,
        /// Lease duration
        #[arg(long, default_value = "10s", value_parser = parse_duration)]
        lease: Duration,
        /// Only delete the key on release if it still holds our token
        #[arg(long)]
        owner_checked: bool,
        /// Command and arguments
        #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
        command: Vec<String>,
    },

    /// Delete a lock unconditionally
    Release {
        /// Lock name
        #[arg(long)]
        name: String,
    },
}

fn parse_duration(value: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(value)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log = tether_log::auto_init()?;
    let config = cli.redis.config()?;

    match cli.command {
        Command::Contend {
            name,
            contenders,
            lease,
        } => commands::contend(&config, &name, contenders, lease).await,
        Command::Hold { name, lease, hold } => commands::hold(&config, &name, lease, hold).await,
        Command::Run {
            name,
            lease,
            owner_checked,
            command,
        } => commands::run(&config, &name, lease, owner_checked, &command).await,
        Command::Release { name } => commands::release(&config, &name).await,
    }
}
