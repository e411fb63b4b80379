//! occtl session control
//!
//! Thin client over the occtl tool: each call composes one subcommand, runs
//! it through the shared [`CommandRunner`] and, for `-j` subcommands, decodes
//! the JSON reply. Identifiers are validated before they are spliced into the
//! command line.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::OcservConfig;
use crate::context::OpContext;
use crate::error::{OcError, OcResult};
use crate::exec::{CommandRunner, ShellRunner};
use crate::occtl_types::{IRoute, IpBan, IpBanPoints, OnlineUser};
use crate::validation;

/// Live server operations
#[async_trait]
pub trait SessionControl: Send + Sync {
    /// Reload server configuration, picking up group changes
    async fn reload(&self, ctx: &OpContext) -> OcResult<()>;

    /// Sessions currently connected
    async fn online_users(&self, ctx: &OpContext) -> OcResult<Vec<OnlineUser>>;

    /// Expire all sessions of `username`
    async fn disconnect(&self, ctx: &OpContext, username: &str) -> OcResult<()>;

    /// Banned IPs
    async fn show_ip_bans(&self, ctx: &OpContext) -> OcResult<Vec<IpBan>>;

    /// IPs with ban points
    async fn show_ip_bans_points(&self, ctx: &OpContext) -> OcResult<Vec<IpBanPoints>>;

    /// Lift a ban
    async fn unban_ip(&self, ctx: &OpContext, ip: &str) -> OcResult<()>;

    /// Server status as printed by occtl
    async fn show_status(&self, ctx: &OpContext) -> OcResult<String>;

    /// Routes announced by connected users
    async fn show_iroutes(&self, ctx: &OpContext) -> OcResult<Vec<IRoute>>;

    /// Detailed sessions of one user
    async fn show_user(&self, ctx: &OpContext, username: &str) -> OcResult<Vec<OnlineUser>>;
}

/// occtl client
pub struct Occtl {
    runner: Arc<dyn CommandRunner>,
    occtl: String,
}

impl Occtl {
    /// `occtl` is the full invocation prefix, e.g. `sudo /usr/bin/occtl`
    pub fn new(runner: Arc<dyn CommandRunner>, occtl: impl Into<String>) -> Self {
        Self {
            runner,
            occtl: occtl.into(),
        }
    }

    pub fn from_config(config: &OcservConfig) -> Self {
        Self::new(
            Arc::new(ShellRunner::new(&config.commands.shell)),
            &config.commands.occtl,
        )
    }

    async fn exec(&self, ctx: &OpContext, subcommand: &str) -> OcResult<Vec<u8>> {
        let command = format!("{} {}", self.occtl, subcommand);
        self.runner.run(ctx, &command).await
    }

    async fn exec_json<T: DeserializeOwned>(&self, ctx: &OpContext, subcommand: &str) -> OcResult<T> {
        let output = self.exec(ctx, subcommand).await?;
        debug!("occtl {} returned {} bytes", subcommand, output.len());
        serde_json::from_slice(&output).map_err(|e| OcError::Decode {
            cmd: subcommand.to_string(),
            source: e,
        })
    }
}

#[async_trait]
impl SessionControl for Occtl {
    async fn reload(&self, ctx: &OpContext) -> OcResult<()> {
        self.exec(ctx, "reload").await?;
        info!("ocserv configuration reloaded");
        Ok(())
    }

    async fn online_users(&self, ctx: &OpContext) -> OcResult<Vec<OnlineUser>> {
        self.exec_json(ctx, "-j show users").await
    }

    async fn disconnect(&self, ctx: &OpContext, username: &str) -> OcResult<()> {
        validation::validate_username(username)?;
        match self.exec(ctx, &format!("disconnect user {}", username)).await {
            Ok(_) => {
                info!("Disconnected user {}", username);
                Ok(())
            }
            Err(e) => {
                warn!("Disconnect of {} failed: {}", username, e);
                Err(OcError::DisconnectFailed(username.to_string()))
            }
        }
    }

    async fn show_ip_bans(&self, ctx: &OpContext) -> OcResult<Vec<IpBan>> {
        self.exec_json(ctx, "-j show ip bans").await
    }

    async fn show_ip_bans_points(&self, ctx: &OpContext) -> OcResult<Vec<IpBanPoints>> {
        self.exec_json(ctx, "-j show ip bans points").await
    }

    async fn unban_ip(&self, ctx: &OpContext, ip: &str) -> OcResult<()> {
        let ip = validation::validate_ip_address(ip)?;
        self.exec(ctx, &format!("unban ip {}", ip)).await?;
        info!("Unbanned {}", ip);
        Ok(())
    }

    async fn show_status(&self, ctx: &OpContext) -> OcResult<String> {
        let output = self.exec(ctx, "show status").await?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn show_iroutes(&self, ctx: &OpContext) -> OcResult<Vec<IRoute>> {
        self.exec_json(ctx, "-j show iroutes").await
    }

    async fn show_user(&self, ctx: &OpContext, username: &str) -> OcResult<Vec<OnlineUser>> {
        validation::validate_username(username)?;
        self.exec_json(ctx, &format!("-j show user {}", username)).await
    }
}
