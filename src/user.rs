//! ocpasswd account management

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::OcservConfig;
use crate::context::OpContext;
use crate::error::OcResult;
use crate::exec::{CommandRunner, ShellRunner};
use crate::group::DEFAULT_GROUP_NAME;
use crate::validation;

/// Local VPN account operations
#[async_trait]
pub trait AccountManager: Send + Sync {
    /// Create an account, or overwrite an existing one
    async fn create(&self, ctx: &OpContext, username: &str, password: &str, group: &str) -> OcResult<()>;

    /// Same as [`AccountManager::create`]
    async fn update(&self, ctx: &OpContext, username: &str, password: &str, group: &str) -> OcResult<()>;

    /// Prevent the account from connecting
    async fn lock(&self, ctx: &OpContext, username: &str) -> OcResult<()>;

    /// Allow a locked account to connect again
    async fn unlock(&self, ctx: &OpContext, username: &str) -> OcResult<()>;

    /// Remove the account
    async fn delete(&self, ctx: &OpContext, username: &str) -> OcResult<()>;
}

/// ocpasswd client
pub struct OcUser {
    runner: Arc<dyn CommandRunner>,
    ocpasswd: String,
    passwd_file: PathBuf,
}

impl OcUser {
    pub fn new(runner: Arc<dyn CommandRunner>, ocpasswd: impl Into<String>, passwd_file: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            ocpasswd: ocpasswd.into(),
            passwd_file: passwd_file.into(),
        }
    }

    pub fn from_config(config: &OcservConfig) -> Self {
        Self::new(
            Arc::new(ShellRunner::new(&config.commands.shell)),
            &config.commands.ocpasswd,
            &config.paths.passwd_file,
        )
    }

    fn command(&self, flags: &[&str], username: &str) -> String {
        let mut parts = vec![self.ocpasswd.clone()];
        parts.extend(flags.iter().map(|f| f.to_string()));
        parts.push("-c".to_string());
        parts.push(self.passwd_file.display().to_string());
        parts.push(username.to_string());
        parts.join(" ")
    }

    async fn run_flag(&self, ctx: &OpContext, flag: &str, username: &str) -> OcResult<()> {
        validation::validate_username(username)?;
        self.runner.run(ctx, &self.command(&[flag], username)).await?;
        Ok(())
    }
}

#[async_trait]
impl AccountManager for OcUser {
    async fn create(&self, ctx: &OpContext, username: &str, password: &str, group: &str) -> OcResult<()> {
        validation::validate_username(username)?;
        validation::validate_password(password)?;

        // Empty and "defaults" both mean no explicit group
        let command = if group.is_empty() || group == DEFAULT_GROUP_NAME {
            self.command(&[], username)
        } else {
            validation::validate_group_name(group)?;
            self.command(&["-g", group], username)
        };

        // Password and confirmation go to stdin, never onto the command line
        let input = format!("{}\n{}\n", password, password);
        self.runner.run_with_input(ctx, &command, input.as_bytes()).await?;
        info!("Saved account {}", username);
        Ok(())
    }

    async fn update(&self, ctx: &OpContext, username: &str, password: &str, group: &str) -> OcResult<()> {
        self.create(ctx, username, password, group).await
    }

    async fn lock(&self, ctx: &OpContext, username: &str) -> OcResult<()> {
        self.run_flag(ctx, "-l", username).await?;
        info!("Locked account {}", username);
        Ok(())
    }

    async fn unlock(&self, ctx: &OpContext, username: &str) -> OcResult<()> {
        self.run_flag(ctx, "-u", username).await?;
        info!("Unlocked account {}", username);
        Ok(())
    }

    async fn delete(&self, ctx: &OpContext, username: &str) -> OcResult<()> {
        self.run_flag(ctx, "-d", username).await?;
        info!("Deleted account {}", username);
        Ok(())
    }
}
