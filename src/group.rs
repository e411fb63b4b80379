//! ocserv group profile store
//!
//! One file per group under the group directory, plus the defaults profile at
//! a fixed path outside it. Every operation runs under [`with_context`], so a
//! fired context returns early while the file work itself may still finish.
//!
//! ocserv only picks up group changes on reload; callers pair mutations with
//! [`crate::occtl::SessionControl::reload`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tracing::{debug, info, warn};

use crate::codec::{self, GroupConfig, WriteMap};
use crate::config::OcservConfig;
use crate::context::{with_context, OpContext};
use crate::error::{OcError, OcResult};
use crate::validation;

/// Name that always refers to the defaults profile
pub const DEFAULT_GROUP_NAME: &str = "defaults";

/// A group file and its parsed configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupProfile {
    pub name: String,
    pub path: PathBuf,
    /// `None` when the file could not be parsed
    pub config: Option<GroupConfig>,
}

/// Group profile operations
#[async_trait]
pub trait GroupManager: Send + Sync {
    /// All group files with their configs, sorted by name.
    ///
    /// Files in subdirectories and files whose names fail group name
    /// validation are listed too, but `update` and `delete` cannot reach
    /// them by name.
    async fn list(&self, ctx: &OpContext) -> OcResult<Vec<GroupProfile>>;

    /// All group names, sorted
    async fn name_list(&self, ctx: &OpContext) -> OcResult<Vec<String>>;

    /// Rewrite the defaults profile. The file must already exist.
    async fn update_default(&self, ctx: &OpContext, config: &WriteMap) -> OcResult<()>;

    /// Create (or overwrite) a group file
    async fn create(&self, ctx: &OpContext, name: &str, config: &WriteMap) -> OcResult<()>;

    /// Rewrite an existing group file
    async fn update(&self, ctx: &OpContext, name: &str, config: &WriteMap) -> OcResult<()>;

    /// Remove a group file. The defaults group cannot be removed.
    async fn delete(&self, ctx: &OpContext, name: &str) -> OcResult<()>;
}

/// File system backed group store
#[derive(Debug, Clone)]
pub struct OcGroup {
    group_dir: PathBuf,
    default_group: PathBuf,
}

impl OcGroup {
    pub fn new(group_dir: impl Into<PathBuf>, default_group: impl Into<PathBuf>) -> Self {
        Self {
            group_dir: group_dir.into(),
            default_group: default_group.into(),
        }
    }

    pub fn from_config(config: &OcservConfig) -> Self {
        Self::new(&config.paths.group_dir, &config.paths.default_group)
    }

    pub fn group_dir(&self) -> &Path {
        &self.group_dir
    }

    pub fn default_group(&self) -> &Path {
        &self.default_group
    }

    fn group_path(&self, name: &str) -> PathBuf {
        self.group_dir.join(name)
    }
}

/// Every non-directory entry below `root`, at any depth. Symlinks are not
/// followed.
async fn walk_group_files(root: &Path) -> OcResult<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| OcError::io(format!("Failed to read {}", dir.display()), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OcError::io(format!("Failed to read {}", dir.display()), e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| OcError::io(format!("Failed to stat {}", path.display()), e))?;

            if file_type.is_dir() {
                pending.push(path);
            } else {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !addressable(root, &path, &name) {
                    warn!("Group file {} cannot be updated or deleted by name", path.display());
                }
                found.push((name, path));
            }
        }
    }

    Ok(found)
}

/// Whether `name` at `path` can be found again through `update`/`delete`
fn addressable(root: &Path, path: &Path, name: &str) -> bool {
    path.parent() == Some(root) && validation::validate_group_name(name).is_ok()
}

/// Parse every file concurrently, one task per file. `join_all` keeps the
/// results in input order and is the completion barrier.
async fn load_profiles(files: Vec<(String, PathBuf)>) -> Vec<GroupProfile> {
    let handles = files
        .iter()
        .map(|(_, path)| tokio::spawn(codec::parse_conf_file(path.clone())));
    let results = join_all(handles).await;

    files
        .into_iter()
        .zip(results)
        .map(|((name, path), joined)| {
            let config = match joined {
                Ok(Ok(config)) => Some(config),
                Ok(Err(e)) => {
                    warn!("Error parsing file {}: {}", path.display(), e);
                    None
                }
                Err(e) => {
                    warn!("Parser task for {} failed: {}", path.display(), e);
                    None
                }
            };
            GroupProfile { name, path, config }
        })
        .collect()
}

/// Write `config` into `file`, naming `target` in I/O errors
async fn write_to(mut file: File, config: &WriteMap, target: String) -> OcResult<()> {
    codec::write_group(&mut file, config).await.map_err(|e| match e {
        OcError::Io { source, .. } => OcError::io(format!("failed to write {}", target), source),
        other => other,
    })
}

#[async_trait]
impl GroupManager for OcGroup {
    async fn list(&self, ctx: &OpContext) -> OcResult<Vec<GroupProfile>> {
        let dir = self.group_dir.clone();
        let mut profiles = with_context(ctx, async move {
            let files = walk_group_files(&dir).await?;
            debug!("Found {} group files in {}", files.len(), dir.display());
            Ok(load_profiles(files).await)
        })
        .await?;

        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(profiles)
    }

    async fn name_list(&self, ctx: &OpContext) -> OcResult<Vec<String>> {
        let dir = self.group_dir.clone();
        let mut names = with_context(ctx, async move {
            let files = walk_group_files(&dir).await?;
            Ok(files.into_iter().map(|(name, _)| name).collect::<Vec<_>>())
        })
        .await?;

        names.sort();
        Ok(names)
    }

    async fn update_default(&self, ctx: &OpContext, config: &WriteMap) -> OcResult<()> {
        let path = self.default_group.clone();
        let config = config.clone();
        with_context(ctx, async move {
            let file = OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&path)
                .await
                .map_err(|e| OcError::io(format!("failed to open default group {}", path.display()), e))?;
            write_to(file, &config, format!("default group {}", path.display())).await?;
            info!("Updated default group {}", path.display());
            Ok(())
        })
        .await
    }

    async fn create(&self, ctx: &OpContext, name: &str, config: &WriteMap) -> OcResult<()> {
        validation::validate_group_name(name)?;
        let name = name.to_string();
        let path = self.group_path(&name);
        let config = config.clone();
        with_context(ctx, async move {
            let file = File::create(&path)
                .await
                .map_err(|e| OcError::io(format!("failed to create group {}", name), e))?;
            write_to(file, &config, format!("group {}", name)).await?;
            info!("Created group {}", name);
            Ok(())
        })
        .await
    }

    async fn update(&self, ctx: &OpContext, name: &str, config: &WriteMap) -> OcResult<()> {
        validation::validate_group_name(name)?;
        let name = name.to_string();
        let path = self.group_path(&name);
        let config = config.clone();
        with_context(ctx, async move {
            // Truncate so keys missing from the new map do not survive
            let file = match OpenOptions::new().write(true).truncate(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(OcError::GroupNotFound(name));
                }
                Err(e) => return Err(OcError::io(format!("failed to open group {}", name), e)),
            };
            write_to(file, &config, format!("group {}", name)).await?;
            info!("Updated group {}", name);
            Ok(())
        })
        .await
    }

    async fn delete(&self, ctx: &OpContext, name: &str) -> OcResult<()> {
        if name == DEFAULT_GROUP_NAME {
            return Err(OcError::DefaultGroupProtected);
        }
        validation::validate_group_name(name)?;
        let name = name.to_string();
        let path = self.group_path(&name);
        with_context(ctx, async move {
            match fs::remove_file(&path).await {
                Ok(()) => {
                    info!("Deleted group {}", name);
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcError::GroupNotFound(name)),
                Err(e) => Err(OcError::io(format!("failed to delete group {}", name), e)),
            }
        })
        .await
    }
}
