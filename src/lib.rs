//! ocmgmt - ocserv Management Library
//!
//! Async management layer over an ocserv installation providing:
//! - Group profile files (list, create, update, delete, defaults)
//! - Live session control through occtl (users, bans, routes, status)
//! - Local accounts through ocpasswd
//!
//! Every operation takes an [`OpContext`] that bounds how long the caller
//! waits. External commands are killed when it fires; file operations are
//! abandoned but not interrupted (see [`context`]).

pub mod error;
pub mod config;
pub mod context;
pub mod validation;
pub mod exec;
pub mod codec;
pub mod group;
pub mod occtl_types;
pub mod occtl;
pub mod user;

// Re-export commonly used types
pub use error::{OcError, OcResult};
pub use config::OcservConfig;
pub use context::{with_context, CancelReason, OpContext};
pub use exec::{CommandRunner, ShellRunner};
pub use codec::{parse_conf_file, write_group, GroupConfig, WriteMap};
pub use group::{GroupManager, GroupProfile, OcGroup};
pub use occtl::{Occtl, SessionControl};
pub use occtl_types::{IRoute, IpBan, IpBanPoints, OnlineUser};
pub use user::{AccountManager, OcUser};
