//! Cancellation context for management operations
//!
//! Every public operation takes an [`OpContext`] first. A context fires when
//! it is cancelled explicitly or when its deadline passes, and children fire
//! with their parent.
//!
//! Two flavours of cancellation are built on top of it:
//!
//! - External commands are bound to the context. The child process is killed
//!   when the context fires (see [`crate::exec`]).
//! - [`with_context`] is advisory. The caller gets [`OcError::Cancelled`] as
//!   soon as the context fires, but the wrapped operation is left running in
//!   the background and its result is discarded. A file write started under
//!   an expired context may therefore still land on disk afterwards.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{OcError, OcResult};

/// Why a context fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "context canceled"),
            CancelReason::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

/// Cancellation token plus optional deadline
#[derive(Debug, Clone)]
pub struct OpContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// Context that never fires unless cancelled
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Child context, cancelled with `self`. The child's deadline is the
    /// earlier of the parent's and `timeout` (if given).
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reason the context has fired, or `None` while it is still live
    pub fn err(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context fires
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => CancelReason::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }
}

impl Default for OpContext {
    fn default() -> Self {
        Self::background()
    }
}

/// Run `operation` as an independent task and race it against `ctx`.
///
/// Returns the operation's own result if it finishes first. If the context
/// fires first this returns [`OcError::Cancelled`] immediately; the task is
/// not aborted and keeps running detached.
pub async fn with_context<F, T>(ctx: &OpContext, operation: F) -> OcResult<T>
where
    F: Future<Output = OcResult<T>> + Send + 'static,
    T: Send + 'static,
{
    if let Some(reason) = ctx.err() {
        return Err(OcError::Cancelled(reason));
    }

    let handle = tokio::spawn(operation);

    tokio::select! {
        biased;
        joined = handle => joined?,
        reason = ctx.done() => {
            debug!("context fired ({}), leaving operation running in background", reason);
            Err(OcError::Cancelled(reason))
        }
    }
}
