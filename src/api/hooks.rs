//! Purpose: Side-effect seam for user-facing error notices and login redirects.
//! Exports: `ClientHooks`, `TracingHooks`.
//! Role: Lets embedders route failures to toasts, stderr notices, or a login flow.
//! Invariants: Hooks run on the request's leader task and must not block.

use crate::core::error::Error;
use crate::core::task_key::TaskKey;

pub trait ClientHooks: Send + Sync + 'static {
    /// A request failed and the issuing call did not suppress notifications.
    fn error(&self, key: &TaskKey, err: &Error);

    /// The session expired; called once until the client's latch is reset.
    fn login_required(&self, login_url: Option<&str>);
}

/// Default hooks: structured log lines only.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingHooks;

impl ClientHooks for TracingHooks {
    fn error(&self, key: &TaskKey, err: &Error) {
        let code = err.code().map(ToString::to_string);
        tracing::warn!(
            key = %key,
            kind = ?err.kind(),
            status = err.status(),
            code = code.as_deref(),
            "request failed: {}",
            err.message().unwrap_or("unknown error")
        );
    }

    fn login_required(&self, login_url: Option<&str>) {
        tracing::warn!(login_url, "session expired; login required");
    }
}
