//! Cooperative cancellation shared between a sweep and its analyzers.
//!
//! One [`CancellationToken`] is cloned into the sweep and the analyzer. The
//! sweep checks it between targets, the streaming reads between chunks.

pub use tokio_util::sync::CancellationToken;

use crate::error::{Result, ScanError};

/// Returns `Err(ScanError::Cancelled)` once `token` has been cancelled.
pub fn check_cancelled(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(ScanError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        assert!(check_cancelled(&token).is_ok());

        other.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(check_cancelled(&token), Err(ScanError::Cancelled)));
    }

    #[test]
    fn child_tokens_follow_the_parent() {
        let parent = CancellationToken::new();
        let child = parent.child_token();
        parent.cancel();
        assert!(matches!(check_cancelled(&child), Err(ScanError::Cancelled)));
    }
}
