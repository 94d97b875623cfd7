//! Ctrl+C and termination signal handling.
//!
//! The first Ctrl+C (or SIGTERM/SIGHUP on unix) flips a shared flag that
//! every suspension point (waits between attempts, the OTP pause, element
//! polling) watches, so the current attempt unwinds and the browser session
//! is closed. A second signal exits immediately.

use std::io;
use std::sync::Arc;

use tokio::sync::watch;

/// Exit status used when the user forces an immediate exit.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Owner of the cancellation flag.
#[derive(Debug, Clone)]
pub struct Interrupt {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// A token that observes this interrupt.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            receiver: self.sender.subscribe(),
        }
    }

    /// Install the process-wide handler for Ctrl+C, SIGTERM and SIGHUP.
    pub fn install_handler(&self) -> io::Result<()> {
        let sender = Arc::clone(&self.sender);

        ctrlc::set_handler(move || {
            if sender.send_replace(true) {
                std::process::exit(FORCED_EXIT_CODE);
            }
            eprintln!("\nStop requested, closing the browser (press Ctrl+C again to force exit)");
        })
        .map_err(|e| io::Error::other(e.to_string()))
    }

    /// Request cancellation programmatically.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

/// Cheap, cloneable view of the cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Interrupt::new().token()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation is requested; pends forever otherwise.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender gone without cancelling: nothing can cancel us any more.
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_token_starts_uncancelled() {
        let interrupt = Interrupt::new();
        assert!(!interrupt.token().is_cancelled());
    }

    #[test]
    fn test_trigger_is_seen_by_existing_tokens() {
        let interrupt = Interrupt::new();
        let token = interrupt.token();
        interrupt.trigger();
        assert!(token.is_cancelled());
        assert!(interrupt.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_trigger() {
        let interrupt = Interrupt::new();
        let token = interrupt.token();

        let waiter = tokio::spawn(async move { token.cancelled().await });
        interrupt.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancellation not observed")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_token_does_not_resolve() {
        let token = CancelToken::never();
        let result = tokio::time::timeout(Duration::from_secs(60), token.cancelled()).await;
        assert!(result.is_err());
    }
}
