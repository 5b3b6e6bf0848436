//! One-shot completion signals keyed by secret name
//!
//! Each configured secret gets a signal that fires once its plaintext is
//! final. Waiting on a name that is not configured returns immediately, so a
//! dependency on an unmanaged file is resolved straight from disk.

use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Completion signals for every configured secret
#[derive(Debug, Default)]
pub struct CompletionMap {
    signals: HashMap<String, CancellationToken>,
}

impl CompletionMap {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let signals = names
            .into_iter()
            .map(|name| (name.into(), CancellationToken::new()))
            .collect();

        Self { signals }
    }

    /// Fire the signal for `name`. Repeated calls are no-ops.
    pub fn mark_complete(&self, name: &str) {
        if let Some(signal) = self.signals.get(name) {
            signal.cancel();
        }
    }

    /// Signal that resolves once `name` is complete
    pub fn signal(&self, name: &str) -> CompletionSignal {
        let token = match self.signals.get(name) {
            Some(token) => token.clone(),
            None => {
                let token = CancellationToken::new();
                token.cancel();
                token
            }
        };

        CompletionSignal { token }
    }

    pub fn is_complete(&self, name: &str) -> bool {
        self.signal(name).is_complete()
    }
}

/// Awaitable handle onto one completion signal
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    token: CancellationToken,
}

impl CompletionSignal {
    pub async fn completed(&self) {
        self.token.cancelled().await
    }

    pub fn is_complete(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_then_complete() {
        let map = Arc::new(CompletionMap::new(["a", "b"]));
        let signal = map.signal("a");
        assert!(!signal.is_complete());

        let waiter = tokio::spawn(async move { signal.completed().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        map.mark_complete("a");
        waiter.await.unwrap();
        assert!(map.is_complete("a"));
        assert!(!map.is_complete("b"));
    }

    #[tokio::test]
    async fn test_unknown_name_is_complete() {
        let map = CompletionMap::new(["a"]);
        assert!(map.is_complete("unknown"));
        map.signal("unknown").completed().await;
    }

    #[test]
    fn test_mark_complete_is_idempotent() {
        let map = CompletionMap::new(["a"]);
        map.mark_complete("a");
        map.mark_complete("a");
        map.mark_complete("not-configured");
        assert!(map.is_complete("a"));
    }
}
