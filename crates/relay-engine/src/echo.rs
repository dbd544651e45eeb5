use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use relay_core::{ChannelId, EchoScope};

/// Skips a text payload identical to the last one sent.
///
/// With [`EchoScope::Global`] a single value is shared by every destination,
/// so the same text fanned out to two channels is only delivered to the first
/// branch that claims it. [`EchoScope::Destination`] keeps one value per
/// mirror channel. The lock is never held across an await.
pub struct EchoSuppressor {
    scope: EchoScope,
    last: Mutex<HashMap<Option<ChannelId>, String>>,
}

impl EchoSuppressor {
    pub fn new(scope: EchoScope) -> Self {
        Self {
            scope,
            last: Mutex::new(HashMap::new()),
        }
    }

    pub fn scope(&self) -> EchoScope {
        self.scope
    }

    /// `false` when `rendered` equals the last recorded text for this channel's scope.
    pub fn should_send(&self, channel: &ChannelId, rendered: &str) -> bool {
        let key = self.key(channel);
        self.state().get(&key).map(String::as_str) != Some(rendered)
    }

    /// Remember `rendered` as the last delivered text. Call only after a successful send.
    pub fn record(&self, channel: &ChannelId, rendered: &str) {
        let key = self.key(channel);
        self.state().insert(key, rendered.to_string());
    }

    /// Check and record in one lock acquisition.
    ///
    /// Returns `None` when `rendered` repeats the last text. Otherwise the text
    /// is stored immediately, before the send happens, so a concurrent branch
    /// sees it; hand the claim back to [`release`](Self::release) if the send fails.
    pub fn try_claim(&self, channel: &ChannelId, rendered: &str) -> Option<EchoClaim> {
        let key = self.key(channel);
        let mut state = self.state();
        if state.get(&key).map(String::as_str) == Some(rendered) {
            return None;
        }
        let previous = state.insert(key.clone(), rendered.to_string());
        Some(EchoClaim {
            key,
            rendered: rendered.to_string(),
            previous,
        })
    }

    /// Undo a claim whose send failed. A no-op if another branch has
    /// recorded a newer text in the meantime.
    pub fn release(&self, claim: EchoClaim) {
        let mut state = self.state();
        if state.get(&claim.key) != Some(&claim.rendered) {
            return;
        }
        match claim.previous {
            Some(previous) => {
                state.insert(claim.key, previous);
            }
            None => {
                state.remove(&claim.key);
            }
        }
    }

    fn key(&self, channel: &ChannelId) -> Option<ChannelId> {
        match self.scope {
            EchoScope::Global => None,
            EchoScope::Destination => Some(channel.clone()),
        }
    }

    fn state(&self) -> MutexGuard<'_, HashMap<Option<ChannelId>, String>> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A text reserved by [`EchoSuppressor::try_claim`].
#[derive(Debug)]
pub struct EchoClaim {
    key: Option<ChannelId>,
    rendered: String,
    previous: Option<String>,
}

impl Default for EchoSuppressor {
    fn default() -> Self {
        Self::new(EchoScope::default())
    }
}
