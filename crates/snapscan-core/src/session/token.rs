//! Latest-wins request tokens.

/// Identifies one encode request. Only the most recently issued token of a
/// session may write its result back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Monotonic token source.
#[derive(Debug, Default)]
pub(crate) struct TokenCounter {
    latest: u64,
}

impl TokenCounter {
    pub(crate) fn issue(&mut self) -> RequestToken {
        self.latest += 1;
        RequestToken(self.latest)
    }

    /// Make every outstanding token stale without issuing a new one.
    pub(crate) fn invalidate(&mut self) {
        self.latest += 1;
    }

    pub(crate) fn is_latest(&self, token: RequestToken) -> bool {
        token.0 == self.latest
    }
}
