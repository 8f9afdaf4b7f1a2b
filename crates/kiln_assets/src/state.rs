use std::sync::Arc;

/// Lifecycle state of an asynchronously produced asset.
///
/// `Pending` moves forward to exactly one of the terminal states. A terminal
/// state is never left again; recomputation requires a fresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AssetState {
    /// Work has been dispatched but has not finished.
    #[default]
    Pending,
    /// The asset finished successfully and its payload is available.
    Ready,
    /// The asset failed; an error payload describes why.
    Invalid,
}

impl AssetState {
    /// Returns `true` for `Ready` and `Invalid`.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for AssetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// Immutable, shared buffer produced by a compile (byte code or error text).
///
/// Payloads are replaced wholesale and never edited in place, so concurrent
/// readers need no synchronization against each other.
pub type Payload = Arc<[u8]>;

/// Builds a payload from UTF-8 text.
#[inline]
#[must_use]
pub fn text_payload(text: &str) -> Payload {
    Arc::from(text.as_bytes())
}

/// Returns an empty payload.
#[inline]
#[must_use]
pub fn empty_payload() -> Payload {
    Arc::from(&[][..])
}

/// Lossy view of a payload as text, for diagnostics.
#[must_use]
pub fn payload_as_text(payload: &Payload) -> String {
    String::from_utf8_lossy(payload).into_owned()
}
