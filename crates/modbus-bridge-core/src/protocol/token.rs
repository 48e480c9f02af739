//! Correlation tokens and the registry of callers awaiting a bus reply.
//!
//! # What is a correlation token? (for beginners)
//!
//! The bus driver performs every transaction in the background and later
//! invokes a callback with the reply.  The callback carries no reference to
//! the HTTP request that caused it; it only carries the integer the bridge
//! handed to the driver when the transaction was submitted.  That integer is
//! the *token*, and the [`TokenRegistry`] is the lookup table from token back
//! to the caller still waiting for its reply.
//!
//! ```text
//! submit:   allocate() ─► T ─► register(T, caller) ─► driver.submit(T, ...)
//! callback: driver ─► on_data(.., T) ─► resolve(T) ─► caller ─► release(T)
//! ```
//!
//! # Thread safety
//!
//! Submissions run on HTTP handler tasks while callbacks run on the bus
//! worker task.  The counter and the map therefore live behind **one** mutex,
//! so an `allocate` can never interleave with a `resolve` half-way through.
//! Every critical section is a handful of `HashMap` operations and never
//! awaits, so a `std::sync::Mutex` is the right tool here.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// An opaque correlation identifier linking a submitted bus transaction to
/// the caller awaiting its reply.
///
/// `Token(0)` is the invalid sentinel and is never issued by
/// [`TokenRegistry::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// The sentinel value that is never handed out.
    pub const INVALID: Token = Token(0);

    /// Returns the raw integer value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Token {
    /// Formats the token as eight upper-case hex digits, the form used in
    /// reply bodies and log lines.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

/// State guarded by the registry mutex.
struct RegistryInner<C> {
    /// The next candidate token value.  Starts at 1.
    next: u32,
    /// Outstanding transactions keyed by token.
    pending: HashMap<Token, C>,
    /// Total number of tokens issued since construction (diagnostics only).
    issued: u64,
}

/// Thread-safe registry of outstanding transactions.
///
/// `C` is the *caller context*: whatever handle delivers a reply to the
/// entity that issued the original request (a oneshot sender in the HTTP
/// bridge, a plain value in tests).  The registry owns each context from
/// [`register`](Self::register) until [`resolve`](Self::resolve) moves it
/// back out, exactly once.
///
/// # Wraparound
///
/// Tokens are 32-bit.  When the counter wraps it skips the sentinel `0` and
/// every token that is still registered, so a live token is never reissued
/// to a second caller.
///
/// # Examples
///
/// ```rust
/// use modbus_bridge_core::TokenRegistry;
///
/// let registry: TokenRegistry<&str> = TokenRegistry::new();
/// let token = registry.allocate();
/// registry.register(token, "caller-a");
///
/// assert_eq!(registry.resolve(token), Some("caller-a"));
/// assert_eq!(registry.resolve(token), None); // already taken
/// ```
pub struct TokenRegistry<C> {
    inner: Mutex<RegistryInner<C>>,
}

impl<C> TokenRegistry<C> {
    /// Creates an empty registry whose first token will be `Token(1)`.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates an empty registry whose counter starts at `first`.
    ///
    /// Used by tests to exercise the wraparound path without issuing four
    /// billion tokens first.
    pub fn starting_at(first: u32) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next: first,
                pending: HashMap::new(),
                issued: 0,
            }),
        }
    }

    /// Locks the inner state.
    ///
    /// A panic while holding the lock cannot leave the map half-updated
    /// (every mutation is a single `HashMap` call), so a poisoned lock is
    /// recovered instead of propagating the panic to every later caller.
    fn lock(&self) -> MutexGuard<'_, RegistryInner<C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a fresh token that is not currently registered.
    ///
    /// Skips the sentinel `0` and any still-outstanding token after the
    /// counter wraps.
    pub fn allocate(&self) -> Token {
        let mut inner = self.lock();
        loop {
            let candidate = Token(inner.next);
            // `wrapping_add` turns u32::MAX + 1 into 0 instead of panicking in
            // debug builds.
            inner.next = inner.next.wrapping_add(1);

            if candidate == Token::INVALID || inner.pending.contains_key(&candidate) {
                continue;
            }

            inner.issued += 1;
            return candidate;
        }
    }

    /// Records `caller` as the recipient of the reply for `token`.
    ///
    /// Must happen no later than the driver submission: the driver's callback
    /// may fire before the submitting code regains control.
    pub fn register(&self, token: Token, caller: C) {
        let previous = self.lock().pending.insert(token, caller);
        if previous.is_some() {
            tracing::warn!("token {token} registered twice; previous caller dropped");
        }
    }

    /// Removes and returns the caller registered under `token`.
    ///
    /// Returns `None` when the token was never issued or was already
    /// resolved, which is how a stale or duplicate callback shows up.
    pub fn resolve(&self, token: Token) -> Option<C> {
        self.lock().pending.remove(&token)
    }

    /// Forgets `token`.  Idempotent: releasing an unknown token is a no-op.
    ///
    /// Returns `true` if a caller was still registered and has been dropped.
    pub fn release(&self, token: Token) -> bool {
        self.lock().pending.remove(&token).is_some()
    }

    /// Returns `true` if `token` is currently registered.
    pub fn is_pending(&self, token: Token) -> bool {
        self.lock().pending.contains_key(&token)
    }

    /// Number of transactions still waiting for a callback.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of tokens handed out by [`allocate`](Self::allocate) so far.
    pub fn issued_count(&self) -> u64 {
        self.lock().issued
    }
}

impl<C> Default for TokenRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for TokenRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("TokenRegistry")
            .field("next", &inner.next)
            .field("pending", &inner.pending.len())
            .field("issued", &inner.issued)
            .finish()
    }
}
