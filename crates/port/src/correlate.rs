//! Correlation tokens and the pending-response map.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Correlation token threading one logical request across async boundaries.
///
/// Tokens are generated per context and scoped by the context's id, so two
/// contexts issuing requests concurrently can never collide even though
/// neither knows about the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
	scope: u64,
	seq: u64,
}

impl Token {
	/// Returns the scope the token was generated in.
	#[must_use]
	pub const fn scope(self) -> u64 {
		self.scope
	}

	/// Returns the sequence number within the scope.
	#[must_use]
	pub const fn seq(self) -> u64 {
		self.seq
	}
}

/// Shared monotonic token generator for one scope.
#[derive(Debug, Default, Clone)]
pub struct TokenGen {
	scope: u64,
	next: Arc<AtomicU64>,
}

impl TokenGen {
	/// Creates a generator for scope 0 (the top-level context).
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a generator for an explicit scope, typically a context id.
	#[must_use]
	pub fn scoped(scope: u64) -> Self {
		Self {
			scope,
			next: Arc::new(AtomicU64::new(0)),
		}
	}

	/// Generates the next unique token.
	#[allow(clippy::should_implement_trait, reason = "convention")]
	pub fn next(&self) -> Token {
		Token {
			scope: self.scope,
			seq: self.next.fetch_add(1, Ordering::Relaxed),
		}
	}
}

/// Token → pending-waiter map for request/response over a port.
///
/// Resolving an unknown or already-settled token is a silent no-op: a late
/// response to a stale request must be discarded, never surfaced.
pub struct Correlator<T> {
	pending: Mutex<HashMap<Token, oneshot::Sender<T>>>,
}

impl<T> Default for Correlator<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> std::fmt::Debug for Correlator<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Correlator").field("pending", &self.pending.lock().len()).finish()
	}
}

impl<T> Correlator<T> {
	/// Creates an empty correlator.
	#[must_use]
	pub fn new() -> Self {
		Self {
			pending: Mutex::new(HashMap::new()),
		}
	}

	/// Registers a waiter for `token`.
	///
	/// The returned receiver resolves when [`Correlator::resolve`] is called
	/// with the same token, and errors if the request is discarded first.
	#[must_use]
	pub fn register(&self, token: Token) -> oneshot::Receiver<T> {
		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(token, tx);
		rx
	}

	/// Delivers a response to the waiter for `token`.
	///
	/// Returns false when no waiter exists (stale or unknown token); the
	/// value is dropped in that case.
	pub fn resolve(&self, token: Token, value: T) -> bool {
		match self.pending.lock().remove(&token) {
			Some(tx) => tx.send(value).is_ok(),
			None => false,
		}
	}

	/// Drops the waiter for `token`, if any.
	pub fn discard(&self, token: Token) {
		self.pending.lock().remove(&token);
	}

	/// Drops every pending waiter.
	pub fn abort_all(&self) {
		self.pending.lock().clear();
	}

	/// Returns the number of outstanding waiters.
	#[must_use]
	pub fn outstanding(&self) -> usize {
		self.pending.lock().len()
	}
}

#[cfg(test)]
mod tests {
	use super::{Correlator, TokenGen};

	#[tokio::test]
	async fn resolve_wakes_the_registered_waiter() {
		let tokens = TokenGen::new();
		let correlator = Correlator::new();
		let token = tokens.next();
		let rx = correlator.register(token);
		assert!(correlator.resolve(token, 7u32));
		assert_eq!(rx.await.unwrap(), 7);
		assert_eq!(correlator.outstanding(), 0);
	}

	#[test]
	fn resolving_a_stale_token_is_silently_dropped() {
		let correlator = Correlator::<u32>::new();
		let token = TokenGen::new().next();
		assert!(!correlator.resolve(token, 7));
	}

	#[test]
	fn scoped_generators_never_collide() {
		let a = TokenGen::scoped(1).next();
		let b = TokenGen::scoped(2).next();
		assert_eq!(a.seq(), b.seq());
		assert_ne!(a, b);
	}

	#[tokio::test]
	async fn abort_all_errors_pending_waiters() {
		let tokens = TokenGen::new();
		let correlator = Correlator::<u32>::new();
		let rx = correlator.register(tokens.next());
		correlator.abort_all();
		assert!(rx.await.is_err());
	}
}
