//! The shared overlay root registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use inlay_host::{ElementId, OverlayHost};

/// Owns the single overlay root element both surfaces render under.
///
/// The root normally lives directly under the document root. Host pages
/// that trap focus inside a modal subtree make an outside root inert, so
/// the registry relocates it into the trap subtree on demand. Every
/// relocation or remount bumps the generation; the coordinator rebuilds
/// the surfaces whenever the generation moves.
pub struct OverlayLayerRegistry {
	host: Arc<dyn OverlayHost>,
	stale: AtomicBool,
	generation: AtomicU64,
}

impl OverlayLayerRegistry {
	/// Creates the registry, mounting the root under the document root if
	/// it is not attached yet.
	#[must_use]
	pub fn new(host: Arc<dyn OverlayHost>) -> Self {
		if !host.root_attached() {
			host.mount_root(None);
		}
		Self {
			host,
			stale: AtomicBool::new(false),
			generation: AtomicU64::new(0),
		}
	}

	/// Returns the current root generation.
	#[must_use]
	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::Acquire)
	}

	/// Makes the overlay interactive for an anchor near `element`.
	///
	/// When the element sits inside a host-page focus trap the root is
	/// relocated into that subtree; when it does not, the root returns
	/// under the document root. Returns true when the root moved and the
	/// surfaces must be rebuilt.
	pub fn ensure_interactive(&self, element: ElementId) -> bool {
		if self.stale.load(Ordering::Acquire) {
			return false;
		}
		let wanted = self.host.trap_root_for(element);
		if wanted == self.host.current_mount() && self.host.root_attached() {
			return false;
		}
		self.host.mount_root(wanted);
		self.generation.fetch_add(1, Ordering::AcqRel);
		true
	}

	/// Reacts to the host page removing the root from the document.
	///
	/// Returns true when the root was recreated (surfaces must rebuild);
	/// false when the registry is stale and the engine should shut down
	/// instead of fighting the page.
	pub fn restore_after_removal(&self) -> bool {
		if self.stale.load(Ordering::Acquire) {
			return false;
		}
		self.host.mount_root(self.host.current_mount());
		self.generation.fetch_add(1, Ordering::AcqRel);
		true
	}

	/// Marks the registry stale: the next external removal is final.
	pub fn mark_stale(&self) {
		self.stale.store(true, Ordering::Release);
	}

	/// Removes the root from the document for good.
	pub fn teardown(&self) {
		self.mark_stale();
		self.host.unmount_root();
	}

	/// Returns true once the registry was marked stale.
	#[must_use]
	pub fn is_stale(&self) -> bool {
		self.stale.load(Ordering::Acquire)
	}
}

impl std::fmt::Debug for OverlayLayerRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OverlayLayerRegistry")
			.field("generation", &self.generation())
			.field("stale", &self.is_stale())
			.finish_non_exhaustive()
	}
}
