use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::events::{HostEvent, HostEvents};
use crate::fields::Fields;
use crate::focus::{FieldLocker, FocusHolder, FocusOracle, LockGuard};
use crate::geometry::{FrameOffset, Rect};
use crate::ids::ElementId;
use crate::overlay::OverlayHost;

#[derive(Default)]
struct FakeState {
	holder: Option<FocusHolder>,
	/// Remaining times the scripted host page re-claims focus for an
	/// element after we blur it.
	fights: HashMap<ElementId, u32>,
	locks: HashMap<ElementId, u32>,
	rects: HashMap<ElementId, Rect>,
	offset: FrameOffset,
	icons: HashMap<ElementId, ElementId>,
	detached_icons: Vec<ElementId>,
	traps: HashMap<ElementId, ElementId>,
	mount: Option<ElementId>,
	attached: bool,
	top_layer: bool,
	blur_log: Vec<ElementId>,
	focus_log: Vec<ElementId>,
}

/// Scriptable host document implementing every injected capability.
///
/// One `FakeHost` stands in for one execution context; independent host
/// documents are simulated by constructing independent instances.
#[derive(Clone)]
pub struct FakeHost {
	state: Arc<Mutex<FakeState>>,
	events: HostEvents,
}

impl Default for FakeHost {
	fn default() -> Self {
		Self::new()
	}
}

impl FakeHost {
	/// Creates a fake host with focus on the body, the overlay root
	/// attached under the document root, and the overlay as top layer.
	#[must_use]
	pub fn new() -> Self {
		Self {
			state: Arc::new(Mutex::new(FakeState {
				attached: true,
				top_layer: true,
				..FakeState::default()
			})),
			events: HostEvents::new(),
		}
	}

	/// Returns this context's event stream.
	#[must_use]
	pub fn events(&self) -> &HostEvents {
		&self.events
	}

	/// Emits a host event.
	pub fn emit(&self, event: HostEvent) {
		self.events.emit(event);
	}

	/// Scripts the current focus holder directly.
	pub fn set_holder(&self, holder: FocusHolder) {
		self.state.lock().holder = Some(holder);
	}

	/// Scripts the host page to re-claim focus for `element` the next
	/// `times` times it is blurred.
	pub fn set_refocus_fights(&self, element: ElementId, times: u32) {
		self.state.lock().fights.insert(element, times);
	}

	/// Scripts the on-screen rectangle of an element.
	pub fn set_rect(&self, element: ElementId, rect: Rect) {
		self.state.lock().rects.insert(element, rect);
	}

	/// Scripts this context's offset within its parent.
	pub fn set_frame_offset(&self, offset: FrameOffset) {
		self.state.lock().offset = offset;
	}

	/// Scripts the visual icon attached to a field.
	pub fn set_icon(&self, field: ElementId, icon: ElementId) {
		self.state.lock().icons.insert(field, icon);
	}

	/// Scripts a focus-trap subtree for an element.
	pub fn set_trap_root(&self, element: ElementId, trap: ElementId) {
		self.state.lock().traps.insert(element, trap);
	}

	/// Scripts whether the overlay root is the top-most interactive layer.
	pub fn set_top_layer(&self, top: bool) {
		self.state.lock().top_layer = top;
	}

	/// Simulates the host page deleting the overlay root's subtree.
	pub fn remove_overlay_root_externally(&self) {
		self.state.lock().attached = false;
		self.events.emit(HostEvent::OverlayRootRemoved);
	}

	/// Returns the number of currently held sibling locks.
	#[must_use]
	pub fn outstanding_locks(&self) -> usize {
		self.state.lock().locks.values().map(|n| *n as usize).sum()
	}

	/// Returns the fields whose icons were detached, in order.
	#[must_use]
	pub fn detached_icons(&self) -> Vec<ElementId> {
		self.state.lock().detached_icons.clone()
	}

	/// Returns every element blurred so far, in order.
	#[must_use]
	pub fn blur_log(&self) -> Vec<ElementId> {
		self.state.lock().blur_log.clone()
	}

	/// Returns every element explicitly focused so far, in order.
	#[must_use]
	pub fn focus_log(&self) -> Vec<ElementId> {
		self.state.lock().focus_log.clone()
	}
}

impl FocusOracle for FakeHost {
	fn holder(&self) -> FocusHolder {
		self.state.lock().holder.unwrap_or(FocusHolder::Body)
	}

	fn blur(&self, element: ElementId) {
		let mut state = self.state.lock();
		state.blur_log.push(element);
		if state.holder != Some(FocusHolder::Element(element)) {
			return;
		}
		match state.fights.get_mut(&element) {
			// The scripted page wins this round and re-claims focus.
			Some(left) if *left > 0 => *left -= 1,
			_ => state.holder = Some(FocusHolder::Body),
		}
	}

	fn focus(&self, element: ElementId) {
		let mut state = self.state.lock();
		state.focus_log.push(element);
		state.holder = Some(FocusHolder::Element(element));
	}
}

impl FieldLocker for FakeHost {
	fn lock_siblings(&self, field: ElementId, _window: Duration) -> LockGuard {
		*self.state.lock().locks.entry(field).or_insert(0) += 1;
		let state = Arc::clone(&self.state);
		LockGuard::new(move || {
			let mut state = state.lock();
			if let Some(count) = state.locks.get_mut(&field) {
				*count = count.saturating_sub(1);
			}
		})
	}
}

impl Fields for FakeHost {
	fn anchor_rect(&self, element: ElementId) -> Option<Rect> {
		self.state.lock().rects.get(&element).copied()
	}

	fn frame_offset(&self) -> FrameOffset {
		self.state.lock().offset
	}

	fn icon_of(&self, field: ElementId) -> Option<ElementId> {
		self.state.lock().icons.get(&field).copied()
	}

	fn detach_icon(&self, field: ElementId) {
		let mut state = self.state.lock();
		state.icons.remove(&field);
		state.detached_icons.push(field);
	}
}

impl OverlayHost for FakeHost {
	fn mount_root(&self, under: Option<ElementId>) {
		let mut state = self.state.lock();
		state.mount = under;
		state.attached = true;
	}

	fn unmount_root(&self) {
		let mut state = self.state.lock();
		state.mount = None;
		state.attached = false;
	}

	fn current_mount(&self) -> Option<ElementId> {
		self.state.lock().mount
	}

	fn root_attached(&self) -> bool {
		self.state.lock().attached
	}

	fn trap_root_for(&self, element: ElementId) -> Option<ElementId> {
		self.state.lock().traps.get(&element).copied()
	}

	fn is_top_layer(&self) -> bool {
		self.state.lock().top_layer
	}
}
