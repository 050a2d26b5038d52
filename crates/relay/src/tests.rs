use std::sync::Arc;

use inlay_host::{AnchorKey, ContextId, ElementId, FakeHost, FocusHolder, FocusOracle, FrameOffset, HostEvent, Rect};
use inlay_port::{DownMessage, Endpoint, SurfaceAction, UpMessage, pair};
use parking_lot::Mutex;

use crate::error::RelayError;
use crate::queue::OrderQueue;
use crate::relay::{ContextRelay, RelayConfig};

async fn settle() {
	for _ in 0..32 {
		tokio::task::yield_now().await;
	}
}

#[tokio::test]
async fn completions_follow_submission_order() {
	let queue = OrderQueue::new();
	let completions = Arc::new(Mutex::new(Vec::new()));
	let (gate1_tx, gate1_rx) = tokio::sync::oneshot::channel::<()>();
	let (gate2_tx, gate2_rx) = tokio::sync::oneshot::channel::<()>();

	let h1 = queue.push(async move {
		let _ = gate1_rx.await;
	});
	let h2 = queue.push(async move {
		let _ = gate2_rx.await;
	});
	let h3 = queue.push(async {});

	for (index, handle) in [(1, h1), (2, h2), (3, h3)] {
		let completions = Arc::clone(&completions);
		tokio::spawn(async move {
			let _ = handle.await;
			completions.lock().push(index);
		});
	}
	settle().await;
	assert!(completions.lock().is_empty());

	// Round trip 2 resolves before round trip 1; nothing may complete yet.
	gate2_tx.send(()).unwrap();
	settle().await;
	assert!(completions.lock().is_empty());

	// Once 1 resolves, all three complete, in submission order.
	gate1_tx.send(()).unwrap();
	settle().await;
	assert_eq!(*completions.lock(), vec![1, 2, 3]);
}

struct Fixture {
	host: FakeHost,
	relay: Arc<ContextRelay>,
	/// Everything the fake top level received, in arrival order.
	received: Arc<Mutex<Vec<UpMessage>>>,
}

/// Wires a relay to a scripted top level that acknowledges every call and
/// reports `visible` on state queries.
fn fixture(context: ContextId, visible: bool) -> Fixture {
	let host = FakeHost::new();
	let (child, top) = pair::<UpMessage, DownMessage>(Endpoint::Nested(context), Endpoint::Top);
	let (up_tx, down_rx) = child.split();
	let relay = ContextRelay::new(
		context,
		up_tx,
		Arc::new(host.clone()),
		Arc::new(host.clone()),
		RelayConfig::default(),
	);
	let _driver = relay.spawn(down_rx);

	let received = Arc::new(Mutex::new(Vec::new()));
	let log = Arc::clone(&received);
	let (top_tx, mut top_rx) = top.split();
	tokio::spawn(async move {
		while let Some(envelope) = top_rx.recv().await {
			log.lock().push(envelope.body.clone());
			let reply = match envelope.body {
				UpMessage::SurfaceOpen(open) => Some(DownMessage::Ack { token: open.token }),
				UpMessage::SurfaceClose { token, .. } => Some(DownMessage::Ack { token }),
				UpMessage::StateQuery { token } => Some(DownMessage::StateReply { token, visible }),
				UpMessage::FocusReleased { .. } => None,
			};
			if let Some(reply) = reply {
				let _ = top_tx.send(reply);
			}
		}
	});

	Fixture { host, relay, received }
}

#[tokio::test]
async fn open_lifts_geometry_into_the_parent_space() {
	let context = ContextId::new(2);
	let field = ElementId::new(11);
	let fx = fixture(context, false);
	fx.host.set_rect(field, Rect::new(10.0, 20.0, 100.0, 24.0));
	fx.host.set_frame_offset(FrameOffset::new(5.0, 7.0));

	fx.relay.open(field, SurfaceAction::SuggestLogin, true).await.unwrap().unwrap();

	let received = fx.received.lock();
	let UpMessage::SurfaceOpen(open) = &received[0] else {
		panic!("expected a surface open, got {received:?}");
	};
	assert_eq!(open.rect, Rect::new(15.0, 27.0, 100.0, 24.0));
	assert_eq!(open.nested_context_id, context);
	assert_eq!(open.field_id, field);
	assert!(open.autofocused);
}

#[tokio::test]
async fn get_state_relays_the_query_upward() {
	let fx = fixture(ContextId::new(3), true);
	let visible = fx.relay.get_state().await.unwrap().unwrap();
	assert!(visible);
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_calls_time_out_silently() {
	let host = FakeHost::new();
	let context = ContextId::new(4);
	let (child, top) = pair::<UpMessage, DownMessage>(Endpoint::Nested(context), Endpoint::Top);
	let (up_tx, down_rx) = child.split();
	let relay = ContextRelay::new(
		context,
		up_tx,
		Arc::new(host.clone()),
		Arc::new(host),
		RelayConfig::default(),
	);
	let _driver = relay.spawn(down_rx);
	// Keep the top port alive but never reply.
	let _silent_top = top;

	let result = relay.open(ElementId::new(1), SurfaceAction::SuggestLogin, false).await.unwrap();
	assert_eq!(result, Err(RelayError::AckTimeout));
}

#[tokio::test]
async fn calls_to_a_gone_parent_are_no_ops() {
	let host = FakeHost::new();
	let context = ContextId::new(5);
	let (child, top) = pair::<UpMessage, DownMessage>(Endpoint::Nested(context), Endpoint::Top);
	let (up_tx, _down_rx) = child.split();
	drop(top);
	let relay = ContextRelay::new(
		context,
		up_tx,
		Arc::new(host.clone()),
		Arc::new(host),
		RelayConfig::default(),
	);

	let result = relay.close(None).await.unwrap();
	assert!(matches!(result, Err(RelayError::Transport(_))));
}

#[tokio::test]
async fn release_focus_blurs_and_reports_back() {
	let context = ContextId::new(6);
	let field = ElementId::new(21);
	let fx = fixture(context, false);
	fx.host.set_holder(FocusHolder::Element(field));

	// An open gives the fake top a port to answer through and sets the
	// stage the top level would be in when it requests a release.
	fx.relay.open(field, SurfaceAction::SuggestLogin, false).await.unwrap().unwrap();

	// Drive the release through the relay's inbound path directly.
	let token = inlay_port::TokenGen::scoped(0).next();
	fx.relay.handle_down(DownMessage::ReleaseFocus { token, context, field });
	settle().await;

	assert_eq!(fx.host.holder(), FocusHolder::Body);
	let received = fx.received.lock();
	assert!(
		received
			.iter()
			.any(|message| matches!(message, UpMessage::FocusReleased { was_focused: true, .. })),
		"expected a focus-released report, got {received:?}"
	);
}

#[tokio::test]
async fn close_anchor_runs_local_cleanup() {
	let context = ContextId::new(7);
	let field = ElementId::new(31);
	let fx = fixture(context, false);
	fx.host.set_icon(field, ElementId::new(32));

	fx.relay.handle_down(DownMessage::CloseAnchor {
		key: AnchorKey::Remote {
			nested_context_id: context,
			field_id: field,
		},
		refocus: true,
	});

	assert_eq!(fx.host.detached_icons(), vec![field]);
	assert_eq!(fx.host.focus_log(), vec![field]);
}

#[tokio::test]
async fn local_scroll_closes_the_anchored_panel() {
	let context = ContextId::new(8);
	let field = ElementId::new(41);
	let fx = fixture(context, false);
	let _watcher = fx.relay.watch_local_events(fx.host.events());

	fx.relay.open(field, SurfaceAction::SuggestLogin, false).await.unwrap().unwrap();
	fx.host.emit(HostEvent::Scroll { container: None });
	settle().await;

	let received = fx.received.lock();
	assert!(
		received.iter().any(|message| matches!(
			message,
			UpMessage::SurfaceClose {
				target: Some(AnchorKey::Remote { field_id, .. }),
				..
			} if *field_id == field
		)),
		"expected a scoped close, got {received:?}"
	);
}

#[tokio::test]
async fn scroll_without_an_anchor_stays_quiet() {
	let fx = fixture(ContextId::new(9), false);
	let _watcher = fx.relay.watch_local_events(fx.host.events());
	fx.host.emit(HostEvent::Scroll { container: None });
	settle().await;
	assert!(fx.received.lock().is_empty());
}

#[tokio::test]
async fn forwarding_lifts_geometry_at_every_hop() {
	// top ← child (ctx 2, offset 10/10) ← grandchild (ctx 3, offset 1/2)
	let child_ctx = ContextId::new(2);
	let grandchild_ctx = ContextId::new(3);
	let field = ElementId::new(51);

	let child_host = FakeHost::new();
	child_host.set_frame_offset(FrameOffset::new(10.0, 10.0));
	let grandchild_host = FakeHost::new();
	grandchild_host.set_frame_offset(FrameOffset::new(1.0, 2.0));
	grandchild_host.set_rect(field, Rect::new(100.0, 100.0, 50.0, 10.0));

	let (child_port, top_port) = pair::<UpMessage, DownMessage>(Endpoint::Nested(child_ctx), Endpoint::Top);
	let (child_up_tx, child_down_rx) = child_port.split();
	let child = ContextRelay::new(
		child_ctx,
		child_up_tx,
		Arc::new(child_host.clone()),
		Arc::new(child_host),
		RelayConfig::default(),
	);
	let _child_driver = child.spawn(child_down_rx);

	let (gc_port, gc_parent_port) = pair::<UpMessage, DownMessage>(Endpoint::Nested(grandchild_ctx), Endpoint::Nested(child_ctx));
	let (gc_up_tx, gc_down_rx) = gc_port.split();
	let (gc_down_tx, gc_up_rx) = gc_parent_port.split();
	let grandchild = ContextRelay::new(
		grandchild_ctx,
		gc_up_tx,
		Arc::new(grandchild_host.clone()),
		Arc::new(grandchild_host),
		RelayConfig::default(),
	);
	let _gc_driver = grandchild.spawn(gc_down_rx);
	let _adoption = child.adopt_child(grandchild_ctx, gc_down_tx, gc_up_rx);

	// Scripted top: record and acknowledge.
	let received: Arc<Mutex<Vec<(Endpoint, UpMessage)>>> = Arc::new(Mutex::new(Vec::new()));
	let log = Arc::clone(&received);
	let (top_tx, mut top_rx) = top_port.split();
	tokio::spawn(async move {
		while let Some(envelope) = top_rx.recv().await {
			log.lock().push((envelope.sender, envelope.body.clone()));
			if let UpMessage::SurfaceOpen(open) = envelope.body {
				let _ = top_tx.send(DownMessage::Ack { token: open.token });
			}
		}
	});

	grandchild
		.open(field, SurfaceAction::SuggestLogin, false)
		.await
		.unwrap()
		.unwrap();

	let received = received.lock();
	let (sender, UpMessage::SurfaceOpen(open)) = &received[0] else {
		panic!("expected a surface open, got {received:?}");
	};
	// The envelope names the immediate child; the payload names the origin.
	assert_eq!(*sender, Endpoint::Nested(child_ctx));
	assert_eq!(open.nested_context_id, grandchild_ctx);
	// 100 + 1 + 10 / 100 + 2 + 10: both hops applied their own offset.
	assert_eq!(open.rect, Rect::new(111.0, 112.0, 50.0, 10.0));
}

#[tokio::test]
async fn replies_to_abandoned_calls_never_reach_children() {
	let context = ContextId::new(10);
	let child_ctx = ContextId::new(11);
	let fx = fixture(context, false);

	let (child_port, child_parent_port) = pair::<UpMessage, DownMessage>(Endpoint::Nested(child_ctx), Endpoint::Nested(context));
	let (_child_up_tx, mut child_down_rx) = child_port.split();
	let (child_down_tx, child_up_rx) = child_parent_port.split();
	let _adoption = fx.relay.adopt_child(child_ctx, child_down_tx, child_up_rx);

	// An ack in our own scope with no waiter left, e.g. after a timeout.
	let abandoned = inlay_port::TokenGen::scoped(context.raw()).next();
	fx.relay.handle_down(DownMessage::Ack { token: abandoned });

	// One scoped to a descendant still passes through.
	let downstream = inlay_port::TokenGen::scoped(child_ctx.raw()).next();
	fx.relay.handle_down(DownMessage::Ack { token: downstream });

	// Forwarding is order-preserving, so the first delivery being the
	// downstream ack proves the abandoned one was dropped.
	let received = child_down_rx.recv().await.unwrap();
	assert_eq!(received.body, DownMessage::Ack { token: downstream });
}
