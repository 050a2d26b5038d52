use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use inlay_host::{FakeHost, Rect, SurfaceKind};
use inlay_port::{Endpoint, Envelope, InitPayload, Port, SurfaceAction, SurfaceDown, SurfaceUp, SurfaceUpKind, pair};
use tokio::sync::broadcast::error::TryRecvError;

use crate::controller::{HandlerOptions, SurfaceController};
use crate::state::{CloseOptions, Phase, SurfaceConfig, SurfaceEvent};

struct Fixture {
	host: FakeHost,
	controller: Arc<SurfaceController>,
	/// The embedded surface's end of the channel.
	surface_port: Port<SurfaceUp, SurfaceDown>,
}

fn fixture(kind: SurfaceKind) -> Fixture {
	let host = FakeHost::new();
	let controller = Arc::new(SurfaceController::new(kind, Arc::new(host.clone()), SurfaceConfig::default()));
	let (top, surface_port) = pair::<SurfaceDown, SurfaceUp>(Endpoint::Top, Endpoint::Surface(kind));
	controller.init(top.sender(), || InitPayload { kind });
	Fixture {
		host,
		controller,
		surface_port,
	}
}

fn make_ready(controller: &SurfaceController, kind: SurfaceKind) {
	controller.handle_message(&Envelope {
		sender: Endpoint::Surface(kind),
		body: SurfaceUp::Loaded,
	});
	controller.handle_message(&Envelope {
		sender: Endpoint::Surface(kind),
		body: SurfaceUp::Ready,
	});
}

fn drain_events(rx: &mut tokio::sync::broadcast::Receiver<SurfaceEvent>) -> Vec<SurfaceEvent> {
	let mut events = Vec::new();
	loop {
		match rx.try_recv() {
			Ok(event) => events.push(event),
			Err(TryRecvError::Empty | TryRecvError::Closed) => return events,
			Err(TryRecvError::Lagged(_)) => {}
		}
	}
}

#[tokio::test]
async fn open_waits_for_ready_then_becomes_visible() {
	let fx = fixture(SurfaceKind::Suggestions);
	let mut events = fx.controller.subscribe();
	let controller = Arc::clone(&fx.controller);

	let opening = tokio::spawn(async move {
		controller
			.open(SurfaceAction::SuggestLogin, Rect::new(1.0, 2.0, 100.0, 20.0), None)
			.await;
	});
	tokio::task::yield_now().await;
	assert_eq!(fx.controller.snapshot().phase, Phase::Opening);

	make_ready(&fx.controller, SurfaceKind::Suggestions);
	opening.await.unwrap();

	let snapshot = fx.controller.snapshot();
	assert_eq!(snapshot.phase, Phase::Open);
	assert!(snapshot.visible);
	assert!(snapshot.chain_holds());
	assert_eq!(
		drain_events(&mut events),
		vec![SurfaceEvent::Opened {
			kind: SurfaceKind::Suggestions,
			action: SurfaceAction::SuggestLogin,
		}]
	);
}

#[tokio::test]
async fn opened_surface_receives_position_then_action() {
	let mut fx = fixture(SurfaceKind::Suggestions);
	make_ready(&fx.controller, SurfaceKind::Suggestions);
	fx.controller
		.open(SurfaceAction::SuggestLogin, Rect::new(5.0, 6.0, 80.0, 24.0), None)
		.await;

	// Skip the Init sent at bind time.
	assert!(matches!(fx.surface_port.recv().await.unwrap().body, SurfaceDown::Init(_)));
	assert_eq!(
		fx.surface_port.recv().await.unwrap().body,
		SurfaceDown::Position {
			rect: Rect::new(5.0, 6.0, 80.0, 24.0)
		}
	);
	assert_eq!(
		fx.surface_port.recv().await.unwrap().body,
		SurfaceDown::ShowAction {
			action: SurfaceAction::SuggestLogin
		}
	);
}

#[tokio::test(start_paused = true)]
async fn open_abandons_silently_when_ready_never_arrives() {
	let fx = fixture(SurfaceKind::Suggestions);
	let mut events = fx.controller.subscribe();

	fx.controller
		.open(SurfaceAction::SuggestLogin, Rect::new(0.0, 0.0, 10.0, 10.0), None)
		.await;

	let snapshot = fx.controller.snapshot();
	assert_eq!(snapshot.phase, Phase::Closed);
	assert!(!snapshot.visible);
	assert!(!snapshot.pending);
	assert!(drain_events(&mut events).is_empty());
}

#[tokio::test]
async fn prepare_veto_discards_the_open() {
	let fx = fixture(SurfaceKind::Suggestions);
	let mut events = fx.controller.subscribe();
	make_ready(&fx.controller, SurfaceKind::Suggestions);

	fx.controller
		.open(
			SurfaceAction::SuggestLogin,
			Rect::new(0.0, 0.0, 10.0, 10.0),
			Some(Box::pin(async { false })),
		)
		.await;

	let snapshot = fx.controller.snapshot();
	assert!(!snapshot.visible);
	assert_eq!(snapshot.phase, Phase::Closed);
	assert!(drain_events(&mut events).is_empty());
}

#[tokio::test]
async fn close_during_opening_aborts_without_a_close_event() {
	let fx = fixture(SurfaceKind::Suggestions);
	let mut events = fx.controller.subscribe();
	let controller = Arc::clone(&fx.controller);

	let opening = tokio::spawn(async move {
		controller
			.open(SurfaceAction::SuggestLogin, Rect::new(0.0, 0.0, 10.0, 10.0), None)
			.await;
	});
	tokio::task::yield_now().await;
	assert_eq!(fx.controller.snapshot().phase, Phase::Opening);

	fx.controller.close(CloseOptions::default());
	opening.await.unwrap();

	let snapshot = fx.controller.snapshot();
	assert_eq!(snapshot.phase, Phase::Closed);
	assert!(!snapshot.visible);
	assert!(!snapshot.pending);
	assert!(drain_events(&mut events).is_empty());

	// A late ready must not resurrect the aborted open.
	make_ready(&fx.controller, SurfaceKind::Suggestions);
	tokio::task::yield_now().await;
	assert!(!fx.controller.snapshot().visible);
}

#[tokio::test]
async fn a_new_open_aborts_the_previous_pending_one() {
	let fx = fixture(SurfaceKind::Suggestions);
	let first = Arc::clone(&fx.controller);
	let first_task = tokio::spawn(async move {
		first
			.open(SurfaceAction::SuggestLogin, Rect::new(0.0, 0.0, 10.0, 10.0), None)
			.await;
	});
	tokio::task::yield_now().await;

	let second = Arc::clone(&fx.controller);
	let second_task = tokio::spawn(async move {
		second
			.open(SurfaceAction::SuggestPassword, Rect::new(0.0, 0.0, 10.0, 10.0), None)
			.await;
	});
	tokio::task::yield_now().await;

	// At most one pending abortable operation exists.
	assert!(fx.controller.snapshot().pending);
	first_task.await.unwrap();

	make_ready(&fx.controller, SurfaceKind::Suggestions);
	second_task.await.unwrap();

	let snapshot = fx.controller.snapshot();
	assert!(snapshot.visible);
	assert!(!snapshot.pending);
}

#[tokio::test]
async fn close_twice_emits_exactly_one_closed_event() {
	let fx = fixture(SurfaceKind::Suggestions);
	make_ready(&fx.controller, SurfaceKind::Suggestions);
	fx.controller
		.open(SurfaceAction::SuggestLogin, Rect::new(0.0, 0.0, 10.0, 10.0), None)
		.await;

	let mut events = fx.controller.subscribe();
	fx.controller.close(CloseOptions {
		discard: false,
		refocus: true,
	});
	fx.controller.close(CloseOptions {
		discard: false,
		refocus: true,
	});

	assert_eq!(
		drain_events(&mut events),
		vec![SurfaceEvent::Closed {
			kind: SurfaceKind::Suggestions,
			discard: false,
			refocus: true,
		}]
	);
	assert_eq!(fx.controller.snapshot().phase, Phase::Closed);
}

#[tokio::test]
async fn user_action_handlers_require_the_top_layer() {
	let fx = fixture(SurfaceKind::Suggestions);
	let fills = Arc::new(AtomicUsize::new(0));
	let seen = Arc::clone(&fills);
	let _guard = fx.controller.register_message_handler(
		SurfaceUpKind::Fill,
		HandlerOptions { user_action: true },
		move |_| {
			seen.fetch_add(1, Ordering::SeqCst);
		},
	);

	let fill = Envelope {
		sender: Endpoint::Surface(SurfaceKind::Suggestions),
		body: SurfaceUp::Fill {
			value: "hunter2".to_owned(),
		},
	};

	fx.host.set_top_layer(false);
	fx.controller.handle_message(&fill);
	assert_eq!(fills.load(Ordering::SeqCst), 0);

	fx.host.set_top_layer(true);
	fx.controller.handle_message(&fill);
	assert_eq!(fills.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn messages_for_a_sibling_surface_are_ignored() {
	let fx = fixture(SurfaceKind::Suggestions);
	fx.controller.handle_message(&Envelope {
		sender: Endpoint::Surface(SurfaceKind::Notifications),
		body: SurfaceUp::Ready,
	});
	assert!(!fx.controller.snapshot().ready);
}

#[tokio::test]
async fn dropping_the_handler_guard_unregisters() {
	let fx = fixture(SurfaceKind::Suggestions);
	let count = Arc::new(AtomicUsize::new(0));
	let seen = Arc::clone(&count);
	let guard = fx
		.controller
		.register_message_handler(SurfaceUpKind::Resize, HandlerOptions::default(), move |_| {
			seen.fetch_add(1, Ordering::SeqCst);
		});

	let resize = Envelope {
		sender: Endpoint::Surface(SurfaceKind::Suggestions),
		body: SurfaceUp::Resize { height: 120.0 },
	};
	fx.controller.handle_message(&resize);
	drop(guard);
	fx.controller.handle_message(&resize);
	assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rebinding_the_channel_keeps_a_visible_surface() {
	let fx = fixture(SurfaceKind::Suggestions);
	make_ready(&fx.controller, SurfaceKind::Suggestions);
	fx.controller
		.open(SurfaceAction::SuggestLogin, Rect::new(0.0, 0.0, 10.0, 10.0), None)
		.await;
	assert!(fx.controller.snapshot().visible);

	let (top, mut replacement) = pair::<SurfaceDown, SurfaceUp>(Endpoint::Top, Endpoint::Surface(SurfaceKind::Suggestions));
	fx.controller.init(top.sender(), || InitPayload {
		kind: SurfaceKind::Suggestions,
	});

	assert!(fx.controller.snapshot().visible);
	assert!(matches!(replacement.recv().await.unwrap().body, SurfaceDown::Init(_)));
}

#[tokio::test]
async fn rebuilding_the_channel_restarts_the_handshake() {
	let fx = fixture(SurfaceKind::Suggestions);
	make_ready(&fx.controller, SurfaceKind::Suggestions);
	fx.controller
		.open(SurfaceAction::SuggestLogin, Rect::new(0.0, 0.0, 10.0, 10.0), None)
		.await;
	assert!(fx.controller.snapshot().visible);
	let mut events = fx.controller.subscribe();

	let (top, mut replacement) = pair::<SurfaceDown, SurfaceUp>(Endpoint::Top, Endpoint::Surface(SurfaceKind::Suggestions));
	fx.controller.rebuild(top.sender(), || InitPayload {
		kind: SurfaceKind::Suggestions,
	});

	// The recreated document must load and signal readiness again.
	let snapshot = fx.controller.snapshot();
	assert_eq!(snapshot.phase, Phase::Closed);
	assert!(!snapshot.loaded && !snapshot.ready && !snapshot.visible);
	assert!(matches!(replacement.recv().await.unwrap().body, SurfaceDown::Init(_)));
	// The visible surface went down with its document; nothing to restore.
	assert_eq!(
		drain_events(&mut events),
		vec![SurfaceEvent::Closed {
			kind: SurfaceKind::Suggestions,
			discard: true,
			refocus: false,
		}]
	);
}

#[tokio::test]
async fn destroy_is_idempotent_and_detaches_everything() {
	let fx = fixture(SurfaceKind::Suggestions);
	make_ready(&fx.controller, SurfaceKind::Suggestions);
	fx.controller
		.open(SurfaceAction::SuggestLogin, Rect::new(0.0, 0.0, 10.0, 10.0), None)
		.await;
	let mut events = fx.controller.subscribe();

	fx.controller.destroy();
	fx.controller.destroy();

	let snapshot = fx.controller.snapshot();
	assert_eq!(snapshot.phase, Phase::Closed);
	assert!(!snapshot.loaded && !snapshot.ready && !snapshot.visible);
	assert_eq!(
		drain_events(&mut events)
			.iter()
			.filter(|event| matches!(event, SurfaceEvent::Closed { .. }))
			.count(),
		1
	);

	// A destroyed controller refuses further opens.
	fx.controller
		.open(SurfaceAction::SuggestLogin, Rect::new(0.0, 0.0, 10.0, 10.0), None)
		.await;
	assert!(!fx.controller.snapshot().visible);
}
