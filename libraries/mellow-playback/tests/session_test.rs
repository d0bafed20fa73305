//! Integration tests for the playback session
//!
//! Drives the session through the simulated native stack and checks the
//! resulting state, the emitted events and what the native side holds.

use mellow_core::{ErrorKind, MediaError, PlaybackStatus, TrackRef};
use mellow_playback::{
    simulated_native, BridgeEvent, PlaybackCommand, Published, RecordingSink, Session,
    SessionConfig, SimulatedProbe, TrackSelector,
};
use std::sync::Arc;

// ===== Test Helpers =====

fn track(id: &str) -> TrackRef {
    TrackRef::new(id, format!("file:///music/{id}.mp3#duration=60000"))
        .with_title(format!("Track {id}"))
        .with_artist("Test Artist")
}

fn session() -> (Session, Arc<RecordingSink>, Arc<SimulatedProbe>) {
    let (native, probe) = simulated_native();
    let sink = Arc::new(RecordingSink::new());
    let session = Session::new(native, sink.clone(), SessionConfig::default());
    (session, sink, probe)
}

async fn playing_queue(ids: &[&str]) -> (Session, Arc<RecordingSink>, Arc<SimulatedProbe>) {
    let (mut session, sink, probe) = session();
    session
        .execute(&PlaybackCommand::play_track(track(ids[0])))
        .await
        .unwrap();
    session
        .execute(&PlaybackCommand::SetQueue {
            tracks: ids.iter().map(|id| track(id)).collect(),
        })
        .await
        .unwrap();
    sink.drain();
    (session, sink, probe)
}

fn state_changes(events: &[BridgeEvent]) -> Vec<PlaybackStatus> {
    events
        .iter()
        .filter_map(|event| match event {
            BridgeEvent::StateChanged { state } => Some(state.status),
            _ => None,
        })
        .collect()
}

// ===== Scenarios =====

#[tokio::test]
async fn play_pause_seek_play_resumes_at_seek_position() {
    let (mut session, _sink, _probe) = session();

    session
        .execute(&PlaybackCommand::play_track(track("T1")))
        .await
        .unwrap();
    session.execute(&PlaybackCommand::Pause).await.unwrap();
    session.execute(&PlaybackCommand::seek(5000)).await.unwrap();
    let state = session.execute(&PlaybackCommand::play()).await.unwrap();

    assert_eq!(state.status, PlaybackStatus::Playing);
    assert_eq!(state.position_ms, 5000);
    assert_eq!(state.current_track_id.as_deref(), Some("T1"));
}

#[tokio::test]
async fn seek_beyond_duration_clamps() {
    let (mut session, _sink, _probe) = session();
    session
        .execute(&PlaybackCommand::play_track(track("T1")))
        .await
        .unwrap();

    let state = session
        .execute(&PlaybackCommand::seek(999_999))
        .await
        .unwrap();

    assert_eq!(state.duration_ms, Some(60_000));
    assert_eq!(state.position_ms, 60_000);
    assert_eq!(state.status, PlaybackStatus::Playing);
}

// ===== State machine =====

#[tokio::test]
async fn play_emits_loading_then_playing() {
    let (mut session, sink, probe) = session();

    session
        .execute(&PlaybackCommand::play_track(track("T1")))
        .await
        .unwrap();

    assert_eq!(
        state_changes(&sink.drain()),
        vec![PlaybackStatus::Loading, PlaybackStatus::Playing]
    );
    assert!(probe.focus_held());
    assert_eq!(probe.allocations(), 1);
}

#[tokio::test]
async fn pause_while_paused_emits_nothing() {
    let (mut session, sink, _probe) = playing_queue(&["a"]).await;

    let first = session.execute(&PlaybackCommand::Pause).await.unwrap();
    assert_eq!(state_changes(&sink.drain()), vec![PlaybackStatus::Paused]);

    let second = session.execute(&PlaybackCommand::Pause).await.unwrap();
    assert_eq!(first, second);
    assert!(sink.drain().is_empty());
}

#[tokio::test]
async fn unreachable_source_moves_to_error_and_broadcasts() {
    let (mut session, sink, probe) = session();

    let err = session
        .execute(&PlaybackCommand::play_track(TrackRef::new(
            "bad",
            "unreachable://nowhere",
        )))
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::Playback(_)));
    assert_eq!(session.status(), PlaybackStatus::Error);
    assert!(!probe.focus_held());

    let events = sink.drain();
    let error_pos = events
        .iter()
        .position(|e| matches!(e, BridgeEvent::Error { kind: ErrorKind::PlaybackError, .. }))
        .expect("error event");
    let last = events.last().unwrap();
    assert!(matches!(
        last,
        BridgeEvent::StateChanged { state } if state.status == PlaybackStatus::Error
    ));
    assert!(error_pos < events.len() - 1, "error precedes the state change");
}

#[tokio::test]
async fn play_after_error_retries() {
    let (mut session, _sink, _probe) = playing_queue(&["a", "b"]).await;

    // Unknown id faults the session
    let err = session
        .execute(&PlaybackCommand::Play {
            track: Some(TrackSelector::Id("missing".into())),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::InvalidState(_)));
    assert_eq!(session.status(), PlaybackStatus::Error);

    let state = session.execute(&PlaybackCommand::play()).await.unwrap();
    assert_eq!(state.status, PlaybackStatus::Playing);
    assert_eq!(state.current_track_id.as_deref(), Some("a"));
}

#[tokio::test]
async fn denied_focus_is_a_playback_error() {
    let (mut session, _sink, probe) = session();
    probe.deny_focus(true);

    let err = session
        .execute(&PlaybackCommand::play_track(track("T1")))
        .await
        .unwrap_err();

    assert_eq!(err, MediaError::playback("audio focus denied"));
    assert_eq!(session.status(), PlaybackStatus::Error);
}

#[tokio::test]
async fn stop_releases_focus_and_keeps_track() {
    let (mut session, _sink, probe) = playing_queue(&["a", "b"]).await;

    let state = session.execute(&PlaybackCommand::Stop).await.unwrap();

    assert_eq!(state.status, PlaybackStatus::Stopped);
    assert_eq!(state.position_ms, 0);
    assert_eq!(state.current_track_id.as_deref(), Some("a"));
    assert!(!probe.focus_held());
    assert_eq!(probe.allocations(), 0);

    // Stop is idempotent, seek is not allowed
    session.execute(&PlaybackCommand::Stop).await.unwrap();
    let err = session
        .execute(&PlaybackCommand::seek(1000))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::InvalidState(_)));
}

// ===== Queue navigation =====

#[tokio::test]
async fn skip_next_clamps_at_queue_end() {
    let (mut session, sink, _probe) = playing_queue(&["a", "b"]).await;

    let state = session.execute(&PlaybackCommand::SkipNext).await.unwrap();
    assert_eq!(state.current_track_id.as_deref(), Some("b"));
    assert_eq!(state.status, PlaybackStatus::Playing);
    sink.drain();

    let state = session.execute(&PlaybackCommand::SkipNext).await.unwrap();
    assert_eq!(state.current_track_id.as_deref(), Some("b"));
    assert!(sink.drain().is_empty(), "boundary skip is a no-op");
}

#[tokio::test]
async fn skip_while_paused_stays_paused() {
    let (mut session, _sink, _probe) = playing_queue(&["a", "b"]).await;
    session.execute(&PlaybackCommand::Pause).await.unwrap();

    let state = session.execute(&PlaybackCommand::SkipNext).await.unwrap();

    assert_eq!(state.status, PlaybackStatus::Paused);
    assert_eq!(state.current_track_id.as_deref(), Some("b"));
}

#[tokio::test]
async fn skip_while_stopped_selects_without_loading() {
    let (mut session, _sink, probe) = playing_queue(&["a", "b"]).await;
    session.execute(&PlaybackCommand::Stop).await.unwrap();

    let state = session.execute(&PlaybackCommand::SkipNext).await.unwrap();

    assert_eq!(state.status, PlaybackStatus::Stopped);
    assert_eq!(state.current_track_id.as_deref(), Some("b"));
    assert_eq!(probe.allocations(), 0);
}

#[tokio::test]
async fn skip_previous_restarts_past_threshold() {
    let (mut session, _sink, _probe) = playing_queue(&["a", "b"]).await;
    session.execute(&PlaybackCommand::SkipNext).await.unwrap();
    session.execute(&PlaybackCommand::seek(10_000)).await.unwrap();

    let state = session
        .execute(&PlaybackCommand::SkipPrevious)
        .await
        .unwrap();
    assert_eq!(state.current_track_id.as_deref(), Some("b"));
    assert_eq!(state.position_ms, 0);

    let state = session
        .execute(&PlaybackCommand::SkipPrevious)
        .await
        .unwrap();
    assert_eq!(state.current_track_id.as_deref(), Some("a"));
}

#[tokio::test]
async fn set_queue_can_detach_current_track() {
    let (mut session, _sink, _probe) = playing_queue(&["a", "b"]).await;

    let state = session
        .execute(&PlaybackCommand::SetQueue {
            tracks: vec![track("x"), track("y")],
        })
        .await
        .unwrap();

    assert_eq!(state.status, PlaybackStatus::Playing);
    assert_eq!(state.current_track_id.as_deref(), Some("a"));
    assert!(state.current_track().is_none());

    let state = session.execute(&PlaybackCommand::SkipNext).await.unwrap();
    assert_eq!(state.current_track_id.as_deref(), Some("x"));
}

#[tokio::test]
async fn play_track_appends_once() {
    let (mut session, _sink, _probe) = playing_queue(&["a", "b"]).await;

    session
        .execute(&PlaybackCommand::play_track(track("c")))
        .await
        .unwrap();
    let state = session
        .execute(&PlaybackCommand::play_track(track("c")))
        .await
        .unwrap();

    let ids: Vec<_> = state.queue.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(state.current_track_id.as_deref(), Some("c"));
}

#[tokio::test]
async fn set_volume_clamps_and_applies() {
    let (mut session, _sink, probe) = playing_queue(&["a"]).await;

    let state = session
        .execute(&PlaybackCommand::SetVolume { level: 250 })
        .await
        .unwrap();

    assert_eq!(state.volume, 100);
    assert_eq!(probe.volume(), Some(100));
}

// ===== Surface publishing =====

#[tokio::test]
async fn seek_publishes_position_only() {
    let (mut session, _sink, probe) = playing_queue(&["a"]).await;
    let before = probe.published().len();

    session.execute(&PlaybackCommand::seek(7000)).await.unwrap();

    let published = probe.published();
    assert_eq!(published.len(), before + 1);
    assert_eq!(
        published.last(),
        Some(&Published::Position {
            position_ms: 7000,
            is_playing: true
        })
    );
}

#[tokio::test]
async fn identical_metadata_is_not_republished() {
    let (mut session, _sink, probe) = playing_queue(&["a"]).await;
    let before = probe.published().len();

    session.execute(&PlaybackCommand::play()).await.unwrap();
    session.execute(&PlaybackCommand::play()).await.unwrap();

    assert_eq!(probe.published().len(), before);
}

#[tokio::test]
async fn untitled_track_shows_default_title() {
    let (mut session, _sink, probe) = session();
    session
        .execute(&PlaybackCommand::play_track(TrackRef::new("t", "file:///t.mp3")))
        .await
        .unwrap();

    let title = probe.published().into_iter().rev().find_map(|p| match p {
        Published::Metadata(now) => Some(now.title),
        Published::Position { .. } => None,
    });
    assert_eq!(title.as_deref(), Some(mellow_core::DEFAULT_TITLE));
}

// ===== Teardown =====

#[tokio::test]
async fn release_frees_everything_and_rejects_commands() {
    let (mut session, _sink, probe) = playing_queue(&["a"]).await;

    session.release().await;
    session.release().await;

    assert!(probe.all_released());
    assert!(session.is_released());
    assert_eq!(
        session.execute(&PlaybackCommand::play()).await.unwrap_err(),
        MediaError::SessionDestroyed
    );
}
