//! Command codec
//!
//! Translates web-layer calls (method name plus JSON arguments) into typed
//! [`PlaybackCommand`]s and native states/events back into JSON. Stateless
//! apart from the alias table fixed at construction; safe to share.

use crate::config::BridgeConfig;
use mellow_core::{CorrelationId, MediaError, PlaybackState, TrackRef};
use mellow_playback::{BridgeEvent, CommandEnvelope, CommandTag, PlaybackCommand, TrackSelector};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Codec failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unsupported command: {0}")]
    Unsupported(String),

    #[error("Malformed arguments for {method}: {reason}")]
    Malformed { method: String, reason: String },

    #[error("Invalid payload: {0}")]
    Payload(String),
}

impl CodecError {
    fn malformed(tag: CommandTag, reason: impl Into<String>) -> Self {
        Self::Malformed {
            method: tag.as_str().to_string(),
            reason: reason.into(),
        }
    }
}

impl From<CodecError> for MediaError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Unsupported(method) => MediaError::UnsupportedCommand(method),
            CodecError::Malformed { method, reason } => MediaError::Decode { method, reason },
            CodecError::Payload(reason) => MediaError::decode("payload", reason),
        }
    }
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// One inbound call from the web layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCall {
    pub method: String,

    /// Caller-chosen id echoed in `commandAck`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    #[serde(default)]
    pub args: Value,
}

impl RawCall {
    pub fn new(method: impl Into<String>, args: Value) -> Self {
        Self {
            method: method.into(),
            call_id: None,
            args,
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandCodec {
    /// Lowercased alias -> tag
    aliases: HashMap<String, CommandTag>,
}

impl CommandCodec {
    /// Codec with only the built-in method names
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec with the configured aliases
    ///
    /// Aliases are matched case-insensitively; built-in names are exact.
    pub fn from_config(config: &BridgeConfig) -> mellow_core::Result<Self> {
        config.validate()?;

        let mut codec = Self::new();
        for (alias, target) in &config.aliases {
            let tag = target.parse::<CommandTag>().map_err(|target| {
                MediaError::configuration(format!(
                    "alias {alias} points at unknown command {target}"
                ))
            })?;
            codec.aliases.insert(alias.to_ascii_lowercase(), tag);
        }
        Ok(codec)
    }

    /// Map a method name to its command tag
    pub fn resolve(&self, method: &str) -> CodecResult<CommandTag> {
        if let Ok(tag) = method.parse::<CommandTag>() {
            return Ok(tag);
        }

        self.aliases
            .get(&method.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| CodecError::Unsupported(method.to_string()))
    }

    /// Every invokable method name, built-ins first
    pub fn methods(&self) -> Vec<String> {
        let mut aliases: Vec<_> = self.aliases.keys().cloned().collect();
        aliases.sort();

        CommandTag::ALL
            .iter()
            .map(|tag| tag.as_str().to_string())
            .chain(aliases)
            .collect()
    }

    /// Decode a call into a command
    pub fn decode(&self, call: &RawCall) -> CodecResult<PlaybackCommand> {
        let tag = self.resolve(&call.method)?;
        decode_args(tag, &call.args)
    }

    /// Decode a call and wrap it with its correlation id
    ///
    /// Calls without a `callId` get a generated one.
    pub fn decode_envelope(&self, call: &RawCall) -> CodecResult<CommandEnvelope> {
        let command = self.decode(call)?;
        let correlation_id = call
            .call_id
            .clone()
            .map_or_else(CorrelationId::generate, CorrelationId::new);
        Ok(CommandEnvelope::web(correlation_id, command))
    }
}

fn decode_args(tag: CommandTag, args: &Value) -> CodecResult<PlaybackCommand> {
    let empty = Map::new();
    let args = match args {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(CodecError::malformed(
                tag,
                format!("arguments must be an object, got {}", type_name(other)),
            ))
        }
    };

    match tag {
        CommandTag::Play => decode_play(args),
        CommandTag::Pause => Ok(PlaybackCommand::Pause),
        CommandTag::Stop => Ok(PlaybackCommand::Stop),
        CommandTag::Seek => decode_seek(args).map(PlaybackCommand::seek),
        CommandTag::SetQueue => decode_queue(args),
        CommandTag::SkipNext => Ok(PlaybackCommand::SkipNext),
        CommandTag::SkipPrevious => Ok(PlaybackCommand::SkipPrevious),
        CommandTag::SetVolume => decode_volume(args),
    }
}

/// Track fields a `play` call may carry at the top level of its arguments
const INLINE_TRACK_FIELDS: [&str; 6] =
    ["id", "sourceUri", "title", "artist", "cover", "artworkUri"];

fn decode_play(args: &Map<String, Value>) -> CodecResult<PlaybackCommand> {
    if let Some(track) = args.get("track").filter(|v| !v.is_null()) {
        let track = decode_track(track).map_err(|reason| {
            CodecError::malformed(CommandTag::Play, format!("track: {reason}"))
        })?;
        return Ok(PlaybackCommand::play_track(track));
    }

    match args.get("trackId") {
        Some(Value::String(id)) if !id.is_empty() => Ok(PlaybackCommand::Play {
            track: Some(TrackSelector::Id(id.clone())),
        }),
        Some(value) if !value.is_null() => Err(CodecError::malformed(
            CommandTag::Play,
            "trackId must be a non-empty string",
        )),
        _ if has_inline_track(args) => decode_inline_track(args)
            .map(PlaybackCommand::play_track)
            .map_err(|reason| CodecError::malformed(CommandTag::Play, reason)),
        _ => Ok(PlaybackCommand::play()),
    }
}

fn has_inline_track(args: &Map<String, Value>) -> bool {
    INLINE_TRACK_FIELDS
        .iter()
        .any(|key| args.get(*key).is_some_and(|value| !value.is_null()))
}

/// Decode the flat `{title, artist, cover}` shape
///
/// Without an `id` the track is keyed by `title|artist|cover`; without a
/// `sourceUri` the engine gets an empty source and only the now-playing
/// metadata is meaningful.
fn decode_inline_track(map: &Map<String, Value>) -> Result<TrackRef, String> {
    let title = optional_string(map, "title")?.unwrap_or_default();
    let artist = decode_artist(map)?;
    let artwork_uri = decode_artwork(map)?;

    let id = match optional_string(map, "id")? {
        Some(id) if !id.is_empty() => id,
        _ => format!(
            "{title}|{artist}|{}",
            artwork_uri.as_deref().unwrap_or_default()
        ),
    };

    Ok(TrackRef {
        id,
        title,
        artist,
        artwork_uri,
        source_uri: optional_string(map, "sourceUri")?.unwrap_or_default(),
    })
}

/// `position` (seconds, may be fractional) wins when it is a usable number;
/// `positionMs` (integer ms) is the fallback
fn decode_seek(args: &Map<String, Value>) -> CodecResult<u64> {
    let seconds = args.get("position").filter(|v| !v.is_null());

    if let Some(seconds) = seconds.and_then(Value::as_f64) {
        if seconds.is_finite() && seconds >= 0.0 {
            return Ok((seconds * 1000.0).round() as u64);
        }
    }

    if let Some(value) = args.get("positionMs") {
        return value.as_u64().ok_or_else(|| {
            CodecError::malformed(CommandTag::Seek, "positionMs must be a non-negative integer")
        });
    }

    match seconds {
        Some(_) => Err(CodecError::malformed(
            CommandTag::Seek,
            "position must be a non-negative number of seconds",
        )),
        None => Err(CodecError::malformed(CommandTag::Seek, "positionMs is required")),
    }
}

fn decode_queue(args: &Map<String, Value>) -> CodecResult<PlaybackCommand> {
    let Some(Value::Array(items)) = args.get("tracks") else {
        return Err(CodecError::malformed(
            CommandTag::SetQueue,
            "tracks must be an array",
        ));
    };

    let mut tracks = Vec::with_capacity(items.len());
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let track = decode_track(item).map_err(|reason| {
            CodecError::malformed(CommandTag::SetQueue, format!("tracks[{index}]: {reason}"))
        })?;

        if !seen.insert(track.id.clone()) {
            return Err(CodecError::malformed(
                CommandTag::SetQueue,
                format!("duplicate track id {}", track.id),
            ));
        }
        tracks.push(track);
    }

    Ok(PlaybackCommand::SetQueue { tracks })
}

fn decode_volume(args: &Map<String, Value>) -> CodecResult<PlaybackCommand> {
    let level = args
        .get("level")
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            CodecError::malformed(CommandTag::SetVolume, "level must be a non-negative integer")
        })?;

    Ok(PlaybackCommand::SetVolume {
        level: level.min(100) as u8,
    })
}

/// Decode a track object
///
/// `artist` may be a string or an array of strings (joined with ", ");
/// `cover` is accepted for `artworkUri`.
fn decode_track(value: &Value) -> Result<TrackRef, String> {
    let Value::Object(map) = value else {
        return Err(format!("expected an object, got {}", type_name(value)));
    };

    Ok(TrackRef {
        id: required_string(map, "id")?,
        title: optional_string(map, "title")?.unwrap_or_default(),
        artist: decode_artist(map)?,
        artwork_uri: decode_artwork(map)?,
        source_uri: required_string(map, "sourceUri")?,
    })
}

fn decode_artist(map: &Map<String, Value>) -> Result<String, String> {
    match map.get("artist") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(artist)) => Ok(artist.clone()),
        Some(Value::Array(names)) => Ok(names
            .iter()
            .map(|name| {
                name.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| "artist entries must be strings".to_string())
            })
            .collect::<Result<Vec<_>, _>>()?
            .join(", ")),
        Some(other) => Err(format!(
            "artist must be a string or an array, got {}",
            type_name(other)
        )),
    }
}

/// An empty cover means none
fn decode_artwork(map: &Map<String, Value>) -> Result<Option<String>, String> {
    let artwork = match optional_string(map, "artworkUri")? {
        Some(uri) => Some(uri),
        None => optional_string(map, "cover")?,
    };
    Ok(artwork.filter(|uri| !uri.is_empty()))
}

fn required_string(map: &Map<String, Value>, key: &str) -> Result<String, String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(format!("{key} must not be empty")),
        None | Some(Value::Null) => Err(format!("{key} is required")),
        Some(other) => Err(format!("{key} must be a string, got {}", type_name(other))),
    }
}

fn optional_string(map: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!("{key} must be a string, got {}", type_name(other))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ===== Outbound =====

pub fn encode_state(state: &PlaybackState) -> CodecResult<Value> {
    serde_json::to_value(state).map_err(|e| CodecError::Payload(e.to_string()))
}

pub fn decode_state(value: &Value) -> CodecResult<PlaybackState> {
    PlaybackState::deserialize(value).map_err(|e| CodecError::Payload(e.to_string()))
}

pub fn encode_event(event: &BridgeEvent) -> CodecResult<Value> {
    serde_json::to_value(event).map_err(|e| CodecError::Payload(e.to_string()))
}

pub fn decode_event(value: &Value) -> CodecResult<BridgeEvent> {
    BridgeEvent::deserialize(value).map_err(|e| CodecError::Payload(e.to_string()))
}

/// Rejection payload handed back to the web layer for a failed call
pub fn encode_error(err: &MediaError) -> Value {
    serde_json::json!({
        "kind": err.kind(),
        "message": err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codec() -> CommandCodec {
        CommandCodec::from_config(&BridgeConfig::default()).unwrap()
    }

    fn decode(method: &str, args: Value) -> CodecResult<PlaybackCommand> {
        codec().decode(&RawCall::new(method, args))
    }

    #[test]
    fn unknown_method_is_unsupported() {
        assert_eq!(
            decode("shuffle", Value::Null),
            Err(CodecError::Unsupported("shuffle".into()))
        );
    }

    #[test]
    fn aliases_resolve_case_insensitively() {
        let codec = codec();
        assert_eq!(codec.resolve("next"), Ok(CommandTag::SkipNext));
        assert_eq!(codec.resolve("seekTo"), Ok(CommandTag::Seek));
        assert_eq!(codec.resolve("SEEKTO"), Ok(CommandTag::Seek));
        assert!(codec.resolve("Play").is_err(), "built-in names are exact");
    }

    #[test]
    fn methods_lists_builtins_then_aliases() {
        let methods = CommandCodec::new().methods();
        assert_eq!(methods.len(), CommandTag::ALL.len());
        assert!(codec().methods().contains(&"prev".to_string()));
    }

    #[test]
    fn seek_requires_non_negative_integer() {
        assert_eq!(
            decode("seek", json!({ "positionMs": 5000 })),
            Ok(PlaybackCommand::seek(5000))
        );

        let bad_values = [
            json!({ "positionMs": -1 }),
            json!({ "positionMs": "5000" }),
            json!({ "positionMs": 1.5 }),
        ];
        for bad in bad_values {
            let err = decode("seek", bad).unwrap_err();
            assert!(matches!(err, CodecError::Malformed { ref method, .. } if method == "seek"));
        }

        assert!(decode("seek", json!({})).is_err());
    }

    #[test]
    fn seek_accepts_seconds() {
        assert_eq!(
            decode("seek", json!({ "position": 12.5 })),
            Ok(PlaybackCommand::seek(12_500))
        );
        assert!(decode("seek", json!({ "position": -3.0 })).is_err());
    }

    #[test]
    fn seconds_win_over_milliseconds() {
        assert_eq!(
            decode("updatePosition", json!({ "position": 2.0, "positionMs": 9000 })),
            Ok(PlaybackCommand::seek(2000))
        );
        // An unusable seconds value falls back to milliseconds
        assert_eq!(
            decode("updatePosition", json!({ "position": -1.0, "positionMs": 9000 })),
            Ok(PlaybackCommand::seek(9000))
        );
    }

    #[test]
    fn android_plugin_method_names_resolve() {
        let codec = codec();
        assert_eq!(codec.resolve("startService"), Ok(CommandTag::Play));
        assert_eq!(codec.resolve("stopService"), Ok(CommandTag::Stop));
        assert_eq!(codec.resolve("updatePosition"), Ok(CommandTag::Seek));
        assert_eq!(decode("stopService", Value::Null), Ok(PlaybackCommand::Stop));
    }

    #[test]
    fn flat_track_fields_start_playback() {
        let command = decode(
            "startService",
            json!({ "title": "Dawn", "artist": ["Ann", "Bob"], "cover": "" }),
        )
        .unwrap();

        let PlaybackCommand::Play {
            track: Some(TrackSelector::Track(track)),
        } = command
        else {
            panic!("expected a track selector");
        };
        assert_eq!(track.id, "Dawn|Ann, Bob|");
        assert_eq!(track.title, "Dawn");
        assert_eq!(track.artist, "Ann, Bob");
        assert_eq!(track.artwork_uri, None);
        assert_eq!(track.source_uri, "");

        let command = decode(
            "play",
            json!({ "id": "t1", "sourceUri": "file:///t1.mp3", "cover": "https://img/t1.jpg" }),
        )
        .unwrap();
        let PlaybackCommand::Play {
            track: Some(TrackSelector::Track(track)),
        } = command
        else {
            panic!("expected a track selector");
        };
        assert_eq!(track.id, "t1");
        assert_eq!(track.artwork_uri.as_deref(), Some("https://img/t1.jpg"));

        let err = decode("startService", json!({ "title": 7 })).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { ref method, .. } if method == "play"));
    }

    #[test]
    fn artist_array_is_joined() {
        let command = decode(
            "play",
            json!({ "track": {
                "id": "t1",
                "sourceUri": "file:///t1.mp3",
                "artist": ["Ann", "Bob"],
                "cover": "https://img.example.com/t1.jpg"
            }}),
        )
        .unwrap();

        let PlaybackCommand::Play { track: Some(TrackSelector::Track(track)) } = command else {
            panic!("expected a track selector");
        };
        assert_eq!(track.artist, "Ann, Bob");
        assert_eq!(track.artwork_uri.as_deref(), Some("https://img.example.com/t1.jpg"));
    }

    #[test]
    fn play_accepts_track_id() {
        assert_eq!(
            decode("resume", json!({ "trackId": "t9" })),
            Ok(PlaybackCommand::Play {
                track: Some(TrackSelector::Id("t9".into()))
            })
        );
        assert_eq!(decode("play", Value::Null), Ok(PlaybackCommand::play()));
    }

    #[test]
    fn set_queue_rejects_duplicates_and_missing_fields() {
        let dup = decode(
            "setQueue",
            json!({ "tracks": [
                { "id": "a", "sourceUri": "file:///a" },
                { "id": "a", "sourceUri": "file:///a2" }
            ]}),
        );
        assert!(matches!(
            dup,
            Err(CodecError::Malformed { ref reason, .. }) if reason.contains("duplicate")
        ));

        let missing = decode("setQueue", json!({ "tracks": [{ "id": "a" }] }));
        assert!(matches!(
            missing,
            Err(CodecError::Malformed { ref reason, .. }) if reason.contains("sourceUri")
        ));
    }

    #[test]
    fn volume_is_clamped() {
        assert_eq!(
            decode("setVolume", json!({ "level": 300 })),
            Ok(PlaybackCommand::SetVolume { level: 100 })
        );
        assert!(decode("setVolume", json!({ "level": -5 })).is_err());
    }

    #[test]
    fn non_object_arguments_are_malformed() {
        assert!(matches!(
            decode("pause", json!([1, 2])),
            Err(CodecError::Malformed { .. })
        ));
    }

    #[test]
    fn envelope_uses_call_id() {
        let envelope = codec()
            .decode_envelope(&RawCall::new("pause", Value::Null).with_call_id("c-1"))
            .unwrap();
        assert_eq!(envelope.correlation_id.as_str(), "c-1");
    }

    #[test]
    fn codec_errors_map_to_taxonomy() {
        let err: MediaError = CodecError::Unsupported("x".into()).into();
        assert_eq!(err.kind(), mellow_core::ErrorKind::UnsupportedCommand);

        let err: MediaError = CodecError::malformed(CommandTag::Seek, "bad").into();
        assert_eq!(err, MediaError::decode("seek", "bad"));
    }

    #[test]
    fn error_payload_carries_kind() {
        let payload = encode_error(&MediaError::SessionDestroyed);
        assert_eq!(payload["kind"], "sessionDestroyed");
        assert_eq!(payload["message"], "Session destroyed");
    }
}
