/// Script replay for the host application
///
/// A script is newline-delimited JSON. Each line is one of:
/// - a web-layer call: `{"method": "play", "args": {...}, "callId": "c1"}`
/// - a lifecycle signal: `{"lifecycle": "background"}`
/// - an OS media-session signal: `{"signal": {"type": "focusLost", "transient": true}}`
///
/// Blank lines and lines starting with `#` are skipped.
use mellow_bridge::{
    encode_error, encode_event, CodecError, MediaBridgeContext, MediaSessionSignal, RawCall,
    Subscription,
};
use serde::Deserialize;
use serde_json::json;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStep {
    Foreground,
    Background,
    Destroy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScriptStep {
    Call(RawCall),
    Lifecycle { lifecycle: LifecycleStep },
    Signal { signal: MediaSessionSignal },
}

/// Parse a whole script
pub fn parse_script(source: &str) -> Result<Vec<ScriptStep>, ScriptError> {
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|_| ScriptError::Parse {
                line: index + 1,
                reason: "expected a call, lifecycle or signal object".to_string(),
            })
        })
        .collect()
}

/// What happened while replaying
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScriptReport {
    pub calls: usize,
    pub failed_calls: usize,
    pub signals: usize,
    pub events: usize,
}

/// Replay `steps` against the context, writing one JSON line per call
/// result and per delivered event
///
/// The session is shut down at the end unless the script destroyed it.
pub async fn run_script(
    context: &MediaBridgeContext,
    steps: &[ScriptStep],
    out: &mut impl Write,
) -> Result<ScriptReport, ScriptError> {
    let mut events = context.adapter().subscribe();
    let mut report = ScriptReport::default();
    let mut destroyed = false;

    for step in steps {
        match step {
            ScriptStep::Call(call) => {
                report.calls += 1;
                let line = match context.call_raw(call.clone()).await {
                    Ok(state) => json!({ "method": call.method, "result": state }),
                    Err(err) => {
                        report.failed_calls += 1;
                        json!({ "method": call.method, "error": encode_error(&err) })
                    }
                };
                writeln!(out, "{}", serde_json::to_string(&line)?)?;
            }
            ScriptStep::Lifecycle { lifecycle } => match lifecycle {
                LifecycleStep::Foreground => context.lifecycle().on_foreground(),
                LifecycleStep::Background => context.lifecycle().on_background(),
                LifecycleStep::Destroy => {
                    context.shutdown().await;
                    destroyed = true;
                }
            },
            ScriptStep::Signal { signal } => {
                report.signals += 1;
                if let Err(err) = context.media_session().handle(*signal) {
                    let line = json!({ "signal": signal, "error": encode_error(&err) });
                    writeln!(out, "{}", serde_json::to_string(&line)?)?;
                }
            }
        }

        report.events += write_events(&mut events, out)?;
    }

    if !destroyed {
        context.shutdown().await;
    }
    report.events += write_events(&mut events, out)?;

    Ok(report)
}

fn write_events(events: &mut Subscription, out: &mut impl Write) -> Result<usize, ScriptError> {
    let mut written = 0;
    for event in events.drain() {
        let encoded = encode_event(&event)?;
        writeln!(out, "{}", serde_json::to_string(&json!({ "event": encoded }))?)?;
        written += 1;
    }
    Ok(written)
}
