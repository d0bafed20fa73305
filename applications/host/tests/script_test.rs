//! Script replay against a real bridge context

use mellow_bridge::{BridgeConfig, MediaBridgeContext};
use mellow_host::{parse_script, run_script};
use mellow_playback::simulated_native;
use serde_json::Value;
use std::io::Write;

const SCRIPT: &str = r#"
{"method": "play", "callId": "c1", "args": {"track": {"id": "t1", "title": "Dawn", "artist": ["Ann", "Bob"], "sourceUri": "file:///t1.mp3#duration=60000"}}}
{"lifecycle": "background"}
{"method": "pause"}
{"method": "seekTo", "args": {"positionMs": 4000}}
{"lifecycle": "foreground"}
{"signal": {"type": "play"}}
{"method": "shuffle"}
{"lifecycle": "destroy"}
{"method": "play"}
"#;

fn lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn replays_calls_lifecycle_and_signals() {
    let steps = parse_script(SCRIPT).unwrap();
    let (native, probe) = simulated_native();
    let context = MediaBridgeContext::start(BridgeConfig::default(), native).unwrap();

    let mut output = Vec::new();
    let report = run_script(&context, &steps, &mut output).await.unwrap();

    assert_eq!(report.calls, 5);
    assert_eq!(report.failed_calls, 2, "unknown method and call after destroy");
    assert_eq!(report.signals, 1);
    assert!(probe.all_released());

    let lines = lines(&output);
    let first = &lines[0];
    assert_eq!(first["method"], "play");
    assert_eq!(first["result"]["queue"][0]["artist"], "Ann, Bob");

    // Background coalesces pause + seek into one state change
    let after_foreground: Vec<_> = lines
        .iter()
        .skip_while(|line| line["method"] != "seekTo")
        .skip(1)
        .take_while(|line| line.get("event").is_some())
        .collect();
    assert_eq!(after_foreground.len(), 1);
    assert_eq!(after_foreground[0]["event"]["state"]["positionMs"], 4000);
    assert_eq!(after_foreground[0]["event"]["state"]["status"], "paused");

    let unsupported = lines
        .iter()
        .find(|line| line["method"] == "shuffle")
        .unwrap();
    assert_eq!(unsupported["error"]["kind"], "unsupportedCommand");

    let last = lines
        .iter()
        .rev()
        .find(|line| line.get("method").is_some())
        .unwrap();
    assert_eq!(last["error"]["kind"], "sessionDestroyed");
}

const ANDROID_SCRIPT: &str = r#"
{"method": "startService", "callId": "s1", "args": {"title": "Dawn", "artist": ["Ann", "Bob"], "cover": ""}}
{"method": "updatePosition", "args": {"position": 1.5}}
{"method": "startService", "callId": "s2", "args": {"title": "Dawn", "artist": ["Ann", "Bob"], "cover": ""}}
{"method": "stopService", "callId": "s3"}
"#;

#[tokio::test]
async fn replays_android_plugin_calls() {
    let steps = parse_script(ANDROID_SCRIPT).unwrap();
    let (native, _probe) = simulated_native();
    let context = MediaBridgeContext::start(BridgeConfig::default(), native).unwrap();

    let mut output = Vec::new();
    let report = run_script(&context, &steps, &mut output).await.unwrap();
    assert_eq!(report.failed_calls, 0);

    let lines = lines(&output);
    let results: Vec<&Value> = lines
        .iter()
        .filter(|line| line.get("method").is_some())
        .map(|line| &line["result"])
        .collect();

    assert_eq!(results[0]["status"], "playing");
    assert_eq!(results[0]["currentTrackId"], "Dawn|Ann, Bob|");
    assert_eq!(results[1]["positionMs"], 1500);
    assert_eq!(results[2]["positionMs"], 1500, "repeated start leaves playback alone");
    assert_eq!(results[3]["status"], "stopped");

    let acks: Vec<&str> = lines
        .iter()
        .filter(|line| line["event"]["type"] == "commandAck")
        .filter_map(|line| line["event"]["correlationId"].as_str())
        .collect();
    assert_eq!(acks, vec!["s1", "s3"], "repeated start never reaches the session");
}

#[tokio::test]
async fn config_file_changes_plugin_id() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "plugin_id = \"MellowPlayer\"\ninitial_volume = 30").unwrap();

    let config = BridgeConfig::load(Some(file.path())).unwrap();
    let (native, _probe) = simulated_native();
    let context = MediaBridgeContext::start(config, native).unwrap();

    assert_eq!(context.bridge().plugin_ids(), vec!["MellowPlayer".to_string()]);

    let steps = parse_script(
        r#"{"method": "play", "args": {"track": {"id": "a", "sourceUri": "file:///a.mp3"}}}"#,
    )
    .unwrap();
    let mut output = Vec::new();
    run_script(&context, &steps, &mut output).await.unwrap();

    let lines = lines(&output);
    assert_eq!(lines[0]["result"]["volume"], 30);
}
