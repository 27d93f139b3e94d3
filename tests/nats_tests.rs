use career_strategist::gateway::nats::{client_subject, server_subject, OPEN_SUBJECT};
use career_strategist::gateway::{ClientEvent, OpenRequest, RealtimeAudio, ServerEvent};
use career_strategist::GatewayError;

#[test]
fn test_subjects() {
    assert_eq!(OPEN_SUBJECT, "interview.open");
    assert_eq!(client_subject("abc"), "interview.abc.client");
    assert_eq!(server_subject("abc"), "interview.abc.server");
}

#[test]
fn test_open_request_serialization() {
    let request = OpenRequest {
        session_id: "abc".to_string(),
        model: "gemini-2.5-flash-native-audio-preview-12-2025".to_string(),
        voice: "Zephyr".to_string(),
        system_prompt: "You are a senior interviewer".to_string(),
        input_sample_rate: 16000,
        output_sample_rate: 24000,
        input_transcription: true,
        output_transcription: true,
    };

    let json = serde_json::to_string(&request).unwrap();
    assert!(json.contains("\"voice\":\"Zephyr\""));
    assert!(json.contains("\"input_sample_rate\":16000"));

    let deserialized: OpenRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, request);
}

#[test]
fn test_client_events_are_tagged() {
    let audio = ClientEvent::RealtimeAudio(RealtimeAudio {
        data: "AAA=".to_string(),
        mime_type: "audio/pcm;rate=16000".to_string(),
    });
    let json = serde_json::to_string(&audio).unwrap();
    assert!(json.contains("\"type\":\"realtime_audio\""));
    assert!(json.contains("\"mime_type\":\"audio/pcm;rate=16000\""));

    let close = serde_json::to_string(&ClientEvent::Close).unwrap();
    assert_eq!(close, r#"{"type":"close"}"#);
}

#[test]
fn test_server_events_from_bridge() {
    let events: Vec<ServerEvent> = [
        r#"{"type":"opened"}"#,
        r#"{"type":"output_transcript","text":"Hello"}"#,
        r#"{"type":"input_transcript","text":"Hi"}"#,
        r#"{"type":"turn_complete"}"#,
        r#"{"type":"audio","data":"AAAA","sample_rate":24000}"#,
        r#"{"type":"interrupted"}"#,
        r#"{"type":"error","code":403,"message":"forbidden"}"#,
        r#"{"type":"closed","reason":null}"#,
    ]
    .iter()
    .map(|raw| serde_json::from_str(raw).unwrap())
    .collect();

    assert_eq!(
        events,
        vec![
            ServerEvent::Opened,
            ServerEvent::OutputTranscript {
                text: "Hello".to_string()
            },
            ServerEvent::InputTranscript {
                text: "Hi".to_string()
            },
            ServerEvent::TurnComplete,
            ServerEvent::Audio {
                data: "AAAA".to_string(),
                sample_rate: 24000
            },
            ServerEvent::Interrupted,
            ServerEvent::Error(GatewayError::with_code(403, "forbidden")),
            ServerEvent::Closed { reason: None },
        ]
    );
}

#[test]
fn test_error_without_code() {
    let event: ServerEvent =
        serde_json::from_str(r#"{"type":"error","message":"Region not supported"}"#).unwrap();
    assert_eq!(
        event,
        ServerEvent::Error(GatewayError::new("Region not supported"))
    );
}
