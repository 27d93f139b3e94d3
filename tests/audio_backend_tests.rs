// Unit tests for audio backend abstractions
//
// These tests verify the core audio types and the PCM transport format.

use career_strategist::audio::{
    pcm, AudioBackendConfig, AudioBackendFactory, AudioDevices, AudioFrame, AudioSink, AudioSource,
    DeviceSet,
};
use base64::Engine;
use tokio::sync::mpsc;

#[test]
fn test_audio_frame_creation() {
    let frame = AudioFrame {
        samples: vec![0.1, -0.2, 0.3],
        sample_rate: 16000,
        timestamp_ms: 1000,
    };

    assert_eq!(frame.samples.len(), 3);
    assert_eq!(frame.sample_rate, 16000);
    assert_eq!(frame.timestamp_ms, 1000);
}

#[test]
fn test_audio_backend_config_custom() {
    let config = AudioBackendConfig {
        target_sample_rate: 24000,
        block_size: 1024,
        realtime: false,
    };

    assert_eq!(config.target_sample_rate, 24000);
    assert_eq!(config.block_size, 1024);
    assert!(!config.realtime);
}

#[test]
fn test_outbound_frame_encoding() {
    // Full scale positive is clamped instead of wrapping
    let samples = [0.0, 1.0, -1.0, 0.5];
    let pcm16 = pcm::float_to_pcm16(&samples);
    assert_eq!(pcm16, vec![0, 32767, -32768, 16384]);

    let data = pcm::encode_frame(&samples);
    let decoded = pcm::decode_frame(&data).unwrap();
    assert_eq!(decoded.len(), 4);
    assert!((decoded[3] - 0.5).abs() < 1e-4);

    assert_eq!(pcm::mime_type(16000), "audio/pcm;rate=16000");
}

#[test]
fn test_inbound_chunk_duration() {
    // 24kHz mono, 2 bytes per sample
    let bytes = vec![0u8; 48000];
    let data = base64::engine::general_purpose::STANDARD.encode(&bytes);

    let samples = pcm::decode_frame(&data).unwrap();
    assert_eq!(samples.len(), 24000);
    assert!((pcm::duration_secs(samples.len(), pcm::OUTPUT_SAMPLE_RATE) - 1.0).abs() < 1e-9);
}

#[test]
fn test_odd_length_chunk_rejected() {
    let data = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]);
    assert!(pcm::decode_frame(&data).is_err());
}

#[cfg(not(feature = "cpal"))]
#[test]
fn test_microphone_without_cpal_is_device_error() {
    let result = AudioBackendFactory::create(AudioSource::Microphone, AudioBackendConfig::default());
    assert!(matches!(result, Err(career_strategist::LiveError::Device(_))));
}

#[tokio::test]
async fn test_device_set_null_output() {
    let devices = DeviceSet {
        source: AudioSource::File("missing.wav".to_string()),
        sink: AudioSink::Null,
        capture: AudioBackendConfig::default(),
        output_sample_rate: pcm::OUTPUT_SAMPLE_RATE,
    };

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut output = devices.open_output(tx).unwrap();
    assert_eq!(output.name(), "null");
    output.close().unwrap();

    assert!(devices.open_microphone().await.is_err());
}
