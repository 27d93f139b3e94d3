pub mod audio;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod session;
pub mod store;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioDevices, AudioFile, AudioFrame,
    AudioSink, AudioSource, DeviceSet, FileBackend, OutputDevice, RenderedOutput,
};
pub use config::Config;
pub use error::{ErrorClassifier, GatewayError, LiveError, LiveResult};
pub use gateway::{ClientEvent, GeminiLiveGateway, LiveGateway, NatsGateway, OpenRequest, ServerEvent};
pub use http::{create_router, AppState};
pub use session::{LiveSessionConfig, LiveSessionController, Role, SessionReport, SessionState, Turn};
pub use store::{interview_system_prompt, NewPosition, Position, PositionStore};
