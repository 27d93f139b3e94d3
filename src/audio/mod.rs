pub mod backend;
pub mod devices;
pub mod file;
pub mod output;
pub mod pcm;

#[cfg(feature = "cpal")]
pub mod cpal_device;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use devices::{AudioDevices, DeviceSet};
pub use file::{AudioFile, FileBackend};
pub use output::{AudioSink, ChunkId, OutputDevice, RenderedOutput};
