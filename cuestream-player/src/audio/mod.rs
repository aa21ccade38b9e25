//! Audio decoding and output
//!
//! Decoding turns wire PCM into planar f32 buffers; outputs provide the
//! audio clock and play scheduled sources.

pub mod decode;
#[cfg(feature = "device-output")]
pub mod device;
pub mod headless;
pub mod manual;
pub mod mixer;
pub mod output;
pub mod types;

pub use decode::{decode_chunk, decode_pcm_s16le};
#[cfg(feature = "device-output")]
pub use device::DeviceOutput;
pub use headless::HeadlessOutput;
pub use manual::ManualOutput;
pub use mixer::SourceMixer;
pub use output::{AudioOutput, SourceHandle, SourceRequest};
pub use types::DecodedBuffer;
