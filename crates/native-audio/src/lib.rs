//! Native audio for playtalk sessions.
//!
//! The codec pieces (WAV chunk encoding, container decoding, resampling and
//! the playback mixer) are always available, as is [`SilentPlayback`] for
//! running without an output device. The cpal-backed [`CpalCapture`] and
//! [`CpalPlayback`] that plug into the session controller need the `device`
//! feature.

#[cfg(feature = "device")]
pub mod capture;
pub mod decode;
pub mod mixer;
#[cfg(feature = "device")]
pub mod playback;
pub mod resample;
pub mod silent;
pub mod wav;

#[cfg(feature = "device")]
pub use capture::CpalCapture;
#[cfg(feature = "device")]
pub use playback::CpalPlayback;
pub use silent::SilentPlayback;
