//! SoundFont 2 loading: the preset hierarchy, per-voice parameters, and cached sample data.
//!
//! ```no_run
//! use sf2voice::{voice, SoundFont};
//! let sf = SoundFont::open("FluidR3_GM.sf2")?;
//! let piano = sf.preset(0, 0)?;
//! sf.preload_preset(piano)?;
//! for v in voice::note_on(piano, 60, 100) {
//!     let pcm = sf.sample_data(&v.sample)?;
//!     println!("{}: {} bytes", v.sample.name, pcm.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod generator;
pub mod modulator;
pub mod records;
pub mod registry;
pub mod riff;
pub mod sample_cache;
pub mod soundfont;
pub mod voice;
pub mod zone;

#[cfg(test)]
mod fixtures;

pub use error::{LookupError, OpenError, SampleError};
pub use generator::{GenAmount, Generator, GeneratorType, SynthParam, SynthParams};
pub use modulator::{Modulator, ModulatorType};
pub use registry::Registry;
pub use sample_cache::SampleCache;
pub use soundfont::{Bank, Instrument, InstrumentZone, Preset, PresetZone, Sample, SoundFont};
pub use voice::{build_voice_parameters, note_on, VoiceParameters};
pub use zone::{GlobalZone, Zone};
