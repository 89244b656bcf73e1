/// SOUNDFONT LOADER.
/// supports .sf2 files.
/*
IMPORTANT SOUNDFONT TERMINOLOGY:
 a PRESET is a source you can play from, e.g. "Piano", "Harpsichord", "Choir"
 an INSTRUMENT is an internal group of samples which presets refer to
 (the idea here is that you could, e.g., have presets "Piano 1" and "Piano 2" which use the
  same underlying "Piano" instrument, but different settings like pitch correction, etc.)
 a ZONE is a specially designated interval of keys and velocities.
 the zone controls various settings about how a sample should be played.
 both presets and instruments have zones.
	 a preset zone refers to an instrument
	 an instrument zone refers to a sample
	 the first zone may refer to nothing: then it's the GLOBAL zone, defaults for the others
 a SAMPLE is a block of audio data with some properties of how it should be played
 a BANK is a group of up to 128 presets, selected by MIDI bank select
*/
use crate::error::{bad_sound_font, format_error, LookupError, OpenError, SampleError};
use crate::generator::GeneratorType;
use crate::records::{Info, SoundFontFile};
use crate::riff::{read_i8, read_name, read_u16, read_u32, read_u8, Record, RiffReader};
use crate::sample_cache::SampleCache;
use crate::zone::{raw_zones, split_zones, GlobalZone, Zone};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleType {
	Mono,
	Right,
	Left,
	Linked,
	RomMono,
	RomRight,
	RomLeft,
	RomLinked,
	Unknown(u16),
}

impl SampleType {
	pub fn from_u16(value: u16) -> Self {
		use SampleType::*;
		match value {
			1 => Mono,
			2 => Right,
			4 => Left,
			8 => Linked,
			0x8001 => RomMono,
			0x8002 => RomRight,
			0x8004 => RomLeft,
			0x8008 => RomLinked,
			other => Unknown(other),
		}
	}

	pub fn is_rom(self) -> bool {
		use SampleType::*;
		matches!(self, RomMono | RomRight | RomLeft | RomLinked)
	}
}

/// shdr record. all positions are in frames from the start of the smpl chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
	pub name: String,
	pub start: u32,
	pub end: u32,
	pub loop_start: u32,
	pub loop_end: u32,
	pub sample_rate: u32,
	/// MIDI key of the recorded pitch
	pub original_pitch: u8,
	/// in cents
	pub pitch_correction: i8,
	/// the other half of a stereo pair
	pub sample_link: u16,
	pub sample_type: SampleType,
}

impl Sample {
	pub fn len(&self) -> u32 {
		self.end.saturating_sub(self.start)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl Record for Sample {
	const SIZE: u32 = 46;
	fn read<R: Read>(f: &mut R) -> std::io::Result<Self> {
		Ok(Sample {
			name: read_name(f)?,
			start: read_u32(f)?,
			end: read_u32(f)?,
			loop_start: read_u32(f)?,
			loop_end: read_u32(f)?,
			sample_rate: read_u32(f)?,
			original_pitch: read_u8(f)?,
			pitch_correction: read_i8(f)?,
			sample_link: read_u16(f)?,
			sample_type: SampleType::from_u16(read_u16(f)?),
		})
	}
}

pub type InstrumentZone = Zone<Arc<Sample>>;
pub type PresetZone = Zone<Arc<Instrument>>;

#[derive(Debug)]
pub struct Instrument {
	pub name: String,
	pub global: Option<GlobalZone>,
	pub zones: Vec<InstrumentZone>,
}

#[derive(Debug)]
pub struct Preset {
	pub name: String,
	pub preset: u16,
	pub bank: u16,
	pub global: Option<GlobalZone>,
	pub zones: Vec<PresetZone>,
	pub library: u32,
	pub genre: u32,
	pub morphology: u32,
}

impl Preset {
	/// every sample this preset can play, each once
	pub fn samples(&self) -> Vec<Arc<Sample>> {
		let mut samples: Vec<Arc<Sample>> = vec![];
		for pzone in self.zones.iter() {
			for izone in pzone.link.zones.iter() {
				if !samples.iter().any(|s| Arc::ptr_eq(s, &izone.link)) {
					samples.push(izone.link.clone());
				}
			}
		}
		samples
	}
}

#[derive(Debug, Default)]
pub struct Bank {
	pub number: u16,
	/// sorted by preset number
	presets: Vec<Preset>,
}

impl Bank {
	pub fn preset(&self, number: u16) -> Result<&Preset, LookupError> {
		self.presets
			.binary_search_by_key(&number, |p| p.preset)
			.map(|i| &self.presets[i])
			.map_err(|_| LookupError::NoPreset {
				bank: self.number,
				preset: number,
			})
	}

	pub fn presets(&self) -> &[Preset] {
		&self.presets
	}

	fn insert(&mut self, preset: Preset) {
		match self.presets.binary_search_by_key(&preset.preset, |p| p.preset) {
			Ok(i) => log::warn!(
				"bank {}: preset {} defined twice ({:?} and {:?}), keeping the first",
				self.number,
				preset.preset,
				self.presets[i].name,
				preset.name
			),
			Err(i) => self.presets.insert(i, preset),
		}
	}
}

/// A loaded soundfont.
/// The preset hierarchy is read completely when loading and never changes after that.
/// Sample data stays in the file and goes through a cache (see `SampleCache`),
/// which is why the file is kept open for as long as this exists.
pub struct SoundFont<R = File> {
	pub info: Info,
	banks: BTreeMap<u16, Bank>,
	instruments: Vec<Arc<Instrument>>,
	samples: Vec<Arc<Sample>>,
	cache: Mutex<SampleCache<R>>,
}

impl SoundFont<File> {
	/// Open a soundfont.
	/// This does not load any sample data, since that would be slow
	/// (soundfont files can be hundreds of megabytes large).
	/// If you're only dealing with a few presets, you may want to call
	/// `preload_preset()` after opening to avoid lag when getting samples.
	pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
		let path = path.as_ref();
		let extension = path
			.extension()
			.and_then(|e| e.to_str())
			.map(|e| e.to_ascii_lowercase());
		if let Some(ext @ ("sf3" | "sfz")) = extension.as_deref() {
			return Err(format_error(format!(".{} files are not supported", ext)));
		}
		log::info!("loading {}", path.display());
		Self::load(File::open(path)?)
	}
}

fn link_index<T>(table: &[Arc<T>], index: u16, what: &str, owner: &str) -> Result<Arc<T>, OpenError> {
	table.get(index as usize).cloned().ok_or_else(|| {
		bad_sound_font(format!(
			"{} refers to {} {}, but there are only {}",
			owner,
			what,
			index,
			table.len()
		))
	})
}

fn read_instruments(file: &SoundFontFile, samples: &[Arc<Sample>]) -> Result<Vec<Arc<Instrument>>, OpenError> {
	let bag_starts: Vec<u16> = file.instruments.iter().map(|i| i.bag_index).collect();
	let zones = raw_zones(
		&bag_starts,
		&file.instrument_bags,
		&file.instrument_generators,
		&file.instrument_modulators,
		"instrument",
	)?;
	let mut instruments = Vec::with_capacity(zones.len());
	for (header, zones) in file.instruments.iter().zip(zones) {
		let owner = format!("instrument {:?}", header.name);
		let split = split_zones(&zones, GeneratorType::SampleID, &owner)?;
		let zones = split
			.local
			.into_iter()
			.map(|z| z.try_map_link(|i| link_index(samples, i, "sample", &owner)))
			.collect::<Result<Vec<_>, _>>()?;
		instruments.push(Arc::new(Instrument {
			name: header.name.clone(),
			global: split.global,
			zones,
		}));
	}
	Ok(instruments)
}

fn read_presets(file: &SoundFontFile, instruments: &[Arc<Instrument>]) -> Result<Vec<Preset>, OpenError> {
	let bag_starts: Vec<u16> = file.preset_headers.iter().map(|p| p.bag_index).collect();
	let zones = raw_zones(
		&bag_starts,
		&file.preset_bags,
		&file.preset_generators,
		&file.preset_modulators,
		"preset",
	)?;
	let mut presets = Vec::with_capacity(zones.len());
	for (header, zones) in file.preset_headers.iter().zip(zones) {
		let owner = format!("preset {:?} ({}:{})", header.name, header.bank, header.preset);
		let split = split_zones(&zones, GeneratorType::Instrument, &owner)?;
		let zones = split
			.local
			.into_iter()
			.map(|z| z.try_map_link(|i| link_index(instruments, i, "instrument", &owner)))
			.collect::<Result<Vec<_>, _>>()?;
		presets.push(Preset {
			name: header.name.clone(),
			preset: header.preset,
			bank: header.bank,
			global: split.global,
			zones,
			library: header.library,
			genre: header.genre,
			morphology: header.morphology,
		});
	}
	Ok(presets)
}

impl<R: Read + Seek> SoundFont<R> {
	/// Like `open()` but takes any seekable stream.
	/// The whole preset hierarchy is validated here; a soundfont that loads is consistent.
	pub fn load(stream: R) -> Result<Self, OpenError> {
		let mut riff = RiffReader::new(stream)?;
		let file = SoundFontFile::read(&mut riff)?;

		let samples: Vec<Arc<Sample>> = file.samples.iter().cloned().map(Arc::new).collect();
		let instruments = read_instruments(&file, &samples)?;
		let presets = read_presets(&file, &instruments)?;

		let mut banks: BTreeMap<u16, Bank> = BTreeMap::new();
		for preset in presets {
			banks
				.entry(preset.bank)
				.or_insert_with(|| Bank {
					number: preset.bank,
					presets: vec![],
				})
				.insert(preset);
		}

		log::info!(
			"loaded {:?}: {} banks, {} instruments, {} samples",
			file.info.name,
			banks.len(),
			instruments.len(),
			samples.len()
		);

		let cache = SampleCache::new(riff.into_inner(), file.sample_chunk_start, file.sample_chunk_size);
		Ok(SoundFont {
			info: file.info,
			banks,
			instruments,
			samples,
			cache: Mutex::new(cache),
		})
	}

	pub fn bank(&self, number: u16) -> Result<&Bank, LookupError> {
		self.banks.get(&number).ok_or(LookupError::NoBank(number))
	}

	pub fn preset(&self, bank: u16, number: u16) -> Result<&Preset, LookupError> {
		self.bank(bank)?.preset(number)
	}

	pub fn banks(&self) -> impl Iterator<Item = &Bank> {
		self.banks.values()
	}

	/// all presets, ordered by (bank, preset)
	pub fn presets(&self) -> impl Iterator<Item = &Preset> {
		self.banks.values().flat_map(|b| b.presets.iter())
	}

	pub fn instruments(&self) -> &[Arc<Instrument>] {
		&self.instruments
	}

	/// every shdr record, including the terminal one
	pub fn samples(&self) -> &[Arc<Sample>] {
		&self.samples
	}

	/// The sample cache. Only one thread at a time gets to use it.
	pub fn cache(&self) -> MutexGuard<'_, SampleCache<R>> {
		// the cache never leaves an entry half-written, so a panic elsewhere doesn't hurt it
		self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// A copy of a sample's PCM data (little-endian i16).
	pub fn sample_data(&self, sample: &Sample) -> Result<Vec<u8>, SampleError> {
		Ok(self.cache().get_sample(sample)?.to_vec())
	}

	/// Load all sample data a preset needs.
	/// the file is slow and the cache is fast, so you might want to do this for the
	/// presets you're going to use before playing anything.
	pub fn preload_preset(&self, preset: &Preset) -> Result<(), SampleError> {
		let mut cache = self.cache();
		for pzone in preset.zones.iter() {
			cache.preload_instrument(&pzone.link)?;
		}
		Ok(())
	}
}
