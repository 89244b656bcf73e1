/// The flat tables of an sf2 file, exactly as stored.
/// `zone.rs` turns these into the preset/instrument hierarchy.
use crate::error::OpenError;
use crate::generator::Generator;
use crate::modulator::Modulator;
use crate::riff::{fourcc, read_name, read_u16, read_u32, FourCC, Record, RiffReader, Version};
use crate::soundfont::Sample;
use std::io::{Read, Seek};

pub const IFIL: FourCC = fourcc("ifil");
pub const ISNG: FourCC = fourcc("isng");
pub const INAM: FourCC = fourcc("INAM");
pub const IROM: FourCC = fourcc("irom");
pub const IVER: FourCC = fourcc("iver");
pub const ICRD: FourCC = fourcc("ICRD");
pub const IENG: FourCC = fourcc("IENG");
pub const IPRD: FourCC = fourcc("IPRD");
pub const ICOP: FourCC = fourcc("ICOP");
pub const ICMT: FourCC = fourcc("ICMT");
pub const ISFT: FourCC = fourcc("ISFT");
pub const SMPL: FourCC = fourcc("smpl");
pub const PHDR: FourCC = fourcc("phdr");
pub const PBAG: FourCC = fourcc("pbag");
pub const PMOD: FourCC = fourcc("pmod");
pub const PGEN: FourCC = fourcc("pgen");
pub const INST: FourCC = fourcc("inst");
pub const IBAG: FourCC = fourcc("ibag");
pub const IMOD: FourCC = fourcc("imod");
pub const IGEN: FourCC = fourcc("igen");
pub const SHDR: FourCC = fourcc("shdr");

/// phdr record
#[derive(Clone, Debug, Default)]
pub struct PresetHeader {
	pub name: String,
	pub preset: u16,
	pub bank: u16,
	pub bag_index: u16,
	pub library: u32,
	pub genre: u32,
	pub morphology: u32,
}

impl Record for PresetHeader {
	const SIZE: u32 = 38;
	fn read<R: Read>(f: &mut R) -> std::io::Result<Self> {
		Ok(PresetHeader {
			name: read_name(f)?,
			preset: read_u16(f)?,
			bank: read_u16(f)?,
			bag_index: read_u16(f)?,
			library: read_u32(f)?,
			genre: read_u32(f)?,
			morphology: read_u32(f)?,
		})
	}
}

/// pbag / ibag record: where a zone's generators and modulators start.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bag {
	pub gen_index: u16,
	pub mod_index: u16,
}

impl Record for Bag {
	const SIZE: u32 = 4;
	fn read<R: Read>(f: &mut R) -> std::io::Result<Self> {
		Ok(Bag {
			gen_index: read_u16(f)?,
			mod_index: read_u16(f)?,
		})
	}
}

/// inst record
#[derive(Clone, Debug, Default)]
pub struct InstrumentHeader {
	pub name: String,
	pub bag_index: u16,
}

impl Record for InstrumentHeader {
	const SIZE: u32 = 22;
	fn read<R: Read>(f: &mut R) -> std::io::Result<Self> {
		Ok(InstrumentHeader {
			name: read_name(f)?,
			bag_index: read_u16(f)?,
		})
	}
}

/// Contents of the INFO list.
#[derive(Clone, Debug, Default)]
pub struct Info {
	pub version: Version,
	pub engine: String,
	pub name: String,
	pub rom_name: Option<String>,
	pub rom_version: Option<Version>,
	pub creation_date: Option<String>,
	pub designers: Option<String>,
	pub product: Option<String>,
	pub copyright: Option<String>,
	pub comments: Option<String>,
	pub tools: Option<String>,
}

impl Info {
	fn read<R: Read + Seek>(riff: &mut RiffReader<R>) -> Result<Self, OpenError> {
		Ok(Info {
			version: riff.read_version(IFIL)?,
			// "If the isng sub-chunk is missing [...] assume EMU8000"
			engine: riff.try_read_string(ISNG)?.unwrap_or_else(|| "EMU8000".to_string()),
			name: riff.read_string(INAM)?,
			rom_name: riff.try_read_string(IROM)?,
			rom_version: riff.try_read_version(IVER)?,
			creation_date: riff.try_read_string(ICRD)?,
			designers: riff.try_read_string(IENG)?,
			product: riff.try_read_string(IPRD)?,
			copyright: riff.try_read_string(ICOP)?,
			comments: riff.try_read_string(ICMT)?,
			tools: riff.try_read_string(ISFT)?,
		})
	}
}

impl std::fmt::Display for Info {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
		writeln!(f, "Soundfont Version: {}", self.version)?;
		writeln!(f, "Target Engine: {}", self.engine)?;
		writeln!(f, "Name: {}", self.name)?;
		let optional = [
			("ROM Name", self.rom_name.clone()),
			("ROM Version", self.rom_version.map(|v| v.to_string())),
			("Date of Creation", self.creation_date.clone()),
			("Sound Designers and Engineers", self.designers.clone()),
			("Product For", self.product.clone()),
			("Copyright Message", self.copyright.clone()),
			("Comments", self.comments.clone()),
			("Tools Used", self.tools.clone()),
		];
		for (label, value) in optional {
			match value {
				Some(v) if !v.is_empty() => writeln!(f, "{}: {}", label, v)?,
				_ => {}
			}
		}
		Ok(())
	}
}

/// Everything in an sf2 file except the sample data itself.
pub struct SoundFontFile {
	pub info: Info,
	pub preset_headers: Vec<PresetHeader>,
	pub preset_bags: Vec<Bag>,
	pub preset_modulators: Vec<Modulator>,
	pub preset_generators: Vec<Generator>,
	pub instruments: Vec<InstrumentHeader>,
	pub instrument_bags: Vec<Bag>,
	pub instrument_modulators: Vec<Modulator>,
	pub instrument_generators: Vec<Generator>,
	pub samples: Vec<Sample>,
	/// file offset of the first byte of PCM data
	pub sample_chunk_start: u64,
	/// size of the smpl chunk in bytes
	pub sample_chunk_size: u32,
}

impl SoundFontFile {
	pub fn read<R: Read + Seek>(riff: &mut RiffReader<R>) -> Result<Self, OpenError> {
		let smpl = riff.extent_of(SMPL)?;
		let file = SoundFontFile {
			info: Info::read(riff)?,
			preset_headers: riff.read_records(PHDR)?,
			preset_bags: riff.read_records(PBAG)?,
			preset_modulators: riff.read_records(PMOD)?,
			preset_generators: riff.read_records(PGEN)?,
			instruments: riff.read_records(INST)?,
			instrument_bags: riff.read_records(IBAG)?,
			instrument_modulators: riff.read_records(IMOD)?,
			instrument_generators: riff.read_records(IGEN)?,
			samples: riff.read_records(SHDR)?,
			sample_chunk_start: smpl.position,
			sample_chunk_size: smpl.size,
		};
		log::debug!(
			"{}: {} preset headers, {} instrument headers, {} sample headers",
			file.info.name,
			file.preset_headers.len(),
			file.instruments.len(),
			file.samples.len()
		);
		Ok(file)
	}
}
