/// RIFF container walking for .sf2 files.
///
/// An sf2 file looks like
/// ```text
/// RIFF <size> sfbk
///     LIST <size> INFO  { ifil, isng, INAM, ... }
///     LIST <size> sdta  { smpl }
///     LIST <size> pdta  { phdr, pbag, pmod, pgen, inst, ibag, imod, igen, shdr }
/// ```
/// We don't interpret anything here, we just remember where every (sub)chunk lives
/// so the record readers can jump straight to it.
use crate::error::{bad_sound_font, format_error, OpenError};
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

#[derive(PartialEq, Eq, Hash, Clone, Copy)]
pub struct FourCC(u8, u8, u8, u8);

impl std::fmt::Debug for FourCC {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
		write!(f, "FourCC({})", self)
	}
}

impl std::fmt::Display for FourCC {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
		// FourCC::new only lets ASCII through
		for b in [self.0, self.1, self.2, self.3] {
			write!(f, "{}", b as char)?;
		}
		Ok(())
	}
}

impl FourCC {
	const fn new(a: u8, b: u8, c: u8, d: u8) -> Option<Self> {
		if a == 0 || b == 0 || c == 0 || d == 0 {
			return None;
		}
		if a >= 128 || b >= 128 || c >= 128 || d >= 128 {
			return None;
		}
		Some(FourCC(a, b, c, d))
	}
}

/// # Panics
/// if `s` is shorter than 4 bytes, or has a NUL or non-ASCII byte in the first 4.
pub(crate) const fn fourcc(s: &str) -> FourCC {
	let bytes = s.as_bytes();
	match FourCC::new(bytes[0], bytes[1], bytes[2], bytes[3]) {
		Some(x) => x,
		None => panic!("bad fourcc"),
	}
}

pub const RIFF: FourCC = fourcc("RIFF");
pub const SFBK: FourCC = fourcc("sfbk");
pub const LIST: FourCC = fourcc("LIST");

pub fn read_fourcc<R: Read>(f: &mut R) -> Result<FourCC, OpenError> {
	let mut bytes = [0; 4];
	f.read_exact(&mut bytes)?;
	FourCC::new(bytes[0], bytes[1], bytes[2], bytes[3])
		.ok_or_else(|| format_error(format!("bad chunk id {:?}", bytes)))
}

pub fn read_u8<R: Read>(f: &mut R) -> std::io::Result<u8> {
	let mut bytes = [0; 1];
	f.read_exact(&mut bytes)?;
	Ok(bytes[0])
}

pub fn read_i8<R: Read>(f: &mut R) -> std::io::Result<i8> {
	Ok(read_u8(f)? as i8)
}

pub fn read_u16<R: Read>(f: &mut R) -> std::io::Result<u16> {
	let mut bytes = [0; 2];
	f.read_exact(&mut bytes)?;
	Ok(u16::from_le_bytes(bytes))
}

pub fn read_i16<R: Read>(f: &mut R) -> std::io::Result<i16> {
	Ok(read_u16(f)? as i16)
}

pub fn read_u32<R: Read>(f: &mut R) -> std::io::Result<u32> {
	let mut bytes = [0; 4];
	f.read_exact(&mut bytes)?;
	Ok(u32::from_le_bytes(bytes))
}

/// reads `len` bytes and strips everything from the first NUL on.
pub fn read_utf8_fixed_len<R: Read>(f: &mut R, len: usize) -> std::io::Result<String> {
	let mut name_vec = vec![0; len];
	f.read_exact(&mut name_vec)?;
	if let Some(nul) = name_vec.iter().position(|&b| b == 0) {
		name_vec.truncate(nul);
	}
	Ok(String::from_utf8_lossy(&name_vec).to_string())
}

/// 20-byte NUL-padded name used by phdr, inst and shdr.
pub fn read_name<R: Read>(f: &mut R) -> std::io::Result<String> {
	read_utf8_fixed_len(f, 20)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Version {
	pub major: u16,
	pub minor: u16,
}

impl std::fmt::Display for Version {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
		write!(f, "{}.{:02}", self.major, self.minor)
	}
}

pub fn read_version<R: Read>(f: &mut R) -> std::io::Result<Version> {
	let major = read_u16(f)?;
	let minor = read_u16(f)?;
	Ok(Version { major, minor })
}

/// A fixed-size record stored back to back inside a chunk.
pub trait Record: Sized {
	/// size of one record in the file, in bytes
	const SIZE: u32;
	fn read<R: Read>(f: &mut R) -> std::io::Result<Self>;
}

/// Where a chunk's data lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
	pub size: u32,
	/// offset of the first byte after the chunk header.
	/// for a LIST chunk this is where its 4-byte type lives.
	pub position: u64,
}

fn pad_to_word<S: Seek>(f: &mut S) -> std::io::Result<()> {
	let pos = f.stream_position()?;
	if pos % 2 != 0 {
		f.seek(SeekFrom::Start(pos + 1))?;
	}
	Ok(())
}

/// A validated RIFF/sfbk stream plus a table of every chunk in it.
pub struct RiffReader<R> {
	file: R,
	chunks: HashMap<FourCC, Extent>,
}

impl<R: Read + Seek> RiffReader<R> {
	/// Checks the RIFF header and walks all top-level chunks (one level of LIST nesting).
	pub fn new(mut file: R) -> Result<Self, OpenError> {
		let file_len = file.seek(SeekFrom::End(0))?;
		file.seek(SeekFrom::Start(0))?;
		if file_len < 12 {
			return Err(format_error(format!("{} bytes is too short for a RIFF header", file_len)));
		}

		let riff = read_fourcc(&mut file)?;
		if riff != RIFF {
			// definitely not a soundfont
			return Err(format_error("no RIFF header"));
		}

		let declared_size = read_u32(&mut file)?;
		if declared_size as u64 + 8 != file_len {
			return Err(format_error(format!(
				"file size does not match: RIFF header says {} bytes, file has {}",
				declared_size as u64 + 8,
				file_len
			)));
		}

		let sfbk = read_fourcc(&mut file)?;
		if sfbk != SFBK {
			// could be a WAV file, for example.
			return Err(format_error(format!("form type is {}, not sfbk", sfbk)));
		}

		let mut chunks = HashMap::new();
		while file.stream_position()? < file_len {
			let chunk_id = read_fourcc(&mut file)?;
			let chunk_size = read_u32(&mut file)?;
			let position = file.stream_position()?;
			let chunk_end = position + chunk_size as u64;
			if chunk_end > file_len {
				return Err(bad_sound_font(format!(
					"{} chunk runs past the end of the file",
					chunk_id
				)));
			}
			// LISTs are filed under their type (INFO, sdta, pdta)
			let chunk_type = if chunk_id == LIST && chunk_size >= 4 {
				read_fourcc(&mut file)?
			} else {
				chunk_id
			};
			insert_chunk(&mut chunks, chunk_type, chunk_size, position);

			if chunk_id == LIST {
				// subchunks have no type, just id + size
				while file.stream_position()? + 8 <= chunk_end {
					let sub_id = read_fourcc(&mut file)?;
					let sub_size = read_u32(&mut file)?;
					let sub_position = file.stream_position()?;
					let sub_end = sub_position + sub_size as u64;
					if sub_end > chunk_end {
						return Err(bad_sound_font(format!(
							"{} subchunk runs past the end of {}",
							sub_id, chunk_type
						)));
					}
					insert_chunk(&mut chunks, sub_id, sub_size, sub_position);
					file.seek(SeekFrom::Start(sub_end))?;
					pad_to_word(&mut file)?;
				}
			}

			file.seek(SeekFrom::Start(chunk_end))?;
			pad_to_word(&mut file)?;
		}

		for (name, extent) in chunks.iter() {
			log::debug!("{}: {} bytes at {}", name, extent.size, extent.position);
		}

		Ok(RiffReader { file, chunks })
	}

	pub fn try_extent_of(&self, name: FourCC) -> Option<Extent> {
		self.chunks.get(&name).copied()
	}

	pub fn extent_of(&self, name: FourCC) -> Result<Extent, OpenError> {
		self.try_extent_of(name)
			.ok_or_else(|| bad_sound_font(format!("no {} chunk", name)))
	}

	fn seek_to(&mut self, extent: Extent) -> std::io::Result<&mut R> {
		self.file.seek(SeekFrom::Start(extent.position))?;
		Ok(&mut self.file)
	}

	/// NUL-terminated string filling (at most) the whole chunk.
	pub fn read_string(&mut self, name: FourCC) -> Result<String, OpenError> {
		let extent = self.extent_of(name)?;
		let f = self.seek_to(extent)?;
		Ok(read_utf8_fixed_len(f, extent.size as usize)?)
	}

	pub fn try_read_string(&mut self, name: FourCC) -> Result<Option<String>, OpenError> {
		match self.try_extent_of(name) {
			Some(_) => self.read_string(name).map(Some),
			None => Ok(None),
		}
	}

	pub fn read_version(&mut self, name: FourCC) -> Result<Version, OpenError> {
		let extent = self.extent_of(name)?;
		if extent.size < 4 {
			return Err(bad_sound_font(format!("{} chunk too small for a version", name)));
		}
		let f = self.seek_to(extent)?;
		Ok(read_version(f)?)
	}

	pub fn try_read_version(&mut self, name: FourCC) -> Result<Option<Version>, OpenError> {
		match self.try_extent_of(name) {
			Some(_) => self.read_version(name).map(Some),
			None => Ok(None),
		}
	}

	/// Reads records of type `T` until the chunk is exhausted.
	/// The chunk size alone bounds the list, terminal records (EOP, EOI, EOS) included.
	pub fn read_records<T: Record>(&mut self, name: FourCC) -> Result<Vec<T>, OpenError> {
		let extent = self.extent_of(name)?;
		let count = extent.size / T::SIZE;
		if extent.size % T::SIZE != 0 {
			log::warn!(
				"{} chunk size {} is not a multiple of {}, ignoring {} trailing bytes",
				name,
				extent.size,
				T::SIZE,
				extent.size % T::SIZE
			);
		}
		let f = self.seek_to(extent)?;
		let mut records = Vec::with_capacity(count as usize);
		for _ in 0..count {
			records.push(T::read(f)?);
		}
		Ok(records)
	}

	/// Give the stream back (the sample cache keeps reading from it).
	pub fn into_inner(self) -> R {
		self.file
	}
}

fn insert_chunk(chunks: &mut HashMap<FourCC, Extent>, name: FourCC, size: u32, position: u64) {
	if chunks.contains_key(&name) {
		log::warn!("duplicate {} chunk at {}, keeping the first one", name, position);
		return;
	}
	chunks.insert(name, Extent { size, position });
}
