/// Lazily loaded PCM data.
///
/// Sample data is read from the smpl chunk the first time it's needed and kept
/// around. Loaded ranges that touch or overlap are merged into one buffer, so
/// the cache is always a set of disjoint, non-adjacent frame ranges.
use crate::error::SampleError;
use crate::soundfont::{Instrument, Sample};
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use std::ops::{Bound, Range};

/// bytes per frame (16-bit PCM)
const FRAME: usize = 2;

struct CacheEntry {
	/// in frames
	len: u32,
	data: Vec<u8>,
}

impl CacheEntry {
	fn end(&self, start: u32) -> u32 {
		start + self.len
	}
}

pub struct SampleCache<R> {
	file: R,
	chunk_start: u64,
	/// in bytes
	chunk_size: u32,
	/// first frame => entry
	entries: BTreeMap<u32, CacheEntry>,
}

impl<R: Read + Seek> SampleCache<R> {
	/// `chunk_start` is the file offset of the smpl data, `chunk_size` its size in bytes.
	pub fn new(file: R, chunk_start: u64, chunk_size: u32) -> Self {
		Self {
			file,
			chunk_start,
			chunk_size,
			entries: BTreeMap::new(),
		}
	}

	fn frame_count(&self) -> u32 {
		self.chunk_size / FRAME as u32
	}

	/// never reads past the smpl chunk; empty if `range` is backwards.
	fn clamp(&self, range: Range<u32>) -> Range<u32> {
		let end = range.end.min(self.frame_count());
		range.start..end.max(range.start)
	}

	/// the entry starting at or before `frame`
	fn entry_before(&self, frame: u32) -> Option<(u32, &CacheEntry)> {
		self.entries
			.range(..=frame)
			.next_back()
			.map(|(&start, entry)| (start, entry))
	}

	pub fn sample_is_cached(&self, range: Range<u32>) -> bool {
		let range = self.clamp(range);
		if range.is_empty() {
			return true;
		}
		match self.entry_before(range.start) {
			Some((start, entry)) => entry.end(start) >= range.end,
			None => false,
		}
	}

	/// Makes sure `range` (in frames) is in the cache.
	/// On a read error the cache is left exactly as it was.
	pub fn preload_sample(&mut self, range: Range<u32>) -> Result<(), SampleError> {
		let range = self.clamp(range);
		if self.sample_is_cached(range.clone()) {
			return Ok(());
		}

		// grow the load region over every entry it touches
		let mut start = range.start;
		let mut end = range.end;
		let mut merged = vec![];
		if let Some((before, entry)) = self.entry_before(range.start) {
			if entry.end(before) >= range.start {
				start = before;
				merged.push(before);
			}
		}
		for (&after, entry) in self
			.entries
			.range((Bound::Excluded(range.start), Bound::Included(range.end)))
		{
			end = end.max(entry.end(after));
			merged.push(after);
		}

		// read the gaps first: nothing is touched until they're all in
		let mut data = vec![0; (end - start) as usize * FRAME];
		let mut pos = start;
		for &key in merged.iter() {
			if key > pos {
				self.read_frames(pos..key, &mut data, start)?;
			}
			pos = pos.max(self.entries[&key].end(key));
		}
		if pos < end {
			self.read_frames(pos..end, &mut data, start)?;
		}

		for key in merged.iter() {
			if let Some(entry) = self.entries.remove(key) {
				let offset = (key - start) as usize * FRAME;
				data[offset..offset + entry.data.len()].copy_from_slice(&entry.data);
			}
		}
		log::trace!(
			"cached frames {}..{} (merged {} entries, {} now)",
			start,
			end,
			merged.len(),
			self.entries.len() + 1
		);
		self.entries.insert(
			start,
			CacheEntry {
				len: end - start,
				data,
			},
		);
		Ok(())
	}

	/// reads `frames` from the file into `data`, which holds frames from `data_start` on.
	fn read_frames(&mut self, frames: Range<u32>, data: &mut [u8], data_start: u32) -> std::io::Result<()> {
		let offset = (frames.start - data_start) as usize * FRAME;
		let len = (frames.end - frames.start) as usize * FRAME;
		self.file
			.seek(SeekFrom::Start(self.chunk_start + frames.start as u64 * FRAME as u64))?;
		self.file.read_exact(&mut data[offset..offset + len])
	}

	/// Raw little-endian PCM bytes of `range` (in frames), loading them if necessary.
	pub fn get_sample_data(&mut self, range: Range<u32>) -> Result<&[u8], SampleError> {
		let range = self.clamp(range);
		if range.is_empty() {
			return Ok(&[]);
		}
		self.preload_sample(range.clone())?;
		let (start, entry) = self
			.entry_before(range.start)
			.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "sample cache lost an entry"))?;
		let from = (range.start - start) as usize * FRAME;
		let to = (range.end - start) as usize * FRAME;
		Ok(&entry.data[from..to])
	}

	/// all of a sample's data
	pub fn get_sample(&mut self, sample: &Sample) -> Result<&[u8], SampleError> {
		self.get_sample_data(sample.start..sample.end)
	}

	pub fn preload_instrument(&mut self, instrument: &Instrument) -> Result<(), SampleError> {
		for zone in instrument.zones.iter() {
			self.preload_sample(zone.link.start..zone.link.end)?;
		}
		Ok(())
	}

	pub fn clear_cache(&mut self) {
		self.entries.clear();
	}

	/// size of all cached samples in bytes.
	pub fn cache_size(&self) -> usize {
		self.entries.values().map(|e| e.data.len()).sum()
	}

	/// cached frame ranges, in order
	pub fn cached_ranges(&self) -> Vec<Range<u32>> {
		self.entries.iter().map(|(&start, e)| start..e.end(start)).collect()
	}

	pub fn entry_count(&self) -> usize {
		self.entries.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	fn shorts(values: impl IntoIterator<Item = i16>) -> Vec<u8> {
		values.into_iter().flat_map(|x| x.to_le_bytes()).collect()
	}

	/// 6 frames of junk, frames 0..30 holding their own index, 8 frames of junk
	fn scenario() -> SampleCache<Cursor<Vec<u8>>> {
		let mut frames = vec![255i16; 6];
		frames.extend(0..30);
		frames.extend([254; 8]);
		SampleCache::new(Cursor::new(shorts(frames)), 6 * 2, 30 * 2)
	}

	fn assert_no_mergeable(cache: &SampleCache<Cursor<Vec<u8>>>) {
		let ranges = cache.cached_ranges();
		for pair in ranges.windows(2) {
			assert!(pair[0].end < pair[1].start, "{:?} and {:?} should have been merged", pair[0], pair[1]);
		}
		for (start, entry) in cache.entries.iter() {
			assert_eq!(entry.data.len(), entry.len as usize * FRAME, "entry at {}", start);
		}
	}

	#[test]
	fn test_cache_scenario() {
		let mut cache = scenario();
		assert!(!cache.sample_is_cached(10..15));

		cache.preload_sample(10..20).unwrap();
		assert_eq!(cache.entry_count(), 1);
		assert_eq!(cache.cached_ranges(), vec![10..20]);
		assert_eq!(cache.entries[&10].data, shorts(10..20));

		assert!(cache.sample_is_cached(10..20));
		assert!(cache.sample_is_cached(15..18));
		assert!(!cache.sample_is_cached(8..15));
		assert!(!cache.sample_is_cached(12..22));

		assert_eq!(cache.get_sample_data(15..20).unwrap(), shorts(15..20));
		assert_eq!(cache.entry_count(), 1);

		assert_eq!(cache.get_sample_data(20..25).unwrap(), shorts(20..25));
		assert_eq!(cache.entry_count(), 1);
		assert_eq!(cache.entries[&10].data, shorts(10..25));

		assert_eq!(cache.get_sample_data(2..5).unwrap(), shorts(2..5));
		assert_eq!(cache.entry_count(), 2);

		assert_eq!(cache.get_sample_data(5..12).unwrap(), shorts(5..12));
		assert_eq!(cache.entry_count(), 1);
		assert_eq!(cache.entries[&2].data, shorts(2..25));

		assert_eq!(cache.get_sample_data(0..5).unwrap(), shorts(0..5));
		assert_eq!(cache.entry_count(), 1);
		assert_eq!(cache.entries[&0].data, shorts(0..25));
		assert_no_mergeable(&cache);
	}

	#[test]
	fn test_clamped_to_chunk() {
		let mut cache = scenario();
		assert_eq!(cache.get_sample_data(25..100).unwrap(), shorts(25..30));
		assert_eq!(cache.cached_ranges(), vec![25..30]);
		assert!(cache.sample_is_cached(28..1000));
		assert_eq!(cache.get_sample_data(40..50).unwrap(), &[] as &[u8]);
		assert_eq!(cache.entry_count(), 1);
	}

	#[test]
	fn test_preload_is_idempotent() {
		let mut cache = scenario();
		cache.preload_sample(3..9).unwrap();
		cache.preload_sample(20..24).unwrap();
		let ranges = cache.cached_ranges();
		let size = cache.cache_size();
		cache.preload_sample(3..9).unwrap();
		cache.preload_sample(20..24).unwrap();
		assert_eq!(cache.cached_ranges(), ranges);
		assert_eq!(cache.cache_size(), size);
		assert_eq!(size, (6 + 4) * FRAME);
	}

	#[test]
	fn test_merges_many_entries() {
		let mut cache = scenario();
		let loads = [4..6, 8..10, 12..14, 16..18, 26..28, 1..2];
		for range in loads.iter() {
			cache.preload_sample(range.clone()).unwrap();
			assert_no_mergeable(&cache);
		}
		assert_eq!(cache.entry_count(), 6);

		// swallows four entries, touching the first one's end and the last one's start
		assert_eq!(cache.get_sample_data(6..16).unwrap(), shorts(6..16));
		assert_eq!(cache.cached_ranges(), vec![1..2, 4..18, 26..28]);
		assert_no_mergeable(&cache);

		for range in loads.iter() {
			let expected = shorts(range.start as i16..range.end as i16);
			assert_eq!(cache.get_sample_data(range.clone()).unwrap(), expected);
		}

		cache.clear_cache();
		assert_eq!(cache.entry_count(), 0);
		assert_eq!(cache.cache_size(), 0);
	}

	#[test]
	fn test_failed_read_leaves_cache_alone() {
		// claims 30 frames of data but the file stops after 20
		let mut frames = vec![255i16; 6];
		frames.extend(0..14);
		let mut cache = SampleCache::new(Cursor::new(shorts(frames)), 6 * 2, 30 * 2);
		cache.preload_sample(2..6).unwrap();
		cache.preload_sample(10..12).unwrap();

		assert!(matches!(cache.preload_sample(4..25), Err(SampleError::IO(_))));
		assert_eq!(cache.cached_ranges(), vec![2..6, 10..12]);
		assert_eq!(cache.get_sample_data(2..6).unwrap(), shorts(2..6));
		assert_eq!(cache.get_sample_data(10..12).unwrap(), shorts(10..12));
	}
}
