/// Rebuilding zones from the flat bag/generator/modulator tables.
///
/// Every level of the pdta hierarchy (preset -> bag, bag -> generator/modulator,
/// instrument -> bag) uses the same trick: a record only stores where its
/// children *start*, and the next record's start is where they end. The tables
/// carry a terminal record (EOP, EOI, the last bag...) just to bound the last range.
use crate::error::{bad_sound_font, OpenError};
use crate::generator::{GenAmount, Generator, GeneratorType};
use crate::modulator::Modulator;
use crate::records::Bag;
use std::collections::HashSet;
use std::ops::Range;

/// A zone of a preset or instrument.
/// `L` is what the zone plays: an instrument for preset zones, a sample for instrument zones,
/// nothing for global zones.
#[derive(Clone, Debug, PartialEq)]
pub struct Zone<L> {
	pub key_range: Option<(u8, u8)>,
	pub vel_range: Option<(u8, u8)>,
	/// everything except the ranges and the link generator
	pub generators: Vec<Generator>,
	pub modulators: Vec<Modulator>,
	pub link: L,
}

pub type GlobalZone = Zone<()>;

fn in_range(range: Option<(u8, u8)>, x: u8) -> Option<bool> {
	range.map(|(lo, hi)| x >= lo && x <= hi)
}

impl<L> Zone<L> {
	/// Whether this zone plays (key, vel). A range this zone doesn't set falls back to
	/// the global zone's, and if that's missing too, anything goes.
	pub fn contains(&self, global: Option<&GlobalZone>, key: u8, vel: u8) -> bool {
		let global_key = global.and_then(|g| g.key_range);
		let global_vel = global.and_then(|g| g.vel_range);
		in_range(self.key_range.or(global_key), key).unwrap_or(true)
			&& in_range(self.vel_range.or(global_vel), vel).unwrap_or(true)
	}

	pub fn try_map_link<M, E>(self, f: impl FnOnce(L) -> Result<M, E>) -> Result<Zone<M>, E> {
		Ok(Zone {
			key_range: self.key_range,
			vel_range: self.vel_range,
			generators: self.generators,
			modulators: self.modulators,
			link: f(self.link)?,
		})
	}
}

/// Turns start indices into `[starts[i], starts[i+1])` ranges.
/// `starts` includes the terminal record, so there is one range less than there are starts.
/// `len` is the size of the table being indexed.
pub fn index_ranges(starts: &[usize], len: usize, what: &str) -> Result<Vec<Range<usize>>, OpenError> {
	if starts.is_empty() {
		return Err(bad_sound_font(format!("no terminal record in {} indices", what)));
	}
	let mut ranges = Vec::with_capacity(starts.len() - 1);
	for pair in starts.windows(2) {
		let (start, end) = (pair[0], pair[1]);
		if end < start {
			return Err(bad_sound_font(format!(
				"{} indices go backwards ({} after {})",
				what, end, start
			)));
		}
		ranges.push(start..end);
	}
	let last = starts[starts.len() - 1];
	if last > len {
		return Err(bad_sound_font(format!(
			"{} index {} is past the end of the table ({} entries)",
			what, last, len
		)));
	}
	Ok(ranges)
}

/// Generators and modulators of one bag, straight from the tables.
#[derive(Clone, Copy, Debug)]
pub struct RawZone<'a> {
	pub generators: &'a [Generator],
	pub modulators: &'a [Modulator],
}

/// Splits the zone tables up by owner (preset or instrument).
/// `bag_starts` are the headers' bag indices, terminal header included.
pub fn raw_zones<'a>(
	bag_starts: &[u16],
	bags: &[Bag],
	generators: &'a [Generator],
	modulators: &'a [Modulator],
	what: &str,
) -> Result<Vec<Vec<RawZone<'a>>>, OpenError> {
	let gen_starts: Vec<usize> = bags.iter().map(|b| b.gen_index as usize).collect();
	let mod_starts: Vec<usize> = bags.iter().map(|b| b.mod_index as usize).collect();
	let gen_ranges = index_ranges(&gen_starts, generators.len(), &format!("{} generator", what))?;
	let mod_ranges = index_ranges(&mod_starts, modulators.len(), &format!("{} modulator", what))?;

	let bag_starts: Vec<usize> = bag_starts.iter().map(|&b| b as usize).collect();
	// the terminal bag only bounds the last zone, it isn't one
	let bag_ranges = index_ranges(&bag_starts, gen_ranges.len(), &format!("{} bag", what))?;

	Ok(bag_ranges
		.into_iter()
		.map(|bags| {
			bags.map(|b| RawZone {
				generators: &generators[gen_ranges[b].clone()],
				modulators: &modulators[mod_ranges[b].clone()],
			})
			.collect()
		})
		.collect())
}

/// A later generator of the same type replaces an earlier one, but keeps its position.
pub fn dedup_keep_last(generators: &[Generator]) -> Vec<Generator> {
	let mut seen = HashSet::new();
	let mut kept: Vec<Generator> = generators.iter().rev().filter(|g| seen.insert(g.oper)).copied().collect();
	kept.reverse();
	kept
}

fn take_leading(generators: &mut Vec<Generator>, kind: GeneratorType) -> Option<GenAmount> {
	if generators.first().map_or(false, |g| g.is(kind)) {
		Some(generators.remove(0).amount)
	} else {
		None
	}
}

/// Zones of one preset/instrument: the optional global zone, and the local zones
/// with the index of what they link to.
pub struct SplitZones {
	pub global: Option<GlobalZone>,
	pub local: Vec<Zone<u16>>,
}

/// Sorts one owner's zones into global and local.
/// `link` is Instrument for preset zones and SampleID for instrument zones.
pub fn split_zones(zones: &[RawZone], link: GeneratorType, owner: &str) -> Result<SplitZones, OpenError> {
	let mut split = SplitZones {
		global: None,
		local: vec![],
	};
	for (i, raw) in zones.iter().enumerate() {
		let mut generators = dedup_keep_last(raw.generators);
		let key_range = take_leading(&mut generators, GeneratorType::KeyRange).map(GenAmount::as_range);
		let vel_range = take_leading(&mut generators, GeneratorType::VelRange).map(GenAmount::as_range);
		let linked = if generators.last().map_or(false, |g| g.is(link)) {
			generators.pop().map(|g| g.amount.as_unsigned())
		} else {
			None
		};
		let modulators = raw.modulators.to_vec();
		match linked {
			Some(index) => split.local.push(Zone {
				key_range,
				vel_range,
				generators,
				modulators,
				link: index,
			}),
			None if i == 0 => {
				split.global = Some(Zone {
					key_range,
					vel_range,
					generators,
					modulators,
					link: (),
				})
			}
			None => {
				return Err(bad_sound_font(format!(
					"{}: zone {} does not end with a {:?} generator",
					owner, i, link
				)))
			}
		}
	}
	if split.local.is_empty() {
		return Err(bad_sound_font(format!("{} has no zones with a {:?} generator", owner, link)));
	}
	Ok(split)
}
