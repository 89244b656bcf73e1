/// Modulators: routing of a controller (velocity, pitch wheel, a CC...) onto a generator.
/// We only work out *which* modulators are active for a voice, not what they compute.
use crate::generator::GeneratorType;
use crate::riff::{read_i16, read_u16, Record};
use std::io::Read;

/// Non-CC controller sources (SoundFont 2.04, 8.2.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModulatorSource {
	None,
	NoteOnVelocity,
	NoteOnKeyNumber,
	PolyPressure,
	ChannelPressure,
	PitchWheel,
	PitchWheelSensitivity,
	Link,
}

impl ModulatorSource {
	fn from_index(index: u8) -> Option<Self> {
		use ModulatorSource::*;
		Some(match index {
			0 => None,
			2 => NoteOnVelocity,
			3 => NoteOnKeyNumber,
			10 => PolyPressure,
			13 => ChannelPressure,
			14 => PitchWheel,
			16 => PitchWheelSensitivity,
			127 => Link,
			_ => return Option::None,
		})
	}

	fn index(self) -> u8 {
		use ModulatorSource::*;
		match self {
			None => 0,
			NoteOnVelocity => 2,
			NoteOnKeyNumber => 3,
			PolyPressure => 10,
			ChannelPressure => 13,
			PitchWheel => 14,
			PitchWheelSensitivity => 16,
			Link => 127,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Continuity {
	Linear = 0,
	Concave = 1,
	Convex = 2,
	Switch = 3,
}

/// Packed source descriptor:
/// ```text
/// bits 0-6    source index (a ModulatorSource, or a CC number if bit 7 is set)
/// bit 7       MIDI continuous controller flag
/// bit 8       direction (0 = min to max, 1 = max to min)
/// bit 9       polarity (0 = unipolar, 1 = bipolar)
/// bits 10-15  continuity
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModulatorType(pub u16);

const INDEX_MASK: u16 = 0x007f;
const CC_BIT: u16 = 1 << 7;
const DIRECTION_BIT: u16 = 1 << 8;
const POLARITY_BIT: u16 = 1 << 9;
const CONTINUITY_SHIFT: u16 = 10;

impl ModulatorType {
	pub fn source_index(self) -> u8 {
		(self.0 & INDEX_MASK) as u8
	}

	pub fn set_source_index(&mut self, index: u8) {
		self.0 = (self.0 & !INDEX_MASK) | (index as u16 & INDEX_MASK);
	}

	/// `None` for CC sources or undefined indices.
	pub fn source(self) -> Option<ModulatorSource> {
		if self.is_cc() {
			None
		} else {
			ModulatorSource::from_index(self.source_index())
		}
	}

	pub fn set_source(&mut self, source: ModulatorSource) {
		self.set_cc(false);
		self.set_source_index(source.index());
	}

	pub fn is_cc(self) -> bool {
		self.0 & CC_BIT != 0
	}

	pub fn set_cc(&mut self, cc: bool) {
		self.set_bit(CC_BIT, cc);
	}

	/// true = max to min
	pub fn direction(self) -> bool {
		self.0 & DIRECTION_BIT != 0
	}

	pub fn set_direction(&mut self, reversed: bool) {
		self.set_bit(DIRECTION_BIT, reversed);
	}

	/// true = bipolar
	pub fn polarity(self) -> bool {
		self.0 & POLARITY_BIT != 0
	}

	pub fn set_polarity(&mut self, bipolar: bool) {
		self.set_bit(POLARITY_BIT, bipolar);
	}

	pub fn continuity_bits(self) -> u8 {
		(self.0 >> CONTINUITY_SHIFT) as u8
	}

	pub fn continuity(self) -> Option<Continuity> {
		use Continuity::*;
		match self.continuity_bits() {
			0 => Some(Linear),
			1 => Some(Concave),
			2 => Some(Convex),
			3 => Some(Switch),
			_ => None,
		}
	}

	pub fn set_continuity(&mut self, continuity: Continuity) {
		self.0 = (self.0 & !(0x3f << CONTINUITY_SHIFT)) | ((continuity as u16) << CONTINUITY_SHIFT);
	}

	fn set_bit(&mut self, bit: u16, on: bool) {
		if on {
			self.0 |= bit;
		} else {
			self.0 &= !bit;
		}
	}

	/// a non-CC source
	pub fn general(source: ModulatorSource, continuity: Continuity, bipolar: bool, reversed: bool) -> Self {
		let mut t = ModulatorType(0);
		t.set_source(source);
		t.set_continuity(continuity);
		t.set_polarity(bipolar);
		t.set_direction(reversed);
		t
	}

	/// MIDI CC `cc` as a source
	pub fn midi_cc(cc: u8, continuity: Continuity, bipolar: bool, reversed: bool) -> Self {
		let mut t = ModulatorType(0);
		t.set_source_index(cc);
		t.set_cc(true);
		t.set_continuity(continuity);
		t.set_polarity(bipolar);
		t.set_direction(reversed);
		t
	}
}

impl std::fmt::Display for ModulatorType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
		if self.is_cc() {
			write!(f, "CC{}", self.source_index())?;
		} else {
			match self.source() {
				Some(source) => write!(f, "{:?}", source)?,
				None => write!(f, "Source#{}", self.source_index())?,
			}
		}
		write!(
			f,
			" ({}, {}, {})",
			if self.polarity() { "bipolar" } else { "unipolar" },
			if self.direction() { "max->min" } else { "min->max" },
			match self.continuity() {
				Some(c) => format!("{:?}", c),
				None => format!("continuity {}", self.continuity_bits()),
			}
		)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transform {
	Linear,
	Absolute,
	Unknown(u16),
}

impl Transform {
	pub fn from_u16(value: u16) -> Self {
		match value {
			0 => Transform::Linear,
			2 => Transform::Absolute,
			other => Transform::Unknown(other),
		}
	}

	pub fn to_u16(self) -> u16 {
		match self {
			Transform::Linear => 0,
			Transform::Absolute => 2,
			Transform::Unknown(other) => other,
		}
	}
}

/// pmod / imod record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Modulator {
	pub source: ModulatorType,
	/// a generator number, or (bit 15 set) a link to another modulator
	pub destination: u16,
	pub amount: i16,
	pub amount_source: ModulatorType,
	pub transform: Transform,
}

impl Modulator {
	pub fn new(
		source: ModulatorType,
		destination: GeneratorType,
		amount: i16,
		amount_source: ModulatorType,
		transform: Transform,
	) -> Self {
		Modulator {
			source,
			destination: destination as u16,
			amount,
			amount_source,
			transform,
		}
	}

	pub fn destination_generator(&self) -> Option<GeneratorType> {
		GeneratorType::from_u16(self.destination)
	}

	/// same modulator except possibly for the amount.
	/// this is what decides whether a local modulator replaces a global/default one.
	pub fn identical_to(&self, other: &Modulator) -> bool {
		self.source == other.source
			&& self.destination == other.destination
			&& self.amount_source == other.amount_source
			&& self.transform == other.transform
	}
}

impl Record for Modulator {
	const SIZE: u32 = 10;
	fn read<R: Read>(f: &mut R) -> std::io::Result<Self> {
		Ok(Modulator {
			source: ModulatorType(read_u16(f)?),
			destination: read_u16(f)?,
			amount: read_i16(f)?,
			amount_source: ModulatorType(read_u16(f)?),
			transform: Transform::from_u16(read_u16(f)?),
		})
	}
}

impl std::fmt::Display for Modulator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
		write!(f, "{} x {}", self.source, self.amount)?;
		if self.amount_source.0 != 0 {
			write!(f, " x {}", self.amount_source)?;
		}
		match self.destination_generator() {
			Some(kind) => write!(f, " -> {:?}", kind)?,
			None => write!(f, " -> #{}", self.destination)?,
		}
		if self.transform != Transform::Linear {
			write!(f, " ({:?})", self.transform)?;
		}
		Ok(())
	}
}

/// The modulators every voice has unless an instrument overrides them (SoundFont 2.04, 8.4).
pub fn default_modulators() -> [Modulator; 10] {
	use Continuity::*;
	use GeneratorType::*;
	use ModulatorSource::*;
	let none = ModulatorType(0);
	let linear = Transform::Linear;
	[
		// 8.4.1 note-on velocity to initial attenuation (0x0502)
		Modulator::new(ModulatorType::general(NoteOnVelocity, Concave, false, true), InitialAttenuation, 960, none, linear),
		// 8.4.2 note-on velocity to filter cutoff (0x0102)
		Modulator::new(ModulatorType::general(NoteOnVelocity, Linear, false, true), InitialFilterFc, -2400, none, linear),
		// 8.4.3 channel pressure to vibrato LFO pitch depth (0x000d)
		Modulator::new(ModulatorType::general(ChannelPressure, Linear, false, false), VibLfoToPitch, 50, none, linear),
		// 8.4.4 mod wheel to vibrato LFO pitch depth (0x0081)
		Modulator::new(ModulatorType::midi_cc(1, Linear, false, false), VibLfoToPitch, 50, none, linear),
		// 8.4.5 CC7 volume to initial attenuation (0x0587; the 0x0582 printed in 2.01 is a typo)
		Modulator::new(ModulatorType::midi_cc(7, Concave, false, true), InitialAttenuation, 960, none, linear),
		// 8.4.6 CC10 pan to pan position (0x028a).
		// pan's zero is the centre, so half of the listed 1000 (fluidsynth does the same)
		Modulator::new(ModulatorType::midi_cc(10, Linear, true, false), Pan, 500, none, linear),
		// 8.4.7 CC11 expression to initial attenuation (0x058b)
		Modulator::new(ModulatorType::midi_cc(11, Concave, false, true), InitialAttenuation, 960, none, linear),
		// 8.4.8 CC91 reverb send (0x00db)
		Modulator::new(ModulatorType::midi_cc(91, Linear, false, false), ReverbEffectsSend, 200, none, linear),
		// 8.4.9 CC93 chorus send (0x00dd)
		Modulator::new(ModulatorType::midi_cc(93, Linear, false, false), ChorusEffectsSend, 200, none, linear),
		// 8.4.10 pitch wheel to initial pitch, scaled by pitch wheel sensitivity (0x020e, 0x0010)
		Modulator::new(
			ModulatorType::general(PitchWheel, Linear, true, false),
			FineTune,
			12700,
			ModulatorType::general(PitchWheelSensitivity, Linear, false, false),
			linear,
		),
	]
}

/// appends every global modulator with no identical counterpart among the
/// local ones as they were before merging. duplicates among the globals themselves are all kept.
fn merge_global(local: &[Modulator], global: &[Modulator]) -> Vec<Modulator> {
	let mut merged = local.to_vec();
	for g in global {
		if !local.iter().any(|l| l.identical_to(g)) {
			merged.push(*g);
		}
	}
	merged
}

/// The active modulators of a voice, in order:
/// surviving defaults, then instrument modulators, then preset modulators.
///
/// a local modulator replaces an identical global one, and an instrument modulator
/// replaces an identical default one. amounts are not compared.
pub fn clean_modulators(
	defaults: &[Modulator],
	global_instrument: &[Modulator],
	local_instrument: &[Modulator],
	global_preset: &[Modulator],
	local_preset: &[Modulator],
) -> Vec<Modulator> {
	let instrument = merge_global(local_instrument, global_instrument);
	let preset = merge_global(local_preset, global_preset);

	let mut cleaned: Vec<Modulator> = defaults
		.iter()
		.filter(|d| !instrument.iter().any(|m| m.identical_to(d)))
		.copied()
		.collect();
	cleaned.extend(instrument);
	cleaned.extend(preset);
	cleaned
}

#[cfg(test)]
mod tests {
	use super::*;
	use GeneratorType::*;

	fn m(dest: GeneratorType, src: u16, amount_src: u16, amount: i16) -> Modulator {
		Modulator::new(ModulatorType(src), dest, amount, ModulatorType(amount_src), Transform::Linear)
	}

	#[test]
	fn test_modulator_merge() {
		let defaults = [
			m(StartAddrsOffset, 0, 0, 16),
			m(EndAddrsOffset, 1, 1, 16),
			m(StartLoopAddrsOffset, 2, 2, 16),
			m(EndLoopAddrsOffset, 3, 3, 16),
		];
		let global_preset = [
			m(StartAddrsOffset, 0, 0, 8),
			m(EndAddrsOffset, 1, 2, 8),
			m(StartLoopAddrsOffset, 2, 3, 8),
			m(EndLoopAddrsOffset, 2, 3, 8),
		];
		let local_preset = [
			m(StartAddrsOffset, 0, 0, 4),
			m(EndAddrsOffset, 1, 1, 4),
			m(StartLoopAddrsOffset, 2, 3, 4),
			m(EndLoopAddrsOffset, 3, 2, 4),
		];
		let global_instrument = [
			m(StartAddrsOffset, 0, 0, 2),
			m(EndAddrsOffset, 1, 2, 2),
			m(StartLoopAddrsOffset, 2, 2, 2),
			m(EndLoopAddrsOffset, 2, 3, 2),
		];
		let local_instrument = [
			m(StartAddrsOffset, 0, 0, 1),
			m(EndAddrsOffset, 1, 1, 1),
			m(StartLoopAddrsOffset, 2, 3, 1),
			m(EndLoopAddrsOffset, 3, 2, 1),
		];

		let cleaned = clean_modulators(
			&defaults,
			&global_instrument,
			&local_instrument,
			&global_preset,
			&local_preset,
		);

		// default, local inst, global inst, local preset, global preset
		let expected = vec![
			m(EndLoopAddrsOffset, 3, 3, 16),
			m(StartAddrsOffset, 0, 0, 1),
			m(EndAddrsOffset, 1, 1, 1),
			m(StartLoopAddrsOffset, 2, 3, 1),
			m(EndLoopAddrsOffset, 3, 2, 1),
			m(EndAddrsOffset, 1, 2, 2),
			m(StartLoopAddrsOffset, 2, 2, 2),
			m(EndLoopAddrsOffset, 2, 3, 2),
			m(StartAddrsOffset, 0, 0, 4),
			m(EndAddrsOffset, 1, 1, 4),
			m(StartLoopAddrsOffset, 2, 3, 4),
			m(EndLoopAddrsOffset, 3, 2, 4),
			m(EndAddrsOffset, 1, 2, 8),
			m(EndLoopAddrsOffset, 2, 3, 8),
		];
		assert_eq!(cleaned.len(), 14);
		assert_eq!(cleaned, expected);
	}

	#[test]
	fn test_amount_not_part_of_identity() {
		let a = m(Pan, 0x028a, 0, 500);
		let b = m(Pan, 0x028a, 0, -500);
		assert!(a.identical_to(&b));
		let mut c = b;
		c.transform = Transform::Absolute;
		assert!(!a.identical_to(&c));

		// instrument override of a default replaces it
		let cleaned = clean_modulators(&[a], &[], &[b], &[], &[]);
		assert_eq!(cleaned, vec![b]);
		// but a preset modulator doesn't
		let cleaned = clean_modulators(&[a], &[], &[], &[], &[b]);
		assert_eq!(cleaned, vec![a, b]);
	}

	#[test]
	fn test_default_modulator_encoding() {
		let defaults = default_modulators();
		let sources: Vec<u16> = defaults.iter().map(|d| d.source.0).collect();
		assert_eq!(
			sources,
			vec![0x0502, 0x0102, 0x000d, 0x0081, 0x0587, 0x028a, 0x058b, 0x00db, 0x00dd, 0x020e]
		);
		assert_eq!(defaults[9].amount_source.0, 0x0010);
		assert_eq!(defaults[9].destination_generator(), Some(FineTune));
	}

	#[test]
	fn test_modulator_type_bits() {
		let t = ModulatorType(0x0587);
		assert_eq!(t.source_index(), 7);
		assert!(t.is_cc());
		assert!(t.direction());
		assert!(!t.polarity());
		assert_eq!(t.continuity(), Some(Continuity::Concave));
		assert_eq!(t.source(), None);

		let mut t = ModulatorType(0);
		t.set_source(ModulatorSource::PitchWheel);
		t.set_polarity(true);
		assert_eq!(t.0, 0x020e);
		t.set_continuity(Continuity::Switch);
		assert_eq!(t.0, 0x0e0e);
		t.set_polarity(false);
		t.set_source_index(0xff);
		assert_eq!(t.0, 0x0c7f);
		assert_eq!(ModulatorType(0xfc00).continuity(), None);
	}
}
