/// Generators and the generator override cascade.
///
/// A voice's parameters come from four generator lists:
///  global instrument zone, local instrument zone (absolute values),
///  global preset zone, local preset zone (offsets added on top).
/// see `apply_generators` for the exact precedence.
use crate::riff::{read_u16, Record};
use std::collections::BTreeMap;
use std::io::Read;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum GeneratorType {
	StartAddrsOffset = 0,
	EndAddrsOffset = 1,
	StartLoopAddrsOffset = 2,
	EndLoopAddrsOffset = 3,
	StartAddrsCoarseOffset = 4,
	ModLfoToPitch = 5,
	VibLfoToPitch = 6,
	ModEnvToPitch = 7,
	InitialFilterFc = 8,
	InitialFilterQ = 9,
	ModLfoToFilterFc = 10,
	ModEnvToFilterFc = 11,
	EndAddrsCoarseOffset = 12,
	ModLfoToVolume = 13,
	Unused1 = 14,
	ChorusEffectsSend = 15,
	ReverbEffectsSend = 16,
	Pan = 17,
	Unused2 = 18,
	Unused3 = 19,
	Unused4 = 20,
	DelayModLfo = 21,
	FreqModLfo = 22,
	DelayVibLfo = 23,
	FreqVibLfo = 24,
	DelayModEnv = 25,
	AttackModEnv = 26,
	HoldModEnv = 27,
	DecayModEnv = 28,
	SustainModEnv = 29,
	ReleaseModEnv = 30,
	KeynumToModEnvHold = 31,
	KeynumToModEnvDecay = 32,
	DelayVolEnv = 33,
	AttackVolEnv = 34,
	HoldVolEnv = 35,
	DecayVolEnv = 36,
	SustainVolEnv = 37,
	ReleaseVolEnv = 38,
	KeynumToVolEnvHold = 39,
	KeynumToVolEnvDecay = 40,
	Instrument = 41,
	Reserved1 = 42,
	KeyRange = 43,
	VelRange = 44,
	StartLoopAddrsCoarseOffset = 45,
	Keynum = 46,
	Velocity = 47,
	InitialAttenuation = 48,
	Reserved2 = 49,
	EndLoopAddrsCoarseOffset = 50,
	CoarseTune = 51,
	FineTune = 52,
	SampleID = 53,
	SampleModes = 54,
	Reserved3 = 55,
	ScaleTuning = 56,
	ExclusiveClass = 57,
	OverridingRootKey = 58,
	Unused5 = 59,
	EndOper = 60,
}

/// number of generator slots a voice has (everything before EndOper)
pub const GENERATOR_COUNT: usize = GeneratorType::EndOper as usize;

/// `{min, max, default}` of a generator, in its native units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneratorInfo {
	pub min: i32,
	pub max: i32,
	pub default: i32,
}

const fn info(min: i32, max: i32, default: i32) -> GeneratorInfo {
	GeneratorInfo { min, max, default }
}

impl GeneratorType {
	const ALL: [GeneratorType; 61] = {
		use GeneratorType::*;
		[
			StartAddrsOffset, EndAddrsOffset, StartLoopAddrsOffset, EndLoopAddrsOffset,
			StartAddrsCoarseOffset, ModLfoToPitch, VibLfoToPitch, ModEnvToPitch, InitialFilterFc,
			InitialFilterQ, ModLfoToFilterFc, ModEnvToFilterFc, EndAddrsCoarseOffset, ModLfoToVolume,
			Unused1, ChorusEffectsSend, ReverbEffectsSend, Pan, Unused2, Unused3, Unused4, DelayModLfo,
			FreqModLfo, DelayVibLfo, FreqVibLfo, DelayModEnv, AttackModEnv, HoldModEnv, DecayModEnv,
			SustainModEnv, ReleaseModEnv, KeynumToModEnvHold, KeynumToModEnvDecay, DelayVolEnv,
			AttackVolEnv, HoldVolEnv, DecayVolEnv, SustainVolEnv, ReleaseVolEnv, KeynumToVolEnvHold,
			KeynumToVolEnvDecay, Instrument, Reserved1, KeyRange, VelRange, StartLoopAddrsCoarseOffset,
			Keynum, Velocity, InitialAttenuation, Reserved2, EndLoopAddrsCoarseOffset, CoarseTune,
			FineTune, SampleID, SampleModes, Reserved3, ScaleTuning, ExclusiveClass, OverridingRootKey,
			Unused5, EndOper,
		]
	};

	/// `None` for anything past EndOper.
	pub fn from_u16(value: u16) -> Option<Self> {
		Self::ALL.get(value as usize).copied()
	}

	/// reserved/unused slots (and EndOper) can't be set by anything.
	pub fn is_not_allowed(self) -> bool {
		use GeneratorType::*;
		matches!(
			self,
			Unused1 | Unused2 | Unused3 | Unused4 | Unused5 | Reserved1 | Reserved2 | Reserved3 | EndOper
		)
	}

	/// generators that are consumed once while loading/choosing zones,
	/// rather than being a per-voice value.
	pub fn is_non_real_time(self) -> bool {
		use GeneratorType::*;
		matches!(
			self,
			Instrument
				| KeyRange | VelRange
				| Keynum | Velocity
				| SampleID | SampleModes
				| ScaleTuning | ExclusiveClass
				| OverridingRootKey
		)
	}

	/// generators only an instrument zone may set (SoundFont 2.04, 8.1.3).
	pub fn is_instrument_only(self) -> bool {
		use GeneratorType::*;
		matches!(
			self,
			StartAddrsOffset
				| EndAddrsOffset
				| StartLoopAddrsOffset
				| EndLoopAddrsOffset
				| StartAddrsCoarseOffset
				| EndAddrsCoarseOffset
				| StartLoopAddrsCoarseOffset
				| EndLoopAddrsCoarseOffset
				| Keynum | Velocity
				| SampleModes | ExclusiveClass
				| OverridingRootKey
		)
	}

	/// amount is a (low, high) byte pair rather than a number
	pub fn is_range(self) -> bool {
		matches!(self, GeneratorType::KeyRange | GeneratorType::VelRange)
	}

	pub fn info(self) -> GeneratorInfo {
		use GeneratorType::*;
		match self {
			// ranges for the address offsets depend on the sample
			StartAddrsOffset | EndAddrsOffset | StartLoopAddrsOffset | EndLoopAddrsOffset
			| StartAddrsCoarseOffset | EndAddrsCoarseOffset | StartLoopAddrsCoarseOffset
			| EndLoopAddrsCoarseOffset => info(0, 0, 0),
			ModLfoToPitch | VibLfoToPitch | ModEnvToPitch => info(-12000, 12000, 0),
			InitialFilterFc => info(1500, 13500, 13500),
			InitialFilterQ => info(0, 960, 0),
			ModLfoToFilterFc | ModEnvToFilterFc => info(-12000, 12000, 0),
			ModLfoToVolume => info(-960, 960, 0),
			ChorusEffectsSend | ReverbEffectsSend => info(0, 1000, 0),
			Pan => info(-500, 500, 0),
			DelayModLfo | DelayVibLfo => info(-12000, 5000, -12000),
			FreqModLfo | FreqVibLfo => info(-16000, 4500, 0),
			DelayModEnv | HoldModEnv | DelayVolEnv | HoldVolEnv => info(-12000, 5000, -12000),
			AttackModEnv | DecayModEnv | ReleaseModEnv => info(-12000, 8000, -12000),
			AttackVolEnv | DecayVolEnv | ReleaseVolEnv => info(-12000, 8000, -12000),
			SustainModEnv => info(0, 1000, 0),
			SustainVolEnv => info(0, 1440, 0),
			KeynumToModEnvHold | KeynumToModEnvDecay => info(-1200, 1200, 0),
			KeynumToVolEnvHold | KeynumToVolEnvDecay => info(-1200, 1200, 0),
			// 0..=127 in both bytes
			KeyRange | VelRange => info(0, 127, 0x7f00),
			Keynum | Velocity | OverridingRootKey => info(0, 127, -1),
			InitialAttenuation => info(0, 1440, 0),
			CoarseTune => info(-120, 120, 0),
			FineTune => info(-99, 99, 0),
			// bit flags
			SampleModes => info(0, 3, 0),
			ScaleTuning => info(0, 1200, 100),
			ExclusiveClass => info(1, 127, 0),
			Instrument | SampleID => info(0, 0, 0),
			Unused1 | Unused2 | Unused3 | Unused4 | Unused5 | Reserved1 | Reserved2 | Reserved3
			| EndOper => info(0, 0, 0),
		}
	}
}

/// A raw 16-bit generator amount.
/// The same bits are read as unsigned, signed, or a (low, high) byte range
/// depending on the generator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GenAmount(pub u16);

impl GenAmount {
	pub fn from_signed(value: i16) -> Self {
		GenAmount(value as u16)
	}

	pub fn from_range(low: u8, high: u8) -> Self {
		GenAmount(u16::from_le_bytes([low, high]))
	}

	pub fn as_unsigned(self) -> u16 {
		self.0
	}

	pub fn as_signed(self) -> i16 {
		self.0 as i16
	}

	/// `(low, high)`: the low byte comes first in the file.
	pub fn as_range(self) -> (u8, u8) {
		let [low, high] = self.0.to_le_bytes();
		(low, high)
	}

	/// format-native offset: plain wrapping 16-bit addition.
	pub fn offset_by(self, other: GenAmount) -> GenAmount {
		GenAmount(self.0.wrapping_add(other.0))
	}
}

/// pgen / igen record.
/// `oper` stays raw since files may contain values we don't know about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Generator {
	pub oper: u16,
	pub amount: GenAmount,
}

impl Generator {
	pub fn new(kind: GeneratorType, amount: u16) -> Self {
		Generator {
			oper: kind as u16,
			amount: GenAmount(amount),
		}
	}

	pub fn signed(kind: GeneratorType, amount: i16) -> Self {
		Self::new(kind, amount as u16)
	}

	pub fn kind(&self) -> Option<GeneratorType> {
		GeneratorType::from_u16(self.oper)
	}

	pub fn is(&self, kind: GeneratorType) -> bool {
		self.oper == kind as u16
	}
}

impl Record for Generator {
	const SIZE: u32 = 4;
	fn read<R: Read>(f: &mut R) -> std::io::Result<Self> {
		Ok(Generator {
			oper: read_u16(f)?,
			amount: GenAmount(read_u16(f)?),
		})
	}
}

impl std::fmt::Display for Generator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
		match self.kind() {
			Some(kind) if kind.is_range() => {
				let (low, high) = self.amount.as_range();
				write!(f, "{:?} = {}..={}", kind, low, high)
			}
			Some(kind) => write!(f, "{:?} = {}", kind, self.amount.as_signed()),
			None => write!(f, "Generator#{} = {}", self.oper, self.amount.as_unsigned()),
		}
	}
}

/// One synthesis parameter of a voice.
/// `modulation` is what modulators add at run time, on top of the resolved base value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SynthParam {
	pub base: GenAmount,
	pub modulation: f32,
}

impl SynthParam {
	pub fn signed_total(&self) -> f32 {
		self.base.as_signed() as f32 + self.modulation
	}

	pub fn unsigned_total(&self) -> f32 {
		self.base.as_unsigned() as f32 + self.modulation
	}
}

/// Per-voice parameter table, one slot per generator type.
#[derive(Clone, Debug, PartialEq)]
pub struct SynthParams {
	params: [SynthParam; GENERATOR_COUNT],
}

impl SynthParams {
	/// every generator at its default value
	pub fn defaults() -> Self {
		let mut params = [SynthParam::default(); GENERATOR_COUNT];
		for (i, param) in params.iter_mut().enumerate() {
			if let Some(kind) = GeneratorType::from_u16(i as u16) {
				// negative defaults wrap to their 16-bit pattern, e.g. -1 => 0xffff
				param.base = GenAmount(kind.info().default as u16);
			}
		}
		SynthParams { params }
	}

	pub fn get(&self, kind: GeneratorType) -> Option<&SynthParam> {
		self.params.get(kind as usize)
	}

	pub fn get_mut(&mut self, kind: GeneratorType) -> Option<&mut SynthParam> {
		self.params.get_mut(kind as usize)
	}

	pub fn iter(&self) -> impl Iterator<Item = (GeneratorType, &SynthParam)> {
		self.params
			.iter()
			.enumerate()
			.filter_map(|(i, p)| GeneratorType::from_u16(i as u16).map(|kind| (kind, p)))
	}
}

impl std::ops::Index<GeneratorType> for SynthParams {
	type Output = SynthParam;
	/// panics on EndOper, which has no slot.
	fn index(&self, kind: GeneratorType) -> &SynthParam {
		&self.params[kind as usize]
	}
}

impl Default for SynthParams {
	fn default() -> Self {
		Self::defaults()
	}
}

/// generator kind if it may be applied to a live voice, otherwise log why not.
fn real_time_kind(generator: &Generator, in_preset: bool) -> Option<GeneratorType> {
	let kind = match generator.kind() {
		Some(kind) if !kind.is_not_allowed() => kind,
		_ => {
			log::debug!("generator {} is not allowed", generator.oper);
			return None;
		}
	};
	if kind.is_non_real_time() {
		log::debug!("generator {:?} is not a real-time generator", kind);
		return None;
	}
	if in_preset && kind.is_instrument_only() {
		log::debug!("generator {:?} is not allowed in a preset", kind);
		return None;
	}
	Some(kind)
}

/// Resolves the four generator lists of a voice into `params`.
///
/// instrument generators *replace* the current value (local after global, so local wins);
/// preset generators are *added* to it. a local preset generator replaces the global
/// preset generator of the same type instead of stacking with it.
/// disallowed / non-real-time generators are skipped.
pub fn apply_generators(
	params: &mut SynthParams,
	global_instrument: &[Generator],
	local_instrument: &[Generator],
	global_preset: &[Generator],
	local_preset: &[Generator],
) {
	for generator in global_instrument.iter().chain(local_instrument) {
		if let Some(kind) = real_time_kind(generator, false) {
			if let Some(param) = params.get_mut(kind) {
				param.base = generator.amount;
			}
		}
	}

	let mut preset_offsets: BTreeMap<GeneratorType, GenAmount> = BTreeMap::new();
	for generator in global_preset {
		if let Some(kind) = real_time_kind(generator, true) {
			preset_offsets.insert(kind, generator.amount);
		}
	}

	for generator in local_preset {
		if let Some(kind) = real_time_kind(generator, true) {
			if let Some(param) = params.get_mut(kind) {
				param.base = param.base.offset_by(generator.amount);
			}
			preset_offsets.remove(&kind);
		}
	}

	for (kind, offset) in preset_offsets {
		if let Some(param) = params.get_mut(kind) {
			param.base = param.base.offset_by(offset);
		}
	}
}

/// Defaults with the cascade applied.
pub fn resolve_generators(
	global_instrument: &[Generator],
	local_instrument: &[Generator],
	global_preset: &[Generator],
	local_preset: &[Generator],
) -> SynthParams {
	let mut params = SynthParams::defaults();
	apply_generators(
		&mut params,
		global_instrument,
		local_instrument,
		global_preset,
		local_preset,
	);
	params
}
