/// Everything a synthesizer needs to start playing a note:
/// which samples, with which parameters and modulators.
use crate::generator::{resolve_generators, Generator, SynthParams};
use crate::modulator::{clean_modulators, default_modulators, Modulator};
use crate::soundfont::{InstrumentZone, Preset, PresetZone, Sample};
use crate::zone::Zone;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct VoiceParameters {
	pub sample: Arc<Sample>,
	pub key: u8,
	pub velocity: u8,
	pub params: SynthParams,
	pub modulators: Vec<Modulator>,
}

fn generators_of<L>(zone: Option<&Zone<L>>) -> &[Generator] {
	match zone {
		Some(z) => &z.generators,
		None => &[],
	}
}

fn modulators_of<L>(zone: Option<&Zone<L>>) -> &[Modulator] {
	match zone {
		Some(z) => &z.modulators,
		None => &[],
	}
}

/// Resolves one (preset zone, instrument zone) pair into voice parameters.
/// `preset_zone` must belong to `preset`, and `instrument_zone` to `preset_zone`'s instrument,
/// since their global zones take part.
pub fn build_voice_parameters(
	preset: &Preset,
	preset_zone: &PresetZone,
	instrument_zone: &InstrumentZone,
	key: u8,
	velocity: u8,
) -> VoiceParameters {
	let instrument_global = preset_zone.link.global.as_ref();
	let preset_global = preset.global.as_ref();
	let params = resolve_generators(
		generators_of(instrument_global),
		&instrument_zone.generators,
		generators_of(preset_global),
		&preset_zone.generators,
	);
	let modulators = clean_modulators(
		&default_modulators(),
		modulators_of(instrument_global),
		&instrument_zone.modulators,
		modulators_of(preset_global),
		&preset_zone.modulators,
	);
	VoiceParameters {
		sample: instrument_zone.link.clone(),
		key,
		velocity,
		params,
		modulators,
	}
}

/// One voice for each (preset zone, instrument zone) pair whose ranges contain the note.
/// can be empty, or have several voices (stereo pairs, layered sounds).
pub fn note_on(preset: &Preset, key: u8, velocity: u8) -> Vec<VoiceParameters> {
	let mut voices = vec![];
	for pzone in preset.zones.iter() {
		if !pzone.contains(preset.global.as_ref(), key, velocity) {
			continue;
		}
		let instrument = &pzone.link;
		for izone in instrument.zones.iter() {
			if izone.contains(instrument.global.as_ref(), key, velocity) {
				voices.push(build_voice_parameters(preset, pzone, izone, key, velocity));
			}
		}
	}
	if voices.is_empty() {
		log::debug!("{}: nothing to play for key {} velocity {}", preset.name, key, velocity);
	}
	voices
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fixtures::Sf2Builder;
	use crate::generator::GeneratorType::{self, *};
	use crate::modulator::{ModulatorType, Transform};
	use crate::soundfont::SoundFont;
	use std::io::Cursor;

	fn font() -> SoundFont<Cursor<Vec<u8>>> {
		let mut sf = Sf2Builder::new("Layers");
		sf.sample("left", 0, 8);
		sf.sample("right", 8, 16);
		sf.sample("soft", 16, 24);
		sf.instrument(
			"strings",
			vec![
				vec![(VelRange, 0x7f40), (InitialAttenuation, 30)],
				vec![(Pan, (-500i16) as u16), (SampleID, 0)],
				vec![(Pan, 500), (SampleID, 1)],
				vec![(VelRange, 0x3f00), (InitialAttenuation, 100), (SampleID, 2)],
			],
		);
		sf.preset(
			"Strings",
			48,
			0,
			vec![
				vec![(CoarseTune, 2)],
				vec![(KeyRange, 0x6024), (InitialAttenuation, 10), (Instrument, 0)],
			],
		);
		sf.instrument_modulator(
			0,
			1,
			Modulator::new(ModulatorType(0x0502), InitialAttenuation, 480, ModulatorType(0), Transform::Linear),
		);
		sf.preset_modulator(
			0,
			1,
			Modulator::new(ModulatorType(0x00ca), InitialFilterFc, -2400, ModulatorType(0), Transform::Linear),
		);
		SoundFont::load(Cursor::new(sf.build())).unwrap()
	}

	fn base(voice: &VoiceParameters, kind: GeneratorType) -> i16 {
		voice.params[kind].base.as_signed()
	}

	#[test]
	fn test_note_on_layers() {
		let sf = font();
		let preset = sf.preset(0, 48).unwrap();

		// loud: global instrument velocity range picks the stereo pair
		let voices = note_on(preset, 60, 100);
		let names: Vec<&str> = voices.iter().map(|v| v.sample.name.as_str()).collect();
		assert_eq!(names, vec!["left", "right"]);
		assert_eq!(base(&voices[0], Pan), -500);
		assert_eq!(base(&voices[1], Pan), 500);
		// instrument sets, preset adds
		assert_eq!(base(&voices[0], InitialAttenuation), 40);
		assert_eq!(base(&voices[0], CoarseTune), 2);

		// soft: the zone's own velocity range wins over the global one
		let voices = note_on(preset, 60, 20);
		assert_eq!(voices.len(), 1);
		assert_eq!(voices[0].sample.name, "soft");
		assert_eq!(base(&voices[0], InitialAttenuation), 110);
		assert_eq!((voices[0].key, voices[0].velocity), (60, 20));

		// outside the preset zone's key range
		assert!(note_on(preset, 20, 100).is_empty());
	}

	#[test]
	fn test_voice_modulators() {
		let sf = font();
		let preset = sf.preset(0, 48).unwrap();
		let voices = note_on(preset, 60, 100);

		// the left zone overrides the velocity -> attenuation default,
		// the preset's CC74 modulator comes last
		let left = &voices[0].modulators;
		let n = default_modulators().len();
		assert_eq!(left.len(), n + 1);
		assert_eq!(left[n - 1].amount, 480);
		assert_eq!(left[n].source.0, 0x00ca);
		assert!(!left.iter().any(|m| m.amount == 960 && m.source.0 == 0x0502));

		let right = &voices[1].modulators;
		assert_eq!(right[..n], default_modulators());
		assert_eq!(right.len(), n + 1);
	}

	#[test]
	fn test_build_voice_parameters() {
		let sf = font();
		let preset = sf.preset(0, 48).unwrap();
		let pzone = &preset.zones[0];
		let izone = &pzone.link.zones[2];
		let voice = build_voice_parameters(preset, pzone, izone, 90, 10);
		assert_eq!(voice.sample.name, "soft");
		assert_eq!(base(&voice, InitialAttenuation), 110);
		assert_eq!(base(&voice, CoarseTune), 2);
		// untouched generators keep their defaults
		assert_eq!(voice.params[InitialFilterFc].base.as_signed(), 13500);
		// sample ids are not synthesis parameters
		assert_eq!(voice.params[SampleID].base.as_unsigned(), 0);
	}
}
