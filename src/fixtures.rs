/// In-memory sf2 files for tests.
use crate::generator::GeneratorType;
use crate::modulator::Modulator;

fn put_u16(out: &mut Vec<u8>, x: u16) {
	out.extend_from_slice(&x.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, x: u32) {
	out.extend_from_slice(&x.to_le_bytes());
}

fn put_name(out: &mut Vec<u8>, name: &str) {
	let mut bytes = name.as_bytes().to_vec();
	bytes.resize(20, 0);
	out.extend_from_slice(&bytes);
}

fn put_chunk(out: &mut Vec<u8>, id: &str, data: &[u8]) {
	out.extend_from_slice(id.as_bytes());
	put_u32(out, data.len() as u32);
	out.extend_from_slice(data);
	if data.len() % 2 != 0 {
		out.push(0);
	}
}

/// NUL-terminated, padded to an even length
fn zstr(s: &str) -> Vec<u8> {
	let mut bytes = s.as_bytes().to_vec();
	bytes.push(0);
	if bytes.len() % 2 != 0 {
		bytes.push(0);
	}
	bytes
}

pub struct ListBuilder {
	body: Vec<u8>,
}

impl ListBuilder {
	pub fn chunk(&mut self, id: &str, data: &[u8]) {
		put_chunk(&mut self.body, id, data);
	}
}

/// RIFF sfbk with arbitrary LISTs.
pub struct RiffBuilder {
	body: Vec<u8>,
}

impl RiffBuilder {
	pub fn new() -> Self {
		RiffBuilder { body: b"sfbk".to_vec() }
	}

	pub fn list(&mut self, kind: &str, fill: impl FnOnce(&mut ListBuilder)) {
		let mut list = ListBuilder {
			body: kind.as_bytes().to_vec(),
		};
		fill(&mut list);
		put_chunk(&mut self.body, "LIST", &list.body);
	}

	pub fn finish(self) -> Vec<u8> {
		let mut out = b"RIFF".to_vec();
		put_u32(&mut out, self.body.len() as u32);
		out.extend_from_slice(&self.body);
		out
	}
}

struct Zone {
	generators: Vec<(GeneratorType, u16)>,
	modulators: Vec<Modulator>,
}

struct Entry {
	name: String,
	number: u16,
	bank: u16,
	zones: Vec<Zone>,
}

/// Builds a complete, valid sf2 file out of samples, instruments and presets.
/// Zones are given as generator lists, in file order.
pub struct Sf2Builder {
	name: String,
	samples: Vec<(String, u32, u32)>,
	instruments: Vec<Entry>,
	presets: Vec<Entry>,
	skipped: Vec<String>,
}

/// PCM byte `i` of the smpl chunk
pub fn sample_byte(i: usize) -> u8 {
	(i % 251) as u8
}

fn zones(generators: Vec<Vec<(GeneratorType, u16)>>) -> Vec<Zone> {
	generators
		.into_iter()
		.map(|generators| Zone {
			generators,
			modulators: vec![],
		})
		.collect()
}

impl Sf2Builder {
	pub fn new(name: &str) -> Self {
		Sf2Builder {
			name: name.to_string(),
			samples: vec![],
			instruments: vec![],
			presets: vec![],
			skipped: vec![],
		}
	}

	/// `start`/`end` in frames
	pub fn sample(&mut self, name: &str, start: u32, end: u32) {
		self.samples.push((name.to_string(), start, end));
	}

	pub fn instrument(&mut self, name: &str, generators: Vec<Vec<(GeneratorType, u16)>>) {
		self.instruments.push(Entry {
			name: name.to_string(),
			number: 0,
			bank: 0,
			zones: zones(generators),
		});
	}

	pub fn preset(&mut self, name: &str, number: u16, bank: u16, generators: Vec<Vec<(GeneratorType, u16)>>) {
		self.presets.push(Entry {
			name: name.to_string(),
			number,
			bank,
			zones: zones(generators),
		});
	}

	pub fn instrument_modulator(&mut self, instrument: usize, zone: usize, modulator: Modulator) {
		self.instruments[instrument].zones[zone].modulators.push(modulator);
	}

	pub fn preset_modulator(&mut self, preset: usize, zone: usize, modulator: Modulator) {
		self.presets[preset].zones[zone].modulators.push(modulator);
	}

	/// leave a pdta subchunk out entirely
	pub fn skip_chunk(&mut self, id: &str) {
		self.skipped.push(id.to_string());
	}

	fn sample_frames(&self) -> u32 {
		self.samples.iter().map(|s| s.2).max().unwrap_or(0)
	}

	/// (headers, bags, modulators, generators)
	fn hierarchy(entries: &[Entry], preset: bool, terminal: &str) -> [Vec<u8>; 4] {
		let (mut hdr, mut bag, mut modu, mut gen_) = (vec![], vec![], vec![], vec![]);
		let (mut bag_count, mut gen_count, mut mod_count) = (0u16, 0u16, 0u16);
		let put_header = |hdr: &mut Vec<u8>, name: &str, number: u16, bank: u16, bag_index: u16| {
			put_name(hdr, name);
			if preset {
				put_u16(hdr, number);
				put_u16(hdr, bank);
				put_u16(hdr, bag_index);
				put_u32(hdr, 0);
				put_u32(hdr, 0);
				put_u32(hdr, 0);
			} else {
				put_u16(hdr, bag_index);
			}
		};
		for entry in entries {
			put_header(&mut hdr, &entry.name, entry.number, entry.bank, bag_count);
			for zone in &entry.zones {
				put_u16(&mut bag, gen_count);
				put_u16(&mut bag, mod_count);
				bag_count += 1;
				for (kind, amount) in &zone.generators {
					put_u16(&mut gen_, *kind as u16);
					put_u16(&mut gen_, *amount);
					gen_count += 1;
				}
				for m in &zone.modulators {
					put_u16(&mut modu, m.source.0);
					put_u16(&mut modu, m.destination);
					put_u16(&mut modu, m.amount as u16);
					put_u16(&mut modu, m.amount_source.0);
					put_u16(&mut modu, m.transform.to_u16());
					mod_count += 1;
				}
			}
		}
		put_header(&mut hdr, terminal, 0xff, 0xff, bag_count);
		put_u16(&mut bag, gen_count);
		put_u16(&mut bag, mod_count);
		modu.extend_from_slice(&[0; 10]);
		gen_.extend_from_slice(&[0; 4]);
		[hdr, bag, modu, gen_]
	}

	pub fn build(&self) -> Vec<u8> {
		let [phdr, pbag, pmod, pgen] = Self::hierarchy(&self.presets, true, "EOP");
		let [inst, ibag, imod, igen] = Self::hierarchy(&self.instruments, false, "EOI");

		let mut shdr = vec![];
		let mut put_sample = |name: &str, start: u32, end: u32| {
			put_name(&mut shdr, name);
			put_u32(&mut shdr, start);
			put_u32(&mut shdr, end);
			put_u32(&mut shdr, start);
			put_u32(&mut shdr, end);
			put_u32(&mut shdr, 44100);
			shdr.push(60);
			shdr.push(0);
			put_u16(&mut shdr, 0);
			put_u16(&mut shdr, 1);
		};
		for (name, start, end) in &self.samples {
			put_sample(name, *start, *end);
		}
		put_sample("EOS", 0, 0);

		let smpl: Vec<u8> = (0..2 * self.sample_frames() as usize).map(sample_byte).collect();

		let mut riff = RiffBuilder::new();
		riff.list("INFO", |l| {
			l.chunk("ifil", &[2, 0, 1, 0]);
			l.chunk("INAM", &zstr(&self.name));
		});
		riff.list("sdta", |l| l.chunk("smpl", &smpl));
		riff.list("pdta", |l| {
			let pdta = [
				("phdr", &phdr),
				("pbag", &pbag),
				("pmod", &pmod),
				("pgen", &pgen),
				("inst", &inst),
				("ibag", &ibag),
				("imod", &imod),
				("igen", &igen),
				("shdr", &shdr),
			];
			for (id, data) in pdta {
				if !self.skipped.iter().any(|s| s == id) {
					l.chunk(id, data);
				}
			}
		});
		riff.finish()
	}
}
