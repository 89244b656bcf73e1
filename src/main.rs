extern crate chrono;
extern crate rhai;

use sf2voice::generator::SynthParams;
use sf2voice::registry::Registry;
use sf2voice::voice::{note_on, VoiceParameters};
use sf2voice::{Sample, SoundFont};
use std::cell::RefCell;
use std::fs::File;
use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;

type SharedRegistry = Rc<RefCell<Registry>>;

fn flush_stdout() {
	if std::io::stdout().flush().is_err() {
		//who cares
	}
}

fn write_u16_le(file: &mut File, n: u16) -> std::io::Result<()> {
	file.write_all(&u16::to_le_bytes(n))
}
fn write_u32_le(file: &mut File, n: u32) -> std::io::Result<()> {
	file.write_all(&u32::to_le_bytes(n))
}

/// mono 16-bit WAV. `data` is little-endian PCM straight from the smpl chunk.
fn save_wav(filename: &str, data: &[u8], sample_rate: u32) -> std::io::Result<()> {
	let mut file = std::fs::OpenOptions::new()
		.write(true)
		.create_new(true)
		.open(filename)?;
	file.write_all("RIFF".as_bytes())?;
	write_u32_le(&mut file, 36 + data.len() as u32)?; // RIFF chunk size
	file.write_all("WAVEfmt ".as_bytes())?;
	write_u32_le(&mut file, 16)?; // fmt  chunk size
	write_u16_le(&mut file, 1)?; // PCM
	write_u16_le(&mut file, 1)?; // 1 channel
	write_u32_le(&mut file, sample_rate)?;
	write_u32_le(&mut file, sample_rate.saturating_mul(2))?; // "byte rate"
	write_u16_le(&mut file, 2)?; // block align
	write_u16_le(&mut file, 16)?; // bits per sample
	file.write_all("data".as_bytes())?;
	write_u32_le(&mut file, data.len() as u32)?; // data chunk size
	file.write_all(data)?;
	file.sync_all()?;
	Ok(())
}

fn get_font(registry: &SharedRegistry, name: &str) -> Option<Arc<SoundFont>> {
	let font = registry.borrow().get(name);
	if font.is_none() {
		eprintln!("no soundfont named {:?} is loaded", name);
	}
	font
}

/// rhai ints are i64; anything that doesn't fit is an error, not a wraparound.
fn to_u16(x: i64, what: &str) -> Option<u16> {
	match u16::try_from(x) {
		Ok(x) => Some(x),
		Err(_) => {
			eprintln!("{} {} out of range", what, x);
			None
		}
	}
}

fn to_midi(x: i64, what: &str) -> Option<u8> {
	match u8::try_from(x) {
		Ok(x) if x < 128 => Some(x),
		_ => {
			eprintln!("{} {} out of range", what, x);
			None
		}
	}
}

fn load_soundfont(registry: &SharedRegistry, filename: &str) {
	match registry.borrow_mut().load_file(filename) {
		Ok(name) => println!("loaded {} as {:?}", filename, name),
		Err(e) => eprintln!("Couldn't open soundfont {}: {}", filename, e),
	}
}

fn load_soundfonts(registry: &SharedRegistry, filenames: rhai::Array) {
	let filenames: Vec<String> = filenames
		.into_iter()
		.filter_map(|f| match f.into_string() {
			Ok(s) => Some(s),
			Err(t) => {
				eprintln!("Warning: soundfont file names should be strings, not {}.", t);
				None
			}
		})
		.collect();
	let (loaded, failures) = registry.borrow_mut().load_files(&filenames);
	for name in loaded {
		println!("loaded {:?}", name);
	}
	for failure in failures {
		eprintln!("Couldn't open soundfont {}: {}", failure.path.display(), failure.error);
	}
}

fn print_info(registry: &SharedRegistry, name: &str) {
	if let Some(sf) = get_font(registry, name) {
		print!("{}", sf.info);
	}
}

fn print_presets(registry: &SharedRegistry, name: &str) {
	if let Some(sf) = get_font(registry, name) {
		for preset in sf.presets() {
			println!("{:3}:{:3}. {}", preset.bank, preset.preset, preset.name);
		}
	}
}

/// voices `name` would play for a note-on, or None after complaining.
fn voices_for(
	registry: &SharedRegistry,
	name: &str,
	bank: i64,
	preset: i64,
	key: i64,
	vel: i64,
) -> Option<(Arc<SoundFont>, Vec<VoiceParameters>)> {
	let sf = get_font(registry, name)?;
	let bank = to_u16(bank, "bank")?;
	let number = to_u16(preset, "preset")?;
	let key = to_midi(key, "key")?;
	let vel = to_midi(vel, "velocity")?;
	let voices = match sf.preset(bank, number) {
		Ok(preset) => note_on(preset, key, vel),
		Err(e) => {
			eprintln!("{}: {}", name, e);
			return None;
		}
	};
	Some((sf, voices))
}

fn print_voice(voice: &VoiceParameters) {
	let sample: &Sample = &voice.sample;
	println!(
		"sample {:?}: frames {}..{}, loop {}..{}, {} Hz, root key {}",
		sample.name, sample.start, sample.end, sample.loop_start, sample.loop_end, sample.sample_rate, sample.original_pitch
	);
	let defaults = SynthParams::defaults();
	for (kind, param) in voice.params.iter() {
		if param.base != defaults[kind].base {
			println!("\t{:?} = {}", kind, param.base.as_signed());
		}
	}
	for modulator in voice.modulators.iter() {
		println!("\tmod {}", modulator);
	}
}

fn print_voices(registry: &SharedRegistry, name: &str, bank: i64, preset: i64, key: i64, vel: i64) {
	if let Some((_, voices)) = voices_for(registry, name, bank, preset, key, vel) {
		if voices.is_empty() {
			println!("(no voices)");
		}
		for voice in voices.iter() {
			print_voice(voice);
		}
	}
}

fn export_voice_err(sf: &SoundFont, voice: &VoiceParameters) -> Result<String, Box<dyn std::error::Error>> {
	if voice.sample.sample_type.is_rom() {
		return Err(format!("{:?} is a ROM sample, its data is not in this file", voice.sample.sample_type).into());
	}
	let data = sf.sample_data(&voice.sample)?;
	let safe_name: String = voice
		.sample
		.name
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
		.collect();
	let name = format!(
		"{}-{}.wav",
		chrono::Local::now().format("%Y-%m-%d-%H-%M-%S"),
		safe_name
	);
	save_wav(&name, &data, voice.sample.sample_rate)?;
	Ok(name)
}

fn export_voices(registry: &SharedRegistry, name: &str, bank: i64, preset: i64, key: i64, vel: i64) {
	if let Some((sf, voices)) = voices_for(registry, name, bank, preset, key, vel) {
		for voice in voices.iter() {
			print!("Saving {}...", voice.sample.name);
			flush_stdout();
			match export_voice_err(&sf, voice) {
				Ok(filename) => println!("\rSample {} saved to {}", voice.sample.name, filename),
				Err(e) => eprintln!("\rError saving sample {}: {}", voice.sample.name, e),
			}
		}
	}
}

fn call_fn_if_exists(
	engine: &rhai::Engine,
	ast: &rhai::AST,
	this: &mut rhai::Dynamic,
	name: &str,
	args: impl rhai::FuncArgs,
) {
	let mut arg_vec = vec![];
	args.parse(&mut arg_vec);
	let mut scope = rhai::Scope::new();
	match engine
		.call_fn_raw(&mut scope, ast, true, false, name, Some(this), &mut arg_vec)
		.map_err(|e| *e)
	{
		Ok(_) => {}
		Err(rhai::EvalAltResult::ErrorFunctionNotFound(s, _)) if s == name => { /* function not found */
		}
		Err(e) => eprintln!("Warning: rhai error: {}", e),
	}
}

fn main() {
	env_logger::init();

	let registry: SharedRegistry = Rc::new(RefCell::new(Registry::new()));

	let mut engine = rhai::Engine::new();
	engine.set_max_expr_depths(0, 0);
	{
		let r = registry.clone();
		engine.register_fn("sf_load", move |filename: &str| load_soundfont(&r, filename));
	}
	{
		let r = registry.clone();
		engine.register_fn("sf_load_all", move |filenames: rhai::Array| load_soundfonts(&r, filenames));
	}
	{
		let r = registry.clone();
		engine.register_fn("sf_print_info", move |name: &str| print_info(&r, name));
	}
	{
		let r = registry.clone();
		engine.register_fn("sf_print_presets", move |name: &str| print_presets(&r, name));
	}
	{
		let r = registry.clone();
		engine.register_fn(
			"sf_print_voice",
			move |name: &str, bank: i64, preset: i64, key: i64, vel: i64| print_voices(&r, name, bank, preset, key, vel),
		);
	}
	{
		let r = registry.clone();
		engine.register_fn(
			"sf_export_voice",
			move |name: &str, bank: i64, preset: i64, key: i64, vel: i64| export_voices(&r, name, bank, preset, key, vel),
		);
	}
	engine.register_fn("sf_print", |s: &str| {
		print!("{s}");
		flush_stdout();
	});

	let engine = engine; // de-multablify
	let args: Vec<String> = std::env::args().collect();
	let config_filename = match args.len() {
		0 | 1 => "config.rhai",
		2 => &args[1],
		_ => {
			eprintln!("Usage: {} [config file]", args[0]);
			return;
		}
	};
	let ast = match engine.compile_file(config_filename.into()) {
		Ok(x) => x,
		Err(e) => {
			eprintln!("Config error: {}", e);
			return;
		}
	};

	if let Err(e) = engine.run_ast(&ast) {
		eprintln!(
			"Error running top-level statements in {}: {}",
			config_filename, e
		);
		return;
	}

	let mut this = rhai::Dynamic::from(rhai::Map::new());
	call_fn_if_exists(&engine, &ast, &mut this, "sf_start", ());

	log::debug!("{} soundfonts loaded at exit", registry.borrow().len());
}
