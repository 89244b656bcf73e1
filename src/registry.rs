use crate::error::OpenError;
use crate::soundfont::SoundFont;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loaded soundfonts by name (the file stem: "FluidR3_GM" for "FluidR3_GM.sf2").
/// Owned by whoever needs it; there is no global instance.
#[derive(Default)]
pub struct Registry {
	fonts: BTreeMap<String, Arc<SoundFont>>,
}

/// why one file couldn't be loaded
#[derive(Debug)]
pub struct LoadFailure {
	pub path: PathBuf,
	pub error: OpenError,
}

pub fn font_name(path: &Path) -> String {
	path.file_stem()
		.map(|s| s.to_string_lossy().to_string())
		.unwrap_or_else(|| path.display().to_string())
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Loads all the files in parallel, one thread each.
	/// A file that fails doesn't stop the others, and never shows up in the registry.
	/// Returns the names of the soundfonts that were added, and the failures.
	pub fn load_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> (Vec<String>, Vec<LoadFailure>) {
		let results: Vec<(PathBuf, Result<SoundFont, OpenError>)> = std::thread::scope(|scope| {
			let handles: Vec<_> = paths
				.iter()
				.map(|path| {
					let path: &Path = path.as_ref();
					(path.to_path_buf(), scope.spawn(move || SoundFont::open(path)))
				})
				.collect();
			handles
				.into_iter()
				.map(|(path, handle)| {
					let result = handle.join().unwrap_or_else(|_| {
						Err(OpenError::IO(std::io::Error::new(
							std::io::ErrorKind::Other,
							"loader thread panicked",
						)))
					});
					(path, result)
				})
				.collect()
		});

		let mut loaded = vec![];
		let mut failures = vec![];
		for (path, result) in results {
			match result {
				Ok(font) => {
					let name = font_name(&path);
					self.insert(&name, font);
					loaded.push(name);
				}
				Err(error) => {
					log::error!("couldn't load {}: {}", path.display(), error);
					failures.push(LoadFailure { path, error });
				}
			}
		}
		(loaded, failures)
	}

	pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<String, OpenError> {
		let path = path.as_ref();
		let font = SoundFont::open(path)?;
		let name = font_name(path);
		self.insert(&name, font);
		Ok(name)
	}

	/// replaces any soundfont with the same name
	pub fn insert(&mut self, name: &str, font: SoundFont) {
		if self.fonts.insert(name.to_string(), Arc::new(font)).is_some() {
			log::warn!("replaced soundfont {:?}", name);
		}
	}

	pub fn get(&self, name: &str) -> Option<Arc<SoundFont>> {
		self.fonts.get(name).cloned()
	}

	pub fn remove(&mut self, name: &str) -> bool {
		self.fonts.remove(name).is_some()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.fonts.keys().map(|s| s.as_str())
	}

	pub fn len(&self) -> usize {
		self.fonts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fonts.is_empty()
	}
}
