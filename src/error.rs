use thiserror::Error;

/// Failure while opening/parsing a soundfont.
/// Any of these aborts loading of that file; nothing partial is handed out.
#[derive(Debug, Error)]
pub enum OpenError {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	/// not a (supported) soundfont at all: bad RIFF header, wrong form type,
	/// size mismatch, .sf3/.sfz extension...
	#[error("not a sound font: {0}")]
	Format(String),
	/// looks like a soundfont, but the preset/instrument/zone layout is broken.
	#[error("bad sound font file: {0}")]
	Malformed(String),
}

#[derive(Debug, Error)]
pub enum LookupError {
	#[error("no bank {0}")]
	NoBank(u16),
	#[error("bank {bank} has no preset {preset}")]
	NoPreset { bank: u16, preset: u16 },
}

#[derive(Debug, Error)]
pub enum SampleError {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
}

pub(crate) fn format_error(s: impl Into<String>) -> OpenError {
	OpenError::Format(s.into())
}

pub(crate) fn bad_sound_font(s: impl Into<String>) -> OpenError {
	OpenError::Malformed(s.into())
}
