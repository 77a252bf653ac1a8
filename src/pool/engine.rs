//! The compression capability run inside each execution unit
//!
//! The pool treats an engine as an opaque `bytes -> bytes` transformation that
//! must be initialized once before use. Each unit builds its own instance
//! through an [`EngineFactory`], so engines never share state across units.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::sync::Arc;

/// A synchronous, possibly failing document transformation
pub trait CompressionEngine: Send {
    /// One-time setup. Called at most once per successful initialization.
    fn initialize(&mut self) -> Result<()>;

    /// Transform `input` into its compressed form
    fn transform(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// Builds one engine per execution unit; receives the slot index
pub type EngineFactory = Arc<dyn Fn(usize) -> Box<dyn CompressionEngine> + Send + Sync>;

/// Gzip engine backed by flate2
#[derive(Debug, Clone)]
pub struct GzipEngine {
    level: u32,
    loaded: bool,
}

impl GzipEngine {
    /// Suffix appended to files produced by this engine
    pub const EXTENSION: &'static str = "gz";

    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
            loaded: false,
        }
    }

    /// Factory producing a fresh gzip engine for every unit
    pub fn factory(level: u32) -> EngineFactory {
        Arc::new(move |_slot| Box::new(GzipEngine::new(level)) as Box<dyn CompressionEngine>)
    }
}

impl CompressionEngine for GzipEngine {
    fn initialize(&mut self) -> Result<()> {
        self.loaded = true;
        Ok(())
    }

    fn transform(&self, input: &[u8]) -> Result<Vec<u8>> {
        if !self.loaded {
            anyhow::bail!("gzip engine used before initialization");
        }

        let mut encoder = GzEncoder::new(
            Vec::with_capacity(input.len() / 2),
            Compression::new(self.level),
        );
        encoder
            .write_all(input)
            .context("Failed to feed input to gzip encoder")?;
        encoder.finish().context("Failed to finish gzip stream")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_gzip_engine_output_decodes_to_input() {
        let mut engine = GzipEngine::new(6);
        engine.initialize().unwrap();

        let input = b"%PDF-1.7 lorem ipsum lorem ipsum lorem ipsum".repeat(20);
        let output = engine.transform(&input).unwrap();
        assert!(output.len() < input.len());

        let mut decoded = Vec::new();
        GzDecoder::new(output.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn test_gzip_engine_requires_initialization() {
        let engine = GzipEngine::new(6);
        let err = engine.transform(b"data").unwrap_err();
        assert!(err.to_string().contains("before initialization"));
    }

    #[test]
    fn test_level_is_clamped() {
        let engine = GzipEngine::new(42);
        assert_eq!(engine.level, 9);
    }
}
