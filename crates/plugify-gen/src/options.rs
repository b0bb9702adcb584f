//! Generator options

use crate::error::{GenError, GenResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CALLBACK_SLOTS: usize = 16;
pub const MAX_CALLBACK_SLOTS: usize = 256;

/// Options controlling a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorOptions {
    /// Emit object-style wrappers (declared and synthesized classes)
    #[serde(default = "default_generate_classes")]
    pub generate_classes: bool,

    /// Trampolines generated per callback type; bounds concurrent registrations
    #[serde(default = "default_callback_slots")]
    pub callback_slots: usize,
}

fn default_generate_classes() -> bool {
    true
}

fn default_callback_slots() -> usize {
    DEFAULT_CALLBACK_SLOTS
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            generate_classes: default_generate_classes(),
            callback_slots: default_callback_slots(),
        }
    }
}

impl GeneratorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classes(mut self, generate_classes: bool) -> Self {
        self.generate_classes = generate_classes;
        self
    }

    pub fn with_callback_slots(mut self, slots: usize) -> Self {
        self.callback_slots = slots;
        self
    }

    /// Parse options from JSON bytes. Empty input yields the defaults.
    pub fn from_json(bytes: &[u8]) -> GenResult<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let options: Self =
            serde_json::from_slice(bytes).map_err(|e| GenError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> GenResult<()> {
        if !(1..=MAX_CALLBACK_SLOTS).contains(&self.callback_slots) {
            return Err(GenError::InvalidOptions(format!(
                "callbackSlots must be between 1 and {MAX_CALLBACK_SLOTS}, got {}",
                self.callback_slots
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "options/options_tests.rs"]
mod options_tests;
