//! Cross-section lookup and luminosity scaling

use std::collections::BTreeMap;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{CrossSection, Luminosity, Rate};

/// Per-process normalization: a cross-section (pb) or, for processes whose
/// rate does not scale with luminosity, a fixed rate (Hz).
#[derive(Debug, Clone, Copy)]
pub struct CrossSections<'a> {
    cross_sections: &'a BTreeMap<String, CrossSection>,
    fixed_rates   : &'a BTreeMap<String, Rate>,
}

impl<'a> CrossSections<'a> {

    pub fn new(cross_sections: &'a BTreeMap<String, CrossSection>, fixed_rates: &'a BTreeMap<String, Rate>) -> Self {
        Self { cross_sections, fixed_rates }
    }

    pub fn from_config(config: &'a Config) -> Self {
        Self::new(&config.cross_sections, &config.fixed_rates)
    }

    /// Cross-section in pb
    ///
    /// # Errors
    /// `UnknownProcess` if no cross-section is known for `process`
    pub fn cross_section(&self, process: &str) -> Result<CrossSection> {
        self.cross_sections.get(process).copied()
            .ok_or_else(|| Error::UnknownProcess(process.to_owned()))
    }

    /// Total rate (Hz) of `process` at instantaneous luminosity `inst_lumi` (Hz/pb)
    pub fn rate_factor(&self, process: &str, inst_lumi: Luminosity) -> Result<Rate> {
        match self.fixed_rates.get(process) {
            Some(&rate) => Ok(rate),
            None => Ok(inst_lumi * self.cross_section(process)?),
        }
    }
}
