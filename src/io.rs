//! Access to histogram container files and the input directory layout

pub mod json;
#[cfg(feature = "hdf5-input")]
pub mod hdf5;

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::config::Input;
use crate::error::{Error, Result};
use crate::histogram::{Hist1D, Hist2D};

/// A file holding named histograms, keyed by `directory/name` paths.
pub trait HistogramSource {
    fn path(&self) -> &Path;
    fn h1(&self, key: &str) -> Result<Hist1D>;
    fn h2(&self, key: &str) -> Result<Hist2D>;

    fn missing(&self, key: &str) -> Error {
        Error::MissingHistogram { path: self.path().to_path_buf(), key: key.to_owned() }
    }
}

/// Open a histogram container, choosing the reader from the file extension.
///
/// Failure to open is logged before being returned: nothing downstream can
/// proceed without the file.
pub fn open(path: &Path) -> Result<Box<dyn HistogramSource>> {
    debug!("opening {}", path.display());
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let source: Result<Box<dyn HistogramSource>> = match extension {
        "json" => json::JsonFile::open(path).map(|f| Box::new(f) as Box<dyn HistogramSource>),
        #[cfg(feature = "hdf5-input")]
        "h5" | "hdf5" => hdf5::Hdf5File::open(path).map(|f| Box::new(f) as Box<dyn HistogramSource>),
        other => Err(Error::Format(other.to_owned())),
    };
    if let Err(e) = &source {
        warn!("failed to open target file {}: {e}", path.display());
    }
    source
}

/// Where to find the file for a given reconstruction, process and pileup
/// scenario: `<dir>/<reco>/<prefix><process>_<scenario>.<extension>`
#[derive(Debug, Clone)]
pub struct InputLayout {
    pub dir: PathBuf,
    pub prefix: String,
    pub extension: String,
}

impl InputLayout {

    pub fn new(dir: impl Into<PathBuf>, input: &Input) -> Self {
        Self { dir: dir.into(), prefix: input.prefix.clone(), extension: input.extension.clone() }
    }

    pub fn sample_path(&self, reco: &str, process: &str, scenario: &str) -> PathBuf {
        let Self { dir, prefix, extension } = self;
        dir.join(reco).join(format!("{prefix}{process}_{scenario}.{extension}"))
    }

    pub fn open(&self, reco: &str, process: &str, scenario: &str) -> Result<Box<dyn HistogramSource>> {
        open(&self.sample_path(reco, process, scenario))
    }
}

#[cfg(test)]
mod test_layout {
    use super::*;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn naming_convention() {
        let layout = InputLayout::new("harvesting", &Input::default());
        assert_eq!(layout.sample_path("HLT_TRKv06p1_TICL", "QCD_Pt600toInf_14TeV", "PU200"),
                   PathBuf::from("harvesting/HLT_TRKv06p1_TICL/Phase2HLTTDR_QCD_Pt600toInf_14TeV_PU200.json"));
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = open(&dir.path().join("nope.json"));
        assert!(matches!(result, Err(Error::Open { .. })));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let result = open(Path::new("histograms.root"));
        assert!(matches!(result, Err(Error::Format(ext)) if ext == "root"));
    }
}
