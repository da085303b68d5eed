//! Histogram containers serialized as JSON.
//!
//! ```json
//! {
//!   "h1": { "eventsProcessed": { "edges": [0, 1], "contents": [0, 1000, 0] } },
//!   "h2": { "NoSelection/met__vs__GEN_pt": { "edges_x": [...], "edges_y": [...], "contents": [...] } }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::histogram::{Hist1D, Hist2D};
use super::HistogramSource;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Container {
    #[serde(default)]
    pub h1: BTreeMap<String, Hist1D>,
    #[serde(default)]
    pub h2: BTreeMap<String, Hist2D>,
}

impl Container {

    pub fn insert_h1(&mut self, key: impl Into<String>, h: Hist1D) { self.h1.insert(key.into(), h); }
    pub fn insert_h2(&mut self, key: impl Into<String>, h: Hist2D) { self.h2.insert(key.into(), h); }

    pub fn write(&self, path: &Path) -> Result<()> {
        let file = std::io::BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer(file, self)?;
        Ok(())
    }
}

pub struct JsonFile {
    path: PathBuf,
    container: Container,
}

impl JsonFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Open { path: path.to_path_buf(), reason: e.to_string() })?;
        let container = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::Open { path: path.to_path_buf(), reason: e.to_string() })?;
        Ok(Self { path: path.to_path_buf(), container })
    }
}

impl HistogramSource for JsonFile {
    fn path(&self) -> &Path { &self.path }

    fn h1(&self, key: &str) -> Result<Hist1D> {
        let mut h = self.container.h1.get(key).cloned().ok_or_else(|| self.missing(key))?;
        h.name = key.to_owned();
        Ok(h)
    }

    fn h2(&self, key: &str) -> Result<Hist2D> {
        let mut h = self.container.h2.get(key).cloned().ok_or_else(|| self.missing(key))?;
        h.name = key.to_owned();
        Ok(h)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::axis::Edges;
    use tempfile::tempdir;

    #[test]
    fn container_roundtrip_through_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("sample.json");

        let mut h = Hist1D::new("", Edges::uniform(3, 0.0, 3.0)?);
        h.fill(0.5);
        h.fill_with(2.5, 3.0);
        let mut container = Container::default();
        container.insert_h1("NoSelection/pt", h);
        container.write(&path)?;

        let file = JsonFile::open(&path)?;
        let reloaded = file.h1("NoSelection/pt")?;
        assert_eq!(reloaded.name, "NoSelection/pt");
        assert_eq!(reloaded.content(1), 1.0);
        assert_eq!(reloaded.content(3), 3.0);
        assert_eq!(reloaded.error(3), 3.0);
        assert!(matches!(file.h1("NoSelection/eta"), Err(Error::MissingHistogram { .. })));
        assert!(matches!(file.h2("NoSelection/pt"), Err(Error::MissingHistogram { .. })));
        Ok(())
    }

    #[test]
    fn malformed_file_fails_to_open() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json")?;
        assert!(matches!(JsonFile::open(&path), Err(Error::Open { .. })));
        Ok(())
    }
}
