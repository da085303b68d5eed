//! Read histograms from HDF5 files.
//!
//! Each histogram is a group at its key path holding 1D datasets: `edges`
//! (or `edges_x` and `edges_y`), `contents` (flows included, x fastest) and
//! optionally `sumw2` and a single-element `entries`.

use std::path::{Path, PathBuf};

use crate::axis::Edges;
use crate::error::{Error, Result};
use crate::histogram::{Hist1D, Hist2D, RawHist2D};
use super::HistogramSource;

pub struct Hdf5File {
    path: PathBuf,
    file: ::hdf5::File,
}

impl Hdf5File {
    pub fn open(path: &Path) -> Result<Self> {
        let file = ::hdf5::File::open(path)
            .map_err(|e| Error::Open { path: path.to_path_buf(), reason: e.to_string() })?;
        Ok(Self { path: path.to_path_buf(), file })
    }

    fn group(&self, key: &str) -> Result<::hdf5::Group> {
        self.file.group(key).map_err(|_| self.missing(key))
    }
}

fn read(group: &::hdf5::Group, name: &str) -> Result<Vec<f64>> {
    Ok(group.dataset(name)?.read_raw::<f64>()?)
}

fn read_opt(group: &::hdf5::Group, name: &str) -> Result<Option<Vec<f64>>> {
    if group.link_exists(name) { Ok(Some(read(group, name)?)) } else { Ok(None) }
}

impl HistogramSource for Hdf5File {
    fn path(&self) -> &Path { &self.path }

    fn h1(&self, key: &str) -> Result<Hist1D> {
        let group = self.group(key)?;
        let edges = Edges::new(read(&group, "edges")?)?;
        let contents = read(&group, "contents")?;
        let sumw2 = read_opt(&group, "sumw2")?
            .unwrap_or_else(|| contents.iter().map(|c| c.abs()).collect());
        let entries = read_opt(&group, "entries")?
            .and_then(|e| e.first().copied())
            .unwrap_or_else(|| contents.iter().sum());
        Hist1D::from_parts(key, edges, contents, sumw2, entries)
    }

    fn h2(&self, key: &str) -> Result<Hist2D> {
        let group = self.group(key)?;
        let raw = RawHist2D {
            name: key.to_owned(),
            edges_x: Edges::new(read(&group, "edges_x")?)?,
            edges_y: Edges::new(read(&group, "edges_y")?)?,
            contents: read(&group, "contents")?,
            sumw2: read_opt(&group, "sumw2")?,
            entries: read_opt(&group, "entries")?.and_then(|e| e.first().copied()),
        };
        Hist2D::try_from(raw)
    }
}
