pub mod types;
pub mod error;
pub mod axis;
pub mod histogram;
pub mod io;
pub mod config;
pub mod xsec;
pub mod rate;
pub mod efficiency;
pub mod resolution;
pub mod report;
pub mod pipeline;
pub mod utils;

pub use error::{Error, Result};
pub use types::{Bin, Measurement, Point};
pub use axis::Edges;
pub use histogram::{Hist1D, Hist2D};
pub use config::Config;
