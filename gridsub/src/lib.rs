//! Submission of ntuple-production jobs to the grid.
//!
//! Each input dataset is matched against a whitelist of run eras; every
//! match becomes one job, whose configuration file is rendered and handed
//! to the grid client (`crab submit -c <file>`).

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use itertools::Itertools;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("`{0}` is not a dataset name of the form /<primary>/<processed>/<tier>")]
    Dataset(String),

    #[error("{request}: `{client}` exited with {status}")]
    Client { request: String, client: String, status: std::process::ExitStatus },

    #[error("{request}: could not run `{client}`: {source}")]
    Spawn { request: String, client: String, source: std::io::Error },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Settings shared by every job. Each field may be overridden from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub request_prefix: String,
    /// Datasets match an era when they contain `<era_prefix><era>`
    pub era_prefix: String,
    pub eras: Vec<String>,
    /// Characters kept from the primary and processed dataset names
    pub name_length: usize,

    pub transfer_outputs: bool,
    pub transfer_logs: bool,

    pub pset: String,
    pub py_cfg_params: Vec<String>,
    pub max_job_runtime_min: u32,
    pub max_memory_mb: u32,
    pub allow_undistributed_cmssw: bool,

    pub publication: bool,
    pub ignore_locality: bool,
    pub splitting: String,
    pub units_per_job: u32,
    pub out_lfn_dir_base: String,
    pub allow_non_valid_input_dataset: bool,
    pub lumi_mask: String,

    pub storage_site: String,
    /// Only used when `ignore_locality` is set
    pub site_whitelist: Vec<String>,
}

impl Default for GridConfig {
    fn default() -> Self {
        let strings = |v: &[&str]| -> Vec<String> { v.iter().map(|s| s.to_string()).collect() };
        Self {
            request_prefix: "EffStudiesRun2_".into(),
            era_prefix: "Run2016".into(),
            eras: strings(&["B-17Jul2018_ver1", "B-17Jul2018_ver2", "C", "D", "E", "F", "G", "H"]),
            name_length: 30,
            transfer_outputs: true,
            transfer_logs: false,
            pset: "jmeTriggerNTuple_cfg.py".into(),
            py_cfg_params: strings(&["globalTag=102X_dataRun2_v13", "isData=True", "era=2016"]),
            max_job_runtime_min: 2880,
            max_memory_mb: 4000,
            allow_undistributed_cmssw: true,
            publication: false,
            ignore_locality: true,
            splitting: "FileBased".into(),
            units_per_job: 5,
            out_lfn_dir_base: "/store/user/anigamov/jme_trigger/Run2EffStudies/".into(),
            allow_non_valid_input_dataset: true,
            lumi_mask: "https://cms-service-dqm.web.cern.ch/cms-service-dqm/CAF/certification/Collisions16/13TeV/ReReco/Final/Cert_271036-284044_13TeV_ReReco_07Aug2017_Collisions16_JSON.txt".into(),
            storage_site: "T2_DE_DESY".into(),
            site_whitelist: strings(&["T2_CH_CERN", "T2_DE_*"]),
        }
    }
}

impl GridConfig {
    /// Built-in defaults, overridden by whatever `path` sets
    pub fn read(path: &Path) -> Result<Self> {
        Ok(toml::from_str(&fs::read_to_string(path)?)?)
    }
}

/// `/<primary>/<processed>/<tier>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub name: String,
    pub primary: String,
    pub processed: String,
}

impl Dataset {
    pub fn parse(name: &str) -> Result<Self> {
        let bad = || Error::Dataset(name.to_owned());
        let mut parts = name.strip_prefix('/').ok_or_else(bad)?.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(primary), Some(processed), Some(tier))
                if !primary.is_empty() && !processed.is_empty() && !tier.is_empty() =>
                Ok(Self { name: name.to_owned(), primary: primary.to_owned(), processed: processed.to_owned() }),
            _ => Err(bad()),
        }
    }
}

/// One dataset list entry per line; blank lines are ignored
pub fn read_datasets(path: &Path) -> Result<Vec<Dataset>> {
    fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Dataset::parse)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub request_name: String,
    pub dataset: String,
    pub output_tag: String,
}

fn truncated(s: &str, n: usize) -> String { s.chars().take(n).collect() }

/// A job for every (dataset, era) match. Datasets matching several eras
/// would yield identical requests: only the first is kept.
pub fn jobs_for(datasets: &[Dataset], config: &GridConfig) -> Vec<Job> {
    let n = config.name_length;
    datasets.iter()
        .flat_map(|d| config.eras.iter()
            .filter(move |era| d.name.contains(&format!("{}{era}", config.era_prefix)))
            .map(move |_| Job {
                request_name: format!("{}{}{}", config.request_prefix, truncated(&d.primary, n), truncated(&d.processed, n)),
                dataset: d.name.clone(),
                output_tag: truncated(&d.processed, n),
            }))
        .unique_by(|job| job.request_name.clone())
        .collect()
}

fn py_bool(b: bool) -> &'static str { if b { "True" } else { "False" } }

fn py_list(items: &[String]) -> String {
    format!("[{}]", items.iter().map(|s| format!("'{s}'")).join(", "))
}

/// The client configuration file of `job`
pub fn render_config(job: &Job, config: &GridConfig) -> String {
    let c = config;
    let mut out = String::new();
    let mut line = |s: String| { let _ = writeln!(out, "{s}"); };
    line("from CRABClient.UserUtilities import config".into());
    line("config = config()".into());
    line(String::new());
    line("config.section_('General')".into());
    line(format!("config.General.requestName = '{}'", job.request_name));
    line(format!("config.General.transferOutputs = {}", py_bool(c.transfer_outputs)));
    line(format!("config.General.transferLogs = {}", py_bool(c.transfer_logs)));
    line(String::new());
    line("config.section_('JobType')".into());
    line("config.JobType.pluginName = 'Analysis'".into());
    line(format!("config.JobType.psetName = '{}'", c.pset));
    line("config.JobType.inputFiles = []".into());
    line(format!("config.JobType.pyCfgParams = {}", py_list(&c.py_cfg_params)));
    line(format!("config.JobType.maxJobRuntimeMin = {}", c.max_job_runtime_min));
    line(format!("config.JobType.maxMemoryMB = {}", c.max_memory_mb));
    line(format!("config.JobType.allowUndistributedCMSSW = {}", py_bool(c.allow_undistributed_cmssw)));
    line(String::new());
    line("config.section_('Data')".into());
    line(format!("config.Data.inputDataset = '{}'", job.dataset));
    line(format!("config.Data.outputDatasetTag = '{}'", job.output_tag));
    line(format!("config.Data.publication = {}", py_bool(c.publication)));
    line(format!("config.Data.ignoreLocality = {}", py_bool(c.ignore_locality)));
    line(format!("config.Data.splitting = '{}'", c.splitting));
    line(format!("config.Data.unitsPerJob = {}", c.units_per_job));
    line(format!("config.Data.outLFNDirBase = '{}'", c.out_lfn_dir_base));
    line(format!("config.Data.allowNonValidInputDataset = {}", py_bool(c.allow_non_valid_input_dataset)));
    line(format!("config.Data.lumiMask = '{}'", c.lumi_mask));
    line(String::new());
    line("config.section_('Site')".into());
    line(format!("config.Site.storageSite = '{}'", c.storage_site));
    if c.ignore_locality {
        line(format!("config.Site.whitelist = {}", py_list(&c.site_whitelist)));
    }
    out
}

/// Outcome of a batch of submissions
#[derive(Debug, Default)]
pub struct Summary {
    pub submitted: Vec<String>,
    pub failed: Vec<Error>,
}

impl Summary {
    pub fn ok(&self) -> bool { self.failed.is_empty() }
}

/// How jobs are handed over to the grid
#[derive(Debug, Clone)]
pub struct Submitter {
    /// Job configuration files are written here
    pub workdir: PathBuf,
    /// Executable invoked as `<client> submit -c <file>`
    pub client: String,
    /// Write the configuration files, but do not run the client
    pub dry_run: bool,
}

impl Submitter {

    pub fn config_path(&self, job: &Job) -> PathBuf {
        self.workdir.join(format!("crab_{}.py", job.request_name))
    }

    /// Submit one job, returning the path of its configuration file
    pub fn submit(&self, job: &Job, config: &GridConfig) -> Result<PathBuf> {
        fs::create_dir_all(&self.workdir)?;
        let path = self.config_path(job);
        fs::write(&path, render_config(job, config))?;
        if self.dry_run {
            info!("[dry run] {} submit -c {}", self.client, path.display());
            return Ok(path);
        }
        info!("{}: {} submit -c {}", job.request_name, self.client, path.display());
        let status = Command::new(&self.client)
            .arg("submit").arg("-c").arg(&path)
            .status()
            .map_err(|source| Error::Spawn { request: job.request_name.clone(), client: self.client.clone(), source })?;
        if !status.success() {
            return Err(Error::Client { request: job.request_name.clone(), client: self.client.clone(), status });
        }
        Ok(path)
    }

    /// Submit every job, carrying on past failures
    pub fn submit_all(&self, jobs: &[Job], config: &GridConfig) -> Summary {
        let mut summary = Summary::default();
        for job in jobs {
            match self.submit(job, config) {
                Ok(_)  => summary.submitted.push(job.request_name.clone()),
                Err(e) => { error!("{e}"); summary.failed.push(e) }
            }
        }
        if !summary.ok() {
            warn!("{} of {} submissions failed", summary.failed.len(), jobs.len());
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::tempdir;

    const JETHT_B: &str = "/JetHT/Run2016B-17Jul2018_ver2-v2/MINIAOD";

    #[rstest(/**/ name,
             case("JetHT/Run2016B/MINIAOD"),
             case("/JetHT/Run2016B"),
             case("/JetHT//MINIAOD"),
    )]
    fn malformed_datasets(name: &str) {
        assert!(matches!(Dataset::parse(name), Err(Error::Dataset(_))));
    }

    #[test]
    fn dataset_parts() {
        let d = Dataset::parse(JETHT_B).unwrap();
        assert_eq!(d.primary, "JetHT");
        assert_eq!(d.processed, "Run2016B-17Jul2018_ver2-v2");
    }

    #[test]
    fn dataset_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("datasets.txt");
        fs::write(&path, format!("  {JETHT_B}  \n\n/MET/Run2016H-17Jul2018-v2/MINIAOD\n")).unwrap();
        let datasets = read_datasets(&path).unwrap();
        assert_eq!(datasets.len(), 2);
        assert_eq!(datasets[0].name, JETHT_B);
    }

    #[test]
    fn one_job_per_matching_era() {
        let datasets = [
            Dataset::parse(JETHT_B).unwrap(),
            Dataset::parse("/SingleMuon/Run2017B-31Mar2018-v1/MINIAOD").unwrap(),
            Dataset::parse("/SingleMuonWithAVeryLongPrimaryDatasetName/Run2016C-17Jul2018-v1/MINIAOD").unwrap(),
        ];
        let jobs = jobs_for(&datasets, &GridConfig::default());
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].request_name, "EffStudiesRun2_JetHTRun2016B-17Jul2018_ver2-v2");
        assert_eq!(jobs[1].request_name, "EffStudiesRun2_SingleMuonWithAVeryLongPrimaryRun2016C-17Jul2018-v1");
        assert_eq!(jobs[1].output_tag, "Run2016C-17Jul2018-v1");
    }

    #[test]
    fn rendered_configuration() {
        let config = GridConfig::default();
        let job = &jobs_for(&[Dataset::parse(JETHT_B).unwrap()], &config)[0];
        let text = render_config(job, &config);
        assert!(text.contains(&format!("config.Data.inputDataset = '{JETHT_B}'")));
        assert!(text.contains("config.Data.unitsPerJob = 5"));
        assert!(text.contains("config.JobType.pyCfgParams = ['globalTag=102X_dataRun2_v13', 'isData=True', 'era=2016']"));
        assert!(text.contains("config.Site.whitelist = ['T2_CH_CERN', 'T2_DE_*']"));

        let local = GridConfig { ignore_locality: false, ..config };
        assert!(!render_config(job, &local).contains("whitelist"));
    }

    #[test]
    fn toml_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.toml");
        fs::write(&path, "storage_site = 'T2_CH_CERN'\nunits_per_job = 2\n").unwrap();
        let config = GridConfig::read(&path).unwrap();
        assert_eq!(config.storage_site, "T2_CH_CERN");
        assert_eq!(config.units_per_job, 2);
        assert_eq!(config.eras, GridConfig::default().eras);

        fs::write(&path, "storage_sight = 'T2_CH_CERN'\n").unwrap();
        assert!(matches!(GridConfig::read(&path), Err(Error::Toml(_))));
    }

    fn job() -> Job {
        jobs_for(&[Dataset::parse(JETHT_B).unwrap()], &GridConfig::default()).remove(0)
    }

    #[test]
    fn dry_run_only_writes_configuration() {
        let dir = tempdir().unwrap();
        let submitter = Submitter { workdir: dir.path().join("jobs"), client: "no-such-grid-client".into(), dry_run: true };
        let path = submitter.submit(&job(), &GridConfig::default()).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn failures_are_collected() {
        let dir = tempdir().unwrap();
        let jobs = [job()];
        let failing = Submitter { workdir: dir.path().to_path_buf(), client: "false".into(), dry_run: false };
        let summary = failing.submit_all(&jobs, &GridConfig::default());
        assert!(!summary.ok());
        assert!(matches!(summary.failed[0], Error::Client { .. }));

        let passing = Submitter { client: "true".into(), ..failing };
        assert_eq!(passing.submit_all(&jobs, &GridConfig::default()).submitted.len(), 1);

        let missing = Submitter { client: "no-such-grid-client".into(), ..passing };
        assert!(matches!(missing.submit_all(&jobs, &GridConfig::default()).failed[0], Error::Spawn { .. }));
    }
}
