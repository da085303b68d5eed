/// Progress bar over the samples read for one pileup scenario
pub (super) struct Progress {
    bar: ProgressBar,
}

impl Progress {

    pub (super) fn new(n_samples: usize, reco: &str, scenario: &str) -> Result<Self, TemplateError> {
        let bar = ProgressBar::new(n_samples as u64).with_prefix(format!("{reco} {scenario}"));
        bar.set_style(ProgressStyle::default_bar()
                      .template("{prefix}: {msg}\n[{elapsed_precise}] {wide_bar} {pos}/{len}")?);
        bar.tick();
        Ok(Self { bar })
    }

    /// A sample is about to be read
    pub (super) fn sample(&self, process: &str) {
        self.bar.set_message(process.to_owned());
        self.bar.inc(1);
    }

    pub (super) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

// ----- Imports -----------------------------------------------------------------------------------------
use indicatif::{ProgressBar, ProgressStyle, style::TemplateError};
