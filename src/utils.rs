/// Group numeric digits to facilitate reading long numbers
pub fn group_digits<F: std::fmt::Display>(n: F) -> String {
    use numsep::{separate, Locale};
    separate(n, Locale::English)
}

/// Output extensions in order of first appearance, lower-cased, leading dots
/// and repeats removed
pub fn dedup_extensions<S: AsRef<str>>(exts: &[S]) -> Vec<String> {
    let mut out: Vec<String> = vec![];
    for ext in exts {
        let ext = ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase();
        if !ext.is_empty() && !out.contains(&ext) { out.push(ext) }
    }
    out
}

pub mod timing {

    use super::group_digits;
    use log::info;
    use std::time::{Duration, Instant};

    /// Wall-clock timing of consecutive stages of a run
    pub struct Progress {
        stage: String,
        previous: Instant,
        total: Duration,
    }

    impl Progress {

        #[allow(clippy::new_without_default)]
        pub fn new() -> Self { Self { stage: String::new(), previous: Instant::now(), total: Duration::ZERO } }

        /// Log the start of a stage and start its timer
        pub fn start(&mut self, stage: impl Into<String>) {
            self.stage = stage.into();
            info!("{} ...", self.stage);
            self.previous = Instant::now();
        }

        /// Log the time taken by the current stage
        pub fn done(&mut self) -> Duration {
            let elapsed = self.previous.elapsed();
            self.total += elapsed;
            info!("{}: {} ms", self.stage, group_digits(elapsed.as_millis()));
            self.previous = Instant::now();
            elapsed
        }

        /// Log the time taken by the current stage, with a summary of its result
        pub fn done_with_message(&mut self, message: &str) -> Duration {
            let elapsed = self.previous.elapsed();
            self.total += elapsed;
            info!("{}: {message} ({} ms)", self.stage, group_digits(elapsed.as_millis()));
            self.previous = Instant::now();
            elapsed
        }

        /// Time spent in completed stages
        pub fn total(&self) -> Duration { self.total }
    }
}
