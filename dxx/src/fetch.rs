use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use fetch_archive::{ArchiveSource, Artefact, Fetcher};
use indicatif::{MultiProgress, ProgressBar};

use crate::progress::{BarReporter, finished_style, spinner_style};

pub type FetchResult = Result<Artefact, anyhow::Error>;

fn make_progress_spinner(m: &MultiProgress, prefix: String) -> ProgressBar {
    let pb = m.add(ProgressBar::new_spinner());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(spinner_style());
    pb.set_prefix(prefix);
    pb
}

fn complete_progress_bar(pb: ProgressBar, source: &ArchiveSource, result: &FetchResult) {
    pb.set_style(finished_style(result.is_ok()));
    let status = match result {
        Ok(artefact) => format!("😸 {} -> {}", source.name(), artefact.path().display()),
        Err(_) => format!("😿 failed to fetch '{}'", source.name()),
    };
    pb.finish_with_message(status);
}

// Fetch a single source, reporting progress in the provided progress bar
fn fetch_one<P>(source: &ArchiveSource, sources_dir: P, timeout: Duration, bar: ProgressBar) -> FetchResult
where
    P: AsRef<Path>,
{
    bar.set_message(format!("{} -> ", source.name()));
    let reporter = BarReporter::new(bar.clone(), source.name());
    let result = Fetcher::new()
        .timeout(timeout)
        .acquire_into(source, sources_dir, &reporter)
        .with_context(|| format!("failed to fetch '{}' from {}", source.name(), source.url()));
    complete_progress_bar(bar, source, &result);
    result
}

// Fetch sources in parallel with `rayon`. Pair each source with its own progress bar. Using
// ordered bars means the bars are shown in order
pub fn parallel_fetch<P>(
    sources: &[ArchiveSource],
    sources_dir: P,
    timeout: Duration,
    mp: &MultiProgress,
) -> Vec<FetchResult>
where
    P: AsRef<Path> + Sync,
{
    use rayon::prelude::*;
    let count = sources.len();
    let ordered_bars = (0..count)
        .map(|k| make_progress_spinner(mp, format!("[{}/{count}]", k + 1)))
        .collect::<Vec<_>>();
    ordered_bars
        .into_iter()
        .zip(sources)
        // Have to `collect()` first because we can't use parallel iterator with Zip
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(bar, source)| fetch_one(source, sources_dir.as_ref(), timeout, bar))
        .collect::<Vec<_>>()
}
