use std::io::{self, Write};
use std::path::Path;

use fetch_archive::{MemberAction, Reporter};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;

const PREFIX: &str = "{prefix:.cyan.bold/blue.bold}";

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

pub fn spinner_style() -> ProgressStyle {
    style(&format!("{PREFIX} 🔎 {{msg:.cyan/blue}} {{spinner}}")).tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷")
}

fn bytes_style() -> ProgressStyle {
    style(&format!(
        "{PREFIX} {{msg:.cyan/blue}} [{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}})"
    ))
    .progress_chars("=> ")
}

fn unknown_size_style() -> ProgressStyle {
    style(&format!(
        "{PREFIX} {{msg:.cyan/blue}} {{spinner}} {{bytes}} ({{bytes_per_sec}})"
    ))
    .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷")
}

pub fn finished_style(ok: bool) -> ProgressStyle {
    if ok {
        style(&format!("{PREFIX} {{msg:.cyan/blue}}"))
    } else {
        style(&format!("{PREFIX} {{msg:.red.bold}}"))
    }
}

/// Renders one acquisition's events on its own progress bar.
pub struct BarReporter {
    bar: ProgressBar,
    name: String,
}

impl BarReporter {
    pub fn new(bar: ProgressBar, name: &str) -> Self {
        Self {
            bar,
            name: name.to_string(),
        }
    }
}

impl Reporter for BarReporter {
    fn download_started(&self, description: &str, total: Option<u64>) {
        match total {
            Some(total) => {
                self.bar.set_style(bytes_style());
                self.bar.set_length(total);
            }
            None => self.bar.set_style(unknown_size_style()),
        }
        self.bar.set_position(0);
        self.bar.set_message(format!("{description} ⬇️"));
    }

    fn download_progress(&self, current: u64) {
        self.bar.set_position(current);
    }

    fn download_finished(&self) {
        self.bar.set_style(spinner_style());
        self.bar.set_message(format!("{} 📦", self.name));
    }

    fn member(&self, action: MemberAction, member: &Path) {
        tracing::trace!("{}: {action} {}", self.name, member.display());
        self.bar
            .set_message(format!("{} 📦 {action} {}", self.name, member.display()));
    }

    fn extracted(&self, dest: &Path) {
        tracing::info!("{}: extracted into {}", self.name, dest.display());
    }
}

/// Routes log output through the progress bars so lines don't tear them.
#[derive(Clone)]
pub struct IndicatifWriter {
    progress_bars: MultiProgress,
}

impl IndicatifWriter {
    pub fn new(pb: MultiProgress) -> Self {
        Self { progress_bars: pb }
    }
}

impl io::Write for IndicatifWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.progress_bars.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.progress_bars.suspend(|| io::stderr().flush())
    }
}

impl<'a> MakeWriter<'a> for IndicatifWriter {
    type Writer = IndicatifWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
