//! Step progress, confirmation gates and the run summary

use crate::error::{ProvisionError, Result};
use chrono::Local;
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

/// Lifecycle of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Executed,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct StepRecord {
    pub ordinal: usize,
    pub description: String,
    pub state: StepState,
    pub duration: Option<Duration>,
    started: Instant,
}

/// `y`, `yes` and blank input (any case, surrounding whitespace ignored) confirm
pub fn is_affirmative(input: &str) -> bool {
    let answer = input.trim().to_lowercase();
    matches!(answer.as_str(), "" | "y" | "yes")
}

/// Drives a fixed number of steps, reading answers from `input` and writing
/// progress to `output`
pub struct StepSequencer<R, W> {
    total: usize,
    counter: usize,
    assume_yes: bool,
    input: R,
    output: W,
    records: Vec<StepRecord>,
    start_time: Instant,
}

impl StepSequencer<io::StdinLock<'static>, io::Stdout> {
    /// Sequencer bound to the process's stdin and stdout
    pub fn stdio(total: usize) -> Self {
        Self::new(total, io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> StepSequencer<R, W> {
    pub fn new(total: usize, input: R, output: W) -> Self {
        Self {
            total,
            counter: 0,
            assume_yes: false,
            input,
            output,
            records: Vec::with_capacity(total),
            start_time: Instant::now(),
        }
    }

    /// Answer every gate affirmatively without reading input
    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn current(&self) -> usize {
        self.counter
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    /// Start the next step and print `"{n}/{N}. {description}"`
    pub fn advance(&mut self, description: &str) -> usize {
        self.complete_current();

        self.counter += 1;
        if self.counter > self.total {
            tracing::warn!("Step {} exceeds the planned {} steps", self.counter, self.total);
        }
        self.records.push(StepRecord {
            ordinal: self.counter,
            description: description.to_string(),
            state: StepState::Pending,
            duration: None,
            started: Instant::now(),
        });

        self.emit(&format!("{}/{}. {}", self.counter, self.total, description));
        self.counter
    }

    /// Ask a yes/no question; see [`is_affirmative`] for what counts as yes
    pub fn confirm(&mut self, prompt: &str) -> Result<bool> {
        write!(self.output, "{} [Y/n]: ", prompt)?;
        if self.assume_yes {
            writeln!(self.output, "y")?;
            return Ok(true);
        }
        self.output.flush()?;

        // EOF reads as an empty answer
        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(is_affirmative(&answer))
    }

    /// Confirm, or abort the run when the operator declines
    pub fn gate(&mut self, prompt: &str) -> Result<()> {
        if self.confirm(prompt)? {
            Ok(())
        } else {
            Err(self.abort("declined by operator"))
        }
    }

    /// Mark the current step aborted and build the error that ends the run
    pub fn abort(&mut self, reason: &str) -> ProvisionError {
        self.halt(reason);
        ProvisionError::UserAbort {
            step: self.counter,
            reason: reason.to_string(),
        }
    }

    /// Move the current step to `Aborted` after a fatal error
    pub fn halt(&mut self, reason: &str) {
        if let Some(record) = self.records.last_mut() {
            if record.state == StepState::Pending {
                record.state = StepState::Aborted;
                record.duration = Some(record.started.elapsed());
            }
        }

        self.emit(&format!("[{}] {} {}", timestamp().dimmed(), "✗".red().bold(), reason));
    }

    /// Read one free-text answer, trimmed
    pub fn prompt(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{}: ", question)?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        Ok(answer.trim().to_string())
    }

    pub fn detail(&mut self, message: &str) {
        self.emit(&format!("[{}]   → {}", timestamp().dimmed(), message.cyan()));
    }

    pub fn warn(&mut self, message: &str) {
        self.emit(&format!(
            "[{}] {} {}",
            timestamp().dimmed(),
            "⚠".yellow(),
            message.yellow()
        ));
    }

    /// Mark the last step executed
    pub fn finish(&mut self) {
        self.complete_current();
    }

    pub fn executed(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.state == StepState::Executed)
            .count()
    }

    pub fn print_summary(&mut self, environment: &str, ignored_failures: usize) {
        let total_duration = self.start_time.elapsed();
        let slowest = self
            .records
            .iter()
            .filter_map(|r| r.duration.map(|d| (r, d)))
            .max_by_key(|(_, d)| *d);

        let mut lines = vec![
            String::new(),
            "═".repeat(44),
            format!("Provision Summary: {}", environment.cyan().bold()),
            "─".repeat(44),
            format!("Total time:    {}", format_duration(total_duration).green()),
        ];
        if let Some((record, duration)) = slowest {
            lines.push(format!(
                "Slowest step:  {} ({})",
                record.description,
                format_duration(duration)
            ));
        }
        lines.push(format!("Steps:         {}/{}", self.executed(), self.total));
        if self.records.iter().any(|r| r.state == StepState::Aborted) {
            lines.push(format!("Status:        {}", "aborted".red().bold()));
        }
        if ignored_failures > 0 {
            lines.push(format!(
                "Ignored:       {} failed command(s)",
                ignored_failures.to_string().yellow()
            ));
        } else {
            lines.push(format!("Ignored:       {}", "0".green()));
        }
        lines.push("═".repeat(44));

        for line in lines {
            self.emit(&line);
        }
    }

    /// Progress output is best effort: a failed write is logged and the run goes on
    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.output, "{}", line) {
            tracing::warn!("Failed to write progress output: {}", e);
        }
    }

    fn complete_current(&mut self) {
        if let Some(record) = self.records.last_mut() {
            if record.state == StepState::Pending {
                record.state = StepState::Executed;
                record.duration = Some(record.started.elapsed());
            }
        }
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Short human-readable duration, e.g. `1.5s` or `2m 5s`
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    } else if total_secs >= 1 {
        format!("{}.{}s", total_secs, millis / 100)
    } else {
        format!("{}ms", millis)
    }
}
