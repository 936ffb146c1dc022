use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::types::TaskStatus;

/// Terminal progress for a collection run
///
/// One overall bar plus a spinner per running task. Owned by the aggregator,
/// so spinners appear when a worker reports it started and finish when its
/// result arrives.
pub struct ProgressMonitor {
    multi: MultiProgress,
    overall: ProgressBar,
    task_bars: HashMap<String, ProgressBar>,
    enabled: bool,
}

impl ProgressMonitor {
    /// `enabled` is false for `--json` output and non-terminal stderr.
    pub fn new(total_tasks: usize, enabled: bool) -> Self {
        if !enabled {
            return Self {
                multi: MultiProgress::new(),
                overall: ProgressBar::hidden(),
                task_bars: HashMap::new(),
                enabled: false,
            };
        }

        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total_tasks as u64));

        overall.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );

        overall.set_message("collecting...");

        Self {
            multi,
            overall,
            task_bars: HashMap::new(),
            enabled: true,
        }
    }

    pub fn start_task(&mut self, name: &str) {
        if !self.enabled {
            return;
        }

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.set_message(format!("⏳ {}", name));
        bar.enable_steady_tick(Duration::from_millis(100));

        self.task_bars.insert(name.to_string(), bar);
    }

    pub fn complete_task(&mut self, name: &str, status: TaskStatus, duration_ms: u64) {
        if !self.enabled {
            return;
        }

        let icon = match status {
            TaskStatus::Ok => "✅",
            TaskStatus::Failed => "❌",
            TaskStatus::Timeout => "⌛",
            TaskStatus::Skipped => "⏭",
        };
        let line = format!("{} {} {} ({}ms)", icon, name, status, duration_ms);
        match self.task_bars.remove(name) {
            Some(bar) => bar.finish_with_message(line),
            // Skipped and never-started tasks report without a spinner.
            None => {
                let _ = self.multi.println(format!("  {line}"));
            }
        }

        self.overall.inc(1);
    }

    pub fn set_message(&self, msg: &str) {
        if self.enabled {
            self.overall.set_message(msg.to_string());
        }
    }

    pub fn finish(&self, deadline_hit: bool) {
        if !self.enabled {
            return;
        }

        let msg = if deadline_hit {
            "⌛ global deadline reached"
        } else {
            "✅ collection finished"
        };

        self.overall.finish_with_message(msg.to_string());
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        for (_, bar) in self.task_bars.drain() {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_monitor_ignores_updates() {
        let mut monitor = ProgressMonitor::new(3, false);

        monitor.start_task("gateway_ping");
        monitor.complete_task("gateway_ping", TaskStatus::Ok, 100);
        monitor.set_message("test");
        monitor.finish(false);
        assert!(monitor.task_bars.is_empty());
    }

    #[test]
    fn completed_tasks_drop_their_spinner() {
        let mut monitor = ProgressMonitor::new(3, true);

        monitor.start_task("gateway_ping");
        monitor.start_task("google_dns_ping");
        monitor.complete_task("gateway_ping", TaskStatus::Ok, 100);
        monitor.complete_task("google_dns_ping", TaskStatus::Timeout, 200);
        monitor.complete_task("ipv6_route", TaskStatus::Skipped, 0);

        assert!(monitor.task_bars.is_empty());
        monitor.finish(true);
    }
}
