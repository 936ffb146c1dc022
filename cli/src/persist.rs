//! Run folder layout and flat-file output.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use wifidiag_core::api::{render_raw, OutputConfig, Report};

pub const STAMP_FORMAT: &str = "%y%m%d_%H%M%S";

/// Who the run is for, and whether privileged probes are available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunUser {
    pub name: String,
    pub privileged: bool,
}

impl RunUser {
    /// Resolve from `SUDO_USER` / `USER` read through `lookup`.
    pub fn detect<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        if let Some(name) = get("SUDO_USER") {
            return Self { name, privileged: true };
        }
        match get("USER") {
            Some(name) => Self {
                privileged: name == "root",
                name,
            },
            None => Self {
                name: "user".to_string(),
                privileged: false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunFolder {
    pub dir: PathBuf,
    pub stamp: String,
}

pub fn folder_name(user: &RunUser, stamp: &str) -> String {
    if user.privileged {
        format!("{}_wifi_diag_{stamp}", user.name)
    } else {
        format!("{}_basic_wifi_diag_{stamp}", user.name)
    }
}

impl RunFolder {
    pub fn create(root: &Path, user: &RunUser, now: DateTime<Local>) -> std::io::Result<Self> {
        let stamp = now.format(STAMP_FORMAT).to_string();
        let dir = root.join(folder_name(user, &stamp));
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, stamp })
    }

    pub fn log_file_name(&self) -> String {
        format!("1_logs_{}.log", self.stamp)
    }

    pub fn capture_path(&self) -> PathBuf {
        self.dir.join(format!("1_tcpdump_{}.pcap", self.stamp))
    }

    fn path(&self, prefix: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{prefix}_{}.{ext}", self.stamp))
    }

    /// Write summary, JSON document and, per `output`, markdown and raw dumps.
    pub fn write_report(&self, report: &Report, output: &OutputConfig) -> std::io::Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let summary = self.path("0_summary", "txt");
        std::fs::write(&summary, &report.summary)?;
        written.push(summary);

        let json = report
            .document
            .to_json_pretty()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let doc = self.path("1_report", "json");
        std::fs::write(&doc, json)?;
        written.push(doc);

        if output.markdown {
            let md = self.path("1_markdown", "md");
            std::fs::write(&md, report.markdown())?;
            written.push(md);
        }

        if output.raw {
            for section in &report.document.sections {
                let raw = self.path(&format!("2_raw_{}", section.category.as_str()), "txt");
                std::fs::write(&raw, render_raw(section))?;
                written.push(raw);
            }
        }

        tracing::info!(dir = %self.dir.display(), files = written.len(), "report written");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use wifidiag_core::api::{
        assemble, score, Category, Context, FrozenResults, Platform, ScoreTable, ScoringPolicy,
        TaskResult, TaskSpec, TaskStatus,
    };

    use super::*;

    fn user(vars: &[(&str, &str)]) -> RunUser {
        let env: HashMap<&str, &str> = vars.iter().copied().collect();
        RunUser::detect(|k| env.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn sudo_user_names_a_full_run() {
        assert_eq!(
            user(&[("SUDO_USER", "alex"), ("USER", "root")]),
            RunUser { name: "alex".into(), privileged: true }
        );
        assert_eq!(
            user(&[("USER", "alex")]),
            RunUser { name: "alex".into(), privileged: false }
        );
        assert!(user(&[("USER", "root")]).privileged);
        assert_eq!(user(&[]).name, "user");
    }

    #[test]
    fn folder_and_files_follow_the_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).single().unwrap();
        let folder = RunFolder::create(dir.path(), &user(&[("USER", "sam")]), now).unwrap();
        assert_eq!(folder.stamp, "240309_140507");
        assert!(folder.dir.ends_with("sam_basic_wifi_diag_240309_140507"));
        assert!(folder.dir.is_dir());
        assert_eq!(folder.log_file_name(), "1_logs_240309_140507.log");

        let specs = vec![
            TaskSpec::test("gateway_ping", Category::Connectivity, "true"),
            TaskSpec::diagnostic("iw_dev", Category::LinkQuality, "iw dev"),
        ];
        let store = FrozenResults::from_results(
            specs.iter().map(|s| TaskResult::new(s, TaskStatus::Ok)),
        )
        .unwrap();
        let sc = score(&store, &ScoreTable::build(&ScoringPolicy::default(), &specs)).unwrap();
        let report = assemble(&store, &sc, &Context::new(Platform::Linux, "wlan0"));

        let written = folder.write_report(&report, &OutputConfig::default()).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "0_summary_240309_140507.txt",
                "1_report_240309_140507.json",
                "1_markdown_240309_140507.md",
                "2_raw_connectivity_240309_140507.txt",
                "2_raw_link-quality_240309_140507.txt",
            ]
        );
        let summary = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(summary, report.summary);
    }
}
