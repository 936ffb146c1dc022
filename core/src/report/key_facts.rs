//! Key facts: the handful of values a reader looks for first (addresses,
//! SSID, signal, host identity), pulled out of the diagnostics' output.
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::Platform;
use crate::executor::types::TaskStatus;
use crate::store::FrozenResults;

use super::assemble::CaptureSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    /// Every match, space separated.
    Join,
    /// First match, a bare 12-digit hex string rendered as colon-separated octets.
    HexMac,
}

/// Where one labelled fact comes from: the first of `tasks` that ran,
/// and the pattern whose first group is the value.
struct Rule {
    label: &'static str,
    tasks: &'static [&'static str],
    pattern: &'static str,
    format: Format,
    /// Warning raised when the task ran but nothing matched.
    missing: Option<&'static str>,
}

const fn rule(label: &'static str, tasks: &'static [&'static str], pattern: &'static str) -> Rule {
    Rule {
        label,
        tasks,
        pattern,
        format: Format::Join,
        missing: None,
    }
}

const NO_IPV6: &str = "No valid IPv6 address";

const DARWIN: &[Rule] = &[
    rule("User name", &["system_profiler"], r"User Name: (.+)"),
    rule("MAC address", &["ifconfig"], r"ether (\S+)"),
    rule("IPv4 address", &["ifconfig"], r"inet (\S+) netmask"),
    Rule {
        missing: Some(NO_IPV6),
        ..rule("IPv6 address", &["ifconfig"], r"inet6 (\S+:[0-9a-f]*) ")
    },
    rule("SSID", &["airport"], r" SSID: (\S+)"),
    Rule {
        format: Format::HexMac,
        missing: Some("Failed parsing BSSID from logs"),
        ..rule("BSSID", &["log_show"], r#""IO80211BSSID" = <(\S+)>"#)
    },
    rule("RSSI", &["system_profiler"], r"Signal / Noise: (\S+ dBm)"),
    rule("Noise", &["system_profiler"], r"Signal / Noise: .+ / (\S+ dBm)"),
    rule("Channel", &["system_profiler"], r"Channel: (\d+)"),
    rule("Computer name", &["system_profiler"], r"Computer Name: (.+)"),
    rule("System version", &["system_profiler"], r"System Version: (.+)"),
    rule("Time since boot", &["system_profiler"], r"Time since boot: (.+)"),
];

const LINUX: &[Rule] = &[
    rule("MAC address", &["ip_addr"], r"ether (\S+)"),
    rule("IPv4 address", &["ip_addr"], r"inet (\S+)/\d{1,2} brd"),
    Rule {
        missing: Some(NO_IPV6),
        ..rule("IPv6 address", &["ip_addr"], r"inet6 (\S+:[0-9a-f]*)/\d{1,3}")
    },
    rule("SSID", &["iw_dev"], r"ssid (\S+)"),
    rule("BSSID", &["iwconfig"], r"Access Point: (\S+)"),
    rule("Signal level", &["iwconfig"], r"Signal level=(\S+) dBm"),
    rule("Link quality", &["iwconfig"], r"Link Quality=(\S+)"),
    rule("Channel", &["iw_dev"], r"channel (.+)"),
    rule("Computer name", &["hostnamectl"], r"Static hostname: (\S+)"),
    rule("Login", &["user_login"], r"uid=\d+\((\S+)\)"),
    rule("Boot time", &["boot_time"], r"system boot +(.*)"),
    rule("OS version", &["hostnamectl"], r"Operating System: (.*)"),
    rule("Kernel", &["hostnamectl"], r"Kernel: (.*)"),
    rule("Hardware vendor", &["hostnamectl"], r"Hardware Vendor: (.*)"),
    rule("Hardware model", &["hostnamectl"], r"Hardware Model: (.*)"),
    rule("Adapter vendor", &["adapter_info"], r"VENDOR: +(.*)"),
    rule("Adapter model", &["adapter_info"], r"PRODUCT: +(.*)"),
    rule("Adapter driver", &["adapter_info"], r"DRIVER: +(.*)"),
];

fn rules(platform: Platform) -> &'static [Rule] {
    match platform {
        Platform::Linux => LINUX,
        Platform::Darwin => DARWIN,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFact {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFacts {
    pub facts: Vec<KeyFact>,
    pub warnings: Vec<String>,
}

impl KeyFacts {
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.warnings.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.facts
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
    }

    fn push(&mut self, label: &str, value: String) {
        self.facts.push(KeyFact {
            label: label.to_string(),
            value,
        });
    }

    /// Collects the platform's key facts from the tasks that ran.
    /// Rules whose tasks are absent or skipped contribute nothing.
    pub fn gather(
        platform: Platform,
        store: &FrozenResults,
        capture: Option<&CaptureSummary>,
    ) -> Self {
        let mut out = Self::default();

        if let Some(started) = store.iter().map(|r| r.started_at).min() {
            out.push(
                "Started at",
                started.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            );
        }

        for rule in rules(platform) {
            let outputs: Vec<&str> = rule
                .tasks
                .iter()
                .filter_map(|t| store.get(t))
                .filter(|r| r.status != TaskStatus::Skipped)
                .map(|r| r.stdout.as_str())
                .collect();
            if outputs.is_empty() {
                continue;
            }
            let re = match Regex::new(rule.pattern) {
                Ok(re) => re,
                Err(e) => {
                    tracing::warn!(label = rule.label, error = %e, "key fact pattern rejected");
                    continue;
                }
            };
            match extract(&re, rule.format, &outputs) {
                Some(value) => out.push(rule.label, value),
                None => {
                    if let Some(w) = rule.missing {
                        out.warnings.push(w.to_string());
                    }
                }
            }
        }

        if let Some(cap) = capture {
            match &cap.error {
                Some(e) => out.warnings.push(format!("Capture failed: {e}")),
                None if cap.router_advertisements == 0 => {
                    out.warnings.push("No router advertisements captured".to_string())
                }
                None => out.push(
                    "RA messages received",
                    cap.router_advertisements.to_string(),
                ),
            }
        }

        out
    }
}

fn extract(re: &Regex, format: Format, outputs: &[&str]) -> Option<String> {
    let mut values: Vec<&str> = Vec::new();
    for text in outputs {
        for caps in re.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                let v = m.as_str().trim();
                if !v.is_empty() && !values.contains(&v) {
                    values.push(v);
                }
            }
        }
    }
    match format {
        Format::Join if values.is_empty() => None,
        Format::Join => Some(values.join(" ")),
        Format::HexMac => values.first().and_then(|v| hex_mac(v)),
    }
}

fn hex_mac(raw: &str) -> Option<String> {
    if raw.len() != 12 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let octets: Vec<&str> = (0..6).map(|i| &raw[i * 2..i * 2 + 2]).collect();
    Some(octets.join(":").to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::{Category, TaskResult, TaskSpec};

    fn ran(name: &str, stdout: &str) -> TaskResult {
        let spec = TaskSpec::test(name, Category::System, "true");
        let mut r = TaskResult::new(&spec, TaskStatus::Ok);
        r.stdout = stdout.to_string();
        r
    }

    const IP_ADDR_V4_ONLY: &str = "\
3: wlan0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue state UP group default qlen 1000
    link/ether 3c:22:fb:01:02:03 brd ff:ff:ff:ff:ff:ff
    inet 192.168.1.20/24 brd 192.168.1.255 scope global dynamic noprefixroute wlan0
       valid_lft 86000sec preferred_lft 86000sec
";

    #[test]
    fn linux_addresses_and_missing_ipv6() {
        let store = FrozenResults::from_results([
            ran("ip_addr", IP_ADDR_V4_ONLY),
            ran("user_login", "uid=1000(alice) gid=1000(alice) groups=1000(alice)\n"),
        ])
        .unwrap();

        let kf = KeyFacts::gather(Platform::Linux, &store, None);
        assert_eq!(kf.get("MAC address"), Some("3c:22:fb:01:02:03"));
        assert_eq!(kf.get("IPv4 address"), Some("192.168.1.20"));
        assert_eq!(kf.get("Login"), Some("alice"));
        assert!(kf.get("IPv6 address").is_none());
        assert_eq!(kf.warnings, vec![NO_IPV6.to_string()]);
        // iwconfig never ran, so no signal fact and no warning for it.
        assert!(kf.get("Signal level").is_none());
        assert_eq!(kf.facts[0].label, "Started at");
    }

    #[test]
    fn skipped_task_contributes_no_warning() {
        let spec = TaskSpec::test("ip_addr", Category::System, "true");
        let store =
            FrozenResults::from_results([TaskResult::skipped(&spec, "tool missing")]).unwrap();
        let kf = KeyFacts::gather(Platform::Linux, &store, None);
        assert!(kf.warnings.is_empty());
    }

    #[test]
    fn zero_router_advertisements_is_a_warning() {
        let store = FrozenResults::from_results([ran(
            "ip_addr",
            "    inet6 fe80::3e22:fbff:fe01:203/64 scope link \n",
        )])
        .unwrap();
        let quiet = CaptureSummary::from_text("icmp6", "");
        let kf = KeyFacts::gather(Platform::Linux, &store, Some(&quiet));
        assert_eq!(kf.get("IPv6 address"), Some("fe80::3e22:fbff:fe01:203"));
        assert_eq!(kf.warnings, vec!["No router advertisements captured".to_string()]);

        let heard = CaptureSummary::from_text(
            "icmp6",
            "12:00:01.000 IP6 fe80::1 > ff02::1: ICMP6, router advertisement, length 64\n",
        );
        let kf = KeyFacts::gather(Platform::Linux, &store, Some(&heard));
        assert_eq!(kf.get("RA messages received"), Some("1"));
        assert!(kf.warnings.is_empty());
    }

    #[test]
    fn darwin_bssid_is_rebuilt_from_hex() {
        let store = FrozenResults::from_results([
            ran("log_show", "kernel: \"IO80211BSSID\" = <A0B1C2D3E4F5>\n"),
            ran(
                "system_profiler",
                "          Signal / Noise: -54 dBm / -92 dBm\n          Channel: 36 (5GHz, 80MHz)\n",
            ),
        ])
        .unwrap();
        let kf = KeyFacts::gather(Platform::Darwin, &store, None);
        assert_eq!(kf.get("BSSID"), Some("a0:b1:c2:d3:e4:f5"));
        assert_eq!(kf.get("RSSI"), Some("-54 dBm"));
        assert_eq!(kf.get("Noise"), Some("-92 dBm"));
        assert_eq!(kf.get("Channel"), Some("36"));
        assert!(kf.warnings.is_empty());
    }
}
