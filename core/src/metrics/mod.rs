//! Numeric metrics and key facts pulled out of raw command output.
use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::executor::types::MetricParser;

pub const PACKET_LOSS_PCT: &str = "packet_loss_pct";
pub const RTT_AVG_MS: &str = "rtt_avg_ms";
pub const HTTP_STATUS: &str = "http_status";
pub const RESOLVED_ADDRESSES: &str = "resolved_addresses";
pub const RSSI_DBM: &str = "rssi_dbm";
pub const NOISE_DBM: &str = "noise_dbm";
pub const LINK_QUALITY_PCT: &str = "link_quality_pct";
pub const RETRANSMITS: &str = "retransmits";
pub const SEGMENTS_SENT: &str = "segments_sent";
pub const RETRANSMIT_PCT: &str = "retransmit_pct";

pub type Metrics = BTreeMap<String, f64>;

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect(concat!(stringify!($name), " is valid")))
        }
    };
}

cached_regex!(packet_loss_re, r"(\d+(?:\.\d+)?)% packet loss");
cached_regex!(rtt_re, r"(?m)^(?:rtt|round-trip) min/avg/max/\w+ = [\d.]+/([\d.]+)/");
cached_regex!(http_status_re, r"(?m)^HTTP/[\d.]+ (\d{3})");
cached_regex!(nslookup_address_re, r"(?m)^Address(?:es)?:\s*(\S+)");
cached_regex!(iw_signal_re, r"Signal level[=:](-?\d+) dBm");
cached_regex!(iw_quality_re, r"Link Quality[=:](\d+)/(\d+)");
cached_regex!(airport_rssi_re, r"agrCtlRSSI:\s*(-?\d+)");
cached_regex!(airport_noise_re, r"agrCtlNoise:\s*(-?\d+)");
cached_regex!(signal_noise_re, r"Signal / Noise:\s*(-?\d+) dBm / (-?\d+) dBm");
cached_regex!(wdutil_rssi_re, r"(?m)^\s*RSSI\s*:\s*(-?\d+) dBm");
cached_regex!(wdutil_noise_re, r"(?m)^\s*Noise\s*:\s*(-?\d+) dBm");
cached_regex!(linux_retrans_re, r"(\d+) segments retransmitted");
cached_regex!(linux_sent_re, r"(\d+) segments sen[dt] out");
cached_regex!(darwin_retrans_re, r"(\d+) data packets? \(\d+ bytes?\) retransmitted");
cached_regex!(darwin_sent_re, r"(?m)^\s*(\d+) packets? sent$");

fn first_number(re: &Regex, text: &str, group: usize) -> Option<f64> {
    re.captures(text)
        .and_then(|c| c.get(group))
        .and_then(|m| m.as_str().parse().ok())
}

/// Run `parser` over `output`. Unrecognised output yields no metrics.
pub fn extract(parser: Option<MetricParser>, output: &str) -> Metrics {
    let mut m = Metrics::new();
    let Some(parser) = parser else {
        return m;
    };

    match parser {
        MetricParser::Ping => {
            if let Some(v) = first_number(packet_loss_re(), output, 1) {
                m.insert(PACKET_LOSS_PCT.into(), v);
            }
            if let Some(v) = first_number(rtt_re(), output, 1) {
                m.insert(RTT_AVG_MS.into(), v);
            }
        }
        MetricParser::Http => {
            if let Some(v) = first_number(http_status_re(), output, 1) {
                m.insert(HTTP_STATUS.into(), v);
            }
        }
        MetricParser::Dns => {
            // Addresses before the first "Name:" belong to the resolver itself.
            if let Some(pos) = output.find("Name:") {
                let answers = nslookup_address_re().find_iter(&output[pos..]).count();
                m.insert(RESOLVED_ADDRESSES.into(), answers as f64);
            } else {
                m.insert(RESOLVED_ADDRESSES.into(), 0.0);
            }
        }
        MetricParser::Wireless => extract_wireless(output, &mut m),
        MetricParser::TcpStats => extract_tcp_stats(output, &mut m),
    }

    m
}

fn extract_wireless(output: &str, m: &mut Metrics) {
    let rssi = first_number(iw_signal_re(), output, 1)
        .or_else(|| first_number(airport_rssi_re(), output, 1))
        .or_else(|| first_number(signal_noise_re(), output, 1))
        .or_else(|| first_number(wdutil_rssi_re(), output, 1));
    if let Some(v) = rssi {
        m.insert(RSSI_DBM.into(), v);
    }

    let noise = first_number(airport_noise_re(), output, 1)
        .or_else(|| first_number(signal_noise_re(), output, 2))
        .or_else(|| first_number(wdutil_noise_re(), output, 1));
    if let Some(v) = noise {
        m.insert(NOISE_DBM.into(), v);
    }

    if let Some(c) = iw_quality_re().captures(output) {
        let num: Option<f64> = c.get(1).and_then(|x| x.as_str().parse().ok());
        let den: Option<f64> = c.get(2).and_then(|x| x.as_str().parse().ok());
        if let (Some(num), Some(den)) = (num, den) {
            if den > 0.0 {
                m.insert(LINK_QUALITY_PCT.into(), round2(num / den * 100.0));
            }
        }
    }
}

fn extract_tcp_stats(output: &str, m: &mut Metrics) {
    let retrans = first_number(linux_retrans_re(), output, 1)
        .or_else(|| first_number(darwin_retrans_re(), output, 1));
    let sent = first_number(linux_sent_re(), output, 1)
        .or_else(|| first_number(darwin_sent_re(), output, 1));

    if let Some(r) = retrans {
        m.insert(RETRANSMITS.into(), r);
    }
    if let Some(s) = sent {
        m.insert(SEGMENTS_SENT.into(), s);
        if let Some(r) = retrans {
            if s > 0.0 {
                m.insert(RETRANSMIT_PCT.into(), round2(r / s * 100.0));
            }
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Collect matches of every fact expression, in pattern order.
///
/// Keeps the first capture group when the expression has one, the whole
/// match otherwise. Expressions are validated when the registry is built;
/// one that still fails to compile here is skipped.
pub fn extract_facts(patterns: &[String], output: &str) -> Vec<String> {
    let mut facts = Vec::new();
    for pattern in patterns {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!(%pattern, error = %e, "skipping invalid fact expression");
                continue;
            }
        };
        for caps in re.captures_iter(output) {
            let m = caps.get(1).or_else(|| caps.get(0));
            if let Some(m) = m {
                let text = m.as_str().trim();
                if !text.is_empty() {
                    facts.push(text.to_string());
                }
            }
        }
    }
    facts
}
