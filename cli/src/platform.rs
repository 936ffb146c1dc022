//! Host facts the collector needs before it starts: interface and gateways.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use wifidiag_core::api::Platform;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const DARWIN_INTERFACE: &str = "en0";
const LINUX_FALLBACK_INTERFACE: &str = "wlan0";

fn interface_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Interface\s+(\S+)").expect("interface regex is valid"))
}

fn linux_gateway_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^default via (\S+)").expect("gateway regex is valid"))
}

/// Run a short probe and return its stdout on success.
async fn probe(program: &str, args: &[&str]) -> Option<String> {
    let fut = Command::new(program).args(args).kill_on_drop(true).output();
    match tokio::time::timeout(PROBE_TIMEOUT, fut).await {
        Ok(Ok(out)) if out.status.success() => Some(String::from_utf8_lossy(&out.stdout).into_owned()),
        Ok(Ok(out)) => {
            tracing::debug!(program, status = ?out.status.code(), "probe exited unsuccessfully");
            None
        }
        Ok(Err(e)) => {
            tracing::debug!(program, error = %e, "probe failed to start");
            None
        }
        Err(_) => {
            tracing::debug!(program, "probe timed out");
            None
        }
    }
}

/// First wireless interface listed by `iw dev`.
pub fn parse_iw_interface(text: &str) -> Option<String> {
    interface_re()
        .captures(text)
        .map(|c| c[1].to_string())
}

pub fn parse_linux_gateway(text: &str) -> Option<String> {
    linux_gateway_re()
        .captures(text)
        .map(|c| c[1].to_string())
}

/// Default route through `interface` in `netstat -rn` output.
pub fn parse_darwin_gateway(text: &str, interface: &str) -> Option<String> {
    text.lines()
        .filter(|l| l.starts_with("default"))
        .filter_map(|l| {
            let cols: Vec<&str> = l.split_whitespace().collect();
            let gw = cols.get(1)?;
            cols.iter()
                .skip(2)
                .any(|c| *c == interface)
                .then(|| gw.to_string())
        })
        .next()
}

pub async fn resolve_interface(platform: Platform, explicit: Option<&str>) -> String {
    if let Some(iface) = explicit.map(str::trim).filter(|s| !s.is_empty()) {
        return iface.to_string();
    }
    match platform {
        Platform::Darwin => DARWIN_INTERFACE.to_string(),
        Platform::Linux => match probe("iw", &["dev"]).await.as_deref().and_then(parse_iw_interface) {
            Some(iface) => iface,
            None => {
                tracing::warn!(fallback = LINUX_FALLBACK_INTERFACE, "no wireless interface found by `iw dev`");
                LINUX_FALLBACK_INTERFACE.to_string()
            }
        },
    }
}

/// IPv4 and IPv6 default gateways; either may be unknown.
pub async fn resolve_gateways(platform: Platform, interface: &str) -> (Option<String>, Option<String>) {
    let (v4, v6) = match platform {
        Platform::Linux => {
            let (v4, v6) = tokio::join!(
                probe("ip", &["-4", "route", "list"]),
                probe("ip", &["-6", "route", "list"])
            );
            (
                v4.as_deref().and_then(parse_linux_gateway),
                v6.as_deref().and_then(parse_linux_gateway),
            )
        }
        Platform::Darwin => {
            let (v4, v6) = tokio::join!(
                probe("netstat", &["-rn", "-f", "inet"]),
                probe("netstat", &["-rn", "-f", "inet6"])
            );
            (
                v4.as_deref().and_then(|t| parse_darwin_gateway(t, interface)),
                v6.as_deref().and_then(|t| parse_darwin_gateway(t, interface)),
            )
        }
    };
    tracing::info!(?v4, ?v6, interface, "gateways resolved");
    (v4, v6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iw_dev_first_interface() {
        let text = "phy#0\n\tInterface wlp2s0\n\t\tifindex 3\n\t\ttype managed\nphy#1\n\tInterface wlan1\n";
        assert_eq!(parse_iw_interface(text).as_deref(), Some("wlp2s0"));
        assert_eq!(parse_iw_interface("phy#0\n"), None);
    }

    #[test]
    fn linux_default_route() {
        let v4 = "default via 192.168.1.1 dev wlp2s0 proto dhcp metric 600\n192.168.1.0/24 dev wlp2s0 scope link\n";
        assert_eq!(parse_linux_gateway(v4).as_deref(), Some("192.168.1.1"));
        let v6 = "fe80::/64 dev wlp2s0 proto kernel\ndefault via fe80::1 dev wlp2s0 proto ra metric 600\n";
        assert_eq!(parse_linux_gateway(v6).as_deref(), Some("fe80::1"));
        assert_eq!(parse_linux_gateway("10.0.0.0/8 dev eth0\n"), None);
    }

    #[test]
    fn darwin_default_route_matches_interface() {
        let text = "Routing tables\n\nInternet:\nDestination        Gateway            Flags        Netif Expire\ndefault            10.0.1.1           UGScg          en7\ndefault            192.168.0.1        UGScIg         en0\n";
        assert_eq!(parse_darwin_gateway(text, "en0").as_deref(), Some("192.168.0.1"));
        assert_eq!(parse_darwin_gateway(text, "en9"), None);
    }

    #[tokio::test]
    async fn explicit_interface_wins() {
        assert_eq!(resolve_interface(Platform::Linux, Some(" wlx0 ")).await, "wlx0");
        assert_eq!(resolve_interface(Platform::Darwin, None).await, "en0");
    }
}
