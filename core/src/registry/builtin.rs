use std::time::Duration;

use crate::context::Platform;
use crate::executor::types::{Category, CommandTemplate, MetricParser, TaskSpec, GATEWAY_TARGET};

const PING_ARGS: &str = "-c 20";
const SLOW_TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// Probes run against each named target. Task names are `<test>_<probe>`.
const TESTS: &[(&str, &str, &[Probe])] = &[
    ("google_dns", "8.8.8.8", &[Probe::Ping, Probe::Route]),
    (
        "google_com",
        "google.com",
        &[Probe::Ping, Probe::Ping6, Probe::Curl, Probe::Curl6, Probe::Nslookup],
    ),
    (
        "facebook",
        "facebook.com",
        &[Probe::Ping, Probe::Ping6, Probe::Curl, Probe::Curl6, Probe::Nslookup],
    ),
    (
        "youtube",
        "youtube.com",
        &[Probe::Ping, Probe::Ping6, Probe::Curl, Probe::Curl6],
    ),
    (
        "the_wlpc",
        "thewlpc.com",
        &[Probe::Ping, Probe::Ping6, Probe::Curl, Probe::Traceroute],
    ),
    ("gateway", GATEWAY_TARGET, &[Probe::Ping, Probe::Ping6]),
];

#[derive(Debug, Clone, Copy)]
enum Probe {
    Ping,
    Ping6,
    Curl,
    Curl6,
    Route,
    Traceroute,
    Nslookup,
}

impl Probe {
    fn suffix(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Ping6 => "ping6",
            Self::Curl => "curl",
            Self::Curl6 => "curl6",
            Self::Route => "route",
            Self::Traceroute => "traceroute",
            Self::Nslookup => "nslookup",
        }
    }

    fn spec(self, test: &str, target: &str) -> TaskSpec {
        let name = format!("{test}_{}", self.suffix());
        let gateway = target == GATEWAY_TARGET;
        let spec = match self {
            Self::Ping | Self::Ping6 => {
                let bin = if matches!(self, Self::Ping6) { "ping6" } else { "ping" };
                let category = if gateway {
                    Category::Connectivity
                } else {
                    Category::Latency
                };
                TaskSpec::test(name, category, format!("{bin} {PING_ARGS} {{target}}"))
                    .with_parser(MetricParser::Ping)
                    .with_facts([r"(\S+% packet loss)", r"min/avg/max/\S+ = (\S+ ms)"])
            }
            Self::Curl => TaskSpec::test(name, Category::Connectivity, "curl -4Is http://{target}")
                .with_parser(MetricParser::Http)
                .with_facts([r"(?m)^(HTTP/\S+ \d{3}.*?)\r?$"]),
            Self::Curl6 => TaskSpec::test(name, Category::Connectivity, "curl -6Is http://{target}")
                .with_parser(MetricParser::Http)
                .with_facts([r"(?m)^(HTTP/\S+ \d{3}.*?)\r?$"]),
            Self::Route => TaskSpec::test(
                name,
                Category::Connectivity,
                CommandTemplate::per_platform([
                    (Platform::Linux, "ip route get {target}"),
                    (Platform::Darwin, "route -vn get {target}"),
                ]),
            ),
            Self::Traceroute => TaskSpec::test(name, Category::Latency, "traceroute -I {target}")
                .with_timeout(SLOW_TASK_TIMEOUT),
            Self::Nslookup => TaskSpec::test(name, Category::Dns, "nslookup {target}")
                .with_parser(MetricParser::Dns)
                .with_facts([r"(?m)^Server:\s*(\S+)"]),
        };

        let ipv6 = matches!(self, Self::Ping6 | Self::Curl6);
        spec.with_target(target).with_ipv6(ipv6)
    }
}

pub(crate) fn tests() -> Vec<TaskSpec> {
    TESTS
        .iter()
        .flat_map(|(test, target, probes)| probes.iter().map(move |p| p.spec(test, target)))
        .collect()
}

pub(crate) fn diagnostics() -> Vec<TaskSpec> {
    use Platform::{Darwin, Linux};

    vec![
        // shared names, per-platform commands
        TaskSpec::diagnostic(
            "public_ip",
            Category::Connectivity,
            "curl -s --max-time 10 ifconfig.me",
        )
        .with_facts([r"\S+"]),
        TaskSpec::diagnostic(
            "gateway_ipv4",
            Category::Connectivity,
            CommandTemplate::per_platform([
                (Linux, "ip -4 route list type unicast dev {interface}"),
                (Darwin, "route get default"),
            ]),
        )
        .with_facts([r"default via \S+", r"gateway: \S+"]),
        TaskSpec::diagnostic(
            "gateway_ipv6",
            Category::Connectivity,
            CommandTemplate::per_platform([
                (Linux, "ip -6 route list type unicast dev {interface}"),
                (Darwin, "route -n get -inet6 default"),
            ]),
        )
        .with_facts([r"default via \S+", r"gateway: \S+"]),
        TaskSpec::diagnostic("tcp_stats", Category::LinkQuality, "netstat -s")
            .with_parser(MetricParser::TcpStats)
            .with_facts([r"\d+ segments retransmitted", r"\d+ data packets? \(\d+ bytes?\) retransmitted"]),
        // darwin
        TaskSpec::diagnostic("log_show", Category::System, "log show --info --debug --last 5m")
            .with_platforms(&[Darwin])
            .with_timeout(SLOW_TASK_TIMEOUT),
        TaskSpec::diagnostic("ifconfig", Category::System, "ifconfig {interface}")
            .with_platforms(&[Darwin])
            .with_facts([r"ether \S+", r"inet6 .+", r"inet .+"]),
        TaskSpec::diagnostic("netstat", Category::Connectivity, "netstat -rn")
            .with_platforms(&[Darwin])
            .with_facts([r"default.+en\d+"]),
        TaskSpec::diagnostic(
            "system_profiler",
            Category::LinkQuality,
            "system_profiler SPAirPortDataType SPHardwareDataType SPSoftwareDataType SPLogsDataType",
        )
        .with_platforms(&[Darwin])
        .with_timeout(SLOW_TASK_TIMEOUT)
        .with_parser(MetricParser::Wireless)
        .with_facts([
            r"Computer Name: .+",
            r"User Name: .+",
            r"System Version: .+",
            r"Time since boot: .+",
            r"Card Type: .+",
            r"Firmware Version: .+",
            r"Supported PHY Modes: .+",
            r"Signal / Noise: .+",
            r"Channel: .+",
            r#""IO80211BSSID" = <(\S+)>"#,
        ]),
        TaskSpec::diagnostic(
            "airport",
            Category::LinkQuality,
            "/System/Library/PrivateFrameworks/Apple80211.framework/Versions/Current/Resources/airport -I",
        )
        .with_platforms(&[Darwin])
        .with_parser(MetricParser::Wireless)
        .with_facts([r"agrCtlRSSI: \S+", r"agrCtlNoise: \S+", r" SSID: .+", r"channel: \S+"]),
        TaskSpec::diagnostic(
            "known_networks",
            Category::System,
            "networksetup -listpreferredwirelessnetworks {interface}",
        )
        .with_platforms(&[Darwin])
        .with_facts([r"\t(\S+)"]),
        TaskSpec::diagnostic("wdutil", Category::LinkQuality, "wdutil info")
            .with_platforms(&[Darwin])
            .with_parser(MetricParser::Wireless),
        // linux
        TaskSpec::diagnostic("journalctl", Category::System, "journalctl -S -10m --no-pager")
            .with_platforms(&[Linux])
            .with_timeout(SLOW_TASK_TIMEOUT),
        TaskSpec::diagnostic("ip_addr", Category::System, "ip addr show {interface}")
            .with_platforms(&[Linux])
            .with_facts([r"ether \S+", r"inet6 .+", r"inet .+"]),
        TaskSpec::diagnostic("ip_route_table", Category::Connectivity, "ip route show table all")
            .with_platforms(&[Linux])
            .with_facts([r"default via \S+ dev \S+"]),
        TaskSpec::diagnostic("user_login", Category::System, "id")
            .with_platforms(&[Linux])
            .with_facts([r"uid=\S+"]),
        TaskSpec::diagnostic("boot_time", Category::System, "who -b")
            .with_platforms(&[Linux])
            .with_facts([r"system boot.+"]),
        TaskSpec::diagnostic("iw_dev", Category::LinkQuality, "iw dev")
            .with_platforms(&[Linux])
            .with_facts([r"ssid \S+", r"channel .+"]),
        TaskSpec::diagnostic("iwconfig", Category::LinkQuality, "iwconfig {interface}")
            .with_platforms(&[Linux])
            .with_parser(MetricParser::Wireless)
            .with_facts([r"Access Point: \S+", r"Link Quality=\S+", r"Signal level=\S+ dBm"]),
        TaskSpec::diagnostic("supported_channels", Category::System, "iwlist {interface} channel")
            .with_platforms(&[Linux]),
        TaskSpec::diagnostic("hostnamectl", Category::System, "hostnamectl")
            .with_platforms(&[Linux])
            .with_facts([
                r"Static hostname: \S+",
                r"Operating System: .*",
                r"Kernel: .*",
                r"Architecture: \S+",
                r"Hardware Vendor: .*",
                r"Hardware Model: .*",
            ]),
        TaskSpec::diagnostic(
            "adapter_info",
            Category::System,
            "nmcli -f GENERAL dev show {interface}",
        )
        .with_platforms(&[Linux])
        .with_facts([
            r"DEVICE:.+",
            r"VENDOR:.+",
            r"PRODUCT:.+",
            r"DRIVER:.+",
            r"DRIVER-VERSION:.+",
        ]),
        TaskSpec::diagnostic("wifi_list", Category::LinkQuality, "nmcli device wifi list")
            .with_platforms(&[Linux]),
    ]
}
