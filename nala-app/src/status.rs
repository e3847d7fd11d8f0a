//! Server info report.
//!
//! Host metrics come from a [`MetricsSource`]; the default one samples the
//! machine through `sysinfo` on the blocking pool.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, Networks, RefreshKind, System};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq)]
pub struct HostSnapshot {
    pub os: OsInfo,
    pub uptime_secs: u64,
    pub cpu: CpuInfo,
    pub memory: MemoryUsage,
    pub disks: Vec<DiskUsage>,
    /// 1, 5 and 15 minute load averages.
    pub load_average: [f64; 3],
    pub network: Option<NetworkCounters>,
    pub runtime: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsInfo {
    pub distro: String,
    pub arch: String,
    pub release: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CpuInfo {
    pub manufacturer: String,
    pub brand: String,
    pub cores: usize,
    pub speed_ghz: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskUsage {
    pub mount: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCounters {
    pub interface: String,
    pub transmitted_bytes: u64,
    pub received_bytes: u64,
}

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn snapshot(&self) -> Result<HostSnapshot>;
}

pub struct StatusReporter {
    source: Arc<dyn MetricsSource>,
}

impl StatusReporter {
    pub fn new(source: Arc<dyn MetricsSource>) -> Self {
        Self { source }
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn collect(&self) -> Result<String> {
        let snapshot = self.source.snapshot().await?;
        Ok(format_report(&snapshot))
    }
}

pub fn format_report(s: &HostSnapshot) -> String {
    let disks = s
        .disks
        .iter()
        .map(|d| {
            format!(
                "• {}: {} / {} ({:.1}%)",
                d.mount,
                gigabytes(d.used_bytes),
                gigabytes(d.total_bytes),
                percent(d.used_bytes, d.total_bytes)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let network = s
        .network
        .as_ref()
        .map(|n| {
            format!(
                "Sent: {:.2} MB | Received: {:.2} MB",
                n.transmitted_bytes as f64 / MIB,
                n.received_bytes as f64 / MIB
            )
        })
        .unwrap_or_default();

    let mut out = String::from("*Server Info*\n");
    let _ = writeln!(
        out,
        "• OS        : {} ({}) {}",
        s.os.distro, s.os.arch, s.os.release
    );
    let _ = writeln!(
        out,
        "• Uptime    : {:.2} hours",
        s.uptime_secs as f64 / 3600.0
    );
    let _ = writeln!(
        out,
        "• CPU       : {} {} ({} cores @ {}GHz)",
        s.cpu.manufacturer, s.cpu.brand, s.cpu.cores, s.cpu.speed_ghz
    );
    let _ = writeln!(out, "• RAM       : {}", ram_line(&s.memory));
    let _ = writeln!(out, "• Disk      : \n{disks}");
    let [one, five, fifteen] = s.load_average;
    let _ = writeln!(out, "• LoadAvg   : {one:.2} | {five:.2} | {fifteen:.2}");
    let _ = writeln!(out, "• Network   : {network}");
    let _ = write!(out, "• Node      : {}", s.runtime);
    out
}

pub fn ram_line(memory: &MemoryUsage) -> String {
    format!(
        "{} / {} ({:.1}%)",
        gigabytes(memory.used_bytes),
        gigabytes(memory.total_bytes),
        percent(memory.used_bytes, memory.total_bytes)
    )
}

fn gigabytes(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GIB)
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

pub fn runtime_version() -> String {
    format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Samples the local host through `sysinfo`.
pub struct SysinfoMetrics {
    network_interface: Option<String>,
}

impl SysinfoMetrics {
    pub fn new(network_interface: Option<String>) -> Self {
        Self {
            network_interface: network_interface
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        }
    }
}

#[async_trait]
impl MetricsSource for SysinfoMetrics {
    async fn snapshot(&self) -> Result<HostSnapshot> {
        let interface = self.network_interface.clone();
        tokio::task::spawn_blocking(move || sample_host(interface.as_deref()))
            .await
            .map_err(|e| anyhow::anyhow!("metrics task failed: {e}"))?
    }
}

fn sample_host(network_interface: Option<&str>) -> Result<HostSnapshot> {
    let sys = System::new_with_specifics(
        RefreshKind::new()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything()),
    );

    let first_cpu = sys
        .cpus()
        .first()
        .ok_or_else(|| anyhow::anyhow!("no CPU information available on this platform"))?;
    let cpu = CpuInfo {
        manufacturer: first_cpu.vendor_id().trim().to_string(),
        brand: first_cpu.brand().trim().to_string(),
        cores: sys.physical_core_count().unwrap_or(sys.cpus().len()),
        speed_ghz: first_cpu.frequency() as f64 / 1000.0,
    };

    let total_memory = sys.total_memory();
    if total_memory == 0 {
        return Err(anyhow::anyhow!("memory information unavailable on this platform"));
    }
    let memory = MemoryUsage {
        total_bytes: total_memory,
        used_bytes: sys.used_memory(),
    };

    let os = OsInfo {
        distro: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
        arch: System::cpu_arch().unwrap_or_else(|| std::env::consts::ARCH.to_string()),
        release: System::os_version()
            .or_else(System::kernel_version)
            .unwrap_or_default(),
    };

    let disks = Disks::new_with_refreshed_list()
        .list()
        .iter()
        .map(|disk| DiskUsage {
            mount: disk.mount_point().display().to_string(),
            total_bytes: disk.total_space(),
            used_bytes: disk.total_space().saturating_sub(disk.available_space()),
        })
        .collect();

    let networks = Networks::new_with_refreshed_list();
    let interfaces = networks.list();
    let mut names: Vec<&String> = interfaces.keys().collect();
    names.sort();
    let chosen = match network_interface {
        Some(wanted) => names.into_iter().find(|name| name.as_str() == wanted),
        None => names.into_iter().find(|name| !name.starts_with("lo")),
    };
    let network = chosen.and_then(|name| {
        interfaces.get(name.as_str()).map(|data| NetworkCounters {
            interface: name.clone(),
            transmitted_bytes: data.total_transmitted(),
            received_bytes: data.total_received(),
        })
    });
    match network.as_ref() {
        Some(n) => tracing::debug!(interface = %n.interface, "network interface selected"),
        None => tracing::debug!(requested = ?network_interface, "no network interface to report"),
    }

    let load = System::load_average();
    Ok(HostSnapshot {
        os,
        uptime_secs: System::uptime(),
        cpu,
        memory,
        disks,
        load_average: [load.one, load.five, load.fifteen],
        network,
        runtime: runtime_version(),
    })
}
