//! One-time startup hardware probe.
//!
//! The probe runs once per process; the resulting profile is immutable and
//! frozen verbatim into every job's config snapshot.

use super::types::{HardwareProfile, Precision};
use crate::subprocess::ToolInvocation;
use std::time::Duration;
use tracing::{debug, info};

/// Accelerator memory at which the widest render pool is allowed.
const WIDE_POOL_MEM_MIB: u64 = 16 * 1024;

/// Render pool sizes per hardware class.
const RENDERS_CPU: usize = 2;
const RENDERS_ACCEL: usize = 4;
const RENDERS_ACCEL_WIDE: usize = 6;

/// Probe deadline; a hung management tool must not stall startup.
const PROBE_DEADLINE: Duration = Duration::from_secs(10);

/// Probe the host and choose a hardware profile.
pub fn probe() -> HardwareProfile {
    match detect_accelerator() {
        Some((name, mem_mib)) => {
            let renders = if mem_mib >= WIDE_POOL_MEM_MIB {
                RENDERS_ACCEL_WIDE
            } else {
                RENDERS_ACCEL
            };
            info!(
                "Accelerator detected: {name} ({mem_mib} MiB), using float16 decoding and nvenc"
            );
            HardwareProfile {
                accelerator: Some(name),
                accelerator_mem_mib: Some(mem_mib),
                precision: Precision::Float16,
                video_codec: "h264_nvenc".to_string(),
                default_concurrency: 2,
                default_parallel_renders: renders,
            }
        }
        None => {
            info!("No accelerator detected, using int8 decoding and software encoding");
            HardwareProfile {
                accelerator: None,
                accelerator_mem_mib: None,
                precision: Precision::Int8,
                video_codec: "libx264".to_string(),
                default_concurrency: 1,
                default_parallel_renders: RENDERS_CPU,
            }
        }
    }
}

/// Query the accelerator management tool for (name, memory MiB).
fn detect_accelerator() -> Option<(String, u64)> {
    let tool = ToolInvocation::new(
        "nvidia-smi",
        ["--query-gpu=name,memory.total", "--format=csv,noheader,nounits"],
    );
    let output = match tool.run(Some(PROBE_DEADLINE)) {
        Ok(out) if out.success() => out,
        Ok(out) => {
            debug!("nvidia-smi exited with status {}", out.status);
            return None;
        }
        Err(e) => {
            debug!("nvidia-smi unavailable: {e}");
            return None;
        }
    };

    parse_smi_report(&output.stdout_str())
}

/// Parse the first device line of the management tool's CSV report.
fn parse_smi_report(report: &str) -> Option<(String, u64)> {
    let line = report.lines().find(|l| !l.trim().is_empty())?;
    let (name, mem) = line.rsplit_once(',')?;
    let mem_mib = mem.trim().parse::<u64>().ok()?;
    Some((name.trim().to_string(), mem_mib))
}
