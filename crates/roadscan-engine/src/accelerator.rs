//! Chipset detection and execution-provider choice.

use std::{fs, process::Command};

use tracing::{debug, info};

/// Where the model graph is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionTarget {
    Cpu,
    Nnapi,
}

/// Chooses NNAPI when the chipset string contains any known-good identifier.
///
/// Matching ignores case: the `Hardware` line of `/proc/cpuinfo` reports
/// `SM8350` where the platform property reports `lahaina`.
pub fn select_target(hardware: Option<&str>, known_socs: &[String]) -> ExecutionTarget {
    let Some(hardware) = hardware else {
        return ExecutionTarget::Cpu;
    };
    let hardware = hardware.to_ascii_lowercase();
    let matched = known_socs
        .iter()
        .map(|soc| soc.trim().to_ascii_lowercase())
        .find(|soc| !soc.is_empty() && hardware.contains(soc.as_str()));
    match matched {
        Some(soc) => {
            info!("Chipset '{}' matches '{}'; using NNAPI", hardware, soc);
            ExecutionTarget::Nnapi
        }
        None => {
            info!("Chipset '{}' not in accelerated list; using CPU", hardware);
            ExecutionTarget::Cpu
        }
    }
}

/// Best-effort chipset string for the host.
pub fn detect_hardware() -> Option<String> {
    if let Some(hardware) = fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|text| parse_cpuinfo_hardware(&text))
    {
        return Some(hardware);
    }
    ["ro.hardware", "ro.board.platform"]
        .iter()
        .find_map(|prop| read_system_property(prop))
}

/// Extracts the `Hardware` field that ARM kernels expose in `/proc/cpuinfo`.
pub fn parse_cpuinfo_hardware(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let value = value.trim();
        (key.trim() == "Hardware" && !value.is_empty()).then(|| value.to_string())
    })
}

fn read_system_property(name: &str) -> Option<String> {
    let output = Command::new("getprop").arg(name).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    debug!("getprop {} = '{}'", name, value);
    (!value.is_empty()).then_some(value)
}
