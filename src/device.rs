//! Compute device detection.
//!
//! The device is probed once at startup and threaded through the pipeline as
//! an explicit value; it is immutable for the duration of the run. Without a
//! CUDA runtime linked, a detected GPU only changes the startup banner; all
//! math runs on the CPU's SIMD units.

use std::fmt;

/// Compute device for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    /// CPU execution.
    Cpu,
    /// CUDA GPU with device ID.
    Cuda { device_id: usize },
}

impl ComputeDevice {
    /// Auto-detect the best available device, preferring CUDA.
    #[must_use]
    pub fn auto_detect() -> Self {
        if Self::cuda_available() {
            Self::Cuda { device_id: 0 }
        } else {
            Self::Cpu
        }
    }

    /// Check whether a CUDA GPU is visible.
    #[must_use]
    pub fn cuda_available() -> bool {
        if std::env::var("CUDA_VISIBLE_DEVICES").is_ok_and(|v| !v.is_empty()) {
            return true;
        }

        std::process::Command::new("nvidia-smi")
            .args(["--query-gpu=name", "--format=csv,noheader"])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Whether this device is a GPU.
    #[must_use]
    pub const fn is_cuda(&self) -> bool {
        matches!(self, Self::Cuda { .. })
    }

    /// Whether this device is the CPU.
    #[must_use]
    pub const fn is_cpu(&self) -> bool {
        matches!(self, Self::Cpu)
    }
}

impl Default for ComputeDevice {
    fn default() -> Self {
        Self::auto_detect()
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "CPU"),
            Self::Cuda { device_id } => write!(f, "CUDA:{device_id}"),
        }
    }
}
