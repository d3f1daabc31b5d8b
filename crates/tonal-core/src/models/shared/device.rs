//! Device selection for native inference.

use candle_core::{DType, Device};
use tracing::{debug, info, warn};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cuda,
    Metal,
    Cpu,
}

impl DeviceKind {
    pub fn is_cpu(&self) -> bool {
        matches!(self, DeviceKind::Cpu)
    }

    pub fn is_metal(&self) -> bool {
        matches!(self, DeviceKind::Metal)
    }

    pub fn is_cuda(&self) -> bool {
        matches!(self, DeviceKind::Cuda)
    }
}

#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub device: Device,
    pub kind: DeviceKind,
    /// Whether bfloat16 kernels are usable
    pub supports_bf16: bool,
}

impl DeviceProfile {
    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
            kind: DeviceKind::Cpu,
            supports_bf16: false,
        }
    }

    /// Select a compute dtype for the device and the requested preference.
    ///
    /// CPU and Metal always run F32. CUDA honours explicit requests and
    /// defaults to BF16 where supported.
    pub fn select_dtype(&self, requested: Option<&str>) -> DType {
        let dtype = match (self.kind, requested.unwrap_or("")) {
            (DeviceKind::Cpu, _) | (DeviceKind::Metal, _) => DType::F32,
            (DeviceKind::Cuda, "float32" | "f32") => DType::F32,
            (DeviceKind::Cuda, "float16" | "f16") => DType::F16,
            (DeviceKind::Cuda, _) if self.supports_bf16 => DType::BF16,
            (DeviceKind::Cuda, _) => DType::F32,
        };

        debug!(
            "Selected dtype {:?} for device {:?} (requested: {:?})",
            dtype, self.kind, requested
        );

        dtype
    }
}

pub struct DeviceSelector;

impl DeviceSelector {
    fn try_metal() -> Option<DeviceProfile> {
        let device = std::panic::catch_unwind(|| Device::new_metal(0))
            .ok()?
            .ok()?;
        if device.is_metal() {
            Some(DeviceProfile {
                device,
                kind: DeviceKind::Metal,
                supports_bf16: false,
            })
        } else {
            None
        }
    }

    fn try_cuda() -> Option<DeviceProfile> {
        let device = std::panic::catch_unwind(|| Device::cuda_if_available(0))
            .ok()?
            .ok()?;
        if device.is_cuda() {
            Some(DeviceProfile {
                device,
                kind: DeviceKind::Cuda,
                // Ampere and newer; older cards can force f32 through the dtype setting
                supports_bf16: true,
            })
        } else {
            None
        }
    }

    pub fn detect() -> Result<DeviceProfile> {
        if let Some(profile) = Self::try_cuda() {
            info!("Using CUDA device for inference");
            return Ok(profile);
        }

        if let Some(profile) = Self::try_metal() {
            info!("Using Metal device for inference");
            return Ok(profile);
        }

        info!("Falling back to CPU for inference");
        Ok(DeviceProfile::cpu())
    }

    pub fn detect_with_preference(preference: Option<&str>) -> Result<DeviceProfile> {
        match preference.unwrap_or("").to_ascii_lowercase().as_str() {
            "cuda" | "gpu" => Self::try_cuda().map(Ok).unwrap_or_else(|| {
                warn!("CUDA requested but unavailable");
                Self::detect()
            }),
            "metal" | "mps" => Self::try_metal().map(Ok).unwrap_or_else(|| {
                warn!("Metal requested but unavailable");
                Self::detect()
            }),
            "cpu" => Ok(DeviceProfile::cpu()),
            _ => Self::detect(),
        }
    }
}
