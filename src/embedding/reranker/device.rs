use candle_core::Device;
use tracing::{info, warn};

/// First usable accelerator among the compiled backends, otherwise the CPU.
pub(crate) fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Reranking on Metal");
                return device;
            }
            Err(e) => warn!(error = %e, "Metal device unavailable"),
        }
    }

    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("Reranking on CUDA");
                return device;
            }
            Err(e) => warn!(error = %e, "CUDA device unavailable"),
        }
    }

    if cfg!(any(feature = "metal", feature = "cuda")) {
        warn!("No accelerator usable, reranking on CPU");
    } else {
        info!("Reranking on CPU");
    }
    Device::Cpu
}
