use anyhow::{Context, Result};
use std::path::Path;

/// Ensure directory exists
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {:?}", path))?;
    }
    Ok(())
}

/// Check if file exists
pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_file()
}

/// Select the accelerator device before any backend is initialized.
///
/// Sets the device-ordering and visible-device environment variables that
/// GPU-capable backends read at startup. Must run before the first tensor
/// operation to take effect.
pub fn configure_device_env(visible_device: &str) {
    std::env::set_var("CUDA_DEVICE_ORDER", "PCI_BUS_ID");
    std::env::set_var("CUDA_VISIBLE_DEVICES", visible_device);
}

/// Format duration as human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

/// Random number utilities
pub mod random {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Create RNG with fixed seed
    pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }
}
