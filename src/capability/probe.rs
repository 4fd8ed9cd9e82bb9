use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

/// Runtime platform capabilities relevant to path selection.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// Accelerated video decode is exposed to the page.
    pub hardware_decode: bool,
    /// Shared memory between workers (required for threaded encoders).
    pub shared_memory: bool,
    /// Dedicated workers can be spawned.
    pub workers: bool,
    /// The document is cross-origin isolated.
    pub cross_origin_isolated: bool,
    /// Device memory estimate in GB, when the platform reports one.
    pub device_memory_gb: Option<f64>,
    /// Heap ceiling estimate in bytes, when the platform reports one.
    pub heap_limit_bytes: Option<u64>,
    /// Mobile-class device.
    pub is_mobile: bool,
    /// Logical core count.
    pub logical_cores: u32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::conservative()
    }
}

impl Capabilities {
    /// Values assumed before detection completes, and per-flag after a query fails.
    pub fn conservative() -> Self {
        Self {
            hardware_decode: false,
            shared_memory: false,
            workers: false,
            cross_origin_isolated: false,
            device_memory_gb: None,
            heap_limit_bytes: None,
            is_mobile: false,
            logical_cores: 1,
        }
    }

    /// Multi-threaded encoders need all three.
    pub fn threading_available(&self) -> bool {
        self.shared_memory && self.cross_origin_isolated && self.workers
    }

    /// Unknown device memory is not treated as low.
    pub fn is_low_memory(&self, threshold_gb: f64) -> bool {
        self.device_memory_gb.is_some_and(|gb| gb <= threshold_gb)
    }
}

/// Platform queries behind the probe. Any query may fail; the probe degrades that flag.
#[async_trait]
pub trait PlatformQuery: Send + Sync {
    /// Usually an async codec-support check, hence the only async query.
    async fn hardware_decode(&self) -> anyhow::Result<bool>;
    fn shared_memory(&self) -> anyhow::Result<bool>;
    fn workers(&self) -> anyhow::Result<bool>;
    fn cross_origin_isolated(&self) -> anyhow::Result<bool>;
    fn device_memory_gb(&self) -> anyhow::Result<Option<f64>>;
    fn heap_limit_bytes(&self) -> anyhow::Result<Option<u64>>;
    fn is_mobile(&self) -> anyhow::Result<bool>;
    fn logical_cores(&self) -> anyhow::Result<u32>;
}

/// Fixed platform answers, for the CLI and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticPlatform {
    caps: Capabilities,
}

impl StaticPlatform {
    pub fn new(caps: Capabilities) -> Self {
        Self { caps }
    }
}

#[async_trait]
impl PlatformQuery for StaticPlatform {
    async fn hardware_decode(&self) -> anyhow::Result<bool> {
        Ok(self.caps.hardware_decode)
    }

    fn shared_memory(&self) -> anyhow::Result<bool> {
        Ok(self.caps.shared_memory)
    }

    fn workers(&self) -> anyhow::Result<bool> {
        Ok(self.caps.workers)
    }

    fn cross_origin_isolated(&self) -> anyhow::Result<bool> {
        Ok(self.caps.cross_origin_isolated)
    }

    fn device_memory_gb(&self) -> anyhow::Result<Option<f64>> {
        Ok(self.caps.device_memory_gb)
    }

    fn heap_limit_bytes(&self) -> anyhow::Result<Option<u64>> {
        Ok(self.caps.heap_limit_bytes)
    }

    fn is_mobile(&self) -> anyhow::Result<bool> {
        Ok(self.caps.is_mobile)
    }

    fn logical_cores(&self) -> anyhow::Result<u32> {
        Ok(self.caps.logical_cores)
    }
}

/// Memoized capability detection.
///
/// Constructed once at startup and shared by reference; the first [`CapabilityProbe::detect`]
/// queries the platform, later calls return the cached value.
pub struct CapabilityProbe {
    platform: Arc<dyn PlatformQuery>,
    cell: OnceCell<Capabilities>,
}

impl CapabilityProbe {
    pub fn new(platform: Arc<dyn PlatformQuery>) -> Self {
        Self {
            platform,
            cell: OnceCell::new(),
        }
    }

    /// Probe with fixed answers.
    pub fn fixed(caps: Capabilities) -> Self {
        Self::new(Arc::new(StaticPlatform::new(caps)))
    }

    /// Detect once, then serve the cached result. Never fails.
    pub async fn detect(&self) -> Capabilities {
        self.cell
            .get_or_init(|| self.query_platform())
            .await
            .clone()
    }

    /// Best-known capabilities without waiting.
    pub fn cached(&self) -> Capabilities {
        self.cell
            .get()
            .cloned()
            .unwrap_or_else(Capabilities::conservative)
    }

    pub fn is_detected(&self) -> bool {
        self.cell.initialized()
    }

    async fn query_platform(&self) -> Capabilities {
        let base = Capabilities::conservative();
        let p = &self.platform;
        let caps = Capabilities {
            hardware_decode: degrade(
                "hardware_decode",
                p.hardware_decode().await,
                base.hardware_decode,
            ),
            shared_memory: degrade("shared_memory", p.shared_memory(), base.shared_memory),
            workers: degrade("workers", p.workers(), base.workers),
            cross_origin_isolated: degrade(
                "cross_origin_isolated",
                p.cross_origin_isolated(),
                base.cross_origin_isolated,
            ),
            device_memory_gb: degrade(
                "device_memory_gb",
                p.device_memory_gb(),
                base.device_memory_gb,
            ),
            heap_limit_bytes: degrade(
                "heap_limit_bytes",
                p.heap_limit_bytes(),
                base.heap_limit_bytes,
            ),
            is_mobile: degrade("is_mobile", p.is_mobile(), base.is_mobile),
            logical_cores: degrade("logical_cores", p.logical_cores(), base.logical_cores).max(1),
        };
        tracing::debug!(?caps, "capabilities detected");
        caps
    }
}

fn degrade<T>(flag: &'static str, res: anyhow::Result<T>, fallback: T) -> T {
    match res {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(flag, error = %e, "capability query failed; assuming unavailable");
            fallback
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capability/probe.rs"]
mod tests;
