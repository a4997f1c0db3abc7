use crate::errors::ProbeError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// A pass/fail probe the status monitor runs each polling cycle
#[mockall::automock]
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Short name used in transition reasons and logs
    fn name(&self) -> &'static str;

    /// Ok means the probe passed
    async fn run(&self) -> Result<(), ProbeError>;
}

/// The three probes a polling cycle consults, in derivation-priority order
pub struct ProbeSet {
    /// Bounded-time CPU round-trip; failure means the process is wedged
    pub responsiveness: std::sync::Arc<dyn StatusProbe>,
    /// Reachability of the backing API/service
    pub dependency: std::sync::Arc<dyn StatusProbe>,
    /// Storage round-trip + mount-point presence
    pub features: std::sync::Arc<dyn StatusProbe>,
}

/// Responsiveness probe: a small compute round-trip on the blocking pool
/// must finish inside its budget
pub struct CpuRoundTripProbe {
    budget: Duration,
}

impl CpuRoundTripProbe {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }
}

impl Default for CpuRoundTripProbe {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

#[async_trait]
impl StatusProbe for CpuRoundTripProbe {
    fn name(&self) -> &'static str {
        "responsiveness"
    }

    async fn run(&self) -> Result<(), ProbeError> {
        let started = Instant::now();
        let work = tokio::task::spawn_blocking(|| {
            let mut acc = 0u64;
            for i in 0..10_000u64 {
                acc = acc.wrapping_add(i.wrapping_mul(i));
            }
            acc
        });

        match tokio::time::timeout(self.budget, work).await {
            Ok(Ok(_)) => {
                log::trace!(
                    "responsiveness round-trip took {}ms",
                    started.elapsed().as_millis()
                );
                Ok(())
            }
            Ok(Err(_)) => Err(ProbeError::Panicked),
            Err(_) => Err(ProbeError::Timeout(self.budget)),
        }
    }
}

/// Dependency-reachability probe: one GET against the backing service
pub struct HttpDependencyProbe {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpDependencyProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl StatusProbe for HttpDependencyProbe {
    fn name(&self) -> &'static str {
        "dependency"
    }

    async fn run(&self) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout(self.timeout)
                } else {
                    ProbeError::failed(format!("{} unreachable: {}", self.url, e))
                }
            })?;

        response
            .error_for_status()
            .map_err(|e| ProbeError::failed(format!("{} returned {}", self.url, e)))?;
        Ok(())
    }
}

/// Critical-feature probe: storage round-trip plus presence of required
/// mount points
pub struct FeatureSanityProbe {
    scratch_dir: PathBuf,
    mount_points: Vec<PathBuf>,
}

impl FeatureSanityProbe {
    pub fn new(scratch_dir: impl Into<PathBuf>, mount_points: Vec<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            mount_points,
        }
    }
}

#[async_trait]
impl StatusProbe for FeatureSanityProbe {
    fn name(&self) -> &'static str {
        "features"
    }

    async fn run(&self) -> Result<(), ProbeError> {
        for mount in &self.mount_points {
            if !mount.exists() {
                return Err(ProbeError::failed(format!(
                    "mount point {} missing",
                    mount.display()
                )));
            }
        }

        // Storage round-trip: written bytes must read back identically
        let path = self.scratch_dir.join(".sitepulse-probe");
        let payload = b"sitepulse-storage-probe";
        tokio::fs::write(&path, payload)
            .await
            .map_err(|e| ProbeError::failed(format!("storage write failed: {}", e)))?;
        let read_back = tokio::fs::read(&path)
            .await
            .map_err(|e| ProbeError::failed(format!("storage read failed: {}", e)))?;
        let _ = tokio::fs::remove_file(&path).await;

        if read_back != payload {
            return Err(ProbeError::failed("storage round-trip corrupted"));
        }
        Ok(())
    }
}
