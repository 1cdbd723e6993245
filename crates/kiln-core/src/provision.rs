//! Image provisioning.
//!
//! Makes sure a runtime image exists locally before any sandbox is created.
//! Images confirmed present are remembered for the lifetime of the
//! provisioner, and concurrent requests for the same missing image wait on a
//! single pull instead of each starting their own.

use crate::error::Result;
use kiln_container::ContainerRuntime;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Ensures runtime images are present, pulling on demand.
pub struct ImageProvisioner {
    runtime: Arc<dyn ContainerRuntime>,
    /// Images known to be present locally.
    present: RwLock<HashSet<String>>,
    /// One lock per image currently being checked or pulled.
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ImageProvisioner {
    /// Create a provisioner with an empty cache.
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            present: RwLock::new(HashSet::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Make sure `image` is available locally.
    ///
    /// # Errors
    ///
    /// Returns the runtime's error if the image is missing and the pull fails.
    pub async fn ensure(&self, image: &str) -> Result<()> {
        if self.present.read().await.contains(image) {
            tracing::trace!(image = %image, "Image cached as present");
            return Ok(());
        }

        let gate = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(in_flight.entry(image.to_string()).or_default())
        };
        let _guard = gate.lock().await;

        // Another request may have finished the pull while we waited
        if self.present.read().await.contains(image) {
            return Ok(());
        }

        let result = self.check_or_pull(image).await;
        if result.is_ok() {
            self.present.write().await.insert(image.to_string());
        }
        self.in_flight.lock().await.remove(image);
        result
    }

    /// Drop `image` from the cache, e.g. after the runtime reported it missing.
    pub async fn forget(&self, image: &str) {
        if self.present.write().await.remove(image) {
            tracing::debug!(image = %image, "Image evicted from cache");
        }
    }

    /// Whether `image` is currently cached as present.
    pub async fn is_cached(&self, image: &str) -> bool {
        self.present.read().await.contains(image)
    }

    async fn check_or_pull(&self, image: &str) -> Result<()> {
        if self.runtime.image_present(image).await? {
            tracing::debug!(image = %image, "Image already present");
            return Ok(());
        }

        let start = std::time::Instant::now();
        tracing::info!(image = %image, "Pulling image");
        self.runtime.pull_image(image).await?;
        tracing::info!(
            image = %image,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Image pulled"
        );
        Ok(())
    }
}

impl std::fmt::Debug for ImageProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageProvisioner").finish_non_exhaustive()
    }
}
