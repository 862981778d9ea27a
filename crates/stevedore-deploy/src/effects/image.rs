use std::time::Duration;

use async_trait::async_trait;
use stevedore_fetch::FetchError;

use crate::plan::ContainerImage;

/// Pulls container images referenced by a service package.
#[async_trait]
pub trait ImagePuller: Send + Sync {
    async fn pull(&self, images: &[ContainerImage], timeout: Duration) -> Result<(), FetchError>;
}

/// For nodes without a container runtime: any image is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopImagePuller;

#[async_trait]
impl ImagePuller for NoopImagePuller {
    async fn pull(&self, images: &[ContainerImage], _timeout: Duration) -> Result<(), FetchError> {
        match images.first() {
            None => Ok(()),
            Some(image) => Err(FetchError::ContainerImage {
                image:   image.name.clone(),
                message: "no container runtime on this node".into(),
            }),
        }
    }
}
