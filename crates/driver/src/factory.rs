//! Driver construction.
//!
//! Callers give a [`DriverConfig`] and get back an initialized
//! `Arc<dyn Driver>` for the configured platform; nothing downstream
//! branches on the platform again.

use std::sync::Arc;

use browser::Platform;
use tracing::info;

use crate::android::AndroidDriver;
use crate::config::DriverConfig;
use crate::contract::Driver;
use crate::error::Result;
use crate::ios::IosDriver;
use crate::web::WebDriver;

/// Build the driver for `config.platform` and run its `init`.
pub async fn create_driver(config: DriverConfig) -> Result<Arc<dyn Driver>> {
    let platform = config.platform;
    info!("[DriverFactory] Initializing driver for {} platform", platform);

    let driver: Arc<dyn Driver> = match platform {
        Platform::Web => Arc::new(WebDriver::new(config)),
        Platform::Android => Arc::new(AndroidDriver::new(config)?),
        Platform::Ios => Arc::new(IosDriver::new(config)?),
    };

    driver.init().await?;
    info!("[DriverFactory] {} driver initialized", platform);
    Ok(driver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::DriverState;
    use crate::error::DriverError;

    #[tokio::test]
    async fn test_web_driver_comes_back_ready() {
        let driver = create_driver(DriverConfig::default()).await.unwrap();
        assert_eq!(driver.platform(), Platform::Web);
        assert_eq!(driver.state(), DriverState::Ready);
    }

    #[tokio::test]
    async fn test_mobile_factory_surfaces_init_failure() {
        let config = DriverConfig {
            platform: Platform::Android,
            automation_server_url: "http://127.0.0.1:1".to_string(),
            working_dir: Some(std::env::temp_dir()),
            ..Default::default()
        };
        let error = create_driver(config).await.unwrap_err();
        assert!(matches!(
            error,
            DriverError::InitializationFailed { attempts: 2, .. }
        ));
    }
}
