//! Tap through an Android device session.
//!
//! Requires an Appium server with a connected device or emulator:
//!   appium --address 127.0.0.1 --port 4723

use browser::Platform;
use driver::{create_driver, DriverConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = DriverConfig {
        platform: Platform::Android,
        app_id: Some("com.android.settings".to_string()),
        ..Default::default()
    };
    let driver = create_driver(config).await?;

    let device = driver.device_info()?;
    println!("Device viewport: {}x{}", device.width, device.height);

    let browser = driver.create_browser().await?;

    let screenshot = browser.screenshot().await?;
    println!("{}", screenshot.message);

    let center_x = device.width as f64 / 2.0;
    let center_y = device.height as f64 / 2.0;
    browser.click(Some(center_x), Some(center_y)).await?;

    // Actions without a device equivalent still resolve cleanly.
    let result = browser.scroll("down").await?;
    println!("{}", result.message);

    driver.destroy().await?;
    Ok(())
}
