//! Walk a local Chrome through the whole action surface.
//!
//! Start Chrome first:
//!   chromium --remote-debugging-port=9222 --headless=new

use browser::NavigateOptions;
use driver::{create_driver, DriverConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let driver = create_driver(DriverConfig::default()).await?;
    let browser = driver.create_browser().await?;
    println!("Browser {} ready", browser.id());

    let result = browser
        .navigate("example.com", NavigateOptions::default())
        .await?;
    println!("{}", result.message);

    let state = browser.get_state().await?;
    println!("{}", serde_json::to_string_pretty(&state)?);

    browser.click(Some(200.0), Some(150.0)).await?;
    // A second click without coordinates reuses the remembered position.
    browser.click(None, None).await?;

    browser.scroll("down").await?;
    browser
        .press_key(&["Control".to_string(), "a".to_string()])
        .await?;
    browser.type_text("hello").await?;

    let screenshot = browser.screenshot().await?;
    println!("{}", screenshot.message);

    let located = browser.locate_at(200.0, 150.0).await?;
    println!("{}", located.message);

    browser.cleanup().await?;

    let id = browser.id().to_string();
    driver.close_browser(&id).await?;
    driver.destroy().await?;
    println!("Done");

    Ok(())
}
