use dotenv::dotenv;
use hltv_arb_bot::renderer::{DocumentRenderer, WebDriverRenderer};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let endpoint =
        env::var("WEBDRIVER_URL").unwrap_or_else(|_| "http://localhost:9515".to_string());

    println!("Connecting to WebDriver at {}...", endpoint);
    let mut renderer = WebDriverRenderer::new_session(&endpoint).await?;
    println!("✅ Session created.");

    renderer.open("https://www.hltv.org").await?;
    let title = renderer.eval("document.title").await?;
    println!("✅ Page loaded. Title: {}", title.as_str().unwrap_or("?"));

    renderer.close().await?;
    Ok(())
}
