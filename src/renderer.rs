use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

#[derive(Error, Debug)]
pub enum RendererError {
    #[error("webdriver transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webdriver protocol: {0}")]
    Protocol(String),
    #[error("timed out after {waited:?} waiting for {selector:?}")]
    WaitTimeout { selector: String, waited: Duration },
}

/// A loaded web page with client-side rendering applied, reduced to the two
/// operations extraction needs: navigation and synchronous script results.
#[async_trait]
pub trait DocumentRenderer: Send {
    async fn open(&mut self, url: &str) -> Result<(), RendererError>;
    async fn eval(&mut self, script: &str) -> Result<Value, RendererError>;

    /// Releases the underlying session. Default is a no-op for renderers
    /// with nothing to tear down.
    async fn close(&mut self) -> Result<(), RendererError> {
        Ok(())
    }
}

/// Chrome session behind a WebDriver endpoint (chromedriver or a grid),
/// speaking the JSON wire protocol over HTTP.
pub struct WebDriverRenderer {
    endpoint: String,
    client: reqwest::Client,
    session_id: Option<String>,
}

impl WebDriverRenderer {
    /// Creates a fresh browser session. Each worker gets its own; sessions
    /// are not reentrant and are never shared.
    pub async fn new_session(endpoint: &str) -> Result<Self, RendererError> {
        let client = reqwest::Client::new();
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": [
                            "--headless=new",
                            "--disable-blink-features=AutomationControlled",
                            "--disable-infobars",
                            "--disable-dev-shm-usage",
                            "--no-sandbox",
                            "--disable-gpu"
                        ],
                        "excludeSwitches": ["enable-automation"]
                    }
                }
            }
        });

        let body: Value = client
            .post(format!("{}/session", endpoint.trim_end_matches('/')))
            .json(&capabilities)
            .send()
            .await?
            .json()
            .await?;

        let session_id = body["value"]["sessionId"]
            .as_str()
            .ok_or_else(|| Self::protocol_error(&body))?
            .to_string();

        let mut renderer = Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
            session_id: Some(session_id),
        };
        // Some sites gate content on this property being present.
        renderer
            .eval("Object.defineProperty(navigator, 'webdriver', {get: () => undefined});")
            .await?;
        Ok(renderer)
    }

    fn session_url(&self, suffix: &str) -> Result<String, RendererError> {
        let id = self
            .session_id
            .as_ref()
            .ok_or_else(|| RendererError::Protocol("session already closed".to_string()))?;
        Ok(format!("{}/session/{}/{}", self.endpoint, id, suffix))
    }

    fn protocol_error(body: &Value) -> RendererError {
        let message = body["value"]["message"]
            .as_str()
            .or_else(|| body["value"]["error"].as_str())
            .unwrap_or("unexpected response shape");
        RendererError::Protocol(message.to_string())
    }

    async fn command(&self, suffix: &str, payload: Value) -> Result<Value, RendererError> {
        let response = self
            .client
            .post(self.session_url(suffix)?)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            return Err(Self::protocol_error(&body));
        }
        Ok(body["value"].clone())
    }
}

#[async_trait]
impl DocumentRenderer for WebDriverRenderer {
    async fn open(&mut self, url: &str) -> Result<(), RendererError> {
        debug!(%url, "navigating");
        self.command("url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn eval(&mut self, script: &str) -> Result<Value, RendererError> {
        // WebDriver scripts must `return`; wrap bare expressions for callers.
        let wrapped = if script.trim_start().starts_with("return") {
            script.to_string()
        } else {
            format!("return ({});", script.trim_end().trim_end_matches(';'))
        };
        self.command("execute/sync", json!({ "script": wrapped, "args": [] }))
            .await
    }

    /// Tears the browser session down. Idempotent.
    async fn close(&mut self) -> Result<(), RendererError> {
        if let Some(id) = self.session_id.take() {
            self.client
                .delete(format!("{}/session/{}", self.endpoint, id))
                .send()
                .await?;
        }
        Ok(())
    }
}

/// Polls until a CSS selector appears in the document.
pub async fn wait_for_selector(
    renderer: &mut dyn DocumentRenderer,
    selector: &str,
    timeout: Duration,
) -> Result<(), RendererError> {
    let started = Instant::now();
    let probe = format!("document.querySelector({:?}) !== null", selector);
    loop {
        if renderer.eval(&probe).await?.as_bool() == Some(true) {
            return Ok(());
        }
        if started.elapsed() >= timeout {
            return Err(RendererError::WaitTimeout {
                selector: selector.to_string(),
                waited: timeout,
            });
        }
        sleep(Duration::from_millis(500)).await;
    }
}

const COOKIE_BUTTON_SELECTORS: [&str; 5] = [
    "button#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll",
    ".fc-button-label",
    "button[data-accept-cookies='true']",
    "#acceptAllButton",
    ".accept-cookies-button",
];

/// Clicks the first known cookie-consent button present on the page.
/// Returns whether one was found; an absent banner is not a failure.
pub async fn dismiss_cookie_banner(renderer: &mut dyn DocumentRenderer) -> bool {
    for selector in COOKIE_BUTTON_SELECTORS {
        let click = format!(
            "return (function () {{ \
                 var button = document.querySelector({:?}); \
                 if (!button) return false; \
                 button.click(); \
                 return true; \
             }})();",
            selector
        );
        match renderer.eval(&click).await {
            Ok(value) if value.as_bool() == Some(true) => {
                debug!(%selector, "accepted cookie banner");
                sleep(Duration::from_secs(1)).await;
                return true;
            }
            Ok(_) => continue,
            Err(_) => continue,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedRenderer {
        answers: Vec<Value>,
        evaluated: Vec<String>,
    }

    #[async_trait]
    impl DocumentRenderer for ScriptedRenderer {
        async fn open(&mut self, _url: &str) -> Result<(), RendererError> {
            Ok(())
        }

        async fn eval(&mut self, script: &str) -> Result<Value, RendererError> {
            self.evaluated.push(script.to_string());
            Ok(self.answers.remove(0))
        }
    }

    #[tokio::test]
    async fn wait_for_selector_polls_until_present() {
        let mut renderer = ScriptedRenderer {
            answers: vec![Value::Bool(false), Value::Bool(true)],
            evaluated: vec![],
        };
        wait_for_selector(&mut renderer, ".betting-section", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(renderer.evaluated.len(), 2);
    }

    #[tokio::test]
    async fn wait_for_selector_times_out() {
        let mut renderer = ScriptedRenderer {
            answers: vec![Value::Bool(false); 2],
            evaluated: vec![],
        };
        let err = wait_for_selector(&mut renderer, ".missing", Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RendererError::WaitTimeout { .. }));
    }

    #[tokio::test]
    async fn cookie_banner_stops_at_first_hit() {
        let mut renderer = ScriptedRenderer {
            answers: vec![Value::Bool(false), Value::Bool(true)],
            evaluated: vec![],
        };
        assert!(dismiss_cookie_banner(&mut renderer).await);
        assert_eq!(renderer.evaluated.len(), 2);
    }

    #[tokio::test]
    async fn absent_banner_is_not_an_error() {
        let mut renderer = ScriptedRenderer {
            answers: vec![Value::Bool(false); COOKIE_BUTTON_SELECTORS.len()],
            evaluated: vec![],
        };
        assert!(!dismiss_cookie_banner(&mut renderer).await);
    }
}
