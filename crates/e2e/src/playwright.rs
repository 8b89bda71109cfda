//! Playwright browser automation
//!
//! A small Node.js bridge script is written to a temp directory and spawned
//! once per session. Rust sends one JSON request per line on stdin and reads
//! one JSON response per line from stdout, so a single browser page lives for
//! the whole scenario.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::automation::{Automation, AutomationLauncher, BoundingBox, MouseButton, WaitState};
use crate::config::{Browser, SuiteConfig, Viewport};
use crate::error::{E2eError, E2eResult};

/// Extra time granted on top of an operation's own timeout before the bridge
/// is considered unresponsive
const RESPONSE_SLACK: Duration = Duration::from_secs(5);

const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require('playwright');

const opts = JSON.parse(process.argv[2]);
const reply = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');

(async () => {
  const browser = await playwright[opts.browser].launch({
    headless: opts.headless,
    slowMo: opts.slowMo,
  });
  const context = await browser.newContext({
    viewport: { width: opts.width, height: opts.height },
  });
  const page = await context.newPage();
  page.setDefaultTimeout(opts.timeout);

  const handlers = {
    goto: (r) => page.goto(r.url).then(() => null),
    fill: (r) => page.locator(r.selector).fill(r.value),
    click: (r) => page.locator(r.selector).click(),
    press: (r) => r.selector
      ? page.locator(r.selector).press(r.key)
      : page.keyboard.press(r.key),
    wait_for: (r) => page
      .waitForSelector(r.selector, { state: r.state, timeout: r.timeout_ms })
      .then(() => null),
    count: (r) => page.locator(r.selector).count(),
    is_visible: (r) => page.locator(r.selector).isVisible(),
    text_content: (r) => page.locator(r.selector).textContent(),
    input_value: (r) => page.locator(r.selector).inputValue(),
    bounding_box: (r) => page.locator(r.selector).boundingBox(),
    mouse_click: (r) => page.mouse.click(r.x, r.y, { button: r.button }),
    mouse_move: (r) => page.mouse.move(r.x, r.y),
    mouse_down: () => page.mouse.down(),
    mouse_up: () => page.mouse.up(),
  };

  reply({ ready: true });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let req;
    try {
      req = JSON.parse(line);
    } catch (e) {
      reply({ id: 0, ok: false, error: 'malformed request: ' + e.message });
      continue;
    }
    if (req.op === 'close') {
      reply({ id: req.id, ok: true, value: null });
      break;
    }
    const handler = handlers[req.op];
    if (!handler) {
      reply({ id: req.id, ok: false, error: 'unknown op: ' + req.op });
      continue;
    }
    try {
      const value = await handler(req);
      reply({ id: req.id, ok: true, value: value === undefined ? null : value });
    } catch (e) {
      reply({ id: req.id, ok: false, error: e.message, timeout: e.name === 'TimeoutError' });
    }
  }

  await browser.close();
})().catch((e) => {
  process.stderr.write(JSON.stringify({ fatal: e.message }) + '\n');
  process.exit(1);
});
"#;

/// Configuration for the Playwright bridge
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub slow_mo_ms: u64,
    pub viewport: Viewport,
    pub action_timeout: Duration,

    /// Time allowed for node to start and the browser to open
    pub launch_timeout: Duration,

    pub node_binary: PathBuf,

    /// Directory whose `node_modules` provides the `playwright` package
    pub working_dir: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            slow_mo_ms: 0,
            viewport: Viewport::default(),
            action_timeout: Duration::from_secs(30),
            launch_timeout: Duration::from_secs(60),
            node_binary: PathBuf::from("node"),
            working_dir: PathBuf::from("."),
        }
    }
}

impl PlaywrightConfig {
    pub fn from_suite(suite: &SuiteConfig) -> Self {
        Self {
            browser: suite.browser,
            headless: suite.headless,
            slow_mo_ms: suite.slow_mo_ms,
            viewport: suite.viewport,
            action_timeout: suite.action_timeout(),
            ..Default::default()
        }
    }

    fn launch_options(&self) -> Value {
        json!({
            "browser": self.browser.as_str(),
            "headless": self.headless,
            "slowMo": self.slow_mo_ms,
            "width": self.viewport.width,
            "height": self.viewport.height,
            "timeout": self.action_timeout.as_millis() as u64,
        })
    }
}

/// One request on the bridge wire. The `id` is attached when sending.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeRequest<'a> {
    Goto { url: &'a str },
    Fill { selector: &'a str, value: &'a str },
    Click { selector: &'a str },
    Press { selector: Option<&'a str>, key: &'a str },
    WaitFor { selector: &'a str, state: WaitState, timeout_ms: u64 },
    Count { selector: &'a str },
    IsVisible { selector: &'a str },
    TextContent { selector: &'a str },
    InputValue { selector: &'a str },
    BoundingBox { selector: &'a str },
    MouseClick { x: f64, y: f64, button: MouseButton },
    MouseMove { x: f64, y: f64 },
    MouseDown {},
    MouseUp {},
    Close {},
}

impl BridgeRequest<'_> {
    /// Short label for logs. Never includes filled values.
    fn label(&self) -> String {
        match self {
            BridgeRequest::Goto { url } => format!("goto:{}", url),
            BridgeRequest::Fill { selector, .. } => format!("fill:{}", selector),
            BridgeRequest::Click { selector } => format!("click:{}", selector),
            BridgeRequest::Press { key, .. } => format!("press:{}", key),
            BridgeRequest::WaitFor { selector, state, .. } => {
                format!("wait:{}:{:?}", selector, state)
            }
            BridgeRequest::Count { selector } => format!("count:{}", selector),
            BridgeRequest::IsVisible { selector } => format!("is_visible:{}", selector),
            BridgeRequest::TextContent { selector } => format!("text_content:{}", selector),
            BridgeRequest::InputValue { selector } => format!("input_value:{}", selector),
            BridgeRequest::BoundingBox { selector } => format!("bounding_box:{}", selector),
            BridgeRequest::MouseClick { x, y, button } => {
                format!("mouse_click:{:?}@{:.0},{:.0}", button, x, y)
            }
            BridgeRequest::MouseMove { x, y } => format!("mouse_move:{:.0},{:.0}", x, y),
            BridgeRequest::MouseDown {} => "mouse_down".to_string(),
            BridgeRequest::MouseUp {} => "mouse_up".to_string(),
            BridgeRequest::Close {} => "close".to_string(),
        }
    }

    fn encode(&self, id: u64) -> E2eResult<String> {
        let mut payload = serde_json::to_value(self)?;
        let object = payload
            .as_object_mut()
            .ok_or_else(|| E2eError::Protocol("request did not encode as an object".into()))?;
        object.insert("id".to_string(), json!(id));
        Ok(serde_json::to_string(&payload)?)
    }
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timeout: bool,
    #[serde(default)]
    ready: bool,
}

impl BridgeResponse {
    fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            return None;
        }
        serde_json::from_str(trimmed).ok()
    }

    fn into_result(self, label: &str) -> E2eResult<Value> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.error.unwrap_or_else(|| "unknown bridge error".to_string());
        if self.timeout {
            Err(E2eError::Timeout(format!("{} ({})", label, message)))
        } else {
            Err(E2eError::Playwright(format!("{}: {}", label, message)))
        }
    }
}

/// Line-delimited JSON transport to the bridge process
struct BridgeIo<W, R> {
    writer: W,
    reader: Lines<R>,
    next_id: u64,
}

type ChildIo = BridgeIo<ChildStdin, BufReader<ChildStdout>>;

impl<W, R> BridgeIo<W, R>
where
    W: AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
{
    fn new(writer: W, reader: R) -> Self {
        Self {
            writer,
            reader: reader.lines(),
            next_id: 0,
        }
    }

    /// Next JSON message, skipping whatever else node prints
    async fn next_response(&mut self) -> E2eResult<BridgeResponse> {
        loop {
            let line = self
                .reader
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Playwright("bridge process exited".into()))?;
            match BridgeResponse::parse(&line) {
                Some(response) => return Ok(response),
                None => debug!("bridge output: {}", line.trim()),
            }
        }
    }

    /// Wait for the reply to `id`. Replies to earlier ids belong to requests
    /// whose deadline already passed and are dropped. A later id means the
    /// two sides disagree about the sequence.
    async fn response_for(&mut self, id: u64) -> E2eResult<BridgeResponse> {
        loop {
            let response = self.next_response().await?;
            if response.id == id {
                return Ok(response);
            }
            if response.id < id {
                warn!("Discarding stale bridge response {}", response.id);
                continue;
            }
            return Err(E2eError::Protocol(format!(
                "expected response {} but got {}",
                id, response.id
            )));
        }
    }

    /// Send one request and wait up to `deadline` for its reply
    async fn exchange(
        &mut self,
        request: &BridgeRequest<'_>,
        label: &str,
        deadline: Duration,
    ) -> E2eResult<BridgeResponse> {
        self.next_id += 1;
        let id = self.next_id;
        let line = request.encode(id)?;

        debug!("bridge #{} -> {}", id, label);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        timeout(deadline, self.response_for(id))
            .await
            .map_err(|_| E2eError::Timeout(format!("bridge response to {}", label)))?
    }
}

/// Playwright page driven through the Node bridge
pub struct PlaywrightHandle {
    io: Mutex<ChildIo>,
    child: Mutex<Child>,
    config: PlaywrightConfig,
    closed: AtomicBool,

    /// Holds the bridge script on disk for the life of the process
    _script_dir: TempDir,
}

impl PlaywrightHandle {
    /// Spawn node, launch the browser and wait until the page is ready
    pub async fn launch(config: PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&config).await?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        tokio::fs::write(&script_path, BRIDGE_SCRIPT).await?;

        info!(
            "Launching {} (headless: {}, slow_mo: {} ms)",
            config.browser.as_str(),
            config.headless,
            config.slow_mo_ms
        );

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .arg(config.launch_options().to_string())
            .current_dir(&config.working_dir)
            .env("NODE_PATH", config.working_dir.join("node_modules"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                E2eError::Playwright(format!(
                    "Failed to spawn {}: {}",
                    config.node_binary.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdout unavailable".into()))?;

        let mut io = BridgeIo::new(stdin, BufReader::new(stdout));

        let ready = timeout(config.launch_timeout, async {
            loop {
                let response = io.next_response().await?;
                if response.ready {
                    return Ok::<_, E2eError>(());
                }
                warn!("Ignoring bridge message before ready: {:?}", response);
            }
        })
        .await;

        match ready {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                terminate(&mut child);
                return Err(e);
            }
            Err(_) => {
                terminate(&mut child);
                return Err(E2eError::Timeout("browser launch".into()));
            }
        }

        debug!("Bridge ready (pid: {:?})", child.id());

        Ok(Self {
            io: Mutex::new(io),
            child: Mutex::new(child),
            config,
            closed: AtomicBool::new(false),
            _script_dir: script_dir,
        })
    }

    /// Check if Playwright is installed
    async fn check_playwright_installed(config: &PlaywrightConfig) -> E2eResult<()> {
        let status = TokioCommand::new("npx")
            .args(["playwright", "--version"])
            .current_dir(&config.working_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    async fn call(&self, request: BridgeRequest<'_>, deadline: Duration) -> E2eResult<Value> {
        let label = request.label();
        if self.closed.load(Ordering::SeqCst) {
            return Err(E2eError::Playwright(format!("{}: session already closed", label)));
        }

        let response = self.io.lock().await.exchange(&request, &label, deadline).await?;
        response.into_result(&label)
    }

    async fn action(&self, request: BridgeRequest<'_>) -> E2eResult<Value> {
        let deadline = self.config.action_timeout + RESPONSE_SLACK;
        self.call(request, deadline).await
    }
}

#[async_trait]
impl Automation for PlaywrightHandle {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.action(BridgeRequest::Goto { url }).await.map(drop)
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.action(BridgeRequest::Fill { selector, value }).await.map(drop)
    }

    async fn click(&self, selector: &str) -> E2eResult<()> {
        self.action(BridgeRequest::Click { selector }).await.map(drop)
    }

    async fn press(&self, selector: Option<&str>, key: &str) -> E2eResult<()> {
        self.action(BridgeRequest::Press { selector, key }).await.map(drop)
    }

    async fn wait_for(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> E2eResult<()> {
        let request = BridgeRequest::WaitFor {
            selector,
            state,
            timeout_ms: timeout.as_millis() as u64,
        };
        self.call(request, timeout + RESPONSE_SLACK).await.map(drop)
    }

    async fn count(&self, selector: &str) -> E2eResult<usize> {
        let value = self.action(BridgeRequest::Count { selector }).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| E2eError::Protocol(format!("count returned {}", value)))
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        let value = self.action(BridgeRequest::IsVisible { selector }).await?;
        value
            .as_bool()
            .ok_or_else(|| E2eError::Protocol(format!("is_visible returned {}", value)))
    }

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>> {
        let value = self.action(BridgeRequest::TextContent { selector }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn input_value(&self, selector: &str) -> E2eResult<String> {
        let value = self.action(BridgeRequest::InputValue { selector }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn bounding_box(&self, selector: &str) -> E2eResult<Option<BoundingBox>> {
        let value = self.action(BridgeRequest::BoundingBox { selector }).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn mouse_click(&self, x: f64, y: f64, button: MouseButton) -> E2eResult<()> {
        self.action(BridgeRequest::MouseClick { x, y, button }).await.map(drop)
    }

    async fn mouse_move(&self, x: f64, y: f64) -> E2eResult<()> {
        self.action(BridgeRequest::MouseMove { x, y }).await.map(drop)
    }

    async fn mouse_down(&self) -> E2eResult<()> {
        self.action(BridgeRequest::MouseDown {}).await.map(drop)
    }

    async fn mouse_up(&self) -> E2eResult<()> {
        self.action(BridgeRequest::MouseUp {}).await.map(drop)
    }

    async fn close(&self) -> E2eResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(e) = self.call(BridgeRequest::Close {}, RESPONSE_SLACK).await {
            warn!("Bridge did not acknowledge close: {}", e);
        }
        self.closed.store(true, Ordering::SeqCst);

        let mut child = self.child.lock().await;
        match timeout(RESPONSE_SLACK, child.wait()).await {
            Ok(Ok(status)) => debug!("Bridge exited with {}", status),
            _ => {
                warn!("Bridge still running after close, terminating");
                terminate(&mut child);
                let _ = child.wait().await;
            }
        }
        Ok(())
    }
}

impl Drop for PlaywrightHandle {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            terminate(self.child.get_mut());
        }
    }
}

/// SIGTERM first so the browser can exit cleanly, then a hard kill
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
    }
    let _ = child.start_kill();
}

/// Launches one Playwright page per scenario
#[derive(Debug, Clone)]
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AutomationLauncher for PlaywrightLauncher {
    async fn launch(&self) -> E2eResult<Box<dyn Automation>> {
        let handle = PlaywrightHandle::launch(self.config.clone()).await?;
        Ok(Box::new(handle))
    }
}
