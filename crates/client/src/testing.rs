//! In-crate fakes for unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use markcache_core::{Error, ResolutionSource};

use crate::fetch::{FetchResponse, HttpClient, ProbeResponse};
use crate::render::{Capture, CaptureOptions, RenderError, ScreenshotRenderer};
use crate::resolve::{Resource, SourceStrategy};

/// Shared call counter.
#[derive(Debug, Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// HTTP client answering from canned responses. Unknown URLs are 404s.
#[derive(Default)]
pub struct FakeHttp {
    heads: Mutex<HashMap<String, (u16, Option<String>)>>,
    bodies: Mutex<HashMap<String, (Bytes, Option<String>)>>,
    head_calls: Calls,
    get_calls: Calls,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a small PNG at `url` for both HEAD and GET.
    pub fn image(&self, url: &str) {
        self.head_response(url, 200, Some("image/png"));
        self.body(url, Bytes::from_static(b"\x89PNG\r\n\x1a\nfake"), Some("image/png"));
    }

    pub fn head_response(&self, url: &str, status: u16, content_type: Option<&str>) {
        self.heads
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, content_type.map(str::to_string)));
    }

    pub fn body(&self, url: &str, bytes: Bytes, content_type: Option<&str>) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), (bytes, content_type.map(str::to_string)));
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.get()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.get()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn head(&self, url: &str, _timeout: Duration) -> Result<ProbeResponse, Error> {
        self.head_calls.hit();
        let (status, content_type) = self.heads.lock().unwrap().get(url).cloned().unwrap_or((404, None));
        Ok(ProbeResponse {
            status: StatusCode::from_u16(status).unwrap(),
            content_type,
        })
    }

    async fn get(&self, url: &str, _timeout: Duration) -> Result<FetchResponse, Error> {
        self.get_calls.hit();
        let (bytes, content_type) = self
            .bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::HttpError(format!("status 404 for {url}")))?;
        Ok(FetchResponse { final_url: url.to_string(), content_type, bytes })
    }
}

/// What a [`ScriptedStrategy`] does when asked for a candidate.
#[derive(Debug, Clone)]
pub enum Script {
    Url(String),
    Credentialed(String),
    Inline(Bytes, String),
    Fail,
    Hang,
    Panic,
}

/// Strategy following a fixed script, counting its calls.
pub struct ScriptedStrategy {
    name: String,
    source: ResolutionSource,
    script: Script,
    delay: Option<Duration>,
    enabled: bool,
    calls: Calls,
}

impl ScriptedStrategy {
    pub fn new(name: &str, source: ResolutionSource, script: Script) -> Self {
        Self { name: name.to_string(), source, script, delay: None, enabled: true, calls: Calls::default() }
    }

    /// Sleep before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn calls(&self) -> Calls {
        self.calls.clone()
    }
}

#[async_trait]
impl<Q: Sync> SourceStrategy<Q> for ScriptedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> ResolutionSource {
        self.source
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn candidate(&self, _request: &Q, _timeout: Duration) -> Result<Resource, Error> {
        self.calls.hit();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script {
            Script::Url(url) => Ok(Resource::remote(url.clone())),
            Script::Credentialed(url) => Ok(Resource::credentialed(url.clone())),
            Script::Inline(bytes, content_type) => {
                Ok(Resource::Inline { bytes: bytes.clone(), content_type: content_type.clone() })
            }
            Script::Fail => Err(Error::ProviderUnavailable(format!("{} is scripted to fail", self.name))),
            Script::Hang => std::future::pending().await,
            Script::Panic => panic!("{} is scripted to panic", self.name),
        }
    }
}

/// Renderer returning a fixed capture.
pub struct FakeRenderer {
    source: ResolutionSource,
    capture: Option<Capture>,
    calls: Calls,
    last_options: Mutex<Option<CaptureOptions>>,
}

impl FakeRenderer {
    pub fn new(source: ResolutionSource, capture: Capture) -> Self {
        Self { source, capture: Some(capture), calls: Calls::default(), last_options: Mutex::new(None) }
    }

    /// A renderer whose every capture fails.
    pub fn failing(source: ResolutionSource) -> Self {
        Self { source, capture: None, calls: Calls::default(), last_options: Mutex::new(None) }
    }

    pub fn calls(&self) -> Calls {
        self.calls.clone()
    }

    pub fn last_options(&self) -> Option<CaptureOptions> {
        self.last_options.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScreenshotRenderer for FakeRenderer {
    fn name(&self) -> &str {
        "fake"
    }

    fn source(&self) -> ResolutionSource {
        self.source
    }

    async fn capture(&self, _url: &Url, options: &CaptureOptions) -> Result<Capture, RenderError> {
        self.calls.hit();
        *self.last_options.lock().unwrap() = Some(options.clone());
        self.capture.clone().ok_or_else(|| RenderError::Capture("scripted failure".into()))
    }
}
