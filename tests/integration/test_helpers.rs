//! Shared test doubles for session and controller tests.
//!
//! Provides recording/failing observers and a scripted container engine so
//! individual test modules can focus on behaviour rather than boilerplate.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use deckhand::runtime::spec::NormalizedSpec;
use deckhand::runtime::{
    ContainerDetails, ContainerEngine, ContainerSummary, LogOptions,
};
use deckhand::session::Observer;
use deckhand::stream::{ByteStream, LogFeed};
use deckhand::{AppError, Result};

/// Observer that records every pushed frame.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub texts: Vec<String>,
    pub closed: bool,
}

#[async_trait]
impl Observer for RecordingObserver {
    async fn push_text(&mut self, text: String) -> Result<()> {
        self.texts.push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Observer whose writes start failing after a fixed number of pushes,
/// simulating a client that disconnected mid-stream.
#[derive(Debug)]
pub struct FailingObserver {
    accept: usize,
    pub texts: Vec<String>,
    pub closed: bool,
}

impl FailingObserver {
    pub fn after(accept: usize) -> Self {
        Self {
            accept,
            texts: Vec::new(),
            closed: false,
        }
    }
}

#[async_trait]
impl Observer for FailingObserver {
    async fn push_text(&mut self, text: String) -> Result<()> {
        if self.texts.len() < self.accept {
            self.texts.push(text);
            Ok(())
        } else {
            Err(AppError::Connection("observer gone".into()))
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Scripted engine double recording every call it receives.
pub struct FakeEngine {
    pub calls: Mutex<Vec<String>>,
    pub has_image: bool,
    pub fail_start: bool,
    pub create_id: String,
    pub summaries: Mutex<Vec<ContainerSummary>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            has_image: true,
            fail_start: false,
            create_id: "0123456789abcdef0123456789abcdef".to_owned(),
            summaries: Mutex::new(Vec::new()),
        }
    }
}

impl FakeEngine {
    fn record(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn set_summaries(&self, summaries: Vec<ContainerSummary>) {
        *self
            .summaries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = summaries;
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn list(&self) -> Result<Vec<ContainerSummary>> {
        self.record("list".into());
        Ok(self
            .summaries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.record(format!("start {id}"));
        if self.fail_start {
            Err(AppError::Upstream("scripted start failure".into()))
        } else {
            Ok(())
        }
    }

    async fn stop(&self, id: &str, timeout_seconds: i64) -> Result<()> {
        self.record(format!("stop {id} {timeout_seconds}"));
        Ok(())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerDetails> {
        self.record(format!("inspect {id}"));
        Ok(ContainerDetails {
            id: id.to_owned(),
            name: "fake".into(),
            image: "fake:latest".into(),
            state: "running".into(),
            running: true,
            tty: false,
            started_at: None,
        })
    }

    async fn image_present(&self, image: &str) -> Result<bool> {
        self.record(format!("image_present {image}"));
        Ok(self.has_image)
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        self.record(format!("pull {image}"));
        Ok(())
    }

    async fn create(&self, spec: &NormalizedSpec) -> Result<String> {
        self.record(format!("create {}", spec.image));
        Ok(self.create_id.clone())
    }

    async fn logs(&self, _id: &str, _options: &LogOptions) -> Result<LogFeed> {
        Err(AppError::Upstream("logs are not scripted in FakeEngine".into()))
    }

    async fn stats(&self, _id: &str) -> Result<ByteStream> {
        Err(AppError::Upstream("stats are not scripted in FakeEngine".into()))
    }
}

/// Build a container summary labeled with a compose project, for stack
/// status grouping tests.
pub fn labeled_summary(name: &str, project: Option<&str>) -> ContainerSummary {
    let mut labels = HashMap::new();
    if let Some(project) = project {
        labels.insert("com.docker.compose.project".to_owned(), project.to_owned());
    }
    ContainerSummary {
        id: "abcdef123456".into(),
        name: name.to_owned(),
        image: "nginx:latest".into(),
        status: "Up 5 minutes".into(),
        state: "running".into(),
        created: 1_700_000_000,
        ports: Vec::new(),
        labels,
    }
}
