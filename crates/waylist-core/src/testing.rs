//! In-process doubles for the transport and notification boundaries.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::notify::{Notifier, ReportEvent};
use crate::transport::{
    Transport, TransportError, TransportRequest, TransportResponse, STATUS_NOT_MODIFIED,
};

/// Scripted transport. Responses are consumed in order; an empty script
/// answers as if offline.
#[derive(Default)]
pub struct FakeTransport {
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    requests: Mutex<Vec<TransportRequest>>,
    gate: tokio::sync::Mutex<()>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, result: Result<TransportResponse, TransportError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn push_json(&self, body: &str, validator: Option<&str>) {
        self.push(Ok(TransportResponse {
            status: 200,
            body: body.as_bytes().to_vec(),
            validator: validator.map(str::to_string),
        }));
    }

    pub fn push_not_modified(&self) {
        self.push(Ok(TransportResponse {
            status: STATUS_NOT_MODIFIED,
            body: Vec::new(),
            validator: None,
        }));
    }

    pub fn push_err(&self, error: TransportError) {
        self.push(Err(error));
    }

    pub fn push_status(&self, status: u16) {
        self.push_err(TransportError::Status {
            status,
            body: String::new(),
        });
    }

    /// Block every request until the returned guard is dropped.
    pub async fn hold(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        drop(self.gate.lock().await);
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Offline("no scripted response".to_string())))
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    warnings: Mutex<Vec<String>>,
    events: Mutex<Vec<ReportEvent>>,
}

impl RecordingNotifier {
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn warn_once(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn report_event(&self, event: ReportEvent) {
        self.events.lock().unwrap().push(event);
    }
}
