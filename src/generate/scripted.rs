//! Offline generator that replays canned responses in order.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::Generator;
use crate::error::{SpliceError, SpliceResult};

/// One recorded request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f64,
}

#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Requests seen so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Generator for ScriptedGenerator {
    fn id(&self) -> &str {
        "scripted"
    }

    fn generate(&self, prompt: &str, system: Option<&str>, temperature: f64) -> SpliceResult<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                prompt: prompt.to_string(),
                system: system.map(str::to_string),
                temperature,
            });
        }
        let mut responses = self
            .responses
            .lock()
            .map_err(|_| SpliceError::Generator("scripted responses poisoned".into()))?;
        responses
            .pop_front()
            .ok_or_else(|| SpliceError::Generator("scripted responses exhausted".into()))
    }
}
