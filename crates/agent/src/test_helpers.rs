//! Shared test helpers: a scripted provider and configurable stub tools.

use async_trait::async_trait;
use leap_core::{
    GenerationRequest, GenerationResponse, Provider, ProviderError, Tool, ToolError, ToolOutput,
    ToolParam,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A provider that replays queued replies in order and records every request.
///
/// Once the queue is empty it returns the repeat reply if one was set,
/// otherwise an `InvalidResponse` error.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    repeat: Mutex<Option<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            repeat: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `text` forever once the queue runs out.
    pub fn repeating(self, text: &str) -> Self {
        *self.repeat.lock().unwrap() = Some(text.to_string());
        self
    }

    pub fn push(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    /// Queue a failure at the front of the script.
    pub fn fail_next(&self, error: ProviderError) {
        self.replies.lock().unwrap().push_front(Err(error));
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);

        let next = self.replies.lock().unwrap().pop_front();
        let text = match next {
            Some(reply) => reply?,
            None => self
                .repeat
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ProviderError::InvalidResponse("script exhausted".into()))?,
        };
        Ok(GenerationResponse {
            eval_count: Some((text.len() / 4) as u32),
            text,
            model,
        })
    }
}

/// What a [`StubTool`] does when executed.
#[derive(Clone)]
pub enum StubBehaviour {
    Data(Value),
    Text(String),
    Fail(String),
    Error(ToolError),
    Panic(String),
}

pub struct StubTool {
    name: String,
    description: String,
    params: &'static [ToolParam],
    behaviour: StubBehaviour,
}

impl StubTool {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params: &[],
            behaviour: StubBehaviour::Text("ok".into()),
        }
    }

    pub fn with_params(mut self, params: &'static [ToolParam]) -> Self {
        self.params = params;
        self
    }

    pub fn returning(mut self, behaviour: StubBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &[ToolParam] {
        self.params
    }

    async fn execute(&self, _params: Value) -> Result<ToolOutput, ToolError> {
        match &self.behaviour {
            StubBehaviour::Data(value) => Ok(ToolOutput::data(value.clone())),
            StubBehaviour::Text(text) => Ok(ToolOutput::Text(text.clone())),
            StubBehaviour::Fail(message) => Ok(ToolOutput::failed(message.clone())),
            StubBehaviour::Error(error) => Err(error.clone()),
            StubBehaviour::Panic(message) => panic!("{message}"),
        }
    }
}
