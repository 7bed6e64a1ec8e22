//! Scripted provider for tests: replays queued outcomes and records prompts.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{GenerationOptions, LlmProvider, LlmResponse};
use crate::types::{ErrorCategory, LlmError, PilotError, Result};

pub(crate) enum Scripted {
    Text(String),
    Fail(ErrorCategory, String),
    Blocked(String),
}

#[derive(Default)]
pub(crate) struct ScriptedProvider {
    replies: Mutex<VecDeque<Scripted>>,
    prompts: Mutex<Vec<(String, GenerationOptions)>>,
}

impl ScriptedProvider {
    pub(crate) fn new(replies: Vec<Scripted>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn text(reply: &str) -> Self {
        Self::new(vec![Scripted::Text(reply.to_string())])
    }

    pub(crate) fn prompts(&self) -> Vec<(String, GenerationOptions)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<LlmResponse> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), options));

        match self.replies.lock().unwrap().pop_front() {
            Some(Scripted::Text(text)) => Ok(LlmResponse::text_only(text)),
            Some(Scripted::Fail(category, message)) => {
                Err(LlmError::with_provider(category, message, "scripted").into())
            }
            Some(Scripted::Blocked(reason)) => Err(PilotError::Blocked {
                provider: "scripted".to_string(),
                reason,
            }),
            None => Err(LlmError::new(ErrorCategory::Unavailable, "script exhausted").into()),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
