//! 測試用的執行環境：依照預先寫好的腳本回傳事件。

use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use super::{AgentRuntime, EventStream};
use crate::agent::{InvocationError, InvocationRequest, StreamEvent};

pub(crate) enum Script {
    /// 送出請求本身就失敗。
    Reject(InvocationError),
    /// 依序回傳這些串流項目。
    Events(Vec<Result<StreamEvent, InvocationError>>),
}

pub(crate) struct ScriptedRuntime {
    script: Mutex<Option<Script>>,
    requests: Mutex<Vec<InvocationRequest>>,
}

impl ScriptedRuntime {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn events(events: Vec<Result<StreamEvent, InvocationError>>) -> Self {
        Self::new(Script::Events(events))
    }

    pub(crate) fn requests(&self) -> Vec<InvocationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, request: InvocationRequest) -> Result<EventStream, InvocationError> {
        self.requests.lock().unwrap().push(request);
        match self.script.lock().unwrap().take() {
            Some(Script::Reject(err)) => Err(err),
            Some(Script::Events(events)) => Ok(Box::pin(stream::iter(events))),
            None => Ok(Box::pin(stream::empty())),
        }
    }
}

pub(crate) fn chunk(text: &str) -> Result<StreamEvent, InvocationError> {
    Ok(StreamEvent::Chunk {
        bytes: text.as_bytes().to_vec(),
    })
}

pub(crate) fn trace(body: serde_json::Value) -> Result<StreamEvent, InvocationError> {
    StreamEvent::decode("trace", body.to_string().as_bytes())
}
