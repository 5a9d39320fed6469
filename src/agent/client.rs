use std::sync::Arc;

use futures_util::StreamExt;
use log::{debug, info, warn};

use super::providers::AgentRuntime;
use super::{InvocationError, InvocationRequest, StreamEvent, session_id};

/// 對遠端代理發出單次呼叫，並從回應串流中取出最終答案。
///
/// 每次呼叫都使用新的工作階段 ID，遠端服務不會記得前一次的內容。
#[derive(Clone)]
pub struct AgentClient {
    runtime: Arc<dyn AgentRuntime>,
    enable_trace: bool,
}

impl AgentClient {
    pub fn new(runtime: Arc<dyn AgentRuntime>, enable_trace: bool) -> Self {
        Self {
            runtime,
            enable_trace,
        }
    }

    /// 目前使用的後端名稱。
    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    /// 送出查詢並讀完整個回應串流。
    ///
    /// 回傳最後一個答案片段的文字；串流中沒有任何片段時回傳空字串。
    /// 追蹤事件只寫入日誌，格式錯誤的事件會被略過。
    pub async fn invoke(&self, query: &str) -> Result<String, InvocationError> {
        let request =
            InvocationRequest::new(session_id::generate(), query).with_trace(self.enable_trace);
        info!(
            "Sending query to {} (session {})",
            self.runtime.name(),
            request.session_id
        );

        let mut events = self.runtime.invoke(request).await?;
        let mut answer = String::new();
        while let Some(event) = events.next().await {
            match event {
                Ok(StreamEvent::Chunk { bytes }) => match String::from_utf8(bytes) {
                    Ok(text) => answer = text,
                    Err(err) => warn!("Skipping chunk that is not valid UTF-8: {err}"),
                },
                Ok(StreamEvent::Trace(trace)) => {
                    for line in trace.describe() {
                        info!("[trace] {line}");
                    }
                }
                Ok(StreamEvent::Ignored { event_type }) => {
                    debug!("Ignoring stream event `{event_type}`");
                }
                Err(err) if err.is_recoverable() => warn!("Skipping stream event: {err}"),
                Err(err) => return Err(err),
            }
        }

        if answer.is_empty() {
            debug!("Response stream ended without an answer chunk");
        }
        Ok(answer)
    }

    /// 與 `invoke` 相同，但把錯誤也轉成一般文字回覆。
    pub async fn invoke_text(&self, query: &str) -> String {
        match self.invoke(query).await {
            Ok(answer) => answer,
            Err(err) => err.to_string(),
        }
    }
}
