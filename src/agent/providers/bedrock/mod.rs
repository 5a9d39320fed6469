//! 透過 HTTPS 呼叫 Amazon Bedrock Agent Runtime 的 `InvokeAgent` 操作。
//!
//! 請求以 AWS Signature V4 簽章，回應主體為 `application/vnd.amazon.eventstream`
//! 二進位串流，每個訊息解析後轉為 `StreamEvent`。

pub mod credentials;
pub mod eventstream;
pub mod sigv4;

use std::pin::Pin;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{self, Stream, StreamExt};
use log::debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};

use self::eventstream::{Message, MessageDecoder};
use self::credentials::CredentialsProvider;
use self::sigv4::{SignableRequest, SigningScope};
use super::{AgentRuntime, EventStream};
use crate::agent::config::AgentSettings;
use crate::agent::{InvocationError, InvocationRequest, StreamEvent};

/// 簽章時使用的服務名稱。
const SIGNING_SERVICE: &str = "bedrock";
const EVENT_STREAM_CONTENT_TYPE: &str = "application/vnd.amazon.eventstream";

/// `AgentRuntime` 的 Bedrock 實作。
pub struct BedrockAgentRuntime {
    /// 服務端點，例如 `https://bedrock-agent-runtime.us-east-1.amazonaws.com`。
    endpoint: String,
    agent_id: String,
    agent_alias_id: String,
    region: String,
    /// 每次呼叫前解析憑證；啟動時找不到憑證不算致命錯誤。
    credentials: CredentialsProvider,
    /// `reqwest` 的非同步 HTTP 客戶端，未設定逾時。
    client: Client,
}

impl BedrockAgentRuntime {
    /// 根據提供的設定建立一個新的 `BedrockAgentRuntime`。
    pub fn new(settings: &AgentSettings) -> Self {
        Self {
            endpoint: settings.endpoint(),
            agent_id: settings.agent_id.clone(),
            agent_alias_id: settings.agent_alias_id.clone(),
            region: settings.region.clone(),
            credentials: CredentialsProvider::new(settings.credentials.clone()),
            client: Client::new(),
        }
    }

    /// 組出這次呼叫的完整 URL，路徑中的每個片段都會經過編碼。
    fn invocation_url(&self, session_id: &str) -> Result<Url, InvocationError> {
        let mut url = Url::parse(&self.endpoint).map_err(|err| {
            InvocationError::Transport(format!("invalid endpoint {}: {err}", self.endpoint))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                InvocationError::Transport(format!("endpoint cannot carry a path: {}", self.endpoint))
            })?
            .pop_if_empty()
            .extend([
                "agents",
                self.agent_id.as_str(),
                "agentAliases",
                self.agent_alias_id.as_str(),
                "sessions",
                session_id,
                "text",
            ]);
        Ok(url)
    }
}

#[async_trait]
impl AgentRuntime for BedrockAgentRuntime {
    fn name(&self) -> &str {
        "Amazon Bedrock Agent"
    }

    async fn invoke(&self, request: InvocationRequest) -> Result<EventStream, InvocationError> {
        let credentials = self.credentials.resolve().await?;
        let url = self.invocation_url(&request.session_id)?;
        let body = serde_json::to_vec(&request)
            .map_err(|err| InvocationError::Transport(format!("failed to encode request: {err}")))?;

        let signed = sigv4::sign(
            &SignableRequest {
                method: "POST",
                url: &url,
                headers: &[
                    ("accept", EVENT_STREAM_CONTENT_TYPE),
                    ("content-type", "application/json"),
                ],
                body: &body,
            },
            &credentials,
            &SigningScope {
                region: &self.region,
                service: SIGNING_SERVICE,
                time: Utc::now(),
            },
        )?;

        debug!(
            "Invoking agent {} (alias {}) with session {}",
            self.agent_id, self.agent_alias_id, request.session_id
        );

        let mut builder = self
            .client
            .post(url)
            .header(ACCEPT, EVENT_STREAM_CONTENT_TYPE)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        for (name, value) in signed {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(InvocationError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(decode_stream(response.bytes_stream()))
    }
}

struct DecodeState<S> {
    bytes: Pin<Box<S>>,
    decoder: MessageDecoder,
    finished: bool,
}

/// 將原始位元組串流轉為事件串流。
///
/// 框架錯誤、傳輸錯誤或服務錯誤會作為最後一個項目回傳，之後串流結束。
/// 無法辨識的訊息只產生可略過的 `MalformedEvent`，串流繼續。
pub fn decode_stream<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<InvocationError> + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: MessageDecoder::new(),
        finished: false,
    };
    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }
            match state.decoder.decode() {
                Ok(Some(message)) => {
                    let item = message_to_event(&message);
                    if let Err(err) = &item
                        && !err.is_recoverable()
                    {
                        state.finished = true;
                    }
                    return Some((item, state));
                }
                Ok(None) => {}
                Err(err) => {
                    state.finished = true;
                    return Some((Err(err), state));
                }
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => state.decoder.push(chunk.as_ref()),
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err.into()), state));
                }
                None => {
                    state.finished = true;
                    if state.decoder.pending() > 0 {
                        return Some((
                            Err(InvocationError::Framing(String::from(
                                "response ended in the middle of a message",
                            ))),
                            state,
                        ));
                    }
                    return None;
                }
            }
        }
    }))
}

/// 依 `:message-type` 標頭把一個訊息轉為事件或服務錯誤。
fn message_to_event(message: &Message) -> Result<StreamEvent, InvocationError> {
    match message.header_str(":message-type") {
        Some("event") => {
            let event_type = message.header_str(":event-type").unwrap_or_default();
            StreamEvent::decode(event_type, &message.payload)
        }
        Some("exception") => Err(InvocationError::Service {
            kind: message
                .header_str(":exception-type")
                .unwrap_or("exception")
                .to_string(),
            message: exception_message(&message.payload),
        }),
        Some("error") => Err(InvocationError::Service {
            kind: message
                .header_str(":error-code")
                .unwrap_or("error")
                .to_string(),
            message: message
                .header_str(":error-message")
                .unwrap_or_default()
                .to_string(),
        }),
        other => Err(InvocationError::MalformedEvent(format!(
            "unexpected message type {other:?}"
        ))),
    }
}

fn exception_message(payload: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(payload)
        .ok()
        .and_then(|value| value.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| String::from_utf8_lossy(payload).into_owned())
}

#[cfg(test)]
mod tests {
    use super::eventstream::testing::{encode, event};
    use super::*;
    use super::credentials::CredentialSources;
    use crate::agent::config::AgentSettings;
    use pretty_assertions::assert_eq;

    fn settings() -> AgentSettings {
        AgentSettings {
            agent_id: String::from("AGENT123"),
            agent_alias_id: String::from("ALIAS456"),
            region: String::from("eu-west-1"),
            enable_trace: true,
            endpoint: None,
            title: None,
            credentials: CredentialSources::default(),
        }
    }

    async fn collect(parts: Vec<Vec<u8>>) -> Vec<Result<StreamEvent, InvocationError>> {
        let source = stream::iter(parts.into_iter().map(Ok::<_, InvocationError>));
        decode_stream(source).collect().await
    }

    #[test]
    fn builds_invocation_url_from_region() {
        let runtime = BedrockAgentRuntime::new(&settings());
        let url = runtime.invocation_url("012345678901234").unwrap();
        assert_eq!(
            url.as_str(),
            "https://bedrock-agent-runtime.eu-west-1.amazonaws.com/agents/AGENT123/agentAliases/ALIAS456/sessions/012345678901234/text"
        );
    }

    #[test]
    fn endpoint_override_keeps_its_path() {
        let mut settings = settings();
        settings.endpoint = Some(String::from("http://localhost:4566/proxy/"));
        let runtime = BedrockAgentRuntime::new(&settings);
        let url = runtime.invocation_url("1").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:4566/proxy/agents/AGENT123/agentAliases/ALIAS456/sessions/1/text"
        );
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let runtime = BedrockAgentRuntime::new(&settings());
        let result = runtime.invoke(InvocationRequest::new("1", "hi")).await;
        assert!(matches!(result, Err(InvocationError::Credentials(_))));
    }

    #[tokio::test]
    async fn decodes_events_split_across_reads() {
        let mut bytes = event("trace", r#"{"trace":{"preProcessingTrace":{}}}"#);
        bytes.extend(event("chunk", r#"{"bytes":"SGVsbG8="}"#));
        let (first, second) = bytes.split_at(7);

        let events = collect(vec![first.to_vec(), second.to_vec()]).await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Ok(StreamEvent::Trace(_))));
        assert_eq!(
            events[1],
            Ok(StreamEvent::Chunk {
                bytes: b"Hello".to_vec()
            })
        );
    }

    #[tokio::test]
    async fn exception_frames_become_service_errors() {
        let frame = encode(
            &[
                (":message-type", "exception"),
                (":exception-type", "throttlingException"),
            ],
            br#"{"message":"Rate exceeded"}"#,
        );
        let events = collect(vec![frame]).await;
        assert_eq!(
            events,
            vec![Err(InvocationError::Service {
                kind: String::from("throttlingException"),
                message: String::from("Rate exceeded"),
            })]
        );
    }

    #[tokio::test]
    async fn truncated_body_reports_framing_error() {
        let frame = event("chunk", r#"{"bytes":"SGVsbG8="}"#);
        let events = collect(vec![frame[..frame.len() - 3].to_vec()]).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(InvocationError::Framing(_))));
    }

    #[tokio::test]
    async fn transport_errors_end_the_stream() {
        let source = stream::iter(vec![
            Ok(event("trace", r#"{"trace":{}}"#)),
            Err(InvocationError::Transport(String::from("connection reset"))),
            Ok(event("chunk", r#"{"bytes":"SGVsbG8="}"#)),
        ]);
        let events: Vec<_> = decode_stream(source).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            Err(InvocationError::Transport(String::from("connection reset")))
        );
    }

    #[tokio::test]
    async fn frames_without_message_type_are_skipped() {
        let mut bytes = encode(&[(":event-type", "chunk")], br#"{"bytes":"SGk="}"#);
        bytes.extend(event("chunk", r#"{"bytes":"SGVsbG8="}"#));

        let events = collect(vec![bytes]).await;
        assert_eq!(events.len(), 2);
        match &events[0] {
            Err(err @ InvocationError::MalformedEvent(message)) => {
                assert!(err.is_recoverable());
                assert!(message.contains("None"), "{message}");
            }
            other => panic!("unexpected first item {other:?}"),
        }
        assert_eq!(
            events[1],
            Ok(StreamEvent::Chunk {
                bytes: b"Hello".to_vec()
            })
        );
    }

    #[tokio::test]
    async fn error_frames_end_the_stream() {
        let mut bytes = encode(
            &[
                (":message-type", "error"),
                (":error-code", "InternalFailure"),
                (":error-message", "agent crashed"),
            ],
            b"",
        );
        bytes.extend(event("chunk", r#"{"bytes":"SGVsbG8="}"#));

        let events = collect(vec![bytes]).await;
        assert_eq!(
            events,
            vec![Err(InvocationError::Service {
                kind: String::from("InternalFailure"),
                message: String::from("agent crashed"),
            })]
        );
    }
}
