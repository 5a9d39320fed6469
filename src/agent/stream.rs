//! 遠端代理回應串流中的事件型別。
//!
//! 服務回傳的每個事件都由事件類型與 JSON 內容組成。這裡把它們解析成明確的
//! 列舉：最終答案片段（`Chunk`）、診斷用的追蹤事件（`Trace`），以及無法辨識而被忽略
//! 的事件（`Ignored`）。

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::InvocationError;

/// 回應串流中的單一事件。
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// 最終答案片段，內容為原始位元組。
    Chunk { bytes: Vec<u8> },
    /// 只用於診斷輸出的追蹤事件，不會影響回傳值。
    Trace(TraceEvent),
    /// 無法辨識的事件類型。
    Ignored { event_type: String },
}

/// 追蹤事件的種類。
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    PreProcessing(Value),
    Orchestration(OrchestrationTrace),
    /// 其他追蹤種類（如 `postProcessingTrace`、`failureTrace`）。
    Other { kind: String, body: Value },
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct TextPart {
    pub text: String,
}

/// 協調（orchestration）追蹤的型別化檢視，未知欄位會被忽略。
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestrationTrace {
    pub rationale: Option<TextPart>,
    pub invocation_input: Option<InvocationInput>,
    pub observation: Option<Observation>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct InvocationInput {
    pub invocation_type: Option<String>,
    pub action_group_invocation_input: Option<Value>,
    pub knowledge_base_lookup_input: Option<TextPart>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Observation {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub action_group_invocation_output: Option<TextPart>,
    pub knowledge_base_lookup_output: Option<KnowledgeBaseLookupOutput>,
    pub final_response: Option<TextPart>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct KnowledgeBaseLookupOutput {
    pub retrieved_references: Vec<Value>,
}

#[derive(Deserialize)]
struct ChunkPayload {
    bytes: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TracePayload {
    trace: Map<String, Value>,
}

impl StreamEvent {
    /// 根據事件類型解析事件內容。
    ///
    /// 內容格式錯誤時回傳 `InvocationError::MalformedEvent`，呼叫端可以略過該事件。
    pub fn decode(event_type: &str, payload: &[u8]) -> Result<Self, InvocationError> {
        match event_type {
            "chunk" => {
                let chunk: ChunkPayload = serde_json::from_slice(payload)
                    .map_err(|err| malformed("chunk", err))?;
                let bytes = STANDARD
                    .decode(chunk.bytes.as_bytes())
                    .map_err(|err| malformed("chunk", err))?;
                Ok(StreamEvent::Chunk { bytes })
            }
            "trace" => {
                let payload: TracePayload = serde_json::from_slice(payload)
                    .map_err(|err| malformed("trace", err))?;
                Ok(classify_trace(payload.trace)?
                    .map(StreamEvent::Trace)
                    .unwrap_or_else(|| StreamEvent::Ignored {
                        event_type: String::from("trace"),
                    }))
            }
            other => Ok(StreamEvent::Ignored {
                event_type: other.to_string(),
            }),
        }
    }
}

fn malformed(event_type: &str, err: impl std::fmt::Display) -> InvocationError {
    InvocationError::MalformedEvent(format!("{event_type}: {err}"))
}

fn classify_trace(mut trace: Map<String, Value>) -> Result<Option<TraceEvent>, InvocationError> {
    if let Some(body) = trace.remove("preProcessingTrace") {
        return Ok(Some(TraceEvent::PreProcessing(body)));
    }
    if let Some(body) = trace.remove("orchestrationTrace") {
        let parsed: OrchestrationTrace =
            serde_json::from_value(body).map_err(|err| malformed("orchestrationTrace", err))?;
        return Ok(Some(TraceEvent::Orchestration(parsed)));
    }
    Ok(trace
        .into_iter()
        .next()
        .map(|(kind, body)| TraceEvent::Other { kind, body }))
}

impl TraceEvent {
    /// 將追蹤事件轉成適合寫入日誌的描述行。
    pub fn describe(&self) -> Vec<String> {
        match self {
            TraceEvent::PreProcessing(body) => vec![format!("Pre-processing trace: {body}")],
            TraceEvent::Orchestration(trace) => trace.describe(),
            TraceEvent::Other { kind, body } => vec![format!("{kind}: {body}")],
        }
    }
}

impl OrchestrationTrace {
    fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(rationale) = &self.rationale {
            lines.push(format!("Rationale: {}", rationale.text));
        }
        if let Some(input) = &self.invocation_input {
            if let Some(kind) = &input.invocation_type {
                lines.push(format!("Invocation type: {kind}"));
            }
            if let Some(action) = &input.action_group_invocation_input {
                lines.push(format!("Action group invocation input: {action}"));
            }
            if let Some(lookup) = &input.knowledge_base_lookup_input {
                lines.push(format!("Looking up in knowledge base: {}", lookup.text));
            }
        }
        if let Some(observation) = &self.observation {
            if let Some(kind) = &observation.kind {
                lines.push(format!("Observation type: {kind}"));
            }
            if let Some(output) = &observation.action_group_invocation_output {
                lines.push(format!("Action group output: {}", output.text));
            }
            if let Some(output) = &observation.knowledge_base_lookup_output {
                lines.push(format!(
                    "Knowledge base returned {} reference(s)",
                    output.retrieved_references.len()
                ));
            }
            if let Some(response) = &observation.final_response {
                lines.push(format!("Final response observed: {}", response.text));
            }
        }
        if lines.is_empty() {
            lines.push(String::from("Orchestration step"));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn decodes_base64_chunk() {
        let payload = json!({ "bytes": STANDARD.encode("Hello") }).to_string();
        let event = StreamEvent::decode("chunk", payload.as_bytes()).unwrap();
        assert_eq!(
            event,
            StreamEvent::Chunk {
                bytes: b"Hello".to_vec()
            }
        );
    }

    #[test]
    fn chunk_without_valid_base64_is_malformed() {
        let payload = json!({ "bytes": "***" }).to_string();
        let err = StreamEvent::decode("chunk", payload.as_bytes()).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn classifies_orchestration_trace() {
        let payload = json!({
            "agentId": "AGENT",
            "trace": {
                "orchestrationTrace": {
                    "invocationInput": {
                        "invocationType": "KNOWLEDGE_BASE",
                        "knowledgeBaseLookupInput": { "text": "s3 buckets", "knowledgeBaseId": "KB1" }
                    },
                    "observation": {
                        "type": "KNOWLEDGE_BASE",
                        "knowledgeBaseLookupOutput": { "retrievedReferences": [{}, {}] }
                    }
                }
            }
        })
        .to_string();

        let trace = match StreamEvent::decode("trace", payload.as_bytes()).unwrap() {
            StreamEvent::Trace(trace) => trace,
            other => panic!("expected a trace event, got {other:?}"),
        };
        assert_eq!(
            trace.describe(),
            vec![
                String::from("Invocation type: KNOWLEDGE_BASE"),
                String::from("Looking up in knowledge base: s3 buckets"),
                String::from("Observation type: KNOWLEDGE_BASE"),
                String::from("Knowledge base returned 2 reference(s)"),
            ]
        );
    }

    #[test]
    fn final_observation_reports_its_type() {
        let payload = json!({
            "trace": {
                "orchestrationTrace": {
                    "observation": {
                        "type": "FINISH",
                        "finalResponse": { "text": "You have 3 buckets." }
                    }
                }
            }
        });
        let trace = match StreamEvent::decode("trace", payload.to_string().as_bytes()).unwrap() {
            StreamEvent::Trace(trace) => trace,
            other => panic!("expected a trace event, got {other:?}"),
        };
        assert_eq!(
            trace.describe(),
            vec![
                String::from("Observation type: FINISH"),
                String::from("Final response observed: You have 3 buckets."),
            ]
        );
    }

    #[test]
    fn classifies_pre_processing_trace() {
        let payload = json!({ "trace": { "preProcessingTrace": { "modelInvocationInput": {} } } });
        let event = StreamEvent::decode("trace", payload.to_string().as_bytes()).unwrap();
        assert!(matches!(
            event,
            StreamEvent::Trace(TraceEvent::PreProcessing(_))
        ));
    }

    #[test]
    fn other_trace_kinds_are_kept_for_diagnostics() {
        let payload = json!({ "trace": { "failureTrace": { "failureReason": "boom" } } });
        let event = StreamEvent::decode("trace", payload.to_string().as_bytes()).unwrap();
        match event {
            StreamEvent::Trace(TraceEvent::Other { kind, .. }) => assert_eq!(kind, "failureTrace"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unknown_event_types_are_ignored() {
        let event = StreamEvent::decode("returnControl", b"{}").unwrap();
        assert_eq!(
            event,
            StreamEvent::Ignored {
                event_type: String::from("returnControl")
            }
        );
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = StreamEvent::decode("trace", b"not json").unwrap_err();
        assert!(matches!(err, InvocationError::MalformedEvent(_)));
    }
}
