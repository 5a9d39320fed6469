//! 代理呼叫與對話狀態。
//!
//! 此模組負責描述與遠端代理互動的核心組件，包括請求/回應事件、
//! 對話歷史管理、後端設定與背景呼叫管理等抽象層。

/// `client` 模組：提供 `AgentClient`，送出一次查詢並從回應串流中取出最終答案。
pub mod client;

/// `config` 模組：負責 `config/agent.toml` 的解析與環境變數補值。
pub mod config;

/// `error` 模組：定義結束一次代理呼叫的 `InvocationError`。
pub mod error;

/// `manager` 模組：提供 `AgentManager`，在背景任務中執行呼叫並把結果交回 UI。
pub mod manager;

/// `message` 模組：定義對話訊息 (`ChatTurn`) 與送往服務的請求格式 (`InvocationRequest`)。
pub mod message;

/// `providers` 模組：與代理後端通訊的具體實作，目前為 Amazon Bedrock。
pub mod providers;

/// `session` 模組：管理一個互動工作階段的對話歷史與狀態機。
pub mod session;

/// `session_id` 模組：產生每次呼叫使用的 15 位數工作階段識別碼。
pub mod session_id;

/// `stream` 模組：回應串流中的事件型別。
pub mod stream;

// --- 公共 API 重新導出 ---

pub use client::AgentClient;
pub use error::InvocationError;
pub use manager::{AgentEvent, AgentManager};
pub use message::{ChatRole, ChatTurn, InvocationRequest};
pub use session::{Session, SessionError, SessionState};
pub use stream::{StreamEvent, TraceEvent};
