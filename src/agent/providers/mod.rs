//! `providers` 模組負責提供與遠端代理服務進行通訊的具體實作。
//!
//! 每個子模組都實現了 `AgentRuntime` trait，抽象化了「送出呼叫請求、取回事件串流」
//! 的細節，讓 `AgentClient` 不需要知道傳輸層的格式。

// --- 子模組宣告 ---

/// `bedrock` 模組：透過 HTTPS 呼叫 Amazon Bedrock Agent Runtime 的 InvokeAgent 操作。
pub mod bedrock;

#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::agent::{InvocationError, InvocationRequest, StreamEvent};

/// 代理回應的事件串流。串流只會被消費一次。
pub type EventStream = BoxStream<'static, Result<StreamEvent, InvocationError>>;

/// 定義了所有代理執行環境都必須遵守的通用行為介面。
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// 回傳此執行環境的名稱，用於 UI 顯示或日誌記錄。
    fn name(&self) -> &str;

    /// 送出一次呼叫請求，並回傳服務的事件串流。
    ///
    /// # Arguments
    /// * `request` - 要傳送給代理的請求物件。
    ///
    /// # Returns
    /// * 建立連線或送出請求失敗時回傳錯誤；串流中途的錯誤則以串流項目的形式回傳。
    async fn invoke(&self, request: InvocationRequest) -> Result<EventStream, InvocationError>;
}
