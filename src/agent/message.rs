use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 對話中訊息的發言者。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    /// 在對話面板中顯示的標籤。
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "You",
            ChatRole::Assistant => "Assistant",
        }
    }
}

/// 對話歷史中的單一訊息。建立後不可修改。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    role: ChatRole,
    content: String,
    /// 只有從 `InvocationError` 轉換而來的代理回覆才會是 `true`。
    #[serde(default)]
    failed: bool,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            failed: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            failed: false,
        }
    }

    /// 建立一則代表呼叫失敗的代理回覆，內容為可讀的錯誤描述。
    pub fn assistant_failure(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            failed: true,
        }
    }

    pub fn role(&self) -> ChatRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn failed(&self) -> bool {
        self.failed
    }
}

/// 隨請求一併送出的工作階段屬性。此前端永遠傳送空的屬性表。
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionAttributes {
    pub session_attributes: Map<String, Value>,
    pub prompt_session_attributes: Map<String, Value>,
}

/// 代表一次對遠端代理的呼叫。每次呼叫都重新建立，不會重複使用。
///
/// `session_id` 放在請求路徑中，其餘欄位序列化為 JSON 請求主體。
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    /// 用於在遠端服務中區分這次對話的隨機識別碼，不具任何安全意義。
    #[serde(skip)]
    pub session_id: String,
    /// 使用者輸入的文字。
    pub input_text: String,
    /// 是否要求服務回傳追蹤事件。
    pub enable_trace: bool,
    pub end_session: bool,
    pub session_state: SessionAttributes,
}

impl InvocationRequest {
    /// `InvocationRequest` 的建構函式。
    pub fn new(session_id: impl Into<String>, input_text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            input_text: input_text.into(),
            enable_trace: true,
            end_session: false,
            session_state: SessionAttributes::default(),
        }
    }

    pub fn with_trace(mut self, enable_trace: bool) -> Self {
        self.enable_trace = enable_trace;
        self
    }
}
