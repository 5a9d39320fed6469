use log::warn;

use super::{ChatTurn, InvocationError};

/// 對話工作階段的狀態。
///
/// `Empty → Sending → AwaitingInput → Sending → …`，`Sending` 只有一個出口：
/// 代理呼叫的結果（成功或失敗）回來。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 尚未有任何訊息。
    Empty,
    /// 等待使用者輸入。
    AwaitingInput,
    /// 已送出一則使用者訊息，正在等待代理回覆。
    Sending,
}

/// 無法開始一次新的對話交換的原因。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("message is empty")]
    EmptyInput,
    #[error("still waiting for the previous reply")]
    Busy,
}

/// 一個互動工作階段內的對話歷史，只能附加，不會持久化。
///
/// 每一則使用者訊息之後必定緊接著恰好一則代理回覆，才會接受下一則使用者訊息。
pub struct Session {
    /// 依建立順序儲存的所有訊息，也就是顯示順序。
    turns: Vec<ChatTurn>,
    state: SessionState,
    /// 當前在 UI 中被選取的訊息索引。
    selected: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// 建立一個空的工作階段。
    pub fn new() -> Self {
        Self {
            turns: Vec::new(),
            state: SessionState::Empty,
            selected: 0,
        }
    }

    /// 回傳所有訊息的不可變切片，順序即顯示順序。
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state == SessionState::Sending
    }

    /// 附加一則使用者訊息並進入 `Sending` 狀態。
    ///
    /// 空白訊息或仍在等待上一則回覆時會被拒絕，歷史不會改變。
    pub fn begin_exchange(&mut self, text: &str) -> Result<(), SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }
        if self.is_sending() {
            return Err(SessionError::Busy);
        }
        self.push(ChatTurn::user(text));
        self.state = SessionState::Sending;
        Ok(())
    }

    /// 以代理呼叫的結果附加恰好一則代理回覆，並回到 `AwaitingInput`。
    ///
    /// 錯誤會轉為可讀文字並標記為失敗的回覆。不在 `Sending` 狀態時忽略此結果。
    pub fn complete_exchange(&mut self, outcome: Result<String, InvocationError>) {
        if !self.is_sending() {
            warn!("Dropping agent reply that arrived with no exchange in flight");
            return;
        }
        let turn = match outcome {
            Ok(text) => ChatTurn::assistant(text),
            Err(err) => ChatTurn::assistant_failure(err.to_string()),
        };
        self.push(turn);
        self.state = SessionState::AwaitingInput;
    }

    /// 附加訊息，並自動將選取位置移動到這則新訊息上。
    fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
        self.selected = self.turns.len().saturating_sub(1);
    }

    /// 回傳當前選取的訊息索引。
    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// 根據給定的偏移量（`delta`）移動選取位置，不會超出邊界。
    pub fn move_selection(&mut self, delta: isize) {
        if self.turns.is_empty() {
            return;
        }
        let last = self.turns.len() as isize - 1;
        self.selected = (self.selected as isize + delta).clamp(0, last) as usize;
    }
}
