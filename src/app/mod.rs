//! `app` 模組是聊天前端的核心。
//!
//! 它負責管理應用程式的整體狀態、處理使用者輸入（鍵盤、滑鼠），
//! 並把背景代理呼叫的結果套用到對話歷史上。

/// `agent` 模組：送出使用者訊息、套用來自 `AgentManager` 的事件。
mod agent;
/// `init` 模組：負責 `App` 結構的初始化。
mod init;
/// `keyboard` 模組：專門處理所有的鍵盤輸入事件。
mod keyboard;
/// `mouse` 模組：滑鼠滾輪捲動對話歷史。
mod mouse;
/// `state` 模組：定義 `App` 與輸入框狀態 `InputComposer`。
mod state;
/// `tick` 模組：處理應用程式的定時更新事件（tick）。
mod tick;

pub(crate) use agent::WAITING_STATUS;
pub use state::{App, InputComposer};
