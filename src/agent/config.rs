use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::providers::bedrock::credentials::CredentialSources;
use super::providers::bedrock::sigv4::Credentials;

/// 預設的視窗標題。
pub const DEFAULT_TITLE: &str = "Resource Management Assistant";

/// 工作區內設定檔的相對路徑。
pub const CONFIG_RELATIVE_PATH: &str = "config/agent.toml";

/// 設定值缺漏時的錯誤。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing `{key}`: set it in config/agent.toml or via the {env} environment variable")]
    Missing { key: &'static str, env: &'static str },
}

/// `config/agent.toml` 的檔案格式。所有欄位都是可選的，缺少的值會從環境變數補上。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct AgentFileConfig {
    agent_id: Option<String>,
    agent_alias_id: Option<String>,
    region: Option<String>,
    enable_trace: Option<bool>,
    endpoint: Option<String>,
    title: Option<String>,
    /// 共用設定檔（`~/.aws/credentials`、`~/.aws/config`）中的 profile 名稱。
    profile: Option<String>,
    credentials: Option<CredentialsSection>,
}

/// 設定檔中的 `[credentials]` 區段。
///
/// 注意：此區段包含敏感的 AWS 金鑰，應確保設定檔不會被提交到版本控制系統。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct CredentialsSection {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    session_token: Option<String>,
}

/// 代理連線所需的完整設定。
///
/// `agent_id`、`agent_alias_id` 與 `region` 由外部的部署流程提供。
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub region: String,
    /// 是否要求服務回傳追蹤事件（只用於日誌診斷）。
    pub enable_trace: bool,
    /// 覆寫預設的服務端點（可選）。
    pub endpoint: Option<String>,
    /// 視窗標題（可選）。
    pub title: Option<String>,
    /// 憑證來源。實際的金鑰在呼叫代理時才解析，找不到時才回報錯誤。
    pub credentials: CredentialSources,
}

impl AgentSettings {
    /// 從指定的工作區目錄讀取 `config/agent.toml`。
    /// 設定檔不存在時，所有值都從環境變數取得。
    pub fn load(workspace_root: &Path) -> Result<Self> {
        Self::load_from(&workspace_root.join(CONFIG_RELATIVE_PATH))
    }

    /// 從指定的設定檔路徑讀取設定，並以行程的環境變數補齊缺少的值。
    pub fn load_from(config_path: &Path) -> Result<Self> {
        Self::load_with(config_path, |key| env::var(key).ok())
    }

    /// 與 `load_from` 相同，但環境變數由 `lookup` 提供。
    pub fn load_with(config_path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file = if config_path.exists() {
            let raw = fs::read_to_string(config_path)
                .with_context(|| format!("讀取代理設定失敗: {}", config_path.display()))?;
            toml::from_str::<AgentFileConfig>(&raw)
                .with_context(|| format!("解析代理設定失敗: {}", config_path.display()))?
        } else {
            AgentFileConfig::default()
        };
        Ok(Self::resolve(file, lookup)?)
    }

    /// 合併設定檔與環境變數。優先順序：設定檔欄位 > 環境變數 > 共用 profile 設定。
    fn resolve(
        file: AgentFileConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let agent_id = non_empty(file.agent_id)
            .or_else(|| lookup("BEDROCK_AGENT_ID"))
            .ok_or(ConfigError::Missing {
                key: "agent_id",
                env: "BEDROCK_AGENT_ID",
            })?;
        let agent_alias_id = non_empty(file.agent_alias_id)
            .or_else(|| lookup("BEDROCK_AGENT_ALIAS_ID"))
            .ok_or(ConfigError::Missing {
                key: "agent_alias_id",
                env: "BEDROCK_AGENT_ALIAS_ID",
            })?;
        let profile = non_empty(file.profile)
            .or_else(|| lookup("AWS_PROFILE"))
            .or_else(|| lookup("AWS_DEFAULT_PROFILE"));

        let section = file.credentials.unwrap_or_default();
        let explicit = match (
            non_empty(section.access_key_id),
            non_empty(section.secret_access_key),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => Some(Credentials {
                access_key_id,
                secret_access_key,
                session_token: non_empty(section.session_token),
            }),
            _ => match (lookup("AWS_ACCESS_KEY_ID"), lookup("AWS_SECRET_ACCESS_KEY")) {
                (Some(access_key_id), Some(secret_access_key)) => Some(Credentials {
                    access_key_id,
                    secret_access_key,
                    session_token: lookup("AWS_SESSION_TOKEN"),
                }),
                _ => None,
            },
        };
        let credentials = CredentialSources::from_env(explicit, profile, &lookup);

        let region = non_empty(file.region)
            .or_else(|| lookup("AWS_REGION"))
            .or_else(|| lookup("AWS_DEFAULT_REGION"))
            .or_else(|| {
                credentials
                    .profile_files
                    .as_ref()
                    .and_then(|files| files.region_for(credentials.profile_name()))
            })
            .ok_or(ConfigError::Missing {
                key: "region",
                env: "AWS_REGION",
            })?;

        Ok(Self {
            agent_id,
            agent_alias_id,
            region,
            enable_trace: file.enable_trace.unwrap_or(true),
            endpoint: non_empty(file.endpoint),
            title: non_empty(file.title),
            credentials,
        })
    }

    /// 回傳服務端點，未覆寫時依區域組出預設端點。
    pub fn endpoint(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            format!("https://bedrock-agent-runtime.{}.amazonaws.com", self.region)
        })
    }

    /// 回傳視窗標題。
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// 預設的工作區根目錄：目前的工作目錄。
pub fn default_workspace_root() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
