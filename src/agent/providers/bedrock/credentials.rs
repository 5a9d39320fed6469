//! AWS credential resolution.
//!
//! Sources are tried in the order the AWS SDKs use: explicit keys (agent config
//! or environment), the shared `credentials`/`config` profile files, the
//! container credentials endpoint, then EC2 instance metadata (IMDSv2).
//! Temporary credentials are cached until shortly before they expire.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::sigv4::Credentials;
use crate::agent::InvocationError;

pub const DEFAULT_PROFILE: &str = "default";
const CONTAINER_HOST: &str = "http://169.254.170.2";
const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254";
const IMDS_TOKEN_TTL_SECONDS: &str = "21600";
/// Temporary credentials are refreshed this long before they expire.
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Locations of the shared `credentials` and `config` files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFiles {
    pub credentials: PathBuf,
    pub config: PathBuf,
}

impl ProfileFiles {
    /// `AWS_SHARED_CREDENTIALS_FILE` / `AWS_CONFIG_FILE`, else `~/.aws/credentials`
    /// and `~/.aws/config`.
    pub fn locate(lookup: &impl Fn(&str) -> Option<String>) -> Option<Self> {
        let aws_dir = lookup("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .map(|home| home.join(".aws"));
        let credentials = lookup("AWS_SHARED_CREDENTIALS_FILE")
            .map(PathBuf::from)
            .or_else(|| aws_dir.as_ref().map(|dir| dir.join("credentials")))?;
        let config = lookup("AWS_CONFIG_FILE")
            .map(PathBuf::from)
            .or_else(|| aws_dir.as_ref().map(|dir| dir.join("config")))?;
        Some(Self {
            credentials,
            config,
        })
    }

    /// Static keys for `profile`. The credentials file wins over the config file.
    pub fn credentials_for(&self, profile: &str) -> Result<Option<Credentials>, InvocationError> {
        if let Some(keys) = read_section(&self.credentials, profile)?
            .as_ref()
            .and_then(section_credentials)
        {
            return Ok(Some(keys));
        }
        Ok(read_section(&self.config, &config_section_name(profile))?
            .as_ref()
            .and_then(section_credentials))
    }

    /// The `region` set for `profile` in the config file.
    pub fn region_for(&self, profile: &str) -> Option<String> {
        read_section(&self.config, &config_section_name(profile))
            .ok()
            .flatten()?
            .remove("region")
            .filter(|region| !region.is_empty())
    }
}

/// In the config file every profile but the default one is `[profile NAME]`.
fn config_section_name(profile: &str) -> String {
    if profile == DEFAULT_PROFILE {
        profile.to_string()
    } else {
        format!("profile {profile}")
    }
}

fn read_section(path: &Path, name: &str) -> Result<Option<HashMap<String, String>>, InvocationError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(InvocationError::Credentials(format!(
                "failed to read {}: {err}",
                path.display()
            )));
        }
    };
    Ok(parse_profiles(&text).remove(name))
}

/// Reads the INI dialect of the shared files: `[section]` headers, `key = value`
/// pairs and `#`/`;` comment lines. Keys are lower-cased.
fn parse_profiles(text: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        if let Some(section) = current.as_ref()
            && let Some((key, value)) = line.split_once('=')
            && let Some(entries) = sections.get_mut(section)
        {
            entries.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    sections
}

fn section_credentials(section: &HashMap<String, String>) -> Option<Credentials> {
    let value = |key: &str| section.get(key).filter(|value| !value.is_empty()).cloned();
    Some(Credentials {
        access_key_id: value("aws_access_key_id")?,
        secret_access_key: value("aws_secret_access_key")?,
        session_token: value("aws_session_token"),
    })
}

/// The ECS/EKS container credentials endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct ContainerEndpoint {
    pub url: String,
    pub authorization: Option<String>,
}

impl fmt::Debug for ContainerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerEndpoint")
            .field("url", &self.url)
            .field("authorization", &self.authorization.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ContainerEndpoint {
    pub fn from_env(lookup: &impl Fn(&str) -> Option<String>) -> Option<Self> {
        let url = lookup("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI")
            .map(|uri| format!("{CONTAINER_HOST}{uri}"))
            .or_else(|| lookup("AWS_CONTAINER_CREDENTIALS_FULL_URI"))?;
        let authorization = lookup("AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE")
            .and_then(|path| fs::read_to_string(path).ok())
            .map(|token| token.trim().to_string())
            .or_else(|| lookup("AWS_CONTAINER_AUTHORIZATION_TOKEN"));
        Some(Self { url, authorization })
    }
}

/// Where credentials may come from. Built once from configuration and the
/// environment; nothing is fetched until `CredentialsProvider::resolve`.
#[derive(Debug, Clone, Default)]
pub struct CredentialSources {
    /// Keys from `[credentials]` or `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`.
    pub explicit: Option<Credentials>,
    /// Shared profile name; `None` means `default`.
    pub profile: Option<String>,
    pub profile_files: Option<ProfileFiles>,
    pub container: Option<ContainerEndpoint>,
    /// `None` when instance metadata is disabled.
    pub imds_endpoint: Option<String>,
}

impl CredentialSources {
    pub fn from_env(
        explicit: Option<Credentials>,
        profile: Option<String>,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Self {
        let imds_disabled = lookup("AWS_EC2_METADATA_DISABLED")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        Self {
            explicit,
            profile,
            profile_files: ProfileFiles::locate(lookup),
            container: ContainerEndpoint::from_env(lookup),
            imds_endpoint: (!imds_disabled).then(|| {
                lookup("AWS_EC2_METADATA_SERVICE_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_IMDS_ENDPOINT.to_string())
            }),
        }
    }

    pub fn profile_name(&self) -> &str {
        self.profile.as_deref().unwrap_or(DEFAULT_PROFILE)
    }
}

/// Credentials returned by the container and instance metadata endpoints.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TemporaryCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
    expiration: Option<String>,
}

struct CachedCredentials {
    credentials: Credentials,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedCredentials {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_none_or(|at| at - chrono::Duration::minutes(REFRESH_MARGIN_MINUTES) > now)
    }
}

/// Resolves and caches credentials for the signer.
pub struct CredentialsProvider {
    sources: CredentialSources,
    /// Used only for metadata endpoints, so it skips proxies and fails fast.
    client: Client,
    cache: Mutex<Option<CachedCredentials>>,
}

impl CredentialsProvider {
    pub fn new(sources: CredentialSources) -> Self {
        let client = Client::builder()
            .no_proxy()
            .connect_timeout(Duration::from_secs(1))
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            sources,
            client,
            cache: Mutex::new(None),
        }
    }

    pub async fn resolve(&self) -> Result<Credentials, InvocationError> {
        if let Some(explicit) = &self.sources.explicit {
            return Ok(explicit.clone());
        }
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref()
            && cached.is_fresh(Utc::now())
        {
            return Ok(cached.credentials.clone());
        }
        let fetched = self.fetch().await?;
        let credentials = fetched.credentials.clone();
        *cache = Some(fetched);
        Ok(credentials)
    }

    async fn fetch(&self) -> Result<CachedCredentials, InvocationError> {
        let profile = self.sources.profile_name();
        if let Some(files) = &self.sources.profile_files
            && let Some(credentials) = files.credentials_for(profile)?
        {
            debug!("Using credentials from shared profile `{profile}`");
            return Ok(CachedCredentials {
                credentials,
                expires_at: None,
            });
        }
        if let Some(container) = &self.sources.container {
            debug!("Fetching credentials from {}", container.url);
            let mut request = self.client.get(&container.url);
            if let Some(token) = &container.authorization {
                request = request.header(AUTHORIZATION, token);
            }
            return parse_temporary(&send_text(request, "container credentials endpoint").await?);
        }
        if let Some(endpoint) = &self.sources.imds_endpoint {
            match self.fetch_from_imds(endpoint.trim_end_matches('/')).await {
                Ok(cached) => return Ok(cached),
                Err(err) => debug!("Instance metadata credentials unavailable: {err}"),
            }
        }
        Err(InvocationError::Credentials(format!(
            "no credentials found for profile `{profile}`: set AWS_ACCESS_KEY_ID and \
             AWS_SECRET_ACCESS_KEY, configure a shared profile, or add [credentials] to \
             config/agent.toml"
        )))
    }

    async fn fetch_from_imds(&self, endpoint: &str) -> Result<CachedCredentials, InvocationError> {
        let token = send_text(
            self.client
                .put(format!("{endpoint}/latest/api/token"))
                .header("x-aws-ec2-metadata-token-ttl-seconds", IMDS_TOKEN_TTL_SECONDS),
            "instance metadata token",
        )
        .await?;
        let roles_url = format!("{endpoint}/latest/meta-data/iam/security-credentials/");
        let roles = send_text(
            self.client
                .get(&roles_url)
                .header("x-aws-ec2-metadata-token", &token),
            "instance role list",
        )
        .await?;
        let role = roles
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| {
                InvocationError::Credentials(String::from("instance has no IAM role attached"))
            })?;
        info!("Using credentials of instance role `{role}`");
        let body = send_text(
            self.client
                .get(format!("{roles_url}{role}"))
                .header("x-aws-ec2-metadata-token", &token),
            "instance role credentials",
        )
        .await?;
        parse_temporary(&body)
    }
}

async fn send_text(request: RequestBuilder, what: &str) -> Result<String, InvocationError> {
    let failed = |err: reqwest::Error| InvocationError::Credentials(format!("{what}: {err}"));
    request
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(failed)?
        .text()
        .await
        .map_err(failed)
}

fn parse_temporary(body: &str) -> Result<CachedCredentials, InvocationError> {
    let parsed: TemporaryCredentials = serde_json::from_str(body).map_err(|err| {
        InvocationError::Credentials(format!("unexpected credentials response: {err}"))
    })?;
    let expires_at = parsed
        .expiration
        .as_deref()
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|at| at.with_timezone(&Utc));
    Ok(CachedCredentials {
        credentials: Credentials {
            access_key_id: parsed.access_key_id,
            secret_access_key: parsed.secret_access_key,
            session_token: parsed.token,
        },
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const ROLE_CREDENTIALS: &str = r#"{
        "Code": "Success",
        "AccessKeyId": "ASIAROLE",
        "SecretAccessKey": "role-secret",
        "Token": "role-token",
        "Expiration": "2099-01-01T00:00:00Z"
    }"#;

    /// Answers one request per route with the body of the first route whose
    /// request line prefix matches, and returns the request heads it saw.
    async fn serve(routes: Vec<(&'static str, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..routes.len() {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let mut len = 0;
                while !buf[..len].windows(4).any(|w| w == b"\r\n\r\n") {
                    let read = socket.read(&mut buf[len..]).await.unwrap();
                    if read == 0 {
                        break;
                    }
                    len += read;
                }
                let head = String::from_utf8_lossy(&buf[..len]).to_string();
                let (status, body) = match routes.iter().find(|(line, _)| head.starts_with(line)) {
                    Some((_, body)) => ("200 OK", *body),
                    None => ("404 Not Found", ""),
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
                seen.push(head.to_ascii_lowercase());
            }
            seen
        });
        (url, handle)
    }

    fn write_files(credentials: &str, config: &str) -> (tempfile::TempDir, ProfileFiles) {
        let dir = tempfile::tempdir().unwrap();
        let files = ProfileFiles {
            credentials: dir.path().join("credentials"),
            config: dir.path().join("config"),
        };
        fs::write(&files.credentials, credentials).unwrap();
        fs::write(&files.config, config).unwrap();
        (dir, files)
    }

    #[test]
    fn parses_sections_and_ignores_comments() {
        let sections = parse_profiles(
            "# leading comment\n[default]\nAWS_ACCESS_KEY_ID = AKID\n; note\n[profile  dev]\nregion=eu-west-1\n",
        );
        assert_eq!(sections["default"]["aws_access_key_id"], "AKID");
        assert_eq!(sections["profile dev"]["region"], "eu-west-1");
    }

    #[test]
    fn credentials_file_wins_over_config_file() {
        let (_dir, files) = write_files(
            "[dev]\naws_access_key_id = FROM_CREDENTIALS\naws_secret_access_key = s1\n",
            "[profile dev]\naws_access_key_id = FROM_CONFIG\naws_secret_access_key = s2\nregion = ap-northeast-1\n",
        );
        let keys = files.credentials_for("dev").unwrap().unwrap();
        assert_eq!(keys.access_key_id, "FROM_CREDENTIALS");
        assert_eq!(files.region_for("dev").as_deref(), Some("ap-northeast-1"));
    }

    #[test]
    fn named_profiles_in_config_file_use_the_profile_prefix() {
        let (_dir, files) = write_files(
            "",
            "[dev]\naws_access_key_id = WRONG\naws_secret_access_key = x\n\
             [profile dev]\naws_access_key_id = RIGHT\naws_secret_access_key = y\naws_session_token = t\n",
        );
        let keys = files.credentials_for("dev").unwrap().unwrap();
        assert_eq!(keys.access_key_id, "RIGHT");
        assert_eq!(keys.session_token.as_deref(), Some("t"));
    }

    #[test]
    fn missing_files_are_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let files = ProfileFiles {
            credentials: dir.path().join("nope"),
            config: dir.path().join("nope-either"),
        };
        assert_eq!(files.credentials_for(DEFAULT_PROFILE).unwrap(), None);
        assert_eq!(files.region_for(DEFAULT_PROFILE), None);
    }

    #[tokio::test]
    async fn explicit_keys_win_over_profiles() {
        let (_dir, files) = write_files(
            "[default]\naws_access_key_id = PROFILE\naws_secret_access_key = s\n",
            "",
        );
        let provider = CredentialsProvider::new(CredentialSources {
            explicit: Some(Credentials {
                access_key_id: String::from("EXPLICIT"),
                secret_access_key: String::from("s"),
                session_token: None,
            }),
            profile_files: Some(files),
            ..CredentialSources::default()
        });
        assert_eq!(provider.resolve().await.unwrap().access_key_id, "EXPLICIT");
    }

    #[tokio::test]
    async fn reports_missing_credentials_when_every_source_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CredentialsProvider::new(CredentialSources {
            profile: Some(String::from("ops")),
            profile_files: Some(ProfileFiles {
                credentials: dir.path().join("credentials"),
                config: dir.path().join("config"),
            }),
            ..CredentialSources::default()
        });
        match provider.resolve().await {
            Err(InvocationError::Credentials(message)) => assert!(message.contains("`ops`"), "{message}"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetches_from_container_endpoint_with_authorization() {
        let (url, server) = serve(vec![("GET /v2/credentials/abc ", ROLE_CREDENTIALS)]).await;
        let provider = CredentialsProvider::new(CredentialSources {
            container: Some(ContainerEndpoint {
                url: format!("{url}/v2/credentials/abc"),
                authorization: Some(String::from("Bearer task-token")),
            }),
            ..CredentialSources::default()
        });

        let credentials = provider.resolve().await.unwrap();
        assert_eq!(credentials.access_key_id, "ASIAROLE");
        assert_eq!(credentials.session_token.as_deref(), Some("role-token"));

        let seen = server.await.unwrap();
        assert!(seen[0].contains("authorization: bearer task-token"), "{}", seen[0]);

        // Cached until expiry; the server is gone, so a refetch would fail.
        assert_eq!(provider.resolve().await.unwrap().access_key_id, "ASIAROLE");
    }

    #[tokio::test]
    async fn fetches_instance_role_through_imds_v2() {
        let (url, server) = serve(vec![
            ("PUT /latest/api/token ", "session-token"),
            ("GET /latest/meta-data/iam/security-credentials/ ", "app-role\n"),
            ("GET /latest/meta-data/iam/security-credentials/app-role ", ROLE_CREDENTIALS),
        ])
        .await;
        let provider = CredentialsProvider::new(CredentialSources {
            imds_endpoint: Some(url),
            ..CredentialSources::default()
        });

        let credentials = provider.resolve().await.unwrap();
        assert_eq!(credentials.secret_access_key, "role-secret");

        let seen = server.await.unwrap();
        assert!(seen[0].contains("x-aws-ec2-metadata-token-ttl-seconds: 21600"));
        assert!(seen[1].contains("x-aws-ec2-metadata-token: session-token"));
        assert!(seen[2].contains("x-aws-ec2-metadata-token: session-token"));
    }

    #[test]
    fn temporary_credentials_expire_early() {
        let now = Utc::now();
        let cached = |expires_at| CachedCredentials {
            credentials: Credentials {
                access_key_id: String::from("A"),
                secret_access_key: String::from("S"),
                session_token: None,
            },
            expires_at,
        };
        assert!(cached(None).is_fresh(now));
        assert!(cached(Some(now + chrono::Duration::hours(1))).is_fresh(now));
        assert!(!cached(Some(now + chrono::Duration::minutes(2))).is_fresh(now));
    }

    #[test]
    fn container_endpoint_prefers_relative_uri() {
        let lookup = |key: &str| match key {
            "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI" => Some(String::from("/v2/credentials/x")),
            "AWS_CONTAINER_CREDENTIALS_FULL_URI" => Some(String::from("http://other")),
            "AWS_CONTAINER_AUTHORIZATION_TOKEN" => Some(String::from("secret-task-token")),
            _ => None,
        };
        let endpoint = ContainerEndpoint::from_env(&lookup).unwrap();
        assert_eq!(endpoint.url, "http://169.254.170.2/v2/credentials/x");
        assert_eq!(endpoint.authorization.as_deref(), Some("secret-task-token"));
        assert!(!format!("{endpoint:?}").contains("secret-task-token"));
    }

    #[test]
    fn metadata_can_be_disabled() {
        let lookup = |key: &str| (key == "AWS_EC2_METADATA_DISABLED").then(|| String::from("TRUE"));
        assert_eq!(CredentialSources::from_env(None, None, &lookup).imds_endpoint, None);
        let lookup = |_: &str| None::<String>;
        assert_eq!(
            CredentialSources::from_env(None, None, &lookup).imds_endpoint.as_deref(),
            Some(DEFAULT_IMDS_ENDPOINT)
        );
    }
}
