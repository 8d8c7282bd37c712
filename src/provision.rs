use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::{
    panel::{ClientRecord, NegotiationError, PanelClient},
    profile::{ProfileError, ProfileRegistry},
    session::{SessionError, SessionManager, SessionStore},
    vmess::{self, Descriptor},
};

const OPERATOR_HINT: &str = "check that the panel API is enabled; \
verify the panel URL, username/password and inbound id; \
if the panel certificate is self-signed set VERIFY_TLS=false";

#[derive(Debug)]
pub enum ProvisionError {
    Configuration(ProfileError),
    InvalidLabel,
    Authentication(SessionError),
    Negotiation(NegotiationError),
    HttpClient { reason: String },
}

impl ProvisionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::InvalidLabel => "invalid_label",
            Self::Authentication(_) => "authentication_error",
            Self::Negotiation(_) => "endpoint_negotiation_exhausted",
            Self::HttpClient { .. } => "http_client_error",
        }
    }

    /// What the operator should check, for failures caused by the remote panel.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Authentication(_) | Self::Negotiation(_) => Some(OPERATOR_HINT),
            Self::Configuration(_) | Self::InvalidLabel | Self::HttpClient { .. } => None,
        }
    }

    pub fn to_failure(&self) -> ProvisionFailure {
        ProvisionFailure {
            kind: self.kind(),
            message: self.to_string(),
            hint: self.hint(),
        }
    }
}

impl std::fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "{err}"),
            Self::InvalidLabel => write!(f, "label must not be empty"),
            Self::Authentication(err) => write!(f, "{err}"),
            Self::Negotiation(err) => write!(f, "{err}"),
            Self::HttpClient { reason } => write!(f, "build http client: {reason}"),
        }
    }
}

impl std::error::Error for ProvisionError {}

impl From<ProfileError> for ProvisionError {
    fn from(err: ProfileError) -> Self {
        Self::Configuration(err)
    }
}

impl From<SessionError> for ProvisionError {
    fn from(err: SessionError) -> Self {
        Self::Authentication(err)
    }
}

impl From<NegotiationError> for ProvisionError {
    fn from(err: NegotiationError) -> Self {
        Self::Negotiation(err)
    }
}

/// Serializable `{kind, message}` view of a [`ProvisionError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionFailure {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionOutcome {
    pub profile: String,
    pub remark: String,
    pub uuid: String,
    pub host: String,
    pub port: String,
    pub network: String,
    pub uri: String,
    pub descriptor: Descriptor,
}

impl ProvisionOutcome {
    pub fn summary(&self) -> String {
        format!(
            "Created on profile {}\n\
             - Remark: {}\n\
             - UUID: {}\n\
             - Host: {}\n\
             - Port: {}\n\
             - Network: {}\n\
             \n\
             vmess link:\n\
             {}\n",
            self.profile, self.remark, self.uuid, self.host, self.port, self.network, self.uri
        )
    }

    /// Text attachment: the link plus the pretty-printed descriptor for apps that import JSON.
    pub fn document(&self) -> String {
        let json = serde_json::to_string_pretty(&self.descriptor).unwrap_or_default();
        format!(
            "# {}\n\n## VMESS\n{}\n\n## JSON\n{}\n",
            self.remark, self.uri, json
        )
    }

    /// File name for [`ProvisionOutcome::document`], with path separators replaced.
    pub fn document_file_name(&self) -> String {
        let stem: String = self
            .remark
            .chars()
            .map(|c| match c {
                '/' | '\\' | '\0' => '_',
                c => c,
            })
            .collect();
        format!("{stem}.txt")
    }
}

/// Quota and policy applied to every client minted by a [`Provisioner`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionDefaults {
    pub total_gb: u64,
    pub expire_days: u64,
    pub flow: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub login: Duration,
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            login: crate::session::DEFAULT_LOGIN_TIMEOUT,
            request: crate::panel::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Runs login, inbound lookup, client creation and link encoding for one label.
#[derive(Debug, Clone)]
pub struct Provisioner {
    registry: ProfileRegistry,
    sessions: SessionManager,
    panel: PanelClient,
    defaults: ProvisionDefaults,
}

impl Provisioner {
    pub fn new(
        registry: ProfileRegistry,
        http: reqwest::Client,
        store: SessionStore,
        timeouts: Timeouts,
        defaults: ProvisionDefaults,
    ) -> Self {
        Self {
            registry,
            sessions: SessionManager::new(http.clone(), store).with_login_timeout(timeouts.login),
            panel: PanelClient::new(http).with_request_timeout(timeouts.request),
            defaults,
        }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub async fn provision(
        &self,
        profile_key: &str,
        label: &str,
    ) -> Result<ProvisionOutcome, ProvisionError> {
        let profile = self.registry.resolve(profile_key)?;
        let label = label.trim();
        if label.is_empty() {
            return Err(ProvisionError::InvalidLabel);
        }

        let session = self.sessions.ensure_session(profile).await?;
        let inbound = self.panel.get_inbound(&session, profile.inbound_id).await?;

        let uuid = uuid::Uuid::new_v4().to_string();
        let record = ClientRecord {
            inbound_id: profile.inbound_id,
            email: label.to_string(),
            uuid: uuid.clone(),
            total_gb: self.defaults.total_gb,
            expire_days: self.defaults.expire_days,
            enable: true,
            flow: self.defaults.flow.clone(),
        };
        self.panel.add_client(&session, &record).await?;

        let encoded = vmess::encode(&inbound, &profile.public_host, &uuid, label);
        info!(
            profile = %profile.name,
            inbound_id = profile.inbound_id,
            %uuid,
            network = %encoded.descriptor.net,
            "client provisioned"
        );

        Ok(ProvisionOutcome {
            profile: profile.name.clone(),
            remark: label.to_string(),
            uuid,
            host: profile.public_host.clone(),
            port: encoded.descriptor.port.clone(),
            network: encoded.descriptor.net.clone(),
            uri: encoded.uri,
            descriptor: encoded.descriptor,
        })
    }
}
