use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Deserializer, Serialize};

use crate::panel::Inbound;

pub const SCHEME: &str = "vmess://";

/// The JSON object carried inside a `vmess://` link (v2 layout).
///
/// Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub v: String,
    pub ps: String,
    pub add: String,
    #[serde(deserialize_with = "string_or_number")]
    pub port: String,
    pub id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub aid: String,
    pub net: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub tls: String,
    // Older links omit sni.
    #[serde(default)]
    pub sni: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub uri: String,
    pub descriptor: Descriptor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    MissingScheme,
    InvalidBase64 { reason: String },
    InvalidPayload { reason: String },
}

impl std::fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingScheme => write!(f, "not a vmess link: missing {SCHEME} prefix"),
            Self::InvalidBase64 { reason } => write!(f, "vmess link is not base64: {reason}"),
            Self::InvalidPayload { reason } => write!(f, "vmess payload is invalid: {reason}"),
        }
    }
}

impl std::error::Error for DescriptorError {}

/// Builds the share link for `client_uuid` on `inbound`.
///
/// Never fails: settings the inbound does not carry fall back to `public_host`, `/` and
/// `tcp`.
pub fn encode(inbound: &Inbound, public_host: &str, client_uuid: &str, remark: &str) -> Encoded {
    let descriptor = Descriptor::build(inbound, public_host, client_uuid, remark);
    let uri = descriptor.to_uri();
    Encoded { uri, descriptor }
}

/// Parses a `vmess://` link back into its descriptor.
pub fn decode(uri: &str) -> Result<Descriptor, DescriptorError> {
    let uri = uri.trim();
    let payload = uri
        .get(..SCHEME.len())
        .filter(|p| p.eq_ignore_ascii_case(SCHEME))
        .map(|_| &uri[SCHEME.len()..])
        .ok_or(DescriptorError::MissingScheme)?;

    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .map_err(|e| DescriptorError::InvalidBase64 {
            reason: e.to_string(),
        })?;
    serde_json::from_slice(&bytes).map_err(|e| DescriptorError::InvalidPayload {
        reason: e.to_string(),
    })
}

impl Descriptor {
    pub fn build(inbound: &Inbound, public_host: &str, client_uuid: &str, remark: &str) -> Self {
        let stream = &inbound.stream;
        let network = stream.network();
        let security = stream.security();

        let (host, path) = match network {
            "ws" => (
                stream.ws.host.as_deref().unwrap_or_default(),
                stream.ws.path.as_deref().unwrap_or_default(),
            ),
            "grpc" => ("", stream.grpc.service_name.as_deref().unwrap_or_default()),
            _ => ("", ""),
        };

        let (tls, sni) = if security == "tls" {
            ("tls", resolve_sni(inbound, public_host))
        } else {
            ("", String::new())
        };

        Self {
            v: "2".to_string(),
            ps: remark.to_string(),
            add: public_host.to_string(),
            port: inbound.port_string(),
            id: client_uuid.to_string(),
            aid: "0".to_string(),
            net: network.to_string(),
            kind: "none".to_string(),
            host: non_empty_or(host, public_host),
            path: non_empty_or(path, "/"),
            tls: tls.to_string(),
            sni,
        }
    }

    /// Compact JSON in field order.
    pub fn to_json(&self) -> String {
        // Only string fields; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn to_uri(&self) -> String {
        format!("{SCHEME}{}", URL_SAFE_NO_PAD.encode(self.to_json().as_bytes()))
    }
}

/// `serverName`, else the first `alpn` entry, else the public host.
fn resolve_sni(inbound: &Inbound, public_host: &str) -> String {
    let settings = inbound.stream.tls_or_reality();
    let server_name = settings
        .and_then(|s| s.server_name.as_deref())
        .filter(|s| !s.is_empty());
    let first_alpn = settings
        .and_then(|s| s.alpn.first())
        .map(String::as_str)
        .filter(|s| !s.is_empty());
    server_name.or(first_alpn).unwrap_or(public_host).to_string()
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn string_or_number<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(serde_json::Number),
    }
    Ok(match Raw::deserialize(de)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}
