use serde_json::{Map, Value};

/// Snapshot of a panel inbound, reduced to what share links need.
///
/// Built with [`Inbound::from_value`], which never fails: fields that are missing or have an
/// unexpected type are left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inbound {
    pub id: Option<u64>,
    pub port: Option<u16>,
    pub stream: StreamSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSettings {
    pub network: Option<String>,
    pub security: Option<String>,
    pub ws: WsSettings,
    pub grpc: GrpcSettings,
    pub tls: Option<TlsSettings>,
    pub reality: Option<TlsSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WsSettings {
    /// `headers.Host`, falling back to `headers.host`.
    pub host: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrpcSettings {
    pub service_name: Option<String>,
}

/// Shared shape of `tlsSettings` and `realitySettings`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    pub server_name: Option<String>,
    /// `alpn` entries in order; non-string entries are kept as empty strings.
    pub alpn: Vec<String>,
}

impl Inbound {
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        // 3x-ui serves `streamSettings` as a JSON document inside a string.
        let stream = object_or_embedded(obj.get("streamSettings"))
            .filter(|s| !s.is_empty())
            .or_else(|| object_or_embedded(obj.get("stream")))
            .unwrap_or_default();

        Self {
            id: obj.get("id").and_then(as_u64_lenient),
            port: obj
                .get("port")
                .and_then(as_u64_lenient)
                .and_then(|p| u16::try_from(p).ok()),
            stream: StreamSettings::from_object(&stream),
        }
    }

    pub fn network(&self) -> &str {
        self.stream.network()
    }

    pub fn port_string(&self) -> String {
        self.port.unwrap_or(0).to_string()
    }
}

impl From<&Value> for Inbound {
    fn from(value: &Value) -> Self {
        Self::from_value(value)
    }
}

impl StreamSettings {
    fn from_object(obj: &Map<String, Value>) -> Self {
        let ws = obj.get("wsSettings").and_then(Value::as_object);
        let headers = ws.and_then(|w| w.get("headers")).and_then(Value::as_object);
        let host = headers.and_then(|h| {
            h.get("Host")
                .or_else(|| h.get("host"))
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        Self {
            network: string_field(obj, "network"),
            security: string_field(obj, "security"),
            ws: WsSettings {
                host,
                path: ws.and_then(|w| string_field(w, "path")),
            },
            grpc: GrpcSettings {
                service_name: obj
                    .get("grpcSettings")
                    .and_then(Value::as_object)
                    .and_then(|g| string_field(g, "serviceName")),
            },
            tls: TlsSettings::from_section(obj.get("tlsSettings")),
            reality: TlsSettings::from_section(obj.get("realitySettings")),
        }
    }

    /// Transport name, `tcp` when the panel leaves it out.
    pub fn network(&self) -> &str {
        match self.network.as_deref() {
            Some(n) if !n.is_empty() => n,
            _ => "tcp",
        }
    }

    pub fn security(&self) -> &str {
        self.security.as_deref().unwrap_or("")
    }

    /// `tlsSettings` when present, otherwise `realitySettings`.
    pub fn tls_or_reality(&self) -> Option<&TlsSettings> {
        self.tls.as_ref().or(self.reality.as_ref())
    }
}

impl TlsSettings {
    /// `None` for a missing, non-object or empty section.
    fn from_section(value: Option<&Value>) -> Option<Self> {
        let obj = value.and_then(Value::as_object).filter(|o| !o.is_empty())?;
        let alpn = obj
            .get("alpn")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|i| i.as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            server_name: string_field(obj, "serverName"),
            alpn,
        })
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn object_or_embedded(value: Option<&Value>) -> Option<Map<String, Value>> {
    match value? {
        Value::Object(obj) => Some(obj.clone()),
        Value::String(raw) if !raw.trim().is_empty() => match serde_json::from_str(raw) {
            Ok(Value::Object(obj)) => Some(obj),
            _ => None,
        },
        _ => None,
    }
}

fn as_u64_lenient(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
