use serde_json::{Value, json};

pub const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// A client entry to be created on an inbound. Never kept after the panel accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub inbound_id: u64,
    pub email: String,
    pub uuid: String,
    pub total_gb: u64,
    pub expire_days: u64,
    pub enable: bool,
    pub flow: String,
}

impl ClientRecord {
    pub fn new(inbound_id: u64, email: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            inbound_id,
            email: email.into(),
            uuid: uuid.into(),
            total_gb: 0,
            expire_days: 0,
            enable: true,
            flow: String::new(),
        }
    }

    /// Quota in bytes; `0` means unlimited.
    pub fn total_bytes(&self) -> u64 {
        if self.total_gb == 0 {
            return 0;
        }
        self.total_gb.saturating_mul(BYTES_PER_GB)
    }

    /// Always `0` (never expires). `expire_days` is accepted but not applied yet.
    pub fn expiry_time_millis(&self) -> u64 {
        0
    }

    /// Client object used inside the `clients` / `settings` arrays.
    pub fn client_json(&self) -> Value {
        json!({
            "id": self.uuid,
            "email": self.email,
            "flow": self.flow,
            "limitIp": 0,
            "totalGB": self.total_bytes(),
            "expiryTime": self.expiry_time_millis(),
            "enable": self.enable,
        })
    }

    /// Single flat body understood by the legacy x-ui `addClient` route.
    pub fn legacy_flat_json(&self) -> Value {
        json!({
            "id": self.inbound_id,
            "email": self.email,
            "enable": self.enable,
            "uuid": self.uuid,
            "flow": self.flow,
            "limitIp": 0,
            "totalGB": self.total_bytes(),
            "expiryTime": self.expiry_time_millis(),
            "tgId": "",
            "subId": "",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn quota_is_converted_to_bytes() {
        let mut c = ClientRecord::new(1, "demo", "u");
        for gb in [1_u64, 5, 50, 1024] {
            c.total_gb = gb;
            assert_eq!(c.total_bytes(), gb * 1_073_741_824);
        }
        c.total_gb = 0;
        assert_eq!(c.total_bytes(), 0);
    }

    #[test]
    fn expiry_is_never_applied() {
        let mut c = ClientRecord::new(1, "demo", "u");
        c.expire_days = 30;
        assert_eq!(c.expiry_time_millis(), 0);
        assert_eq!(c.client_json()["expiryTime"], json!(0));
        assert_eq!(c.legacy_flat_json()["expiryTime"], json!(0));
    }

    #[test]
    fn client_json_shape() {
        let mut c = ClientRecord::new(3, "demo", "11111111-1111-1111-1111-111111111111");
        c.total_gb = 2;
        assert_eq!(
            c.client_json(),
            json!({
                "id": "11111111-1111-1111-1111-111111111111",
                "email": "demo",
                "flow": "",
                "limitIp": 0,
                "totalGB": 2_147_483_648_u64,
                "expiryTime": 0,
                "enable": true,
            })
        );
    }
}
