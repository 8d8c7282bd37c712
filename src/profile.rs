use std::collections::BTreeMap;

use serde::Serialize;

/// One panel deployment the operator can provision against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub name: String,
    pub base_url: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub inbound_id: u64,
    pub public_host: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    BaseUrl,
    Username,
    Password,
    InboundId,
    PublicHost,
}

impl ProfileField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BaseUrl => "base_url",
            Self::Username => "username",
            Self::Password => "password",
            Self::InboundId => "inbound_id",
            Self::PublicHost => "public_host",
        }
    }

    /// Environment variable suffix the field is read from.
    pub fn env_suffix(&self) -> &'static str {
        match self {
            Self::BaseUrl => "PANEL_BASE",
            Self::Username => "USERNAME",
            Self::Password => "PASSWORD",
            Self::InboundId => "INBOUND_ID",
            Self::PublicHost => "PUBLIC_HOST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    UnknownProfile {
        key: String,
        known: Vec<String>,
    },
    Incomplete {
        name: String,
        missing: Vec<ProfileField>,
    },
}

impl std::fmt::Display for ProfileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownProfile { key, known } => write!(
                f,
                "unknown profile: {key} (known: {})",
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            ),
            Self::Incomplete { name, missing } => {
                let fields: Vec<&str> = missing.iter().map(|m| m.as_str()).collect();
                write!(
                    f,
                    "profile {name} is incomplete: missing {}",
                    fields.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for ProfileError {}

impl Profile {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        inbound_id: u64,
        public_host: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            inbound_id,
            public_host: public_host.into().trim().to_string(),
        }
    }

    /// Builds the profile `prefix` from `{prefix}_PANEL_BASE`, `{prefix}_USERNAME`, ...
    ///
    /// Missing variables become empty fields; an `INBOUND_ID` that is not a positive integer
    /// becomes `0`. Neither is an error here, [`Profile::validate`] reports them.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |field: ProfileField| {
            lookup(&format!("{prefix}_{}", field.env_suffix())).unwrap_or_default()
        };
        let inbound_id = var(ProfileField::InboundId).trim().parse::<u64>().unwrap_or(0);
        Self::new(
            prefix,
            var(ProfileField::BaseUrl),
            var(ProfileField::Username),
            var(ProfileField::Password),
            inbound_id,
            var(ProfileField::PublicHost),
        )
    }

    pub fn missing_fields(&self) -> Vec<ProfileField> {
        let mut missing = Vec::new();
        if self.base_url.is_empty() {
            missing.push(ProfileField::BaseUrl);
        }
        if self.username.is_empty() {
            missing.push(ProfileField::Username);
        }
        if self.password.is_empty() {
            missing.push(ProfileField::Password);
        }
        if self.inbound_id == 0 {
            missing.push(ProfileField::InboundId);
        }
        if self.public_host.is_empty() {
            missing.push(ProfileField::PublicHost);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            return Ok(());
        }
        Err(ProfileError::Incomplete {
            name: self.name.clone(),
            missing,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileRegistry {
    pub fn new(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    pub fn from_env(keys: &[String]) -> Self {
        Self::from_lookup(keys, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(keys: &[String], lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::new(
            keys.iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .map(|k| Profile::from_lookup(k, &lookup)),
        )
    }

    pub fn get(&self, key: &str) -> Result<&Profile, ProfileError> {
        self.profiles
            .get(key)
            .ok_or_else(|| ProfileError::UnknownProfile {
                key: key.to_string(),
                known: self.profiles.keys().cloned().collect(),
            })
    }

    /// Looks up `key` and checks every field is populated.
    pub fn resolve(&self, key: &str) -> Result<&Profile, ProfileError> {
        let profile = self.get(key)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
