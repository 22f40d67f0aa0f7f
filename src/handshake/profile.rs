//! Upgrade protocol profiles.
//!
//! The primary and legacy bridges run the same algorithm; only the strings
//! differ. A profile carries all of them so one implementation can be
//! instantiated once per protocol family.
//!
//! Configuration overrides individual fields through `ProfileOverrides`;
//! anything left out keeps the family's built-in value.

use serde::{Deserialize, Serialize};

/// Magic shared by the core remoting protocol families.
pub const CORE_MAGIC: &str = "CF70DEB8-70F9-4FBA-8B4F-DFC3E723B4CD";

/// Security mechanism label published with the listener metadata.
pub const CORE_MECHANISM: &str = "core";

/// Upgrade token of the primary remoting protocol.
pub const PRIMARY_PROTOCOL: &str = "activemq-remoting";

/// Upgrade token of the legacy remoting protocol.
pub const LEGACY_PROTOCOL: &str = "hornetq-remoting";

/// Header selecting a named broker instance (root or backup).
pub const BROKER_NAME_HEADER: &str = "activemq-server-name";

/// Strings that parameterize one upgrade protocol family.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UpgradeProfile {
    /// Token matched against the request's `Upgrade` header.
    pub protocol: String,

    /// 36-byte constant appended to the client key before hashing.
    pub magic: String,

    /// Request header carrying the client key.
    pub key_header: String,

    /// Response header carrying the computed accept token.
    pub accept_header: String,

    /// Request header naming the target acceptor.
    pub endpoint_header: String,

    /// Request header naming the target broker instance.
    pub broker_header: String,

    /// Security mechanism label for listener metadata.
    pub mechanism: String,
}

impl UpgradeProfile {
    pub fn primary() -> Self {
        Self {
            protocol: PRIMARY_PROTOCOL.to_string(),
            magic: CORE_MAGIC.to_string(),
            key_header: "Sec-ActiveMQRemoting-Key".to_string(),
            accept_header: "Sec-ActiveMQRemoting-Accept".to_string(),
            endpoint_header: "httpUpgradeEndpoint".to_string(),
            broker_header: BROKER_NAME_HEADER.to_string(),
            mechanism: CORE_MECHANISM.to_string(),
        }
    }

    /// Older clients use the same magic as the primary family, so it is shared here.
    pub fn legacy() -> Self {
        Self {
            protocol: LEGACY_PROTOCOL.to_string(),
            magic: CORE_MAGIC.to_string(),
            key_header: "Sec-HornetQRemoting-Key".to_string(),
            accept_header: "Sec-HornetQRemoting-Accept".to_string(),
            endpoint_header: "http-upgrade-endpoint".to_string(),
            broker_header: BROKER_NAME_HEADER.to_string(),
            mechanism: CORE_MECHANISM.to_string(),
        }
    }
}

impl Default for UpgradeProfile {
    fn default() -> Self {
        Self::primary()
    }
}

/// Partial profile as written in configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileOverrides {
    pub protocol: Option<String>,
    pub magic: Option<String>,
    pub key_header: Option<String>,
    pub accept_header: Option<String>,
    pub endpoint_header: Option<String>,
    pub broker_header: Option<String>,
    pub mechanism: Option<String>,
}

impl ProfileOverrides {
    /// Replace the fields of `base` that were given.
    pub fn apply(self, base: UpgradeProfile) -> UpgradeProfile {
        UpgradeProfile {
            protocol: self.protocol.unwrap_or(base.protocol),
            magic: self.magic.unwrap_or(base.magic),
            key_header: self.key_header.unwrap_or(base.key_header),
            accept_header: self.accept_header.unwrap_or(base.accept_header),
            endpoint_header: self.endpoint_header.unwrap_or(base.endpoint_header),
            broker_header: self.broker_header.unwrap_or(base.broker_header),
            mechanism: self.mechanism.unwrap_or(base.mechanism),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_keep_unset_fields() {
        let overrides = ProfileOverrides {
            protocol: Some("proto-b".into()),
            mechanism: Some("plain".into()),
            ..Default::default()
        };
        let profile = overrides.apply(UpgradeProfile::legacy());

        assert_eq!(profile.protocol, "proto-b");
        assert_eq!(profile.mechanism, "plain");
        assert_eq!(profile.key_header, "Sec-HornetQRemoting-Key");
        assert_eq!(profile.magic, CORE_MAGIC);
    }

    #[test]
    fn families_share_magic_but_not_headers() {
        let primary = UpgradeProfile::primary();
        let legacy = UpgradeProfile::legacy();
        assert_eq!(primary.magic, legacy.magic);
        assert_ne!(primary.protocol, legacy.protocol);
        assert_ne!(primary.key_header, legacy.key_header);
        assert_ne!(primary.endpoint_header, legacy.endpoint_header);
    }
}
