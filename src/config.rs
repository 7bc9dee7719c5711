use rootcause::{Report, report};

use crate::store::RecordType;

/// Everything the service needs, resolved from the environment exactly once
/// at startup. The handlers never touch the environment themselves.
#[derive(Debug, Clone)]
pub struct Config {
    pub credential: CredentialSettings,
    pub subscription_id: String,
    pub resource_group: String,
    pub zone_name: String,
    pub record_set_name: String,
    pub record_type: RecordType,
    pub interface: String,
    pub port: String,
}

/// Which credential strategy the deployment selected. Decided here, from
/// configuration presence, so the update protocol never branches on it.
#[derive(Debug, Clone)]
pub enum CredentialSettings {
    /// `AppSecret` is configured: tenant + client id + secret.
    ClientSecret {
        tenant_id: String,
        client_id: String,
        secret: String,
    },
    /// No secret: managed identity, user-assigned when `AppId` is set.
    ManagedIdentity { client_id: Option<String> },
}

const REQUIRED_VARS: &[&str] = &["SubscriptionId", "ResourceGroupName", "ZoneName"];

impl Config {
    pub fn from_env() -> Result<Self, Report> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Report> {
        let mut error = report!("Missing required environment variable");
        let mut is_error = false;
        for var in REQUIRED_VARS {
            if lookup(var).is_none() {
                error = error.attach(format!("'{}' is not set", var));
                is_error = true;
            }
        }
        if is_error {
            return Err(error);
        }

        let credential = match lookup("AppSecret").filter(|s| !s.is_empty()) {
            Some(secret) => CredentialSettings::ClientSecret {
                tenant_id: required(&lookup, "TenantId")?,
                client_id: required(&lookup, "AppId")?,
                secret,
            },
            None => CredentialSettings::ManagedIdentity {
                client_id: lookup("AppId").filter(|s| !s.is_empty()),
            },
        };

        let record_type = match lookup("RecordType").as_deref() {
            None | Some("A") => RecordType::A,
            Some("AAAA") => RecordType::AAAA,
            Some(other) => {
                return Err(report!("Unsupported record type")
                    .attach(format!("'{}', expected 'A' or 'AAAA'", other)));
            }
        };

        Ok(Self {
            credential,
            subscription_id: required(&lookup, "SubscriptionId")?,
            resource_group: required(&lookup, "ResourceGroupName")?,
            zone_name: required(&lookup, "ZoneName")?,
            // Defaults to the zone apex.
            record_set_name: lookup("RecordSetName").unwrap_or_else(|| "@".to_string()),
            record_type,
            interface: lookup("INTERFACE").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT").unwrap_or_else(|| "3000".to_string()),
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, Report> {
    lookup(name).ok_or_else(|| {
        report!("Missing required environment variable").attach(format!("'{}' is not set", name))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base_vars() -> HashMap<String, String> {
        vars(&[
            ("SubscriptionId", "sub-1"),
            ("ResourceGroupName", "rg-1"),
            ("ZoneName", "example.com"),
        ])
    }

    fn from_map(map: &HashMap<String, String>) -> Result<Config, Report> {
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn missing_required_variables_fail_resolution() {
        let mut map = base_vars();
        map.remove("ZoneName");

        assert!(from_map(&map).is_err());
    }

    #[test]
    fn record_set_name_defaults_to_the_zone_apex() {
        let config = from_map(&base_vars()).expect("config resolves");

        assert_eq!(config.record_set_name, "@");
        assert_eq!(config.record_type, RecordType::A);
    }

    #[test]
    fn configured_secret_selects_the_secret_strategy() {
        let mut map = base_vars();
        map.insert("TenantId".to_string(), "tenant-1".to_string());
        map.insert("AppId".to_string(), "client-1".to_string());
        map.insert("AppSecret".to_string(), "hunter2".to_string());

        let config = from_map(&map).expect("config resolves");

        assert!(matches!(
            config.credential,
            CredentialSettings::ClientSecret { ref secret, .. } if secret == "hunter2"
        ));
    }

    #[test]
    fn secret_without_tenant_fails_resolution() {
        let mut map = base_vars();
        map.insert("AppId".to_string(), "client-1".to_string());
        map.insert("AppSecret".to_string(), "hunter2".to_string());

        assert!(from_map(&map).is_err());
    }

    #[test]
    fn no_secret_selects_managed_identity() {
        let mut map = base_vars();
        map.insert("AppId".to_string(), "client-1".to_string());

        let config = from_map(&map).expect("config resolves");

        assert!(matches!(
            config.credential,
            CredentialSettings::ManagedIdentity { client_id: Some(ref id) } if id == "client-1"
        ));
    }

    #[test]
    fn no_secret_and_no_app_id_selects_the_system_identity() {
        let config = from_map(&base_vars()).expect("config resolves");

        assert!(matches!(
            config.credential,
            CredentialSettings::ManagedIdentity { client_id: None }
        ));
    }

    #[test]
    fn empty_secret_counts_as_absent() {
        let mut map = base_vars();
        map.insert("AppSecret".to_string(), String::new());

        let config = from_map(&map).expect("config resolves");

        assert!(matches!(
            config.credential,
            CredentialSettings::ManagedIdentity { .. }
        ));
    }

    #[test]
    fn unknown_record_type_fails_resolution() {
        let mut map = base_vars();
        map.insert("RecordType".to_string(), "TXT".to_string());

        assert!(from_map(&map).is_err());
    }

    #[test]
    fn aaaa_record_type_is_accepted() {
        let mut map = base_vars();
        map.insert("RecordType".to_string(), "AAAA".to_string());

        let config = from_map(&map).expect("config resolves");

        assert_eq!(config.record_type, RecordType::AAAA);
    }
}
