use async_trait::async_trait;

use super::{AddressRecord, DnsRecordStore, RecordIdentity, RecordType, VersionTag};
use crate::credentials::AccessToken;
use crate::error::UpdateError;

const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
const API_VERSION: &str = "2018-05-01";

/// Record-set client for the Azure DNS management REST API.
///
/// The reqwest client is shared for connection pooling only; every request
/// carries its own token and the record is read fresh each time.
pub struct AzureDnsStore {
    identity: RecordIdentity,
    endpoint: String,
    client: reqwest::Client,
}

impl AzureDnsStore {
    pub fn new(identity: RecordIdentity) -> Self {
        Self::with_endpoint(identity, DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(identity: RecordIdentity, endpoint: impl Into<String>) -> Self {
        Self {
            identity,
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    fn record_set_url(&self) -> String {
        let id = &self.identity;
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/dnsZones/{}/{}/{}",
            self.endpoint,
            id.subscription_id,
            id.resource_group,
            id.zone_name,
            id.record_type.as_str(),
            id.record_set_name,
        )
    }
}

#[async_trait]
impl DnsRecordStore for AzureDnsStore {
    async fn fetch(&self, token: &AccessToken) -> Result<AddressRecord, UpdateError> {
        let response = self
            .client
            .get(self.record_set_url())
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|e| UpdateError::transport(format!("fetching record set: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(UpdateError::store_read(format!(
                "record set '{}' ({}) not found in zone '{}'",
                self.identity.record_set_name,
                self.identity.record_type.as_str(),
                self.identity.zone_name,
            )));
        }
        if !response.status().is_success() {
            return Err(UpdateError::store_read(format!(
                "record set fetch returned {}",
                response.status()
            )));
        }

        let record_set = response
            .json::<RecordSetResponse>()
            .await
            .map_err(|e| UpdateError::store_read(format!("parsing record set response: {e}")))?;

        let address = match self.identity.record_type {
            RecordType::A => record_set
                .properties
                .a_records
                .first()
                .map(|r| r.ipv4_address.clone()),
            RecordType::AAAA => record_set
                .properties
                .aaaa_records
                .first()
                .map(|r| r.ipv6_address.clone()),
        };

        let Some(address) = address else {
            return Err(UpdateError::store_read(format!(
                "record set '{}' holds no {} record",
                self.identity.record_set_name,
                self.identity.record_type.as_str(),
            )));
        };

        Ok(AddressRecord {
            address,
            version_tag: VersionTag(record_set.etag),
            ttl: record_set.properties.ttl,
        })
    }

    async fn update(
        &self,
        token: &AccessToken,
        observed: &AddressRecord,
        new_address: &str,
    ) -> Result<(), UpdateError> {
        let body = match self.identity.record_type {
            RecordType::A => serde_json::json!({
                "properties": {
                    "TTL": observed.ttl,
                    "ARecords": [{ "ipv4Address": new_address }],
                }
            }),
            RecordType::AAAA => serde_json::json!({
                "properties": {
                    "TTL": observed.ttl,
                    "AAAARecords": [{ "ipv6Address": new_address }],
                }
            }),
        };

        let response = self
            .client
            .put(self.record_set_url())
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token.secret())
            .header(reqwest::header::IF_MATCH, observed.version_tag.0.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| UpdateError::transport(format!("updating record set: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == reqwest::StatusCode::PRECONDITION_FAILED {
            Err(UpdateError::ConcurrencyConflict)
        } else {
            Err(UpdateError::store_write(format!(
                "record set update returned {}: {:?}",
                response.status(),
                response
                    .text()
                    .await
                    .unwrap_or("<Response reading failed>".to_string()),
            )))
        }
    }
}

#[derive(serde::Deserialize)]
struct RecordSetResponse {
    etag: String,
    properties: RecordSetProperties,
}

#[derive(serde::Deserialize)]
struct RecordSetProperties {
    #[serde(rename = "TTL", default = "default_ttl")]
    ttl: u64,
    #[serde(rename = "ARecords", default)]
    a_records: Vec<ARecordEntry>,
    #[serde(rename = "AAAARecords", default)]
    aaaa_records: Vec<AaaaRecordEntry>,
}

fn default_ttl() -> u64 {
    3600
}

#[derive(serde::Deserialize)]
struct ARecordEntry {
    #[serde(rename = "ipv4Address")]
    ipv4_address: String,
}

#[derive(serde::Deserialize)]
struct AaaaRecordEntry {
    #[serde(rename = "ipv6Address")]
    ipv6_address: String,
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn identity(record_type: RecordType) -> RecordIdentity {
        RecordIdentity {
            subscription_id: "sub-1".to_string(),
            resource_group: "rg-1".to_string(),
            zone_name: "example.com".to_string(),
            record_set_name: "@".to_string(),
            record_type,
        }
    }

    const RECORD_PATH: &str =
        "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Network/dnsZones/example.com/A/@";

    fn token() -> AccessToken {
        AccessToken::new("test-token")
    }

    #[tokio::test]
    async fn fetch_parses_address_tag_and_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(RECORD_PATH))
            .and(query_param("api-version", API_VERSION))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "etag": "00000002-0000-0000-0000-000000000000",
                "properties": {
                    "TTL": 300,
                    "ARecords": [{ "ipv4Address": "1.2.3.4" }],
                }
            })))
            .mount(&server)
            .await;

        let store = AzureDnsStore::with_endpoint(identity(RecordType::A), server.uri());
        let record = store.fetch(&token()).await.expect("fetch succeeds");

        assert_eq!(record.address, "1.2.3.4");
        assert_eq!(
            record.version_tag,
            VersionTag("00000002-0000-0000-0000-000000000000".to_string())
        );
        assert_eq!(record.ttl, 300);
    }

    #[tokio::test]
    async fn fetch_of_missing_record_set_is_a_read_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = AzureDnsStore::with_endpoint(identity(RecordType::A), server.uri());
        let err = store.fetch(&token()).await.expect_err("404 must fail");

        assert!(matches!(err, UpdateError::StoreRead(_)));
    }

    #[tokio::test]
    async fn fetch_of_empty_record_set_is_a_read_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "etag": "tag-1",
                "properties": { "TTL": 300 }
            })))
            .mount(&server)
            .await;

        let store = AzureDnsStore::with_endpoint(identity(RecordType::A), server.uri());
        let err = store.fetch(&token()).await.expect_err("no A record must fail");

        assert!(matches!(err, UpdateError::StoreRead(_)));
    }

    #[tokio::test]
    async fn update_puts_new_address_guarded_by_observed_tag() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(RECORD_PATH))
            .and(query_param("api-version", API_VERSION))
            .and(header("if-match", "tag-1"))
            .and(body_json(serde_json::json!({
                "properties": {
                    "TTL": 300,
                    "ARecords": [{ "ipv4Address": "5.6.7.8" }],
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "etag": "tag-2",
                "properties": {
                    "TTL": 300,
                    "ARecords": [{ "ipv4Address": "5.6.7.8" }],
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = AzureDnsStore::with_endpoint(identity(RecordType::A), server.uri());
        let observed = AddressRecord {
            address: "1.2.3.4".to_string(),
            version_tag: VersionTag("tag-1".to_string()),
            ttl: 300,
        };

        store
            .update(&token(), &observed, "5.6.7.8")
            .await
            .expect("update succeeds");
    }

    #[tokio::test]
    async fn update_rejected_by_stale_tag_is_a_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;

        let store = AzureDnsStore::with_endpoint(identity(RecordType::A), server.uri());
        let observed = AddressRecord {
            address: "1.2.3.4".to_string(),
            version_tag: VersionTag("stale".to_string()),
            ttl: 300,
        };

        let err = store
            .update(&token(), &observed, "5.6.7.8")
            .await
            .expect_err("412 must fail");

        assert!(matches!(err, UpdateError::ConcurrencyConflict));
    }

    #[tokio::test]
    async fn aaaa_record_sets_use_the_ipv6_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Network/dnsZones/example.com/AAAA/@",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "etag": "tag-1",
                "properties": {
                    "TTL": 300,
                    "AAAARecords": [{ "ipv6Address": "2001:db8::1" }],
                }
            })))
            .mount(&server)
            .await;

        let store = AzureDnsStore::with_endpoint(identity(RecordType::AAAA), server.uri());
        let record = store.fetch(&token()).await.expect("fetch succeeds");

        assert_eq!(record.address, "2001:db8::1");
    }
}
