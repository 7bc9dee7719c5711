use std::sync::Arc;

use crate::credentials::CredentialProvider;
use crate::store::{DnsRecordStore, RecordType};

#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<dyn CredentialProvider + Send + Sync>,
    pub store: Arc<dyn DnsRecordStore + Send + Sync>,
    pub record_type: RecordType,
}
