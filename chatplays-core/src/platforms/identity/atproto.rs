//! AT Protocol identity lookups.
//!
//! Two independent requests per participant:
//!  - the DID document (PLC directory, or `/.well-known/did.json` for
//!    `did:web`), whose first `at://` alias is the handle;
//!  - the `app.bsky.actor.profile/self` record, giving a display name and an
//!    avatar blob CID that is turned into a CDN image URL.
//!
//! Either may fail or be empty without affecting the other.

use std::sync::Arc;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use chatplays_common::models::Identity;
use crate::Error;
use crate::http::HttpClient;
use super::IdentityResolver;

pub const DEFAULT_PLC_DIRECTORY: &str = "https://plc.directory";
pub const DEFAULT_PROFILE_SERVICE: &str = "https://public.api.bsky.app";
const AVATAR_CDN: &str = "https://cdn.bsky.app/img/avatar/plain";
const PROFILE_COLLECTION: &str = "app.bsky.actor.profile";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DidDocument {
    #[serde(default)]
    also_known_as: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GetRecordResponse {
    value: ProfileRecord,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRecord {
    display_name: Option<String>,
    avatar: Option<BlobRef>,
}

#[derive(Debug, Deserialize)]
struct BlobRef {
    #[serde(rename = "ref")]
    link: Option<CidLink>,
}

#[derive(Debug, Deserialize)]
struct CidLink {
    #[serde(rename = "$link")]
    cid: String,
}

#[derive(Debug, Default, PartialEq)]
struct Profile {
    display_name: Option<String>,
    avatar_url: Option<String>,
}

pub struct AtprotoIdentityResolver {
    http: Arc<dyn HttpClient>,
    plc_directory: String,
    profile_service: String,
}

impl AtprotoIdentityResolver {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            plc_directory: DEFAULT_PLC_DIRECTORY.to_string(),
            profile_service: DEFAULT_PROFILE_SERVICE.to_string(),
        }
    }

    pub fn with_plc_directory(mut self, url: impl Into<String>) -> Self {
        self.plc_directory = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_profile_service(mut self, url: impl Into<String>) -> Self {
        self.profile_service = url.into().trim_end_matches('/').to_string();
        self
    }

    fn did_document_url(&self, did: &str) -> Result<String, Error> {
        if did.starts_with("did:plc:") {
            Ok(format!("{}/{}", self.plc_directory, did))
        } else if let Some(host) = did.strip_prefix("did:web:") {
            Ok(format!("https://{}/.well-known/did.json", host))
        } else {
            Err(Error::Resolution(format!("unsupported DID method: {}", did)))
        }
    }

    fn profile_record_url(&self, did: &str) -> Result<Url, Error> {
        let mut url = Url::parse(&format!("{}/xrpc/com.atproto.repo.getRecord", self.profile_service))
            .map_err(|e| Error::Config(format!("invalid profile service '{}': {}", self.profile_service, e)))?;
        url.query_pairs_mut()
            .append_pair("repo", did)
            .append_pair("collection", PROFILE_COLLECTION)
            .append_pair("rkey", "self");
        Ok(url)
    }

    async fn lookup_handle(&self, did: &str) -> Result<Option<String>, Error> {
        let body = self.http.get(&self.did_document_url(did)?).await?;
        let doc: DidDocument = serde_json::from_str(&body)?;
        Ok(doc
            .also_known_as
            .iter()
            .find_map(|aka| aka.strip_prefix("at://"))
            .filter(|handle| !handle.is_empty())
            .map(String::from))
    }

    async fn lookup_profile(&self, did: &str) -> Result<Profile, Error> {
        let body = self.http.get(self.profile_record_url(did)?.as_str()).await?;
        let record: GetRecordResponse = serde_json::from_str(&body)?;
        let display_name = record
            .value
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        let avatar_url = record
            .value
            .avatar
            .and_then(|blob| blob.link)
            .map(|link| avatar_url(did, &link.cid));
        Ok(Profile { display_name, avatar_url })
    }
}

pub fn avatar_url(did: &str, cid: &str) -> String {
    format!("{}/{}/{}@jpeg", AVATAR_CDN, did, cid)
}

#[async_trait]
impl IdentityResolver for AtprotoIdentityResolver {
    async fn resolve(&self, participant_id: &str) -> Result<Option<Identity>, Error> {
        let (handle, profile) = tokio::join!(
            self.lookup_handle(participant_id),
            self.lookup_profile(participant_id)
        );

        let both_failed = handle.is_err() && profile.is_err();
        let handle = handle.unwrap_or_else(|e| {
            warn!("handle lookup for {} failed: {}", participant_id, e);
            None
        });
        let profile = profile.unwrap_or_else(|e| {
            warn!("profile lookup for {} failed: {}", participant_id, e);
            Profile::default()
        });
        if both_failed {
            return Err(Error::Resolution(format!("all lookups failed for {}", participant_id)));
        }

        let identity = Identity {
            participant_id: participant_id.to_string(),
            handle,
            display_name: profile.display_name,
            avatar_url: profile.avatar_url,
        };
        if identity.is_empty() {
            debug!("no identity found for {}", participant_id);
            return Ok(None);
        }
        Ok(Some(identity))
    }
}
