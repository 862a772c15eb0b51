use super::{ImageInspection, ImageRegistry};
use crate::error::{Error, Result};
use crate::reference::ParsedImage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::header::{ACCEPT, WWW_AUTHENTICATE};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use std::time::Duration;
use talos_core::types::{RegistryConfig, RegistryCredentials};
use tokio::sync::RwLock;
use tracing::{debug, trace};

const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json,\
application/vnd.docker.distribution.manifest.list.v2+json,\
application/vnd.oci.image.manifest.v1+json,\
application/vnd.docker.distribution.manifest.v2+json";

const CONTENT_DIGEST: &str = "docker-content-digest";

static CHALLENGE_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)="([^"]*)""#).expect("challenge regex is valid")
});

/// Authorization to present on repeat requests
#[derive(Debug, Clone)]
enum Authorization {
    Bearer(String),
    Basic,
}

/// Client for OCI-compatible container registries
pub struct HttpRegistryClient {
    client: reqwest::Client,
    credentials: BTreeMap<String, RegistryCredentials>,
    scheme: &'static str,
    /// Authorization obtained per `host/repository`
    authorizations: RwLock<HashMap<String, Authorization>>,
}

impl HttpRegistryClient {
    /// Create a new registry client
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            credentials: config.credentials.clone(),
            scheme: "https",
            authorizations: RwLock::new(HashMap::new()),
        })
    }

    /// Talk plain HTTP to every registry (local test registries)
    pub fn with_plain_http(mut self) -> Self {
        self.scheme = "http";
        self
    }

    fn base_url(&self, image: &ParsedImage) -> String {
        format!("{}://{}/v2/{}", self.scheme, image.registry_host(), image.repository_path())
    }

    fn credentials_for(&self, image: &ParsedImage) -> Option<&RegistryCredentials> {
        self.credentials.get(image.domain_or_default())
    }

    fn request(
        &self,
        url: &str,
        accept: Option<&str>,
        authorization: Option<&Authorization>,
        image: &ParsedImage,
    ) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        match authorization {
            Some(Authorization::Bearer(token)) => request = request.bearer_auth(token),
            Some(Authorization::Basic) => {
                if let Some(creds) = self.credentials_for(image) {
                    request = request.basic_auth(&creds.username, Some(&creds.password));
                }
            }
            None => {}
        }
        request
    }

    /// GET `url`, answering one authentication challenge if the registry sends it
    async fn get(&self, url: &str, accept: Option<&str>, image: &ParsedImage) -> Result<Response> {
        let key = format!("{}/{}", image.registry_host(), image.repository_path());
        let cached = self.authorizations.read().await.get(&key).cloned();

        debug!("GET {}", url);
        let response = self.request(url, accept, cached.as_ref(), image).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(challenge) = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
        else {
            return Ok(response);
        };

        let authorization = self.authorize(&challenge, image).await?;
        self.authorizations
            .write()
            .await
            .insert(key, authorization.clone());

        Ok(self
            .request(url, accept, Some(&authorization), image)
            .send()
            .await?)
    }

    /// Answer a `WWW-Authenticate` challenge
    async fn authorize(&self, challenge: &str, image: &ParsedImage) -> Result<Authorization> {
        let (scheme, params) = challenge.split_once(' ').unwrap_or((challenge, ""));

        if scheme.eq_ignore_ascii_case("basic") {
            return match self.credentials_for(image) {
                Some(_) => Ok(Authorization::Basic),
                None => Err(Error::registry(format!(
                    "{} requires credentials",
                    image.domain_or_default()
                ))),
            };
        }

        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(Error::registry(format!(
                "Unsupported authentication scheme: {}",
                scheme
            )));
        }

        let params: HashMap<&str, &str> = CHALLENGE_PARAM_RE
            .captures_iter(params)
            .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
            .collect();

        let realm = params
            .get("realm")
            .ok_or_else(|| Error::registry("Bearer challenge has no realm"))?;
        let default_scope = format!("repository:{}:pull", image.repository_path());
        let scope = params.get("scope").copied().unwrap_or(&default_scope);

        let mut query = vec![("scope", scope)];
        if let Some(service) = params.get("service") {
            query.push(("service", *service));
        }
        let token_url = reqwest::Url::parse_with_params(realm, &query)
            .map_err(|e| Error::registry(format!("Invalid token realm {}: {}", realm, e)))?;

        debug!("Requesting registry token from {}", realm);
        let mut request = self.client.get(token_url);
        if let Some(creds) = self.credentials_for(image) {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::registry(format!(
                "Token request to {} failed ({}): {}",
                realm, status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        token
            .token
            .or(token.access_token)
            .map(Authorization::Bearer)
            .ok_or_else(|| Error::registry("Token response carries no token"))
    }

    async fn expect_success(response: Response, what: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(Error::registry(format!(
            "Registry returned {} for {} ({}): {}",
            status,
            what,
            url,
            if body.is_empty() {
                "(no response body)".to_string()
            } else {
                body
            }
        )))
    }

    /// Fetch a manifest; returns its digest and parsed body
    async fn manifest(&self, image: &ParsedImage, reference: &str) -> Result<(String, Manifest)> {
        let url = format!("{}/manifests/{}", self.base_url(image), reference);
        let response = self.get(&url, Some(MANIFEST_ACCEPT), image).await?;
        let response = Self::expect_success(response, "manifest").await?;

        let header_digest = response
            .headers()
            .get(CONTENT_DIGEST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;
        let digest = header_digest
            .unwrap_or_else(|| format!("sha256:{}", hex::encode(Sha256::digest(&body))));

        Ok((digest, serde_json::from_slice(&body)?))
    }
}

#[async_trait]
impl ImageRegistry for HttpRegistryClient {
    async fn list_tags(&self, image: &ParsedImage) -> Result<Vec<String>> {
        let mut all_tags = Vec::new();
        let mut url = format!("{}/tags/list?n=1000", self.base_url(image));

        loop {
            let response = self.get(&url, None, image).await?;
            let response = Self::expect_success(response, "tag list").await?;

            let next_url = response
                .headers()
                .get("link")
                .and_then(|h| h.to_str().ok())
                .and_then(|link| parse_link_header(link, self.scheme, image.registry_host()));

            let tags: TagsResponse = response.json().await?;
            all_tags.extend(tags.tags);

            match next_url {
                Some(next) => url = next,
                None => break,
            }
        }

        trace!("Found {} tags for {}", all_tags.len(), image.untagged());
        Ok(all_tags)
    }

    async fn inspect(&self, image: &ParsedImage) -> Result<ImageInspection> {
        let reference = match (image.tag(), image.digest()) {
            (_, Some(digest)) => digest.to_string(),
            (Some(tag), None) => tag.to_string(),
            (None, None) => {
                return Err(Error::invalid_reference(
                    image.to_string(),
                    "nothing to inspect without a tag or digest",
                ))
            }
        };

        let (digest, manifest) = self.manifest(image, &reference).await?;

        // For an index, the creation time comes from the platform manifest
        let config = match (manifest.config, manifest.manifests) {
            (Some(config), _) => Some(config),
            (None, Some(entries)) => match select_platform(&entries) {
                Some(entry) => self.manifest(image, &entry.digest).await?.1.config,
                None => None,
            },
            (None, None) => None,
        };

        let created = match config {
            Some(config) => {
                let url = format!("{}/blobs/{}", self.base_url(image), config.digest);
                let response = self.get(&url, None, image).await?;
                let response = Self::expect_success(response, "config blob").await?;
                let blob: ConfigBlob = response.json().await?;
                blob.created
            }
            None => None,
        };

        let created_at = created.unwrap_or_else(|| {
            debug!("{} has no creation time, using now", image);
            Utc::now()
        });

        Ok(ImageInspection { digest, created_at })
    }
}

/// Prefer linux/amd64, otherwise the first entry
fn select_platform(entries: &[IndexEntry]) -> Option<&IndexEntry> {
    entries
        .iter()
        .find(|e| {
            e.platform
                .as_ref()
                .is_some_and(|p| p.os == "linux" && p.architecture == "amd64")
        })
        .or_else(|| entries.first())
}

/// Parse Link header for pagination
/// Format: </v2/repo/tags/list?n=100&last=tag>; rel="next"
fn parse_link_header(link: &str, scheme: &str, host: &str) -> Option<String> {
    for part in link.split(',') {
        let part = part.trim();
        if part.contains("rel=\"next\"") {
            let start = part.find('<')?;
            let end = part.find('>')?;
            let url = &part[start + 1..end];
            if url.starts_with('/') {
                return Some(format!("{}://{}{}", scheme, host, url));
            }
            return Some(url.to_string());
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    config: Option<Descriptor>,
    #[serde(default)]
    manifests: Option<Vec<IndexEntry>>,
}

#[derive(Debug, Deserialize)]
struct Descriptor {
    digest: String,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    digest: String,
    #[serde(default)]
    platform: Option<Platform>,
}

#[derive(Debug, Deserialize)]
struct Platform {
    os: String,
    architecture: String,
}

#[derive(Debug, Deserialize)]
struct ConfigBlob {
    #[serde(default)]
    created: Option<DateTime<Utc>>,
}
