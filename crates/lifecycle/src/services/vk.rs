//! VK API clients for the compliance authority (VK ORD) and the media host
//! (community wall).

use std::time::Duration;

use async_trait::async_trait;
use domain::PhotoUpload;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use super::compliance::{AdRegistration, ComplianceAuthority};
use super::media_host::{MediaHost, MediaRef, UploadTarget};
use crate::error::{ComplianceError, MediaHostError};

/// Default VK API endpoint.
pub const VK_API_URL: &str = "https://api.vk.com/method";

/// Default VK API version.
pub const VK_API_VERSION: &str = "5.131";

/// Connection settings shared by the VK clients.
#[derive(Debug, Clone)]
pub struct VkApi {
    client: reqwest::Client,
    base_url: String,
    version: String,
}

impl VkApi {
    /// Builds a client with a per-request timeout.
    pub fn new(version: impl Into<String>, request_timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: VK_API_URL.to_string(),
            version: version.into(),
        })
    }

    /// Points the client at another endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call(
        &self,
        method: &str,
        token: &str,
        params: &[(&str, String)],
    ) -> reqwest::Result<Value> {
        self.client
            .get(format!("{}/{method}", self.base_url.trim_end_matches('/')))
            .query(&[("access_token", token), ("v", self.version.as_str())])
            .query(params)
            .send()
            .await?
            .json()
            .await
    }
}

/// Extracts `error{error_code, error_msg}` from a VK response body.
fn api_error(body: &Value) -> Option<(i64, String)> {
    let error = body.get("error")?;
    Some((
        error["error_code"].as_i64().unwrap_or_default(),
        error["error_msg"]
            .as_str()
            .unwrap_or("unknown error")
            .to_string(),
    ))
}

/// Reads an identifier that VK may send as a string or a number.
fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Ad registration through `ads.registerAd`.
#[derive(Debug, Clone)]
pub struct VkOrdClient {
    api: VkApi,
    token: String,
}

impl VkOrdClient {
    pub fn new(api: VkApi, token: impl Into<String>) -> Self {
        Self {
            api,
            token: token.into(),
        }
    }
}

#[async_trait]
impl ComplianceAuthority for VkOrdClient {
    #[tracing::instrument(skip(self, ad), fields(site = %ad.site))]
    async fn register(&self, ad: &AdRegistration) -> Result<String, ComplianceError> {
        let body = self
            .api
            .call(
                "ads.registerAd",
                &self.token,
                &[
                    ("ad_format", "1".to_string()),
                    ("ad_text", ad.text.clone()),
                    ("ad_site", ad.site.clone()),
                    ("ad_cost", ad.cost_minor.to_string()),
                    ("ad_cost_type", "1".to_string()),
                ],
            )
            .await?;

        if let Some((code, message)) = api_error(&body) {
            return Err(ComplianceError::Rejected { code, message });
        }

        let response = &body["response"];
        identifier(&response["erid"])
            .or_else(|| identifier(&response["ad_id"]))
            .ok_or(ComplianceError::MissingIdentifier)
    }
}

/// Wall photo upload and posting on behalf of a community.
#[derive(Debug, Clone)]
pub struct VkWallClient {
    api: VkApi,
    token: String,
}

impl VkWallClient {
    pub fn new(api: VkApi, token: impl Into<String>) -> Self {
        Self {
            api,
            token: token.into(),
        }
    }

    async fn call(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<Value, MediaHostError> {
        let body = self.api.call(method, &self.token, params).await?;
        if let Some((code, message)) = api_error(&body) {
            return Err(MediaHostError::Api { code, message });
        }
        Ok(body["response"].clone())
    }
}

#[async_trait]
impl MediaHost for VkWallClient {
    async fn upload_target(&self, group_id: i64) -> Result<UploadTarget, MediaHostError> {
        let response = self
            .call(
                "photos.getWallUploadServer",
                &[("group_id", group_id.unsigned_abs().to_string())],
            )
            .await?;

        let upload_url = response["upload_url"]
            .as_str()
            .ok_or_else(|| MediaHostError::Malformed("missing upload_url".to_string()))?;
        Ok(UploadTarget {
            upload_url: upload_url.to_string(),
        })
    }

    #[tracing::instrument(skip(self, target, image), fields(filename = %image.filename))]
    async fn upload(
        &self,
        target: &UploadTarget,
        group_id: i64,
        image: &PhotoUpload,
    ) -> Result<MediaRef, MediaHostError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.filename.clone())
            .mime_str(&image.mimetype)?;
        let uploaded: Value = self
            .api
            .client
            .post(&target.upload_url)
            .multipart(Form::new().part("photo", part))
            .send()
            .await?
            .json()
            .await?;

        let field = |name: &str| match &uploaded[name] {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(MediaHostError::Malformed(format!(
                "upload response missing {name}"
            ))),
        };
        let (server, photo, hash) = (field("server")?, field("photo")?, field("hash")?);

        let saved = self
            .call(
                "photos.saveWallPhoto",
                &[
                    ("group_id", group_id.unsigned_abs().to_string()),
                    ("server", server),
                    ("photo", photo),
                    ("hash", hash),
                ],
            )
            .await?;

        let first = &saved[0];
        match (first["owner_id"].as_i64(), first["id"].as_i64()) {
            (Some(owner_id), Some(id)) => Ok(MediaRef { owner_id, id }),
            _ => Err(MediaHostError::Malformed(
                "saveWallPhoto returned no photo".to_string(),
            )),
        }
    }

    #[tracing::instrument(skip(self, message, attachments), fields(attachments = attachments.len()))]
    async fn publish(
        &self,
        group_id: i64,
        message: &str,
        attachments: &[MediaRef],
    ) -> Result<i64, MediaHostError> {
        let mut params = vec![
            ("owner_id", (-group_id.abs()).to_string()),
            ("from_group", "1".to_string()),
            ("message", message.to_string()),
        ];
        if !attachments.is_empty() {
            let joined = attachments
                .iter()
                .map(MediaRef::to_string)
                .collect::<Vec<_>>()
                .join(",");
            params.push(("attachments", joined));
        }

        let response = self.call("wall.post", &params).await?;
        response["post_id"]
            .as_i64()
            .ok_or_else(|| MediaHostError::Malformed("wall.post returned no post_id".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_error_extraction() {
        let body = json!({"error": {"error_code": 100, "error_msg": "bad param"}});
        assert_eq!(api_error(&body), Some((100, "bad param".to_string())));
        assert_eq!(api_error(&json!({"response": {}})), None);
    }

    #[test]
    fn test_identifier_accepts_strings_and_numbers() {
        assert_eq!(identifier(&json!("ABCD-1234")), Some("ABCD-1234".to_string()));
        assert_eq!(identifier(&json!(123456789)), Some("123456789".to_string()));
        assert_eq!(identifier(&json!("  ")), None);
        assert_eq!(identifier(&Value::Null), None);
    }
}
