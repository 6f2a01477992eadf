//! Chef server API client implementation.
//!
//! This module provides the HTTP client for the Chef server REST API and the
//! [`ChefApi`] trait the resource reconcilers are written against.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::error::{ChefApiError, ChefResourcesError, Result};

use super::auth::RequestSigner;
use super::types::{DataBagCreated, Environment, SearchQuery, SearchResult};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Operations the reconcilers need from the Chef server.
///
/// Every method performs exactly one request. Non-success statuses surface as
/// [`ChefApiError::ApiRequestFailed`] with the server's body untouched.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChefApi: Send + Sync {
    /// Lists data bags as a map of name to API URI.
    async fn list_data_bags(&self) -> Result<BTreeMap<String, String>>;

    /// Creates an empty data bag.
    async fn create_data_bag(&self, name: &str) -> Result<DataBagCreated>;

    /// Deletes a data bag and all of its items.
    async fn delete_data_bag(&self, name: &str) -> Result<()>;

    /// Creates an item in a data bag.
    async fn create_data_bag_item(&self, data_bag: &str, item: &Value) -> Result<()>;

    /// Gets the raw content of a data bag item.
    async fn get_data_bag_item(&self, data_bag: &str, item_id: &str) -> Result<Value>;

    /// Deletes a data bag item.
    async fn delete_data_bag_item(&self, data_bag: &str, item_id: &str) -> Result<()>;

    /// Creates an environment.
    async fn create_environment(&self, environment: &Environment) -> Result<()>;

    /// Replaces an existing environment.
    async fn update_environment(&self, environment: &Environment) -> Result<()>;

    /// Gets an environment by name.
    async fn get_environment(&self, name: &str) -> Result<Environment>;

    /// Deletes an environment.
    async fn delete_environment(&self, name: &str) -> Result<()>;

    /// Runs a full search.
    async fn search(&self, query: &SearchQuery) -> Result<SearchResult>;

    /// Runs a partial search that returns only the selected attribute paths.
    async fn partial_search(
        &self,
        query: &SearchQuery,
        keys: &BTreeMap<String, Vec<String>>,
    ) -> Result<SearchResult>;
}

/// Chef server API client.
#[derive(Debug, Clone)]
pub struct ChefClient {
    /// HTTP client.
    client: Client,
    /// Organization URL, always ending in `/`.
    base_url: Url,
    /// Request signer.
    signer: RequestSigner,
}

impl ChefClient {
    /// Creates a new Chef API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(
        server_url: &str,
        signer: RequestSigner,
        timeout_secs: u64,
        allow_unverified_ssl: bool,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(allow_unverified_ssl)
            .build()
            .map_err(|e| ChefApiError::network(format!("Failed to create HTTP client: {e}")))?;

        let base_url = parse_base_url(server_url)?;
        debug!("Chef API client for {base_url} as {}", signer.client_name());

        Ok(Self {
            client,
            base_url,
            signer,
        })
    }

    /// Builds the URL for a sequence of path segments under the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ChefResourcesError::internal(format!("Server URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends one signed request and decodes the JSON response.
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<T> {
        let payload = match body {
            Some(value) => serde_json::to_vec(value).map_err(|e| {
                ChefResourcesError::internal(format!("Failed to encode request body: {e}"))
            })?,
            None => Vec::new(),
        };

        debug!("{method} {url}");
        if !payload.is_empty() {
            trace!("Request body: {}", String::from_utf8_lossy(&payload));
        }

        let signed = self
            .signer
            .sign(method.as_str(), url.path(), &payload, Utc::now())?;

        let mut request = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        for (name, value) in signed {
            request = request.header(name, value);
        }
        if body.is_some() {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(payload);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChefApiError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChefApiError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(ChefApiError::api_error(
                status.as_u16(),
                String::from_utf8_lossy(&bytes).into_owned(),
            )
            .into());
        }

        trace!("Response {status}: {}", String::from_utf8_lossy(&bytes));

        let bytes: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(bytes).map_err(|e| {
            ChefApiError::invalid_response(format!("Failed to parse response: {e}")).into()
        })
    }

    /// Builds a search URL with its query string.
    fn search_url(&self, query: &SearchQuery) -> Result<Url> {
        let mut url = self.endpoint(&["search", &query.index])?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.params() {
                pairs.append_pair(key, &value);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ChefApi for ChefClient {
    async fn list_data_bags(&self) -> Result<BTreeMap<String, String>> {
        let url = self.endpoint(&["data"])?;
        self.execute(Method::GET, url, None).await
    }

    async fn create_data_bag(&self, name: &str) -> Result<DataBagCreated> {
        let url = self.endpoint(&["data"])?;
        let body = serde_json::json!({ "name": name });
        self.execute(Method::POST, url, Some(&body)).await
    }

    async fn delete_data_bag(&self, name: &str) -> Result<()> {
        let url = self.endpoint(&["data", name])?;
        let _: Value = self.execute(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn create_data_bag_item(&self, data_bag: &str, item: &Value) -> Result<()> {
        let url = self.endpoint(&["data", data_bag])?;
        let _: Value = self.execute(Method::POST, url, Some(item)).await?;
        Ok(())
    }

    async fn get_data_bag_item(&self, data_bag: &str, item_id: &str) -> Result<Value> {
        let url = self.endpoint(&["data", data_bag, item_id])?;
        self.execute(Method::GET, url, None).await
    }

    async fn delete_data_bag_item(&self, data_bag: &str, item_id: &str) -> Result<()> {
        let url = self.endpoint(&["data", data_bag, item_id])?;
        let _: Value = self.execute(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn create_environment(&self, environment: &Environment) -> Result<()> {
        let url = self.endpoint(&["environments"])?;
        let body = encode(environment)?;
        let _: Value = self.execute(Method::POST, url, Some(&body)).await?;
        Ok(())
    }

    async fn update_environment(&self, environment: &Environment) -> Result<()> {
        let url = self.endpoint(&["environments", &environment.name])?;
        let body = encode(environment)?;
        let _: Value = self.execute(Method::PUT, url, Some(&body)).await?;
        Ok(())
    }

    async fn get_environment(&self, name: &str) -> Result<Environment> {
        let url = self.endpoint(&["environments", name])?;
        self.execute(Method::GET, url, None).await
    }

    async fn delete_environment(&self, name: &str) -> Result<()> {
        let url = self.endpoint(&["environments", name])?;
        let _: Value = self.execute(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResult> {
        let url = self.search_url(query)?;
        self.execute(Method::GET, url, None).await
    }

    async fn partial_search(
        &self,
        query: &SearchQuery,
        keys: &BTreeMap<String, Vec<String>>,
    ) -> Result<SearchResult> {
        let url = self.search_url(query)?;
        let body = serde_json::to_value(keys)
            .map_err(|e| ChefResourcesError::internal(format!("Failed to encode search keys: {e}")))?;
        self.execute(Method::POST, url, Some(&body)).await
    }
}

/// Serializes a request body.
fn encode<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| ChefResourcesError::internal(format!("Failed to encode request body: {e}")))
}

/// Parses the server URL and makes sure relative joins stay under it.
fn parse_base_url(server_url: &str) -> Result<Url> {
    let mut url = Url::parse(server_url).map_err(|e| {
        ChefResourcesError::Config(crate::error::ConfigError::validation(
            format!("Invalid server URL '{server_url}': {e}"),
            "server.url",
        ))
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chef::auth::content_hash;
    use crate::chef::auth::tests::test_key;
    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, ChefClient) {
        let server = MockServer::start().await;
        let signer = RequestSigner::new("admin", test_key());
        let client = ChefClient::new(
            &format!("{}/organizations/acme", server.uri()),
            signer,
            DEFAULT_TIMEOUT_SECS,
            false,
        )
        .expect("Failed to create client");
        (server, client)
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let url = parse_base_url("https://chef.example.com/organizations/acme").expect("valid");
        assert_eq!(url.as_str(), "https://chef.example.com/organizations/acme/");
        assert!(parse_base_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_list_data_bags_sends_signed_request() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/organizations/acme/data"))
            .and(header("x-ops-userid", "admin"))
            .and(header("x-ops-sign", "version=1.3"))
            .and(header_exists("x-ops-authorization-1"))
            .and(header_exists("x-ops-timestamp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "users": "https://chef/organizations/acme/data/users"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let bags = client.list_data_bags().await.expect("list failed");
        assert_eq!(
            bags.get("users").map(String::as_str),
            Some("https://chef/organizations/acme/data/users")
        );
    }

    #[tokio::test]
    async fn test_create_data_bag_posts_name() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/organizations/acme/data"))
            .and(body_json(serde_json::json!({ "name": "users" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "uri": "https://chef/organizations/acme/data/users"
            })))
            .mount(&server)
            .await;

        let created = client.create_data_bag("users").await.expect("create failed");
        assert_eq!(created.uri, "https://chef/organizations/acme/data/users");
    }

    #[tokio::test]
    async fn test_not_found_is_reported_verbatim() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/organizations/acme/data/users/alice"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string("{\"error\":[\"Cannot load data bag item alice\"]}"),
            )
            .mount(&server)
            .await;

        let err = client
            .get_data_bag_item("users", "alice")
            .await
            .expect_err("should fail");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Cannot load data bag item alice"));
    }

    #[tokio::test]
    async fn test_server_error_is_not_not_found() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/organizations/acme/environments/prod"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client.get_environment("prod").await.expect_err("should fail");
        assert!(!err.is_not_found());
        assert!(matches!(
            err,
            ChefResourcesError::Api(ChefApiError::ApiRequestFailed { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_update_environment_puts_full_body() {
        let (server, client) = setup().await;

        let mut env = Environment::new("prod");
        env.description = String::from("Production");
        env.cookbook_versions
            .insert(String::from("nginx"), String::from("~> 2.0"));

        Mock::given(method("PUT"))
            .and(path("/organizations/acme/environments/prod"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "name": "prod",
                "description": "Production",
                "json_class": "Chef::Environment",
                "chef_type": "environment",
                "default_attributes": {},
                "override_attributes": {},
                "cookbook_versions": { "nginx": "~> 2.0" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client.update_environment(&env).await.expect("update failed");
    }

    #[tokio::test]
    async fn test_delete_accepts_empty_body() {
        let (server, client) = setup().await;

        Mock::given(method("DELETE"))
            .and(path("/organizations/acme/environments/staging"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client
            .delete_environment("staging")
            .await
            .expect("delete failed");
    }

    #[tokio::test]
    async fn test_search_query_string() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/organizations/acme/search/node"))
            .and(query_param("q", "role:web"))
            .and(query_param("rows", "1"))
            .and(query_param("sort", "X_CHEF_id_CHEF_X asc"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 3,
                "start": 0,
                "rows": [{ "name": "web1" }]
            })))
            .mount(&server)
            .await;

        let result = client
            .search(&SearchQuery::new("node", "role:web").with_rows(1))
            .await
            .expect("search failed");
        assert_eq!(result.total, 3);
        assert_eq!(result.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_partial_search_posts_keys() {
        let (server, client) = setup().await;

        let mut keys = BTreeMap::new();
        keys.insert(
            String::from("ip"),
            vec![String::from("ipaddress")],
        );

        Mock::given(method("POST"))
            .and(path("/organizations/acme/search/node"))
            .and(query_param("q", "name:web1"))
            .and(body_json(serde_json::json!({ "ip": ["ipaddress"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 1,
                "start": 0,
                "rows": [{ "url": "https://chef/nodes/web1", "data": { "ip": "10.0.0.1" } }]
            })))
            .mount(&server)
            .await;

        let result = client
            .partial_search(&SearchQuery::new("node", "name:web1").with_rows(1), &keys)
            .await
            .expect("partial search failed");
        assert_eq!(result.total, 1);
        assert_eq!(result.rows[0]["data"]["ip"], "10.0.0.1");
    }

    #[tokio::test]
    async fn test_create_data_bag_item_posts_content() {
        let (server, client) = setup().await;
        let item = serde_json::json!({ "id": "alice", "shell": "/bin/zsh" });
        let sent = serde_json::to_vec(&item).expect("encode");

        Mock::given(method("POST"))
            .and(path("/organizations/acme/data/users"))
            .and(header("content-type", "application/json"))
            .and(header("x-ops-content-hash", content_hash(&sent).as_str()))
            .and(body_json(item.clone()))
            .respond_with(ResponseTemplate::new(201).set_body_json(item.clone()))
            .expect(1)
            .mount(&server)
            .await;

        client
            .create_data_bag_item("users", &item)
            .await
            .expect("create item failed");
    }

    #[tokio::test]
    async fn test_get_data_bag_item_decodes_body() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/organizations/acme/data/users/alice"))
            .and(header("x-ops-content-hash", content_hash(b"").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "alice",
                "groups": ["admin"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let item = client
            .get_data_bag_item("users", "alice")
            .await
            .expect("get item failed");
        assert_eq!(item, serde_json::json!({ "id": "alice", "groups": ["admin"] }));
    }

    #[tokio::test]
    async fn test_delete_data_bag() {
        let (server, client) = setup().await;

        Mock::given(method("DELETE"))
            .and(path("/organizations/acme/data/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "users"
            })))
            .expect(1)
            .mount(&server)
            .await;

        client.delete_data_bag("users").await.expect("delete failed");
    }

    #[tokio::test]
    async fn test_delete_data_bag_item() {
        let (server, client) = setup().await;

        Mock::given(method("DELETE"))
            .and(path("/organizations/acme/data/users/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "alice"
            })))
            .expect(1)
            .mount(&server)
            .await;

        client
            .delete_data_bag_item("users", "alice")
            .await
            .expect("delete item failed");
    }

    #[tokio::test]
    async fn test_create_environment_posts_body() {
        let (server, client) = setup().await;

        let mut env = Environment::new("staging");
        env.description = String::from("Staging");
        env.default_attributes
            .insert(String::from("tz"), serde_json::json!("UTC"));

        Mock::given(method("POST"))
            .and(path("/organizations/acme/environments"))
            .and(body_json(serde_json::json!({
                "name": "staging",
                "description": "Staging",
                "json_class": "Chef::Environment",
                "chef_type": "environment",
                "default_attributes": { "tz": "UTC" },
                "override_attributes": {},
                "cookbook_versions": {}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "uri": "https://chef/organizations/acme/environments/staging"
            })))
            .expect(1)
            .mount(&server)
            .await;

        client.create_environment(&env).await.expect("create failed");
    }
}
