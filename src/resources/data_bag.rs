//! Data bag reconciler.
//!
//! The API has no endpoint for a single bag's metadata, so existence is
//! checked against the bag listing.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::chef::ChefApi;
use crate::error::Result;

use super::schema::{FieldSchema, ResourceSchema};
use super::{Resource, ResourceData, ResourceKind};

const KIND: ResourceKind = ResourceKind::DataBag;

/// Reconciler for `data_bag` resources.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataBagResource;

#[async_trait]
impl Resource for DataBagResource {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::resource(
            KIND,
            vec![
                FieldSchema::string("name")
                    .required()
                    .force_new()
                    .describe("Name of the data bag"),
                FieldSchema::string("api_uri")
                    .computed()
                    .describe("API URI of the data bag"),
            ],
        )
    }

    async fn create(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let name = data.require_str(KIND, "name")?.to_string();
        info!("Creating data bag: {name}");

        let created = api.create_data_bag(&name).await?;

        data.set_id(&name);
        data.set("api_uri", created.uri);
        Ok(())
    }

    async fn read(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let name = data.require_id(KIND, "read")?.to_string();
        info!("Reading data bag: {name}");

        let bags = match api.list_data_bags().await {
            Ok(bags) => bags,
            Err(e) if e.is_not_found() => {
                debug!("Data bag listing returned 404, treating {name} as absent");
                data.clear_id();
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match bags.get(&name) {
            Some(uri) => {
                data.set("name", name.as_str());
                data.set("api_uri", uri.as_str());
            }
            None => {
                debug!("Data bag {name} not listed, treating as absent");
                data.clear_id();
            }
        }
        Ok(())
    }

    async fn delete(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let name = data.require_id(KIND, "delete")?.to_string();
        info!("Deleting data bag: {name}");

        api.delete_data_bag(&name).await?;
        data.clear_id();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chef::{DataBagCreated, MockChefApi};
    use crate::error::{ChefApiError, ChefResourcesError};
    use serde_json::Map;
    use std::collections::BTreeMap;

    fn named(name: &str) -> ResourceData {
        let mut data = ResourceData::default();
        data.set("name", name);
        data
    }

    fn listing() -> BTreeMap<String, String> {
        let mut bags = BTreeMap::new();
        bags.insert(String::from("users"), String::from("https://chef/data/users"));
        bags
    }

    #[tokio::test]
    async fn test_create_sets_id_and_uri() {
        let mut api = MockChefApi::new();
        api.expect_create_data_bag()
            .withf(|name| name == "users")
            .times(1)
            .returning(|_| {
                Ok(DataBagCreated {
                    uri: String::from("https://chef/data/users"),
                })
            });

        let mut data = named("users");
        DataBagResource.create(&api, &mut data).await.expect("create failed");

        assert_eq!(data.id.as_deref(), Some("users"));
        assert_eq!(data.get_str("api_uri"), Some("https://chef/data/users"));
    }

    #[tokio::test]
    async fn test_create_propagates_conflict() {
        let mut api = MockChefApi::new();
        api.expect_create_data_bag()
            .returning(|_| Err(ChefApiError::api_error(409, "exists").into()));

        let mut data = named("users");
        let err = DataBagResource.create(&api, &mut data).await.expect_err("conflict");
        assert!(matches!(
            err,
            ChefResourcesError::Api(ChefApiError::ApiRequestFailed { status: 409, .. })
        ));
        assert!(data.is_absent());
    }

    #[tokio::test]
    async fn test_read_found_in_listing() {
        let mut api = MockChefApi::new();
        api.expect_list_data_bags().returning(|| Ok(listing()));

        let mut data = ResourceData::with_id("users", Map::new());
        DataBagResource.read(&api, &mut data).await.expect("read failed");

        assert_eq!(data.id.as_deref(), Some("users"));
        assert_eq!(data.get_str("name"), Some("users"));
        assert_eq!(data.get_str("api_uri"), Some("https://chef/data/users"));
    }

    #[tokio::test]
    async fn test_read_missing_from_listing_clears_id() {
        let mut api = MockChefApi::new();
        api.expect_list_data_bags().returning(|| Ok(listing()));

        let mut data = ResourceData::with_id("secrets", Map::new());
        DataBagResource.read(&api, &mut data).await.expect("read failed");
        assert!(data.is_absent());
    }

    #[tokio::test]
    async fn test_read_404_clears_id() {
        let mut api = MockChefApi::new();
        api.expect_list_data_bags()
            .returning(|| Err(ChefApiError::api_error(404, "not found").into()));

        let mut data = ResourceData::with_id("users", Map::new());
        DataBagResource.read(&api, &mut data).await.expect("404 is not an error");
        assert!(data.is_absent());
    }

    #[tokio::test]
    async fn test_read_other_errors_propagate() {
        let mut api = MockChefApi::new();
        api.expect_list_data_bags()
            .returning(|| Err(ChefApiError::api_error(401, "unauthorized").into()));

        let mut data = ResourceData::with_id("users", Map::new());
        assert!(DataBagResource.read(&api, &mut data).await.is_err());
        assert_eq!(data.id.as_deref(), Some("users"));
    }

    #[tokio::test]
    async fn test_delete_clears_id() {
        let mut api = MockChefApi::new();
        api.expect_delete_data_bag()
            .withf(|name| name == "users")
            .times(1)
            .returning(|_| Ok(()));

        let mut data = ResourceData::with_id("users", Map::new());
        DataBagResource.delete(&api, &mut data).await.expect("delete failed");
        assert!(data.is_absent());
    }

    #[tokio::test]
    async fn test_update_is_unsupported() {
        let api = MockChefApi::new();
        let mut data = ResourceData::with_id("users", Map::new());
        let err = DataBagResource.update(&api, &mut data).await.expect_err("unsupported");
        assert_eq!(err.to_string(), "Resource error: data_bag does not support update");
    }

    #[tokio::test]
    async fn test_import_passthrough() {
        let mut api = MockChefApi::new();
        api.expect_list_data_bags().returning(|| Ok(listing()));

        let data = DataBagResource.import(&api, "users").await.expect("import failed");
        assert_eq!(data.get_str("name"), Some("users"));

        assert!(DataBagResource.import(&api, "missing").await.is_err());
    }
}
