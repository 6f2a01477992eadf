//! Data bag item reconciler.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::chef::ChefApi;
use crate::error::{ResourceError, Result};

use super::json::{canonical_string, parse_object};
use super::schema::{FieldSchema, ResourceSchema};
use super::{Resource, ResourceData, ResourceKind, ensure_imported};

const KIND: ResourceKind = ResourceKind::DataBagItem;

/// Reconciler for `data_bag_item` resources.
///
/// The item id comes from the `id` attribute inside `content_json`. Imports
/// take `<data bag name>.<item id>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataBagItemResource;

/// Parses item content and extracts its id.
///
/// # Errors
///
/// Returns an error if the content is not a JSON object or has no non-empty
/// string `id`.
pub fn prepare_item_content(content_json: &str) -> Result<(String, Value)> {
    let content = parse_object("content_json", content_json)?;

    let item_id = content
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(ResourceError::MissingItemId)?;

    Ok((item_id, Value::Object(content)))
}

/// Splits a `databagname.itemname` id into item data ready for a read.
///
/// # Errors
///
/// Returns [`ResourceError::InvalidImportId`] unless both parts are non-empty.
pub fn locate_item(id: &str) -> Result<ResourceData> {
    let (data_bag, item_id) = id
        .split_once('.')
        .filter(|(bag, item)| !bag.is_empty() && !item.is_empty())
        .ok_or_else(|| ResourceError::InvalidImportId {
            id: id.to_string(),
            expected: String::from("databagname.itemname"),
        })?;

    let mut data = ResourceData::with_id(item_id, Map::new());
    data.set("data_bag_name", data_bag);
    Ok(data)
}

#[async_trait]
impl Resource for DataBagItemResource {
    fn kind(&self) -> ResourceKind {
        KIND
    }

    fn schema(&self) -> ResourceSchema {
        ResourceSchema::resource(
            KIND,
            vec![
                FieldSchema::string("data_bag_name")
                    .required()
                    .force_new()
                    .describe("Data bag that holds the item"),
                FieldSchema::string("content_json")
                    .required()
                    .force_new()
                    .json()
                    .describe("Item content as a JSON object with a string 'id'"),
            ],
        )
    }

    async fn create(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let data_bag = data.require_str(KIND, "data_bag_name")?.to_string();
        let (item_id, content) = prepare_item_content(data.require_str(KIND, "content_json")?)?;
        info!("Creating data bag item: {data_bag}/{item_id}");

        api.create_data_bag_item(&data_bag, &content).await?;

        data.set_id(&item_id);
        data.set("content_json", canonical_string(&content));
        Ok(())
    }

    async fn read(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let item_id = data.require_id(KIND, "read")?.to_string();
        let data_bag = data.require_str(KIND, "data_bag_name")?.to_string();
        info!("Reading data bag item: {data_bag}/{item_id}");

        match api.get_data_bag_item(&data_bag, &item_id).await {
            Ok(content) => {
                data.set("content_json", canonical_string(&content));
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Data bag item {data_bag}/{item_id} not found, treating as absent");
                data.clear_id();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, api: &dyn ChefApi, data: &mut ResourceData) -> Result<()> {
        let item_id = data.require_id(KIND, "delete")?.to_string();
        let data_bag = data.require_str(KIND, "data_bag_name")?.to_string();
        info!("Deleting data bag item: {data_bag}/{item_id}");

        api.delete_data_bag_item(&data_bag, &item_id).await?;
        data.clear_id();
        Ok(())
    }

    async fn import(&self, api: &dyn ChefApi, id: &str) -> Result<ResourceData> {
        let mut data = locate_item(id)?;
        self.read(api, &mut data).await?;
        ensure_imported(KIND, id, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chef::MockChefApi;
    use crate::error::ChefApiError;
    use serde_json::json;

    fn item_data(content: &str) -> ResourceData {
        let mut data = ResourceData::default();
        data.set("data_bag_name", "users");
        data.set("content_json", content);
        data
    }

    #[test]
    fn test_prepare_item_content() {
        let (id, value) = prepare_item_content("{\"id\":\"alice\",\"uid\":1000}").expect("valid");
        assert_eq!(id, "alice");
        assert_eq!(value["uid"], 1000);
    }

    #[test]
    fn test_prepare_item_content_requires_string_id() {
        for content in ["{}", "{\"id\":\"\"}", "{\"id\":5}"] {
            let err = prepare_item_content(content).expect_err("no usable id");
            assert_eq!(
                err.to_string(),
                "Resource error: content_json must have id attribute, set to a string"
            );
        }
        assert!(prepare_item_content("{oops").is_err());
    }

    #[tokio::test]
    async fn test_create_posts_content() {
        let mut api = MockChefApi::new();
        api.expect_create_data_bag_item()
            .withf(|bag, item| bag == "users" && item["id"] == "alice")
            .times(1)
            .returning(|_, _| Ok(()));

        let mut data = item_data("{\"uid\": 1000, \"id\": \"alice\"}");
        DataBagItemResource.create(&api, &mut data).await.expect("create failed");

        assert_eq!(data.id.as_deref(), Some("alice"));
        assert_eq!(data.get_str("content_json"), Some("{\"id\":\"alice\",\"uid\":1000}"));
    }

    #[tokio::test]
    async fn test_create_without_id_makes_no_request() {
        let api = MockChefApi::new();
        let mut data = item_data("{\"uid\": 1000}");
        assert!(DataBagItemResource.create(&api, &mut data).await.is_err());
        assert!(data.is_absent());
    }

    #[tokio::test]
    async fn test_read_sets_canonical_content() {
        let mut api = MockChefApi::new();
        api.expect_get_data_bag_item()
            .withf(|bag, id| bag == "users" && id == "alice")
            .returning(|_, _| Ok(json!({ "uid": 1000, "id": "alice" })));

        let mut data = item_data("{}");
        data.set_id("alice");
        DataBagItemResource.read(&api, &mut data).await.expect("read failed");
        assert_eq!(data.get_str("content_json"), Some("{\"id\":\"alice\",\"uid\":1000}"));
    }

    #[tokio::test]
    async fn test_read_404_clears_id() {
        let mut api = MockChefApi::new();
        api.expect_get_data_bag_item()
            .returning(|_, _| Err(ChefApiError::api_error(404, "missing").into()));

        let mut data = item_data("{}");
        data.set_id("alice");
        DataBagItemResource.read(&api, &mut data).await.expect("404 is absent");
        assert!(data.is_absent());
    }

    #[tokio::test]
    async fn test_read_other_errors_propagate() {
        let mut api = MockChefApi::new();
        api.expect_get_data_bag_item()
            .returning(|_, _| Err(ChefApiError::network("connection reset").into()));

        let mut data = item_data("{}");
        data.set_id("alice");
        assert!(DataBagItemResource.read(&api, &mut data).await.is_err());
    }

    #[tokio::test]
    async fn test_delete() {
        let mut api = MockChefApi::new();
        api.expect_delete_data_bag_item()
            .withf(|bag, id| bag == "users" && id == "alice")
            .times(1)
            .returning(|_, _| Ok(()));

        let mut data = item_data("{}");
        data.set_id("alice");
        DataBagItemResource.delete(&api, &mut data).await.expect("delete failed");
        assert!(data.is_absent());
    }

    #[tokio::test]
    async fn test_import_splits_id() {
        let mut api = MockChefApi::new();
        api.expect_get_data_bag_item()
            .withf(|bag, id| bag == "users" && id == "alice.smith")
            .returning(|_, _| Ok(json!({ "id": "alice.smith" })));

        let data = DataBagItemResource
            .import(&api, "users.alice.smith")
            .await
            .expect("import failed");
        assert_eq!(data.id.as_deref(), Some("alice.smith"));
        assert_eq!(data.get_str("data_bag_name"), Some("users"));
    }

    #[tokio::test]
    async fn test_import_rejects_malformed_ids() {
        let api = MockChefApi::new();
        for id in ["users", ".alice", "users.", ""] {
            let err = DataBagItemResource.import(&api, id).await.expect_err("malformed");
            assert_eq!(
                err.to_string(),
                format!("Resource error: unexpected format of ID ({id}), expected databagname.itemname")
            );
        }
    }

    #[tokio::test]
    async fn test_import_missing_item_fails() {
        let mut api = MockChefApi::new();
        api.expect_get_data_bag_item()
            .returning(|_, _| Err(ChefApiError::api_error(404, "missing").into()));

        assert!(DataBagItemResource.import(&api, "users.ghost").await.is_err());
    }
}
