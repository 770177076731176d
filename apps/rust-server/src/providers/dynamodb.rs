// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DynamoDB item store.
//!
//! Items live in a single table keyed by the string attribute `id`.
//! Conditional writes give create/update/delete their conflict and
//! not-found semantics without a read first.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::{
    types::{AttributeValue, ReturnValue},
    Client,
};
use chrono::{DateTime, Utc};
use tracing::debug;

use super::UpstreamError;
use crate::config::StoreConfig;
use crate::models::{Item, ItemFields};

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailedException";

type Attributes = HashMap<String, AttributeValue>;

/// Item persistence the handlers rely on.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn get_item(&self, id: &str) -> Result<Option<Item>, UpstreamError>;

    /// All items, or only those in `category`.
    async fn list_items(&self, category: Option<&str>) -> Result<Vec<Item>, UpstreamError>;

    /// Insert a new item. Fails with `AlreadyExists` if the id is taken.
    async fn create_item(&self, item: Item) -> Result<Item, UpstreamError>;

    /// Overwrite the writable fields of an existing item.
    async fn update_item(
        &self,
        id: &str,
        fields: ItemFields,
        updated_at: DateTime<Utc>,
    ) -> Result<Item, UpstreamError>;

    async fn delete_item(&self, id: &str) -> Result<(), UpstreamError>;
}

pub struct DynamoDbStore {
    client: Client,
    table_name: String,
}

impl DynamoDbStore {
    pub fn new(sdk: &SdkConfig, config: &StoreConfig) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.as_str());
        }

        Self {
            client: Client::from_conf(builder.build()),
            table_name: config.table_name.clone(),
        }
    }
}

fn key(id: &str) -> AttributeValue {
    AttributeValue::S(id.to_string())
}

/// Map a failed conditional write to `err`, pass anything else through.
fn on_condition_failed(err: UpstreamError, replacement: UpstreamError) -> UpstreamError {
    if err.code() == Some(CONDITIONAL_CHECK_FAILED) {
        replacement
    } else {
        err
    }
}

#[async_trait]
impl ItemStore for DynamoDbStore {
    async fn get_item(&self, id: &str) -> Result<Option<Item>, UpstreamError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("id", key(id))
            .send()
            .await?;

        output.item().map(item_from_attributes).transpose()
    }

    async fn list_items(&self, category: Option<&str>) -> Result<Vec<Item>, UpstreamError> {
        let mut items = Vec::new();
        let mut start_key: Option<Attributes> = None;

        loop {
            let mut scan = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(start_key.take());
            if let Some(category) = category {
                scan = scan
                    .filter_expression("#category = :category")
                    .expression_attribute_names("#category", "category")
                    .expression_attribute_values(":category", AttributeValue::S(category.to_string()));
            }

            let output = scan.send().await?;
            for attributes in output.items() {
                items.push(item_from_attributes(attributes)?);
            }
            debug!(page = output.items().len(), total = items.len(), "scanned item page");

            match output.last_evaluated_key() {
                Some(last) if !last.is_empty() => start_key = Some(last.clone()),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn create_item(&self, item: Item) -> Result<Item, UpstreamError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item_to_attributes(&item)))
            .condition_expression("attribute_not_exists(#id)")
            .expression_attribute_names("#id", "id")
            .send()
            .await
            .map_err(|e| {
                on_condition_failed(e.into(), UpstreamError::AlreadyExists("Item already exists".into()))
            })?;

        Ok(item)
    }

    async fn update_item(
        &self,
        id: &str,
        fields: ItemFields,
        updated_at: DateTime<Utc>,
    ) -> Result<Item, UpstreamError> {
        let output = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", key(id))
            .update_expression(
                "SET #name = :name, #description = :description, \
                 #category = :category, #price = :price, #updatedAt = :updatedAt",
            )
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#id", "id")
            .expression_attribute_names("#name", "name")
            .expression_attribute_names("#description", "description")
            .expression_attribute_names("#category", "category")
            .expression_attribute_names("#price", "price")
            .expression_attribute_names("#updatedAt", "updatedAt")
            .expression_attribute_values(":name", AttributeValue::S(fields.name))
            .expression_attribute_values(":description", AttributeValue::S(fields.description))
            .expression_attribute_values(":category", AttributeValue::S(fields.category))
            .expression_attribute_values(":price", AttributeValue::N(fields.price.to_string()))
            .expression_attribute_values(":updatedAt", AttributeValue::S(updated_at.to_rfc3339()))
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| on_condition_failed(e.into(), UpstreamError::NotFound("Item not found".into())))?;

        let attributes = output
            .attributes()
            .ok_or_else(|| UpstreamError::InvalidResponse("UpdateItem returned no attributes".into()))?;
        item_from_attributes(attributes)
    }

    async fn delete_item(&self, id: &str) -> Result<(), UpstreamError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("id", key(id))
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#id", "id")
            .send()
            .await
            .map_err(|e| on_condition_failed(e.into(), UpstreamError::NotFound("Item not found".into())))?;

        Ok(())
    }
}

fn item_to_attributes(item: &Item) -> Attributes {
    HashMap::from([
        ("id".to_string(), AttributeValue::S(item.id.clone())),
        ("name".to_string(), AttributeValue::S(item.name.clone())),
        ("description".to_string(), AttributeValue::S(item.description.clone())),
        ("category".to_string(), AttributeValue::S(item.category.clone())),
        ("price".to_string(), AttributeValue::N(item.price.to_string())),
        ("createdBy".to_string(), AttributeValue::S(item.created_by.clone())),
        ("createdAt".to_string(), AttributeValue::S(item.created_at.to_rfc3339())),
        ("updatedAt".to_string(), AttributeValue::S(item.updated_at.to_rfc3339())),
    ])
}

fn item_from_attributes(attributes: &Attributes) -> Result<Item, UpstreamError> {
    let string = |name: &str| -> Result<String, UpstreamError> {
        attributes
            .get(name)
            .and_then(|v| v.as_s().ok())
            .cloned()
            .ok_or_else(|| UpstreamError::InvalidResponse(format!("item attribute {name} missing")))
    };
    let timestamp = |name: &str| -> Result<DateTime<Utc>, UpstreamError> {
        let raw = string(name)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| UpstreamError::InvalidResponse(format!("item attribute {name}: {e}")))
    };

    let price = attributes
        .get("price")
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<f64>().ok())
        .ok_or_else(|| UpstreamError::InvalidResponse("item attribute price missing".into()))?;

    Ok(Item {
        id: string("id")?,
        name: string("name")?,
        description: string("description").unwrap_or_default(),
        category: string("category")?,
        price,
        created_by: string("createdBy")?,
        created_at: timestamp("createdAt")?,
        updated_at: timestamp("updatedAt")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_item, spawn_aws_fake, test_sdk_config, FakeReply};
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use url::Url;

    async fn store(endpoint: Url) -> DynamoDbStore {
        let config = StoreConfig {
            endpoint: Some(endpoint),
            table_name: "items".into(),
        };
        DynamoDbStore::new(&test_sdk_config().await, &config)
    }

    /// Wire form of an item as DynamoDB returns it.
    fn item_json(item: &Item) -> Value {
        json!({
            "id": { "S": item.id },
            "name": { "S": item.name },
            "description": { "S": item.description },
            "category": { "S": item.category },
            "price": { "N": item.price.to_string() },
            "createdBy": { "S": item.created_by },
            "createdAt": { "S": item.created_at.to_rfc3339() },
            "updatedAt": { "S": item.updated_at.to_rfc3339() },
        })
    }

    fn conditional_check_failed() -> FakeReply {
        FakeReply::error(
            StatusCode::BAD_REQUEST,
            "ConditionalCheckFailedException",
            "The conditional request failed",
        )
    }

    #[test]
    fn attributes_round_trip() {
        let item = sample_item("item-1", "tools");
        let back = item_from_attributes(&item_to_attributes(&item)).unwrap();
        assert_eq!(back, item);
    }

    #[tokio::test]
    async fn get_item_returns_none_when_absent() {
        let fake = spawn_aws_fake(vec![FakeReply::ok(json!({}))]).await;
        assert!(store(fake.url.clone()).await.get_item("missing").await.unwrap().is_none());

        let calls = fake.calls();
        assert_eq!(calls[0].target, "DynamoDB_20120810.GetItem");
        assert!(calls[0].content_type.starts_with("application/x-amz-json-1.0"));
        assert_eq!(calls[0].body["TableName"], "items");
        assert_eq!(calls[0].body["Key"], json!({"id": {"S": "missing"}}));
        assert!(calls[0]
            .authorization
            .starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
        assert!(calls[0].authorization.contains("/us-east-1/dynamodb/aws4_request"));
    }

    #[tokio::test]
    async fn get_item_decodes_stored_attributes() {
        let item = sample_item("item-1", "tools");
        let fake = spawn_aws_fake(vec![FakeReply::ok(json!({ "Item": item_json(&item) }))]).await;

        let found = store(fake.url.clone()).await.get_item("item-1").await.unwrap();
        assert_eq!(found, Some(item));
    }

    #[tokio::test]
    async fn list_follows_pagination_and_filters_category() {
        let first = sample_item("a", "tools");
        let second = sample_item("b", "tools");
        let fake = spawn_aws_fake(vec![
            FakeReply::ok(json!({
                "Items": [item_json(&first)],
                "Count": 1,
                "LastEvaluatedKey": {"id": {"S": "a"}}
            })),
            FakeReply::ok(json!({ "Items": [item_json(&second)], "Count": 1 })),
        ])
        .await;

        let items = store(fake.url.clone())
            .await
            .list_items(Some("tools"))
            .await
            .unwrap();
        assert_eq!(items, vec![first, second]);

        let calls = fake.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].target, "DynamoDB_20120810.Scan");
        assert_eq!(calls[0].body["FilterExpression"], "#category = :category");
        assert_eq!(
            calls[0].body["ExpressionAttributeValues"][":category"]["S"],
            "tools"
        );
        assert!(calls[0].body.get("ExclusiveStartKey").is_none());
        assert_eq!(calls[1].body["ExclusiveStartKey"], json!({"id": {"S": "a"}}));
    }

    #[tokio::test]
    async fn create_conflict_maps_to_already_exists() {
        let fake = spawn_aws_fake(vec![conditional_check_failed()]).await;

        let err = store(fake.url.clone())
            .await
            .create_item(sample_item("dup", "tools"))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::AlreadyExists(_)));
        assert_eq!(
            fake.calls()[0].body["ConditionExpression"],
            "attribute_not_exists(#id)"
        );
    }

    #[tokio::test]
    async fn update_returns_new_attributes() {
        let mut updated = sample_item("item-1", "garden");
        updated.name = "Rake".into();
        let fake = spawn_aws_fake(vec![FakeReply::ok(json!({
            "Attributes": item_json(&updated)
        }))])
        .await;

        let item = store(fake.url.clone())
            .await
            .update_item(
                "item-1",
                ItemFields {
                    name: "Rake".into(),
                    description: updated.description.clone(),
                    category: "garden".into(),
                    price: updated.price,
                },
                updated.updated_at,
            )
            .await
            .unwrap();
        assert_eq!(item, updated);

        let body = &fake.calls()[0].body;
        assert_eq!(body["ReturnValues"], "ALL_NEW");
        assert_eq!(body["ConditionExpression"], "attribute_exists(#id)");
        assert_eq!(body["ExpressionAttributeValues"][":name"]["S"], "Rake");
    }

    #[tokio::test]
    async fn update_or_delete_of_missing_item_is_not_found() {
        let fake = spawn_aws_fake(vec![conditional_check_failed()]).await;
        let store = store(fake.url.clone()).await;

        let err = store.delete_item("missing").await.unwrap_err();
        assert_eq!(err, UpstreamError::NotFound("Item not found".into()));

        let err = store
            .update_item(
                "missing",
                ItemFields {
                    name: "n".into(),
                    description: String::new(),
                    category: "c".into(),
                    price: 1.0,
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, UpstreamError::NotFound("Item not found".into()));
    }

    #[tokio::test]
    async fn missing_table_is_not_reported_as_missing_item() {
        let fake = spawn_aws_fake(vec![FakeReply::error(
            StatusCode::BAD_REQUEST,
            "ResourceNotFoundException",
            "Requested resource not found",
        )])
        .await;

        let err = store(fake.url.clone()).await.delete_item("item-1").await.unwrap_err();
        assert_eq!(err.code(), Some("ResourceNotFoundException"));
        assert!(!matches!(err, UpstreamError::NotFound(_)));
    }

    #[tokio::test]
    async fn throttling_keeps_service_status() {
        let fake = spawn_aws_fake(vec![FakeReply::error(
            StatusCode::BAD_REQUEST,
            "ProvisionedThroughputExceededException",
            "Rate exceeded",
        )])
        .await;

        let err = store(fake.url.clone()).await.list_items(None).await.unwrap_err();
        assert_eq!(err.code(), Some("ProvisionedThroughputExceededException"));
    }
}
