use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use cats_api_core::backend::{BackendError, DocumentBackend};
use cats_api_core::contract::{
    AttributeNames, DeleteItemParams, GetItemOutput, GetItemParams, Item, PutItemParams,
    ScanOutput, ScanParams,
};

use crate::adapters::attribute_value::{from_attribute_map, to_attribute_map};
use crate::config::HandlerConfig;

const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailedException";

/// [`DocumentBackend`] over a DynamoDB table client.
#[derive(Debug, Clone)]
pub struct DynamoDocumentBackend {
    client: Client,
}

impl DynamoDocumentBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client with the configured retry budget, operation timeout,
    /// and optional endpoint override.
    pub async fn from_config(config: &HandlerConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts))
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.operation_timeout)
                    .build(),
            );
        if let Some(endpoint) = &config.ddb_endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config))
    }
}

#[async_trait]
impl DocumentBackend for DynamoDocumentBackend {
    async fn put(&self, params: PutItemParams) -> Result<(), BackendError> {
        self.client
            .put_item()
            .table_name(&params.table_name)
            .set_item(Some(to_attribute_map(&params.item)))
            .set_condition_expression(params.condition_expression)
            .set_expression_attribute_names(attribute_names(params.expression_attribute_names))
            .set_expression_attribute_values(attribute_values(
                params.expression_attribute_values.as_ref(),
            ))
            .send()
            .await
            .map_err(|error| backend_error(&params.table_name, error))?;
        Ok(())
    }

    async fn get(&self, params: GetItemParams) -> Result<GetItemOutput, BackendError> {
        let output = self
            .client
            .get_item()
            .table_name(&params.table_name)
            .set_key(Some(to_attribute_map(&params.key)))
            .set_projection_expression(params.projection_expression)
            .set_expression_attribute_names(attribute_names(params.expression_attribute_names))
            .send()
            .await
            .map_err(|error| backend_error(&params.table_name, error))?;

        let item = output.item().map(from_attribute_map).transpose()?;
        Ok(GetItemOutput { item })
    }

    async fn delete(&self, params: DeleteItemParams) -> Result<(), BackendError> {
        self.client
            .delete_item()
            .table_name(&params.table_name)
            .set_key(Some(to_attribute_map(&params.key)))
            .set_condition_expression(params.condition_expression)
            .set_expression_attribute_names(attribute_names(params.expression_attribute_names))
            .set_expression_attribute_values(attribute_values(
                params.expression_attribute_values.as_ref(),
            ))
            .send()
            .await
            .map_err(|error| backend_error(&params.table_name, error))?;
        Ok(())
    }

    async fn scan(&self, params: ScanParams) -> Result<ScanOutput, BackendError> {
        let limit = params
            .limit
            .map(i32::try_from)
            .transpose()
            .map_err(|_| BackendError::validation("Limit exceeds the maximum page size"))?;

        let output = self
            .client
            .scan()
            .table_name(&params.table_name)
            .set_limit(limit)
            .set_filter_expression(params.filter_expression)
            .set_projection_expression(params.projection_expression)
            .set_expression_attribute_names(attribute_names(params.expression_attribute_names))
            .set_expression_attribute_values(attribute_values(
                params.expression_attribute_values.as_ref(),
            ))
            .set_exclusive_start_key(params.exclusive_start_key.as_ref().map(to_attribute_map))
            .send()
            .await
            .map_err(|error| backend_error(&params.table_name, error))?;

        let items = output
            .items()
            .iter()
            .map(from_attribute_map)
            .collect::<Result<Vec<Item>, _>>()?;
        let last_evaluated_key = output
            .last_evaluated_key()
            .map(from_attribute_map)
            .transpose()?;
        Ok(ScanOutput {
            count: usize::try_from(output.count()).unwrap_or(items.len()),
            scanned_count: usize::try_from(output.scanned_count()).unwrap_or(items.len()),
            items,
            last_evaluated_key,
        })
    }
}

fn attribute_names(names: Option<AttributeNames>) -> Option<HashMap<String, String>> {
    names.map(|names| names.into_iter().collect())
}

fn attribute_values(values: Option<&Item>) -> Option<HashMap<String, AttributeValue>> {
    values.map(to_attribute_map)
}

fn backend_error<E, R>(table_name: &str, error: SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match error.code() {
        Some(RESOURCE_NOT_FOUND) => BackendError::TableNotFound {
            table: table_name.to_string(),
        },
        Some(CONDITIONAL_CHECK_FAILED) => BackendError::ConditionalCheckFailed,
        _ => BackendError::service(DisplayErrorContext(&error).to_string()),
    }
}
