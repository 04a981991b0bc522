//! JSON documents to DynamoDB attribute values and back.
//!
//! Numbers travel as their decimal text, so integers and decimals survive the
//! round trip unchanged. Binary attributes have no JSON form and are rejected
//! on the way out.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use cats_api_core::backend::BackendError;
use cats_api_core::contract::Item;
use serde_json::{Number, Value};

pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(flag) => AttributeValue::Bool(*flag),
        Value::Number(number) => AttributeValue::N(number.to_string()),
        Value::String(text) => AttributeValue::S(text.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute_value).collect()),
        Value::Object(map) => AttributeValue::M(to_attribute_map(map)),
    }
}

pub fn to_attribute_map(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_attribute_value(value)))
        .collect()
}

pub fn from_attribute_value(value: &AttributeValue) -> Result<Value, BackendError> {
    match value {
        AttributeValue::S(text) => Ok(Value::String(text.clone())),
        AttributeValue::N(text) => parse_number(text),
        AttributeValue::Bool(flag) => Ok(Value::Bool(*flag)),
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::L(items) => items
            .iter()
            .map(from_attribute_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::M(map) => from_attribute_map(map).map(Value::Object),
        AttributeValue::Ss(items) => Ok(Value::Array(
            items.iter().cloned().map(Value::String).collect(),
        )),
        AttributeValue::Ns(items) => items
            .iter()
            .map(|text| parse_number(text))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(BackendError::validation(format!(
            "unsupported attribute type: {other:?}"
        ))),
    }
}

pub fn from_attribute_map(map: &HashMap<String, AttributeValue>) -> Result<Item, BackendError> {
    map.iter()
        .map(|(name, value)| Ok((name.clone(), from_attribute_value(value)?)))
        .collect()
}

fn parse_number(text: &str) -> Result<Value, BackendError> {
    text.parse::<Number>()
        .map(Value::Number)
        .map_err(|error| BackendError::validation(format!("invalid number {text:?}: {error}")))
}
