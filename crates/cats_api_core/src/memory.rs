//! In-process document store used in place of a local DynamoDB in tests.
//!
//! Conditions, filters, and projections are evaluated for the expression
//! subset in the `expression` module; scans page in key order.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::{BackendError, DocumentBackend};
use crate::contract::{
    DeleteItemParams, GetItemOutput, GetItemParams, Item, PutItemParams, ScanOutput, ScanParams,
};
use crate::expression::{
    Condition, Projection, Scope, CONDITION_EXPRESSION, FILTER_EXPRESSION,
};

#[derive(Debug)]
struct Table {
    key_schema: Vec<String>,
    items: BTreeMap<Vec<String>, Item>,
}

impl Table {
    /// Encodes the key attributes of `attributes` in key-schema order.
    ///
    /// With `exact` set, attributes outside the key schema are rejected the
    /// way a key lookup rejects them.
    fn encode_key(&self, attributes: &Item, exact: bool) -> Result<Vec<String>, BackendError> {
        if exact && attributes.len() != self.key_schema.len() {
            return Err(BackendError::validation(
                "The provided key element does not match the schema",
            ));
        }

        self.key_schema
            .iter()
            .map(|name| match attributes.get(name) {
                Some(value @ (Value::String(_) | Value::Number(_))) => Ok(value.to_string()),
                Some(_) => Err(BackendError::validation(format!(
                    "Invalid type for key attribute '{name}'"
                ))),
                None => Err(BackendError::validation(format!(
                    "Missing the key {name} in the item"
                ))),
            })
            .collect()
    }

    fn key_attributes(&self, item: &Item) -> Item {
        self.key_schema
            .iter()
            .filter_map(|name| item.get(name).map(|value| (name.clone(), value.clone())))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    tables: Mutex<BTreeMap<String, Table>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Self::create_table`]; replaces an existing table.
    pub fn with_table(self, name: impl Into<String>, key_schema: &[&str]) -> Self {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), new_table(key_schema));
        self
    }

    pub fn create_table(
        &self,
        name: impl Into<String>,
        key_schema: &[&str],
    ) -> Result<(), BackendError> {
        let name = name.into();
        if key_schema.is_empty() {
            return Err(BackendError::validation("key schema must not be empty"));
        }

        let mut tables = self.lock()?;
        if tables.contains_key(&name) {
            return Err(BackendError::validation(format!(
                "Table already exists: {name}"
            )));
        }
        tables.insert(name, new_table(key_schema));
        Ok(())
    }

    pub fn item_count(&self, table: &str) -> Option<usize> {
        self.lock()
            .ok()
            .and_then(|tables| tables.get(table).map(|table| table.items.len()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Table>>, BackendError> {
        self.tables
            .lock()
            .map_err(|_| BackendError::service("in-memory table lock poisoned"))
    }
}

fn new_table(key_schema: &[&str]) -> Table {
    Table {
        key_schema: key_schema.iter().map(|name| name.to_string()).collect(),
        items: BTreeMap::new(),
    }
}

fn table_mut<'a>(
    tables: &'a mut BTreeMap<String, Table>,
    name: &str,
) -> Result<&'a mut Table, BackendError> {
    tables.get_mut(name).ok_or_else(|| BackendError::TableNotFound {
        table: name.to_string(),
    })
}

/// Fails with `ConditionalCheckFailed` unless `expression` holds for the
/// stored item; an absent item is checked as an empty one.
fn check_condition(
    expression: Option<&str>,
    scope: Scope<'_>,
    current: Option<&Item>,
) -> Result<(), BackendError> {
    let Some(expression) = expression else {
        return Ok(());
    };
    let condition = Condition::parse(expression, CONDITION_EXPRESSION, scope)?;
    let empty = Item::new();
    if condition.matches(current.unwrap_or(&empty)) {
        Ok(())
    } else {
        Err(BackendError::ConditionalCheckFailed)
    }
}

fn parse_projection(
    expression: Option<&str>,
    scope: Scope<'_>,
) -> Result<Option<Projection>, BackendError> {
    expression
        .map(|expression| Projection::parse(expression, scope))
        .transpose()
}

fn project(projection: Option<&Projection>, item: &Item) -> Item {
    match projection {
        Some(projection) => projection.apply(item),
        None => item.clone(),
    }
}

#[async_trait]
impl DocumentBackend for InMemoryDocumentStore {
    async fn put(&self, params: PutItemParams) -> Result<(), BackendError> {
        let mut tables = self.lock()?;
        let table = table_mut(&mut tables, &params.table_name)?;
        let key = table.encode_key(&params.item, false)?;
        check_condition(
            params.condition_expression.as_deref(),
            Scope::new(
                params.expression_attribute_names.as_ref(),
                params.expression_attribute_values.as_ref(),
            ),
            table.items.get(&key),
        )?;
        table.items.insert(key, params.item);
        Ok(())
    }

    async fn get(&self, params: GetItemParams) -> Result<GetItemOutput, BackendError> {
        let mut tables = self.lock()?;
        let table = table_mut(&mut tables, &params.table_name)?;
        let key = table.encode_key(&params.key, true)?;
        let projection = parse_projection(
            params.projection_expression.as_deref(),
            Scope::new(params.expression_attribute_names.as_ref(), None),
        )?;
        Ok(GetItemOutput {
            item: table
                .items
                .get(&key)
                .map(|item| project(projection.as_ref(), item)),
        })
    }

    async fn delete(&self, params: DeleteItemParams) -> Result<(), BackendError> {
        let mut tables = self.lock()?;
        let table = table_mut(&mut tables, &params.table_name)?;
        let key = table.encode_key(&params.key, true)?;
        check_condition(
            params.condition_expression.as_deref(),
            Scope::new(
                params.expression_attribute_names.as_ref(),
                params.expression_attribute_values.as_ref(),
            ),
            table.items.get(&key),
        )?;
        table.items.remove(&key);
        Ok(())
    }

    async fn scan(&self, params: ScanParams) -> Result<ScanOutput, BackendError> {
        let mut tables = self.lock()?;
        let table = table_mut(&mut tables, &params.table_name)?;
        if params.limit == Some(0) {
            return Err(BackendError::validation("Limit must be greater than zero"));
        }

        let scope = Scope::new(
            params.expression_attribute_names.as_ref(),
            params.expression_attribute_values.as_ref(),
        );
        let filter = params
            .filter_expression
            .as_deref()
            .map(|expression| Condition::parse(expression, FILTER_EXPRESSION, scope))
            .transpose()?;
        let projection = parse_projection(params.projection_expression.as_deref(), scope)?;
        let start = match &params.exclusive_start_key {
            Some(key) => Bound::Excluded(table.encode_key(key, true)?),
            None => Bound::Unbounded,
        };

        let mut remaining = table.items.range((start, Bound::Unbounded));
        let mut items = Vec::new();
        let mut scanned_count = 0;
        let mut last_scanned = None;
        for (_, item) in remaining.by_ref().take(params.limit.unwrap_or(usize::MAX)) {
            scanned_count += 1;
            last_scanned = Some(item);
            let kept = match &filter {
                Some(filter) => filter.matches(item),
                None => true,
            };
            if kept {
                items.push(project(projection.as_ref(), item));
            }
        }

        // A page that stopped at the limit with items left over can be resumed.
        let last_evaluated_key = match (remaining.next(), last_scanned) {
            (Some(_), Some(item)) => Some(table.key_attributes(item)),
            _ => None,
        };
        Ok(ScanOutput {
            count: items.len(),
            scanned_count,
            items,
            last_evaluated_key,
        })
    }
}
