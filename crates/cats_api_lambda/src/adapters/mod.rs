pub mod attribute_value;
pub mod dynamo;
