//! Tool descriptors offered by the CKAN provider.

use opencontext_core::provider::{
    json_schema_array, json_schema_integer, json_schema_map, json_schema_object,
    json_schema_string,
};
use opencontext_core::ToolDescriptor;
use serde_json::json;

pub const SEARCH_DATASETS: &str = "search_datasets";
pub const GET_DATASET: &str = "get_dataset";
pub const QUERY_DATA: &str = "query_data";
pub const GET_SCHEMA: &str = "get_schema";
pub const EXECUTE_SQL: &str = "execute_sql";
pub const AGGREGATE_DATA: &str = "aggregate_data";

pub fn descriptors(city_name: &str) -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            SEARCH_DATASETS,
            format!("Search for datasets in {}'s open data portal", city_name),
            json_schema_object(
                json!({
                    "query": json_schema_string("Search query string"),
                    "limit": json_schema_integer("Maximum number of results (default: 20)", 20),
                }),
                vec!["query"],
            ),
        ),
        ToolDescriptor::new(
            GET_DATASET,
            format!(
                "Get detailed information about a specific dataset from {}'s open data portal",
                city_name
            ),
            json_schema_object(
                json!({"dataset_id": json_schema_string("Dataset ID or name")}),
                vec!["dataset_id"],
            ),
        ),
        ToolDescriptor::new(
            QUERY_DATA,
            format!(
                "Query data from a specific resource in {}'s open data portal",
                city_name
            ),
            json_schema_object(
                json!({
                    "resource_id": json_schema_string("Resource ID to query"),
                    "filters": json_schema_map("Optional filters (field: value pairs)"),
                    "limit": json_schema_integer("Maximum number of records (default: 100)", 100),
                }),
                vec!["resource_id"],
            ),
        ),
        ToolDescriptor::new(
            GET_SCHEMA,
            format!(
                "Get schema information for a resource in {}'s open data portal",
                city_name
            ),
            json_schema_object(
                json!({"resource_id": json_schema_string("Resource ID")}),
                vec!["resource_id"],
            ),
        ),
        ToolDescriptor::new(
            EXECUTE_SQL,
            "Execute a read-only SQL SELECT query against the datastore. \
             Tables are referenced by resource ID in double quotes, \
             e.g. SELECT * FROM \"<resource-id>\" LIMIT 10",
            json_schema_object(
                json!({"sql": json_schema_string("A single SELECT statement")}),
                vec!["sql"],
            ),
        ),
        ToolDescriptor::new(
            AGGREGATE_DATA,
            format!(
                "Aggregate records of a resource in {}'s open data portal \
                 (GROUP BY with metrics such as COUNT, SUM, AVG)",
                city_name
            ),
            json_schema_object(
                json!({
                    "resource_id": json_schema_string("Resource ID to aggregate"),
                    "group_by": json_schema_array(
                        json_schema_string("Column name"),
                        "Columns to group by",
                    ),
                    "metrics": json_schema_map(
                        "Metrics as alias: SQL expression, e.g. {\"total\": \"COUNT(*)\"}",
                    ),
                    "filters": json_schema_map("Equality filters (field: value pairs)"),
                    "having": json_schema_string("Optional HAVING condition"),
                    "order_by": json_schema_string("Optional ORDER BY clause"),
                    "limit": json_schema_integer("Maximum number of rows (1-10000, default: 100)", 100),
                }),
                vec!["resource_id"],
            ),
        ),
    ]
}
