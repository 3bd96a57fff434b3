//! Builds aggregation queries for the CKAN datastore.

use opencontext_core::Arguments;
use serde_json::Value;

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 10_000;

/// Structured input of the `aggregate_data` tool.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub resource_id: String,
    pub group_by: Vec<String>,
    /// `(alias, expression)` pairs, sorted by alias.
    pub metrics: Vec<(String, String)>,
    pub filters: Vec<(String, Value)>,
    pub having: Option<String>,
    pub order_by: Option<String>,
    pub limit: i64,
}

impl AggregateQuery {
    /// Read the tool arguments. The error is the user-facing message.
    pub fn from_arguments(arguments: &Arguments) -> Result<Self, String> {
        let resource_id = arguments
            .get("resource_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or("resource_id is required")?
            .to_string();

        let group_by = match arguments.get("group_by") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(column)) => vec![column.clone()],
            Some(Value::Array(columns)) => columns
                .iter()
                .map(|c| {
                    c.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| "group_by must be a list of column names".to_string())
                })
                .collect::<Result<Vec<_>, String>>()?,
            Some(_) => return Err("group_by must be a list of column names".to_string()),
        };

        let mut metrics = match arguments.get("metrics") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(alias, expr)| {
                    expr.as_str()
                        .map(|e| (alias.clone(), e.to_string()))
                        .ok_or_else(|| format!("metric '{}' must be an SQL expression string", alias))
                })
                .collect::<Result<Vec<_>, String>>()?,
            Some(_) => return Err("metrics must map aliases to SQL expressions".to_string()),
        };
        metrics.sort();

        if group_by.is_empty() && metrics.is_empty() {
            return Err("At least one of group_by or metrics is required".to_string());
        }

        let filters = match arguments.get("filters") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Some(_) => return Err("filters must be an object of field: value pairs".to_string()),
        };

        let text = |key: &str| {
            arguments
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let limit = arguments
            .get("limit")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT);

        Ok(Self {
            resource_id,
            group_by,
            metrics,
            filters,
            having: text("having"),
            order_by: text("order_by"),
            limit,
        })
    }

    /// Render the query text.
    pub fn to_sql(&self) -> Result<String, String> {
        let mut columns: Vec<String> = self.group_by.iter().map(|c| quote_identifier(c)).collect();
        columns.extend(
            self.metrics
                .iter()
                .map(|(alias, expr)| format!("{} AS {}", expr, quote_identifier(alias))),
        );

        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote_identifier(&self.resource_id)
        );

        if !self.filters.is_empty() {
            let conditions = self
                .filters
                .iter()
                .map(|(field, value)| condition(field, value))
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if !self.group_by.is_empty() {
            let group: Vec<String> = self.group_by.iter().map(|c| quote_identifier(c)).collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&group.join(", "));
        }

        if let Some(having) = &self.having {
            sql.push_str(" HAVING ");
            sql.push_str(having);
        }

        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }

        sql.push_str(&format!(" LIMIT {}", self.limit));
        Ok(sql)
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn condition(field: &str, value: &Value) -> Result<String, String> {
    let column = quote_identifier(field);
    match value {
        Value::Null => Ok(format!("{} IS NULL", column)),
        Value::String(s) => Ok(format!("{} = {}", column, quote_literal(s))),
        Value::Number(n) => Ok(format!("{} = {}", column, n)),
        Value::Bool(b) => Ok(format!("{} = {}", column, b)),
        Value::Array(_) | Value::Object(_) => {
            Err(format!("Unsupported filter value for field '{}'", field))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RESOURCE: &str = "a1b2c3d4-e5f6-7890-abcd-ef1234567890";

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_full_query() {
        let query = AggregateQuery::from_arguments(&args(json!({
            "resource_id": RESOURCE,
            "group_by": ["neighborhood"],
            "metrics": {"total": "COUNT(*)"},
            "filters": {"closed_at": null, "status": "Open", "year": 2024},
            "having": "COUNT(*) > 5",
            "order_by": "total DESC",
            "limit": 50
        })))
        .unwrap();

        assert_eq!(
            query.to_sql().unwrap(),
            format!(
                "SELECT \"neighborhood\", COUNT(*) AS \"total\" FROM \"{RESOURCE}\" \
                 WHERE \"closed_at\" IS NULL AND \"status\" = 'Open' AND \"year\" = 2024 \
                 GROUP BY \"neighborhood\" HAVING COUNT(*) > 5 ORDER BY total DESC LIMIT 50"
            )
        );
    }

    #[test]
    fn test_metrics_sorted_by_alias() {
        let query = AggregateQuery::from_arguments(&args(json!({
            "resource_id": RESOURCE,
            "metrics": {"total": "COUNT(*)", "average": "AVG(amount)"}
        })))
        .unwrap();

        assert_eq!(
            query.metrics,
            vec![
                ("average".to_string(), "AVG(amount)".to_string()),
                ("total".to_string(), "COUNT(*)".to_string()),
            ]
        );
    }

    #[test]
    fn test_string_values_escaped() {
        let query = AggregateQuery::from_arguments(&args(json!({
            "resource_id": RESOURCE,
            "metrics": {"n": "COUNT(*)"},
            "filters": {"name": "O'Brien"}
        })))
        .unwrap();

        let sql = query.to_sql().unwrap();
        assert!(sql.contains("\"name\" = 'O''Brien'"));
        assert!(sql.ends_with("LIMIT 100"));
    }

    #[test]
    fn test_identifier_quotes_doubled() {
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_limit_clamped() {
        let base = json!({"resource_id": RESOURCE, "group_by": ["a"]});

        let mut high = base.clone();
        high["limit"] = json!(1_000_000);
        assert_eq!(AggregateQuery::from_arguments(&args(high)).unwrap().limit, MAX_LIMIT);

        let mut low = base;
        low["limit"] = json!(-3);
        assert_eq!(AggregateQuery::from_arguments(&args(low)).unwrap().limit, 1);
    }

    #[test]
    fn test_requires_group_by_or_metrics() {
        let err = AggregateQuery::from_arguments(&args(json!({"resource_id": RESOURCE}))).unwrap_err();
        assert!(err.contains("required"));
    }

    #[test]
    fn test_requires_resource_id() {
        let err = AggregateQuery::from_arguments(&args(json!({"group_by": ["a"]}))).unwrap_err();
        assert_eq!(err, "resource_id is required");
    }

    #[test]
    fn test_rejects_nested_filter_values() {
        let query = AggregateQuery::from_arguments(&args(json!({
            "resource_id": RESOURCE,
            "group_by": ["a"],
            "filters": {"tags": ["x", "y"]}
        })))
        .unwrap();
        assert!(query.to_sql().unwrap_err().contains("tags"));
    }
}
