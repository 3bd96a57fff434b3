//! Text rendering of CKAN responses.

use super::config::CkanConfig;
use serde_json::Value;
use std::fmt::Write;

const PREVIEW_RECORDS: usize = 5;
const NOTES_PREVIEW_CHARS: usize = 100;

fn str_field<'a>(value: &'a Value, key: &str, default: &'a str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// Render a scalar without JSON quoting for strings.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

pub fn search_results(config: &CkanConfig, datasets: &[Value]) -> String {
    if datasets.is_empty() {
        return format!("No datasets found in {}'s open data portal.", config.city_name);
    }

    let mut out = format!(
        "Found {} dataset(s) in {}'s open data portal:\n\n",
        datasets.len(),
        config.city_name
    );

    for (i, dataset) in datasets.iter().enumerate() {
        let id = str_field(dataset, "id", "unknown");
        let notes = match dataset.get("notes").and_then(Value::as_str) {
            Some(notes) if !notes.is_empty() => {
                format!("{}...", notes.chars().take(NOTES_PREVIEW_CHARS).collect::<String>())
            }
            _ => "No description".to_string(),
        };

        let _ = writeln!(out, "{}. {}", i + 1, str_field(dataset, "title", "Untitled"));
        let _ = writeln!(out, "   ID: {}", id);
        let _ = writeln!(out, "   Description: {}", notes);
        let _ = writeln!(out, "   Portal: {}/dataset/{}", config.portal_url, id);
        out.push('\n');
    }

    let _ = write!(
        out,
        "View all datasets at: {}\nUse get_dataset tool with a dataset ID to get more details.",
        config.portal_url
    );
    out
}

pub fn dataset(config: &CkanConfig, dataset: &Value) -> String {
    let id = str_field(dataset, "id", "unknown");
    let organization = dataset
        .get("organization")
        .and_then(|o| o.get("title"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown");

    let mut lines = vec![
        format!("Dataset: {}", str_field(dataset, "title", "Untitled")),
        format!("ID: {}", id),
        format!("Organization: {}", organization),
        format!("Description: {}", str_field(dataset, "notes", "No description")),
        String::new(),
        format!("Portal URL: {}/dataset/{}", config.portal_url, id),
        String::new(),
    ];

    let resources = dataset
        .get("resources")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    if resources.is_empty() {
        lines.push("No resources available for this dataset.".to_string());
    } else {
        lines.push(format!("Resources ({}):", resources.len()));
        for (i, resource) in resources.iter().enumerate() {
            let res_id = str_field(resource, "id", "unknown");
            lines.push(format!(
                "  {}. {} ({})",
                i + 1,
                str_field(resource, "name", "Unnamed"),
                str_field(resource, "format", "unknown")
            ));
            lines.push(format!("     Resource ID: {}", res_id));
            lines.push(format!(
                "     Use query_data tool with resource_id='{}' to query this data",
                res_id
            ));
        }
    }

    lines.join("\n")
}

pub fn query_results(records: &[Value], limit: i64) -> String {
    if records.is_empty() {
        return "No records found matching the query.".to_string();
    }

    let mut lines = vec![format!(
        "Found {} record(s) (showing up to {}):\n",
        records.len(),
        limit
    )];

    for (i, record) in records.iter().take(PREVIEW_RECORDS).enumerate() {
        lines.push(format!("Record {}:", i + 1));
        if let Some(fields) = record.as_object() {
            for (key, value) in fields.iter().filter(|(k, _)| k.as_str() != "_id") {
                lines.push(format!("  {}: {}", key, display(value)));
            }
        }
        lines.push(String::new());
    }

    if records.len() > PREVIEW_RECORDS {
        lines.push(format!(
            "... and {} more record(s)",
            records.len() - PREVIEW_RECORDS
        ));
    }

    lines.join("\n")
}

pub fn schema(fields: &[Value]) -> String {
    if fields.is_empty() {
        return "No schema information available.".to_string();
    }

    let mut lines = vec!["Schema fields:".to_string()];
    for field in fields {
        lines.push(format!(
            "  • {} ({})",
            str_field(field, "id", "unknown"),
            str_field(field, "type", "unknown")
        ));
        let label = field
            .get("info")
            .and_then(|info| info.get("label"))
            .and_then(Value::as_str)
            .unwrap_or("");
        if !label.is_empty() {
            lines.push(format!("    {}", label));
        }
    }

    lines.join("\n")
}

/// Render a `datastore_search_sql` result.
pub fn sql_results(result: &Value) -> String {
    let records = result
        .get("records")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if records.is_empty() {
        return "Query returned no records.".to_string();
    }

    let fields: Vec<&str> = result
        .get("fields")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|f| f.get("id").and_then(Value::as_str))
                .filter(|id| *id != "_id" && *id != "_full_text")
                .collect()
        })
        .unwrap_or_default();

    let mut out = format!("Query returned {} record(s).\n", records.len());
    if !fields.is_empty() {
        let _ = writeln!(out, "Fields: {}", fields.join(", "));
    }
    out.push('\n');

    for (i, record) in records.iter().take(PREVIEW_RECORDS).enumerate() {
        let rendered = serde_json::to_string(record).unwrap_or_else(|_| record.to_string());
        let _ = writeln!(out, "{}. {}", i + 1, rendered);
    }

    if records.len() > PREVIEW_RECORDS {
        let _ = write!(out, "... and {} more record(s)", records.len() - PREVIEW_RECORDS);
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> CkanConfig {
        CkanConfig {
            enabled: true,
            base_url: "https://data.example.gov".to_string(),
            portal_url: "https://portal.example.gov".to_string(),
            city_name: "Springfield".to_string(),
            timeout: 120,
            api_key: None,
        }
    }

    #[test]
    fn test_search_results() {
        let text = search_results(
            &config(),
            &[json!({"id": "parks", "title": "City Parks", "notes": "x".repeat(150)})],
        );

        assert!(text.starts_with("Found 1 dataset(s) in Springfield's open data portal:"));
        assert!(text.contains("1. City Parks"));
        assert!(text.contains(&format!("Description: {}...", "x".repeat(100))));
        assert!(text.contains("Portal: https://portal.example.gov/dataset/parks"));
    }

    #[test]
    fn test_empty_search() {
        assert_eq!(
            search_results(&config(), &[]),
            "No datasets found in Springfield's open data portal."
        );
    }

    #[test]
    fn test_dataset_lists_resources() {
        let text = dataset(
            &config(),
            &json!({
                "id": "parks",
                "title": "City Parks",
                "organization": {"title": "Parks Department"},
                "resources": [{"id": "r1", "name": "Inventory", "format": "CSV"}]
            }),
        );

        assert!(text.contains("Organization: Parks Department"));
        assert!(text.contains("Description: No description"));
        assert!(text.contains("Resources (1):"));
        assert!(text.contains("1. Inventory (CSV)"));
        assert!(text.contains("resource_id='r1'"));
    }

    #[test]
    fn test_query_results_preview() {
        let records: Vec<Value> = (0..7).map(|i| json!({"_id": i, "name": format!("row {i}")})).collect();
        let text = query_results(&records, 100);

        assert!(text.starts_with("Found 7 record(s) (showing up to 100):"));
        assert!(text.contains("  name: row 0"));
        assert!(!text.contains("_id"));
        assert!(!text.contains("row 5"));
        assert!(text.ends_with("... and 2 more record(s)"));
    }

    #[test]
    fn test_schema() {
        let text = schema(&[
            json!({"id": "name", "type": "text", "info": {"label": "Park name"}}),
            json!({"id": "acres", "type": "numeric"}),
        ]);
        assert_eq!(
            text,
            "Schema fields:\n  • name (text)\n    Park name\n  • acres (numeric)"
        );
        assert_eq!(schema(&[]), "No schema information available.");
    }

    #[test]
    fn test_sql_results() {
        let text = sql_results(&json!({
            "records": [{"ward": "1", "n": 4}],
            "fields": [{"id": "_id"}, {"id": "ward"}, {"id": "n"}]
        }));
        assert!(text.contains("Query returned 1 record(s)."));
        assert!(text.contains("Fields: ward, n"));
        assert!(text.contains(r#"1. {"n":4,"ward":"1"}"#) || text.contains(r#"1. {"ward":"1","n":4}"#));
        assert_eq!(sql_results(&json!({"records": []})), "Query returned no records.");
    }
}
