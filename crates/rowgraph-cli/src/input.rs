//! Turning command line input into catalogs, parameters and queries.

use std::path::Path;

use anyhow::{Context, bail};
use rowgraph::{Catalog, JoinGraph, SelectQuery, SqlValue};

/// Loads a JSON catalog.
pub fn load_catalog(path: Option<&Path>) -> anyhow::Result<Catalog> {
    let Some(path) = path else {
        bail!("no schema given: pass --schema or set ROWGRAPH_SCHEMA");
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading schema {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing schema {}", path.display()))
}

/// Parses a parameter: an integer, a real, `null`, or else text.
pub fn parse_param(raw: &str) -> SqlValue {
    if raw.eq_ignore_ascii_case("null") {
        return SqlValue::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return SqlValue::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return SqlValue::Float(f);
        }
    }
    SqlValue::Text(raw.to_string())
}

/// Fragments and modifiers of a SELECT, as given on the command line.
#[derive(Debug, Default)]
pub struct SelectSpec {
    pub filters: Vec<String>,
    pub params: Vec<String>,
    pub group_by: Vec<String>,
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Builds the SELECT for `entity`. Parameters are handed to the WHERE
/// fragments in order, one per `?`.
pub fn build_select(
    catalog: &Catalog,
    entity: &str,
    spec: &SelectSpec,
) -> anyhow::Result<SelectQuery> {
    let graph = JoinGraph::build(catalog, entity)?;
    let mut query = SelectQuery::new(graph);

    let mut params = spec.params.iter().map(|p| parse_param(p));
    for filter in &spec.filters {
        let wanted = filter.matches('?').count();
        let taken: Vec<SqlValue> = params.by_ref().take(wanted).collect();
        if taken.len() != wanted {
            bail!("`{filter}` needs {wanted} parameter(s), only {} left", taken.len());
        }
        query = query.filter(filter, taken);
    }
    let unused = params.count();
    if unused > 0 {
        bail!("{unused} parameter(s) left without a placeholder");
    }

    for expr in &spec.group_by {
        query = query.group_by(expr);
    }
    for expr in &spec.order_by {
        query = query.order_by(expr);
    }
    if let Some(limit) = spec.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = spec.offset {
        query = query.offset(offset);
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SCHEMA: &str = r#"{
        "entities": [
            {
                "name": "Article",
                "table": "article",
                "fields": [
                    {"name": "id", "kind": "column", "column": "id", "primary_key": true},
                    {"name": "title", "kind": "column", "column": "title"},
                    {"name": "tags", "kind": "values", "linktable": "article_tag", "column": "tag"}
                ]
            }
        ]
    }"#;

    fn catalog() -> Catalog {
        serde_json::from_str(SCHEMA).unwrap()
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("42"), SqlValue::Int(42));
        assert_eq!(parse_param("-1.5"), SqlValue::Float(-1.5));
        assert_eq!(parse_param("NULL"), SqlValue::Null);
        assert_eq!(parse_param("John"), SqlValue::Text("John".into()));
        assert_eq!(parse_param("inf"), SqlValue::Text("inf".into()));
    }

    #[test]
    fn test_load_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SCHEMA.as_bytes()).unwrap();
        let catalog = load_catalog(Some(file.path())).unwrap();
        assert_eq!(catalog.table_of("Article").unwrap(), "article");
    }

    #[test]
    fn test_load_catalog_errors() {
        assert!(load_catalog(None).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let err = load_catalog(Some(file.path())).unwrap_err();
        assert!(err.to_string().starts_with("parsing schema"));
    }

    #[test]
    fn test_build_select_assigns_params_in_order() {
        let spec = SelectSpec {
            filters: vec!["`article`.id > ?".into(), "tags.tag IN (?, ?)".into()],
            params: vec!["3".into(), "rust".into(), "sql".into()],
            order_by: vec!["`article`.id".into()],
            limit: Some(5),
            ..SelectSpec::default()
        };
        let expr = build_select(&catalog(), "Article", &spec).unwrap().to_expression();
        assert!(expr.sql().contains("\nWHERE (`article`.id > ?)\n AND (tags.tag IN (?, ?))"));
        assert!(expr.sql().ends_with("\nORDER BY `article`.id\nLIMIT 5"));
        assert_eq!(
            expr.params(),
            &[
                SqlValue::Int(3),
                SqlValue::Text("rust".into()),
                SqlValue::Text("sql".into())
            ]
        );
    }

    #[test]
    fn test_build_select_checks_param_count() {
        let missing = SelectSpec {
            filters: vec!["`article`.id = ?".into()],
            ..SelectSpec::default()
        };
        assert!(build_select(&catalog(), "Article", &missing).is_err());

        let extra = SelectSpec {
            params: vec!["1".into()],
            ..SelectSpec::default()
        };
        assert!(build_select(&catalog(), "Article", &extra).is_err());
    }

    #[test]
    fn test_build_select_unknown_entity() {
        let err = build_select(&catalog(), "Nope", &SelectSpec::default()).unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }
}
