//! Comma-separated edge lists: one `source,target[,weight]` per line.

use serde_json::{json, Value};

use crate::error::ClientError;

/// Turn an edge list into a submission payload. Blank lines and lines
/// starting with `#` are skipped.
pub fn parse_edge_list(text: &str) -> Result<Value, ClientError> {
    let mut edges = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let err = |reason: String| ClientError::EdgeList {
            line: index + 1,
            reason,
        };

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let (source, target, weight) = match fields.as_slice() {
            [source, target] => (*source, *target, 1.0),
            [source, target, weight] => {
                let weight: f64 = weight
                    .parse()
                    .map_err(|_| err(format!("weight '{weight}' is not a number")))?;
                (*source, *target, weight)
            }
            _ => {
                return Err(err(format!(
                    "expected 2 or 3 fields, found {}",
                    fields.len()
                )))
            }
        };
        if source.is_empty() || target.is_empty() {
            return Err(err("empty vertex name".to_string()));
        }
        edges.push(json!([source, target, weight]));
    }
    Ok(json!({ "nodes": [], "edges": edges }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_weighted_and_unweighted_lines() {
        let payload = parse_edge_list("a,b,2.5\n\n# comment\n b , c \n").unwrap();
        assert_eq!(
            payload,
            json!({ "nodes": [], "edges": [["a", "b", 2.5], ["b", "c", 1.0]] })
        );
    }

    #[test]
    fn reports_line_numbers() {
        let err = parse_edge_list("a,b\nc\n").unwrap_err();
        assert!(matches!(err, ClientError::EdgeList { line: 2, .. }));

        let err = parse_edge_list("a,b,heavy").unwrap_err();
        assert!(err.to_string().contains("heavy"));
    }

    #[test]
    fn empty_input_has_no_edges() {
        assert_eq!(parse_edge_list("").unwrap()["edges"], json!([]));
    }
}
