//! Graph submission payload: `{"nodes": [...], "edges": [[from, to, weight], ...]}`.
//!
//! Validation happens here, once, at submission time. Everything downstream
//! (workers, algorithms) receives an already well-formed [`GraphPayload`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PayloadError;

/// One weighted, undirected edge between two named vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEdge {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

/// A structurally valid graph submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    /// Vertices listed explicitly (may include isolated ones).
    #[serde(default)]
    pub nodes: Vec<String>,
    pub edges: Vec<WeightedEdge>,
}

impl GraphPayload {
    /// Parse raw upload bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PayloadError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| PayloadError::Json(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Validate the loosely-typed wire form.
    ///
    /// `edges` is required. `nodes` is optional. Vertex ids may be strings
    /// or numbers; weights may be numbers or numeric strings and default to
    /// 1.0 for two-element edges.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        let obj = value.as_object().ok_or(PayloadError::NotAnObject)?;

        let raw_edges = obj.get("edges").ok_or(PayloadError::MissingField("edges"))?;
        let raw_edges = raw_edges.as_array().ok_or(PayloadError::WrongType {
            field: "edges",
            expected: "an array",
        })?;

        let mut edges = Vec::with_capacity(raw_edges.len());
        let mut total = 0.0_f64;
        for (index, raw) in raw_edges.iter().enumerate() {
            let edge = parse_edge(index, raw)?;
            total += edge.weight;
            edges.push(edge);
        }
        // Modularity divides by twice the total weight.
        if !(2.0 * total).is_finite() {
            return Err(PayloadError::WeightOverflow);
        }

        let nodes = match obj.get("nodes") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    vertex_name(item).ok_or_else(|| PayloadError::InvalidNode {
                        index,
                        reason: "vertex id must be a string or a number".to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(PayloadError::WrongType {
                    field: "nodes",
                    expected: "an array",
                })
            }
        };

        Ok(Self { nodes, edges })
    }

    /// Distinct vertex count (explicit nodes plus edge endpoints).
    pub fn vertex_count(&self) -> usize {
        let mut seen = std::collections::HashSet::new();
        for n in &self.nodes {
            seen.insert(n.as_str());
        }
        for e in &self.edges {
            seen.insert(e.source.as_str());
            seen.insert(e.target.as_str());
        }
        seen.len()
    }
}

fn parse_edge(index: usize, raw: &Value) -> Result<WeightedEdge, PayloadError> {
    let invalid = |reason: &str| PayloadError::InvalidEdge {
        index,
        reason: reason.to_string(),
    };

    let parts = raw
        .as_array()
        .ok_or_else(|| invalid("edge must be an array [from, to, weight]"))?;
    if parts.len() < 2 || parts.len() > 3 {
        return Err(invalid("edge must have 2 or 3 elements"));
    }

    let source = vertex_name(&parts[0]).ok_or_else(|| invalid("'from' must be a string or a number"))?;
    let target = vertex_name(&parts[1]).ok_or_else(|| invalid("'to' must be a string or a number"))?;

    let weight = match parts.get(2) {
        None | Some(Value::Null) => 1.0,
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| invalid("weight is not representable"))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid("weight must be numeric"))?,
        Some(_) => return Err(invalid("weight must be numeric")),
    };

    if !weight.is_finite() || weight < 0.0 {
        return Err(invalid("weight must be a finite, non-negative number"));
    }

    Ok(WeightedEdge {
        source,
        target,
        weight,
    })
}

fn vertex_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
