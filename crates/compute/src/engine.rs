use std::time::Instant;

use netjobs_core::GraphPayload;
use netjobs_graph::GraphStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::algorithms::communities::{label_propagation, LabelPropagationParams};
use crate::algorithms::fastgreedy::fastgreedy;
use crate::algorithms::infomap::{infomap, InfomapParams};
use crate::algorithms::layout::{fruchterman_reingold, LayoutParams};
use crate::algorithms::leading_eigenvector::{leading_eigenvector, LeadingEigenvectorParams};
use crate::algorithms::leiden::{leiden, LeidenParams};
use crate::algorithms::multilevel::{multilevel, MultilevelParams};
use crate::algorithms::network::{modularity, renumber, Network};
use crate::catalog::Algorithm;
use crate::error::ComputeError;
use crate::options::AlgorithmOptions;

/// Everything a worker needs to run one job. This is also the JSON
/// document handed to an out-of-process worker on stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeRequest {
    pub algorithm: Algorithm,
    #[serde(default)]
    pub options: AlgorithmOptions,
    pub graph: GraphPayload,
}

impl ComputeRequest {
    /// Build a request, rejecting options the algorithm cannot parse.
    pub fn new(
        algorithm: Algorithm,
        options: AlgorithmOptions,
        graph: GraphPayload,
    ) -> Result<Self, ComputeError> {
        let request = Self {
            algorithm,
            options,
            graph,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        Params::parse(self.algorithm, &self.options).map(|_| ())
    }
}

enum Params {
    Clustering(ClusteringParams),
    Layout(LayoutParams),
}

enum ClusteringParams {
    Leiden(LeidenParams),
    Fastgreedy,
    Infomap(InfomapParams),
    LabelPropagation(LabelPropagationParams),
    LeadingEigenvector(LeadingEigenvectorParams),
    Multilevel(MultilevelParams),
}

impl Params {
    fn parse(algorithm: Algorithm, options: &AlgorithmOptions) -> Result<Self, ComputeError> {
        use ClusteringParams as C;
        let clustering = match algorithm {
            Algorithm::Drawgraph => return Ok(Params::Layout(LayoutParams::from_options(options)?)),
            Algorithm::Leiden => C::Leiden(LeidenParams::from_options(options)?),
            Algorithm::Fastgreedy => C::Fastgreedy,
            Algorithm::Infomap => C::Infomap(InfomapParams::from_options(options)?),
            Algorithm::Labelpropagation => {
                C::LabelPropagation(LabelPropagationParams::from_options(options)?)
            }
            Algorithm::Leadingeigenvector => {
                C::LeadingEigenvector(LeadingEigenvectorParams::from_options(options)?)
            }
            Algorithm::Multilevel => C::Multilevel(MultilevelParams::from_options(options)?),
        };
        Ok(Params::Clustering(clustering))
    }
}

/// Run one request to completion.
///
/// `progress` receives short human-readable phase descriptions; the caller
/// decides where they go (a status record, a pipe, a log).
pub fn execute(
    request: &ComputeRequest,
    progress: &mut dyn FnMut(&str),
) -> Result<Value, ComputeError> {
    let start = Instant::now();
    let params = Params::parse(request.algorithm, &request.options)?;

    let graph = GraphStore::from_payload(&request.graph);
    let stats = graph.stats();
    info!(
        algorithm = %request.algorithm,
        vertices = stats.vertex_count,
        edges = stats.edge_count,
        isolated = stats.isolated_count,
        "graph built"
    );
    progress(&format!(
        "running {} on {} vertices and {} edges",
        request.algorithm, stats.vertex_count, stats.edge_count
    ));

    let output = match params {
        Params::Layout(p) => layout_output(&graph, &fruchterman_reingold(&graph, &p))?,
        Params::Clustering(p) => {
            let network = Network::from_store(&graph);
            let (membership, codelength) = match p {
                ClusteringParams::Leiden(p) => (leiden(&network, &p), None),
                ClusteringParams::Fastgreedy => (fastgreedy(&network), None),
                ClusteringParams::Infomap(p) => {
                    let result = infomap(&network, &p);
                    (result.membership, Some(result.codelength))
                }
                ClusteringParams::LabelPropagation(p) => (label_propagation(&graph, &p), None),
                ClusteringParams::LeadingEigenvector(p) => {
                    (leading_eigenvector(&network, &p), None)
                }
                ClusteringParams::Multilevel(p) => (multilevel(&network, &p), None),
            };
            clustering_output(&graph, &network, membership, codelength)?
        }
    };

    info!(
        algorithm = %request.algorithm,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "computation finished"
    );
    progress("formatting result");
    Ok(output)
}

fn clustering_output(
    graph: &GraphStore,
    network: &Network,
    mut membership: Vec<usize>,
    codelength: Option<f64>,
) -> Result<Value, ComputeError> {
    let community_count = renumber(&mut membership);
    let q = modularity(network, &membership, 1.0);
    if !q.is_finite() {
        return Err(ComputeError::Failed(
            "modularity is not finite; edge weights overflow".to_string(),
        ));
    }

    let communities: Map<String, Value> = graph
        .names()
        .iter()
        .zip(&membership)
        .map(|(name, &label)| (name.clone(), json!(label)))
        .collect();

    let mut out = Map::new();
    out.insert("communities".to_string(), Value::Object(communities));
    out.insert("community_count".to_string(), json!(community_count));
    out.insert("modularity".to_string(), json!(q));
    if let Some(codelength) = codelength {
        out.insert("codelength".to_string(), json!(codelength));
    }
    Ok(Value::Object(out))
}

fn layout_output(graph: &GraphStore, layout: &[[f64; 2]]) -> Result<Value, ComputeError> {
    if layout.iter().flatten().any(|c| !c.is_finite()) {
        return Err(ComputeError::Failed("layout diverged".to_string()));
    }
    let positions: Map<String, Value> = graph
        .names()
        .iter()
        .zip(layout)
        .map(|(name, p)| (name.clone(), json!([p[0], p[1]])))
        .collect();
    Ok(json!({ "layout": positions }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(algorithm: Algorithm, options: &[(&str, &str)]) -> ComputeRequest {
        let graph = GraphPayload::from_value(&json!({
            "nodes": ["a", "b", "c", "d"],
            "edges": [["a", "b", 1.0], ["b", "c", 2.0], ["c", "d", 1.5]],
        }))
        .unwrap();
        ComputeRequest::new(algorithm, options.iter().copied().collect(), graph).unwrap()
    }

    #[test]
    fn every_clustering_labels_every_vertex() {
        for algorithm in Algorithm::ALL {
            if algorithm == Algorithm::Drawgraph {
                continue;
            }
            let out = execute(&request(algorithm, &[]), &mut |_| {}).unwrap();
            let communities = out["communities"].as_object().unwrap();
            assert_eq!(communities.len(), 4, "{}", algorithm);

            let k = out["community_count"].as_u64().unwrap() as usize;
            assert!((1..=4).contains(&k), "{}: {} communities", algorithm, k);
            for label in communities.values() {
                assert!((label.as_u64().unwrap() as usize) < k);
            }
            assert!(out["modularity"].is_f64());
        }
    }

    #[test]
    fn labels_start_at_zero_in_vertex_order() {
        let out = execute(&request(Algorithm::Fastgreedy, &[]), &mut |_| {}).unwrap();
        assert_eq!(out["communities"]["a"], json!(0));
    }

    #[test]
    fn infomap_reports_codelength() {
        let out = execute(&request(Algorithm::Infomap, &[("trials", "2")]), &mut |_| {}).unwrap();
        assert!(out["codelength"].as_f64().unwrap() > 0.0);
        let out = execute(&request(Algorithm::Leiden, &[]), &mut |_| {}).unwrap();
        assert!(out.get("codelength").is_none());
    }

    #[test]
    fn drawgraph_returns_layout() {
        let out = execute(&request(Algorithm::Drawgraph, &[("iterations", "50")]), &mut |_| {}).unwrap();
        let layout = out["layout"].as_object().unwrap();
        assert_eq!(layout.len(), 4);
        assert_eq!(layout["a"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn progress_is_reported() {
        let mut messages = Vec::new();
        execute(&request(Algorithm::Multilevel, &[]), &mut |m| messages.push(m.to_string())).unwrap();
        assert!(messages[0].starts_with("running multilevel"));
        assert_eq!(messages.last().map(String::as_str), Some("formatting result"));
    }

    #[test]
    fn bad_options_are_rejected_up_front() {
        let graph = GraphPayload::from_value(&json!({ "edges": [["a", "b"]] })).unwrap();
        let options: AlgorithmOptions = [("objective_function", "surprise")].into_iter().collect();
        let err = ComputeRequest::new(Algorithm::Leiden, options, graph).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidInput(_)));
    }

    #[test]
    fn request_round_trips_through_json() {
        let req = request(Algorithm::Leiden, &[("seed", "3")]);
        let text = serde_json::to_string(&req).unwrap();
        assert!(text.contains("\"algorithm\":\"leiden\""));
        let back: ComputeRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn overflowing_weights_fail_instead_of_null_modularity() {
        // Deserialized requests skip payload validation.
        let graph: GraphPayload = serde_json::from_value(json!({
            "edges": [
                { "source": "a", "target": "b", "weight": 1e308 },
                { "source": "b", "target": "c", "weight": 1e308 },
            ],
        }))
        .unwrap();
        let req = ComputeRequest::new(Algorithm::Leiden, AlgorithmOptions::new(), graph).unwrap();
        let err = execute(&req, &mut |_| {}).unwrap_err();
        assert!(matches!(err, ComputeError::Failed(ref m) if m.contains("not finite")), "{err}");
    }

    #[test]
    fn empty_graph_is_not_an_error() {
        let graph = GraphPayload::from_value(&json!({ "edges": [] })).unwrap();
        let req = ComputeRequest::new(Algorithm::Leiden, AlgorithmOptions::new(), graph).unwrap();
        let out = execute(&req, &mut |_| {}).unwrap();
        assert_eq!(out["community_count"], json!(0));
    }
}
