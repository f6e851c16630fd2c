use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Every algorithm the service can run, keyed by its route name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Leiden,
    Fastgreedy,
    Infomap,
    Labelpropagation,
    Leadingeigenvector,
    Multilevel,
    Drawgraph,
}

/// What kind of result an algorithm produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    Clustering,
    Embedding,
}

impl Algorithm {
    pub const ALL: [Algorithm; 7] = [
        Algorithm::Leiden,
        Algorithm::Fastgreedy,
        Algorithm::Infomap,
        Algorithm::Labelpropagation,
        Algorithm::Leadingeigenvector,
        Algorithm::Multilevel,
        Algorithm::Drawgraph,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Leiden => "leiden",
            Algorithm::Fastgreedy => "fastgreedy",
            Algorithm::Infomap => "infomap",
            Algorithm::Labelpropagation => "labelpropagation",
            Algorithm::Leadingeigenvector => "leadingeigenvector",
            Algorithm::Multilevel => "multilevel",
            Algorithm::Drawgraph => "drawgraph",
        }
    }

    pub fn kind(self) -> AlgorithmKind {
        match self {
            Algorithm::Drawgraph => AlgorithmKind::Embedding,
            _ => AlgorithmKind::Clustering,
        }
    }

    /// Option names the algorithm understands. Others are ignored.
    pub fn option_names(self) -> &'static [&'static str] {
        match self {
            Algorithm::Leiden => &["objective_function", "resolution", "beta", "iterations", "seed"],
            Algorithm::Fastgreedy => &[],
            Algorithm::Infomap => &["trials", "seed"],
            Algorithm::Labelpropagation => &["iterations", "seed"],
            Algorithm::Leadingeigenvector => &["clusters"],
            Algorithm::Multilevel => &["resolution"],
            Algorithm::Drawgraph => &["iterations", "seed"],
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ComputeError::UnknownAlgorithm(s.to_string()))
    }
}
