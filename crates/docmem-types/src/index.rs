//! ANN index descriptors for the two supported vector-index dialects.
//!
//! The dialect is a tagged variant (`IndexParams`) chosen once when the
//! adapter is constructed. Index creation and query construction branch on
//! the tag; the two parameter sets never overlap.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::VectorStoreError;

/// Graph degree for disk-oriented indexes.
pub const DEFAULT_DISKANN_MAX_DEGREE: u32 = 32;

/// Candidate list size while building a disk-oriented index.
pub const DEFAULT_DISKANN_L_BUILD: u32 = 50;

/// Graph connectivity for memory-graph indexes.
pub const DEFAULT_HNSW_M: u32 = 16;

/// Candidate list size while building a memory-graph index.
pub const DEFAULT_HNSW_EF_CONSTRUCTION: u32 = 64;

/// The document field holding the embedding vector.
pub const VECTOR_PATH: &str = "embedding";

/// Backing algorithm of a vector index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Disk-oriented graph index. Scales past memory, the default.
    #[default]
    DiskAnn,
    /// Memory-resident navigable small-world graph.
    Hnsw,
}

impl IndexKind {
    /// The `kind` value the store uses in `cosmosSearchOptions`.
    pub fn wire_name(&self) -> &'static str {
        match self {
            IndexKind::DiskAnn => "vector-diskann",
            IndexKind::Hnsw => "vector-hnsw",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "vector-diskann" => Some(IndexKind::DiskAnn),
            "vector-hnsw" => Some(IndexKind::Hnsw),
            _ => None,
        }
    }

    /// Field the similarity query projects the native score into.
    pub fn score_field(&self) -> &'static str {
        match self {
            IndexKind::DiskAnn => "similarityScore",
            IndexKind::Hnsw => "score",
        }
    }

    /// Name of the query-time exploration parameter.
    pub fn search_param(&self) -> &'static str {
        match self {
            IndexKind::DiskAnn => "lSearch",
            IndexKind::Hnsw => "efSearch",
        }
    }

    /// Default build parameters for this kind.
    pub fn default_params(&self) -> IndexParams {
        match self {
            IndexKind::DiskAnn => IndexParams::DiskAnn {
                max_degree: DEFAULT_DISKANN_MAX_DEGREE,
                l_build: DEFAULT_DISKANN_L_BUILD,
            },
            IndexKind::Hnsw => IndexParams::Hnsw {
                m: DEFAULT_HNSW_M,
                ef_construction: DEFAULT_HNSW_EF_CONSTRUCTION,
            },
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::DiskAnn => write!(f, "diskann"),
            IndexKind::Hnsw => write!(f, "hnsw"),
        }
    }
}

impl FromStr for IndexKind {
    type Err = VectorStoreError;

    /// Accepts the short config names and the wire names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "diskann" | "vector-diskann" => Ok(IndexKind::DiskAnn),
            "hnsw" | "vector-hnsw" => Ok(IndexKind::Hnsw),
            other => Err(VectorStoreError::validation(format!(
                "unknown index kind '{other}' (expected 'diskann' or 'hnsw')"
            ))),
        }
    }
}

/// Similarity metric of a vector index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimilarityMetric {
    #[default]
    #[serde(rename = "COS")]
    Cosine,
    #[serde(rename = "IP")]
    InnerProduct,
    #[serde(rename = "L2")]
    Euclidean,
}

impl SimilarityMetric {
    pub fn wire_name(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "COS",
            SimilarityMetric::InnerProduct => "IP",
            SimilarityMetric::Euclidean => "L2",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "COS" => Some(SimilarityMetric::Cosine),
            "IP" => Some(SimilarityMetric::InnerProduct),
            "L2" => Some(SimilarityMetric::Euclidean),
            _ => None,
        }
    }
}

/// Kind-specific build parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IndexParams {
    DiskAnn { max_degree: u32, l_build: u32 },
    Hnsw { m: u32, ef_construction: u32 },
}

impl IndexParams {
    pub fn kind(&self) -> IndexKind {
        match self {
            IndexParams::DiskAnn { .. } => IndexKind::DiskAnn,
            IndexParams::Hnsw { .. } => IndexKind::Hnsw,
        }
    }
}

/// Full description of the vector index a collection should carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub dimensions: u32,
    pub similarity: SimilarityMetric,
    pub params: IndexParams,
}

impl IndexDescriptor {
    /// Descriptor with default build parameters, named `<collection>_vector_index`.
    pub fn for_collection(collection: &str, kind: IndexKind, dimensions: u32) -> Self {
        Self {
            name: Self::index_name(collection),
            dimensions,
            similarity: SimilarityMetric::Cosine,
            params: kind.default_params(),
        }
    }

    pub fn index_name(collection: &str) -> String {
        format!("{collection}_vector_index")
    }

    pub fn kind(&self) -> IndexKind {
        self.params.kind()
    }
}
