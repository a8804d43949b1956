//! Plain records carried from a task's `work` closure to its `on_complete`.

use serde::Serialize;

use crate::error::Result;
use crate::library::{Chunking, NcLibrary, StorageFormat};
use crate::types::{HostObject, HostValue};

/// An opened or created file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    /// Root group ncid.
    pub id: i32,
    /// Storage family reported by the library.
    pub format: StorageFormat,
    /// Name of the root group.
    pub group_name: String,
}

/// A group handle and its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupResult {
    /// Group ncid.
    pub id: i32,
    /// Group name.
    pub name: String,
}

/// One dimension as seen from a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionInfo {
    /// Dimension id.
    pub id: i32,
    /// Dimension name.
    pub name: String,
    /// Current length; grows for unlimited dimensions.
    pub len: usize,
    /// `true` for an unlimited dimension.
    pub unlimited: bool,
}

impl DimensionInfo {
    /// Queries dimension `dimid`; `unlimited` lists the unlimited dimension
    /// ids visible from `ncid`.
    pub(crate) fn query(library: &dyn NcLibrary, ncid: i32, dimid: i32, unlimited: &[i32]) -> Result<Self> {
        let (name, len) = library.inq_dim(ncid, dimid)?;
        Ok(Self {
            id: dimid,
            name,
            len,
            unlimited: unlimited.contains(&dimid),
        })
    }
}

impl From<DimensionInfo> for HostObject {
    fn from(info: DimensionInfo) -> Self {
        HostObject::new()
            .with("id", info.id)
            .with("name", info.name)
            .with("length", info.len as f64)
            .with("unlimited", info.unlimited)
    }
}

/// One variable of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableInfo {
    /// Variable id.
    pub id: i32,
    /// Ncid of the group holding the variable.
    pub parent_id: i32,
    /// Variable name.
    pub name: String,
    /// Raw type code.
    pub kind_code: i32,
    /// Dimension ids, outermost first.
    pub dim_ids: Vec<i32>,
    /// Number of attributes.
    pub natts: usize,
}

impl VariableInfo {
    pub(crate) fn query(library: &dyn NcLibrary, parent_id: i32, varid: i32) -> Result<Self> {
        let meta = library.inq_var(parent_id, varid)?;
        Ok(Self {
            id: varid,
            parent_id,
            name: meta.name,
            kind_code: meta.type_code,
            dim_ids: meta.dim_ids,
            natts: meta.natts,
        })
    }
}

/// Compression settings of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeflateInfo {
    /// Shuffle filter enabled.
    pub shuffle: bool,
    /// Deflate filter enabled.
    pub deflate: bool,
    /// Deflate level, 0..=9.
    pub level: i32,
}

impl From<DeflateInfo> for HostObject {
    fn from(info: DeflateInfo) -> Self {
        HostObject::new()
            .with("shuffle", info.shuffle)
            .with("deflate", info.deflate)
            .with("level", info.level)
    }
}

/// Storage layout of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkInfo {
    /// Layout.
    pub mode: Chunking,
    /// Chunk size per dimension; empty unless chunked.
    pub sizes: Vec<usize>,
}

impl From<ChunkInfo> for HostObject {
    fn from(info: ChunkInfo) -> Self {
        let sizes: Vec<HostValue> = info
            .sizes
            .into_iter()
            .map(|size| HostValue::Number(size as f64))
            .collect();
        HostObject::new()
            .with("mode", info.mode.as_str())
            .with("sizes", HostValue::Array(sizes))
    }
}
