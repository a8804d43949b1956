//! The external array-file library, seen as a set of blocking calls.
//!
//! [`NcLibrary`] is the call surface the rest of the crate is written
//! against. Every method blocks, returns a [`Status`] on failure and is only
//! ever called from a task's `work` closure on a worker thread.
//!
//! Handles are plain integers: an `ncid` names an open file or one of its
//! groups, a `varid` names a variable inside a group ([`GLOBAL`] addresses
//! the group itself), a `dimid` names a dimension.
//!
//! [`MemoryLibrary`] implements the surface in memory.

pub mod memory;
pub mod status;

use serde::{Deserialize, Serialize};

use crate::types::{Buffer, ElementKind, Text};

pub use memory::{LibraryCall, MemoryLibrary};
pub use status::Status;

/// `varid` addressing group-level (global) attributes.
pub const GLOBAL: i32 = -1;

/// Result of a library call.
pub type LibResult<T> = std::result::Result<T, Status>;

/// Number of elements a selection covers, `None` when the product of
/// `count` overflows.
pub fn selection_len(count: &[usize]) -> Option<usize> {
    count.iter().try_fold(1_usize, |n, &c| n.checked_mul(c))
}

/// Checks a strided selection against a shape and returns the step of each
/// dimension.
///
/// An empty `stride` means a step of 1 everywhere. Dimensions with a zero
/// count are only checked for `start <= len`.
pub fn check_hyperslab(shape: &[usize], start: &[usize], count: &[usize], stride: &[isize]) -> LibResult<Vec<usize>> {
    let rank = shape.len();
    if start.len() != rank || count.len() != rank || !(stride.is_empty() || stride.len() == rank) {
        return Err(Status::EINVAL);
    }
    let mut steps = Vec::with_capacity(rank);
    for d in 0..rank {
        let step = stride.get(d).copied().unwrap_or(1);
        if step <= 0 {
            return Err(Status::ESTRIDE);
        }
        let step = step.unsigned_abs();
        if start[d] > shape[d] {
            return Err(Status::EINVALCOORDS);
        }
        if count[d] > 0 {
            if start[d] >= shape[d] {
                return Err(Status::EINVALCOORDS);
            }
            match last_index(start[d], count[d], step) {
                Some(last) if last < shape[d] => {},
                _ => return Err(Status::EEDGE),
            }
        }
        steps.push(step);
    }
    Ok(steps)
}

/// Index of the last element selected along one dimension; `count` must be
/// non-zero.
pub(crate) fn last_index(start: usize, count: usize, step: usize) -> Option<usize> {
    (count - 1).checked_mul(step).and_then(|offset| start.checked_add(offset))
}

/// On-disk format requested when creating a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Classic (CDF-1).
    Classic,
    /// Classic with 64-bit offsets (CDF-2).
    Classic64,
    /// NetCDF-4 (HDF5 storage).
    Netcdf4,
    /// NetCDF-4 restricted to the classic data model.
    Netcdf4Classic,
}

impl FileFormat {
    /// `true` for the formats restricted to the classic data model.
    pub fn is_classic_model(self) -> bool {
        !matches!(self, Self::Netcdf4)
    }

    /// Storage family the format is written with.
    pub fn storage(self) -> StorageFormat {
        match self {
            Self::Classic | Self::Classic64 => StorageFormat::Netcdf3,
            Self::Netcdf4 | Self::Netcdf4Classic => StorageFormat::Hdf5,
        }
    }
}

impl std::str::FromStr for FileFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(Self::Classic),
            "classic64" => Ok(Self::Classic64),
            "netcdf4" => Ok(Self::Netcdf4),
            "netcdf4classic" => Ok(Self::Netcdf4Classic),
            _ => Err(()),
        }
    }
}

/// Storage family of an open file, as the library reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StorageFormat {
    /// Not determined.
    Undefined = 0,
    /// NetCDF-3.
    Netcdf3 = 1,
    /// HDF5.
    Hdf5 = 2,
    /// HDF4.
    Hdf4 = 3,
    /// Parallel NetCDF.
    Pnetcdf = 4,
    /// OPeNDAP DAP2.
    Dap2 = 5,
    /// OPeNDAP DAP4.
    Dap4 = 6,
    /// User-defined format 0.
    Udf0 = 8,
    /// User-defined format 1.
    Udf1 = 9,
    /// Zarr.
    Zarr = 10,
}

impl StorageFormat {
    /// Host-facing format name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Undefined => "unknown",
            Self::Netcdf3 => "netcdf3",
            Self::Hdf5 => "hdf5",
            Self::Hdf4 => "hdf4",
            Self::Pnetcdf => "pnetcdf",
            Self::Dap2 => "dap2",
            Self::Dap4 => "dap4",
            Self::Udf0 => "udf0",
            Self::Udf1 => "udf1",
            Self::Zarr => "zarr",
        }
    }
}

/// Storage layout of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chunking {
    /// One contiguous block.
    Contiguous,
    /// Split into chunks.
    Chunked,
    /// Stored in the object header.
    Compact,
}

impl Chunking {
    /// Host-facing layout name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contiguous => "contiguous",
            Self::Chunked => "chunked",
            Self::Compact => "compact",
        }
    }
}

impl std::str::FromStr for Chunking {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contiguous" => Ok(Self::Contiguous),
            "chunked" => Ok(Self::Chunked),
            "compact" => Ok(Self::Compact),
            _ => Err(()),
        }
    }
}

/// What the library reports about one variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarMeta {
    /// Variable name.
    pub name: String,
    /// Raw type code; may be outside the supported element kinds.
    pub type_code: i32,
    /// Dimension ids, outermost first.
    pub dim_ids: Vec<i32>,
    /// Number of attributes.
    pub natts: usize,
}

/// Blocking call surface of an array-file library.
///
/// Implementations must be callable from several worker threads at once.
/// Mutual exclusion between file lifecycle calls (`create`, `open`, `sync`,
/// `close`) and everything else is the caller's job, through
/// [`FileLifecycleLock`](nc4async_tasks::FileLifecycleLock).
///
/// # Errors
///
/// Every call returns the library's [`Status`] on failure.
pub trait NcLibrary: Send + Sync + 'static {
    // ─── Files ──────────────────────────────────────────────────────────

    /// Creates a file and returns its root ncid.
    fn create(&self, path: &str, format: FileFormat, clobber: bool) -> LibResult<i32>;

    /// Opens an existing file and returns its root ncid.
    fn open(&self, path: &str, writable: bool) -> LibResult<i32>;

    /// Closes a file.
    fn close(&self, ncid: i32) -> LibResult<()>;

    /// Flushes a file to storage.
    fn sync(&self, ncid: i32) -> LibResult<()>;

    /// Leaves define mode.
    fn enddef(&self, ncid: i32) -> LibResult<()>;

    /// Storage family of an open file.
    fn inq_format(&self, ncid: i32) -> LibResult<StorageFormat>;

    // ─── Groups ─────────────────────────────────────────────────────────

    /// Group name (`/` for the root group).
    fn inq_grpname(&self, ncid: i32) -> LibResult<String>;

    /// Full group path, e.g. `/forecast/surface`.
    fn inq_grpname_full(&self, ncid: i32) -> LibResult<String>;

    /// Renames a group.
    fn rename_grp(&self, ncid: i32, name: &str) -> LibResult<()>;

    /// Defines a subgroup and returns its ncid.
    fn def_grp(&self, parent: i32, name: &str) -> LibResult<i32>;

    /// Immediate subgroups.
    fn inq_grps(&self, ncid: i32) -> LibResult<Vec<i32>>;

    /// Subgroup ncid by name.
    fn inq_grp_ncid(&self, ncid: i32, name: &str) -> LibResult<i32>;

    // ─── Dimensions ─────────────────────────────────────────────────────

    /// Dimensions defined in the group, optionally including its ancestors.
    fn inq_dimids(&self, ncid: i32, include_parents: bool) -> LibResult<Vec<i32>>;

    /// Name and current length of a dimension.
    fn inq_dim(&self, ncid: i32, dimid: i32) -> LibResult<(String, usize)>;

    /// Defines a dimension; a length of 0 defines an unlimited dimension.
    fn def_dim(&self, ncid: i32, name: &str, len: usize) -> LibResult<i32>;

    /// Unlimited dimensions visible from the group.
    fn inq_unlimdims(&self, ncid: i32) -> LibResult<Vec<i32>>;

    // ─── Variables ──────────────────────────────────────────────────────

    /// Variables defined in the group.
    fn inq_varids(&self, ncid: i32) -> LibResult<Vec<i32>>;

    /// Variable id by name.
    fn inq_varid(&self, ncid: i32, name: &str) -> LibResult<i32>;

    /// Variable metadata.
    fn inq_var(&self, ncid: i32, varid: i32) -> LibResult<VarMeta>;

    /// Defines a variable and returns its id.
    fn def_var(&self, ncid: i32, name: &str, kind: ElementKind, dim_ids: &[i32]) -> LibResult<i32>;

    /// Renames a variable.
    fn rename_var(&self, ncid: i32, varid: i32, name: &str) -> LibResult<()>;

    /// Reads a strided hyperslab into `buffer`, which must have the
    /// variable's kind and exactly `product(count)` elements.
    fn get_vars(
        &self,
        ncid: i32,
        varid: i32,
        start: &[usize],
        count: &[usize],
        stride: &[isize],
        buffer: &mut Buffer,
    ) -> LibResult<()>;

    /// Writes a strided hyperslab from `buffer`.
    fn put_vars(
        &self,
        ncid: i32,
        varid: i32,
        start: &[usize],
        count: &[usize],
        stride: &[isize],
        buffer: &Buffer,
    ) -> LibResult<()>;

    /// `(shuffle, deflate, level)` of a variable.
    fn inq_var_deflate(&self, ncid: i32, varid: i32) -> LibResult<(bool, bool, i32)>;

    /// Sets compression parameters of a variable.
    fn def_var_deflate(&self, ncid: i32, varid: i32, shuffle: bool, deflate: bool, level: i32) -> LibResult<()>;

    /// Storage layout and chunk sizes of a variable.
    fn inq_var_chunking(&self, ncid: i32, varid: i32) -> LibResult<(Chunking, Vec<usize>)>;

    /// Sets the storage layout of a variable.
    fn def_var_chunking(&self, ncid: i32, varid: i32, mode: Chunking, sizes: &[usize]) -> LibResult<()>;

    // ─── Attributes ─────────────────────────────────────────────────────

    /// Number of attributes of a variable, or of the group for [`GLOBAL`].
    fn inq_natts(&self, ncid: i32, varid: i32) -> LibResult<usize>;

    /// Attribute name by index.
    fn inq_attname(&self, ncid: i32, varid: i32, index: usize) -> LibResult<String>;

    /// `(type_code, len)` of an attribute.
    fn inq_att(&self, ncid: i32, varid: i32, name: &str) -> LibResult<(i32, usize)>;

    /// Reads a numeric attribute into `buffer`.
    fn get_att(&self, ncid: i32, varid: i32, name: &str, buffer: &mut Buffer) -> LibResult<()>;

    /// Reads a text attribute into `text`.
    fn get_att_text(&self, ncid: i32, varid: i32, name: &str, text: &mut Text) -> LibResult<()>;

    /// Reads a string attribute into `strings`.
    fn get_att_string(&self, ncid: i32, varid: i32, name: &str, strings: &mut [String]) -> LibResult<()>;

    /// Writes a numeric attribute.
    fn put_att(&self, ncid: i32, varid: i32, name: &str, buffer: &Buffer) -> LibResult<()>;

    /// Writes a text attribute.
    fn put_att_text(&self, ncid: i32, varid: i32, name: &str, text: &Text) -> LibResult<()>;

    /// Writes a string attribute.
    fn put_att_string(&self, ncid: i32, varid: i32, name: &str, strings: &[String]) -> LibResult<()>;

    /// Renames an attribute.
    fn rename_att(&self, ncid: i32, varid: i32, name: &str, new_name: &str) -> LibResult<()>;

    /// Deletes an attribute.
    fn del_att(&self, ncid: i32, varid: i32, name: &str) -> LibResult<()>;
}
