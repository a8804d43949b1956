//! Variable handles: data access, storage settings and variable attributes.
//!
//! Data is addressed as a hyperslab: `start` and `count` give one entry per
//! dimension (outermost first) and `stride` the step between selected
//! elements. Reads resolve one host value holding `product(count)` elements
//! (a scalar when that is 1); writes take one host value of the same size.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use nc4async_tasks::{Engine, TaskFuture};
use tracing::debug;

use crate::attribute;
use crate::entity::{ChunkInfo, DeflateInfo, DimensionInfo, VariableInfo};
use crate::error::{NcError, Result};
use crate::library::{check_hyperslab, selection_len, Chunking, NcLibrary};
use crate::types::{ElementKind, HostObject, HostValue, TypedValue};

/// A variable of a group. Clones share the cached name.
#[derive(Clone)]
pub struct Variable {
    engine: Engine,
    library: Arc<dyn NcLibrary>,
    id: i32,
    parent_id: i32,
    name: Rc<RefCell<String>>,
    kind: ElementKind,
    dim_ids: Rc<[i32]>,
}

impl Variable {
    pub(crate) fn new(engine: Engine, library: Arc<dyn NcLibrary>, info: VariableInfo) -> Result<Self> {
        let kind = ElementKind::from_code(info.kind_code)?;
        Ok(Self {
            engine,
            library,
            id: info.id,
            parent_id: info.parent_id,
            name: Rc::new(RefCell::new(info.name)),
            kind,
            dim_ids: info.dim_ids.into(),
        })
    }

    /// The variable id within its group.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Ncid of the group holding the variable.
    pub fn parent_id(&self) -> i32 {
        self.parent_id
    }

    /// The variable name as last seen.
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    /// Element kind of the variable's data.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.dim_ids.len()
    }

    /// `[Variable <name>, type <type>, <n> dimension(s)]`
    pub fn inspect(&self) -> String {
        format!(
            "[Variable {}, type {}, {} dimension(s)]",
            self.name.borrow(),
            self.kind,
            self.rank()
        )
    }

    /// Renames the variable and resolves the new name.
    pub fn set_name(&self, new_name: &str) -> TaskFuture<String, NcError> {
        let library = Arc::clone(&self.library);
        let (ncid, varid) = (self.parent_id, self.id);
        let new_name = new_name.to_string();
        let cached = Rc::clone(&self.name);
        self.engine.submit(
            move |ctx| -> Result<String> {
                let _guard = ctx.lock().shared();
                library.rename_var(ncid, varid, &new_name)?;
                Ok(new_name)
            },
            move |_env, new_name| {
                cached.replace(new_name.clone());
                Ok(new_name)
            },
        )
    }

    /// The variable's dimensions keyed by name, outermost first.
    pub fn dimensions(&self) -> TaskFuture<HostObject, NcError> {
        let library = Arc::clone(&self.library);
        let ncid = self.parent_id;
        let dim_ids = Vec::from(&*self.dim_ids);
        self.engine.submit(
            move |ctx| -> Result<Vec<DimensionInfo>> {
                let _guard = ctx.lock().shared();
                let unlimited = library.inq_unlimdims(ncid)?;
                dim_ids
                    .into_iter()
                    .map(|dimid| DimensionInfo::query(library.as_ref(), ncid, dimid, &unlimited))
                    .collect()
            },
            |_env, dims| {
                Ok(dims
                    .into_iter()
                    .map(|dim| (dim.name.clone(), HostValue::from(HostObject::from(dim))))
                    .collect())
            },
        )
    }

    // ─── Data access ────────────────────────────────────────────────────

    /// Reads the element at `index`.
    pub fn read(&self, index: &[usize]) -> TaskFuture<HostValue, NcError> {
        let count = vec![1; index.len()];
        self.read_hyperslab(index, &count, &[])
    }

    /// Writes `value` to the element at `index`.
    pub fn write(&self, index: &[usize], value: &HostValue) -> TaskFuture<HostValue, NcError> {
        let count = vec![1; index.len()];
        self.write_hyperslab(index, &count, &[], value)
    }

    /// Reads a contiguous block.
    pub fn read_slice(&self, start: &[usize], count: &[usize]) -> TaskFuture<HostValue, NcError> {
        self.read_hyperslab(start, count, &[])
    }

    /// Writes a contiguous block.
    pub fn write_slice(&self, start: &[usize], count: &[usize], value: &HostValue) -> TaskFuture<HostValue, NcError> {
        self.write_hyperslab(start, count, &[], value)
    }

    /// Reads every `stride`-th element of a block.
    pub fn read_strided_slice(
        &self,
        start: &[usize],
        count: &[usize],
        stride: &[isize],
    ) -> TaskFuture<HostValue, NcError> {
        self.read_hyperslab(start, count, stride)
    }

    /// Writes every `stride`-th element of a block.
    pub fn write_strided_slice(
        &self,
        start: &[usize],
        count: &[usize],
        stride: &[isize],
        value: &HostValue,
    ) -> TaskFuture<HostValue, NcError> {
        self.write_hyperslab(start, count, stride, value)
    }

    fn check_selection(&self, start: &[usize], count: &[usize], stride: &[isize]) -> Result<()> {
        let rank = self.rank();
        let matches = start.len() == rank && count.len() == rank && (stride.is_empty() || stride.len() == rank);
        if matches {
            Ok(())
        } else {
            Err(NcError::argument(format!(
                "Wrong number of dimensions (variable has {rank}, got start {}, count {}, stride {})",
                start.len(),
                count.len(),
                stride.len()
            )))
        }
    }

    fn read_hyperslab(&self, start: &[usize], count: &[usize], stride: &[isize]) -> TaskFuture<HostValue, NcError> {
        let total = match self
            .check_selection(start, count, stride)
            .and_then(|()| element_count(count))
        {
            Ok(total) => total,
            Err(err) => return self.engine.reject_now(err),
        };
        let library = Arc::clone(&self.library);
        let (ncid, varid, kind) = (self.parent_id, self.id, self.kind);
        let name = self.name();
        let (start, count, stride) = (start.to_vec(), count.to_vec(), stride.to_vec());
        self.engine.submit(
            move |ctx| -> Result<TypedValue> {
                let _guard = ctx.lock().shared();
                // The buffer is only sized once the selection fits the variable.
                check_hyperslab(&shape_of(&*library, ncid, varid)?, &start, &count, &stride)?;
                let mut value = TypedValue::allocate(kind, total);
                library.get_vars(ncid, varid, &start, &count, &stride, value.buffer_mut())?;
                debug!(task_id = %ctx.task_id(), ncid, varid, len = value.len(), "read hyperslab");
                Ok(TypedValue::new(name, value.into_buffer()))
            },
            |env, value| Ok(value.to_host_value(env)),
        )
    }

    fn write_hyperslab(
        &self,
        start: &[usize],
        count: &[usize],
        stride: &[isize],
        value: &HostValue,
    ) -> TaskFuture<HostValue, NcError> {
        let typed = self
            .check_selection(start, count, stride)
            .and_then(|()| TypedValue::from_host_value(self.name(), self.kind, value))
            .and_then(|typed| {
                let expected = element_count(count)?;
                if typed.len() == expected {
                    Ok(typed)
                } else {
                    Err(NcError::argument(format!(
                        "Wrong number of elements (expected {expected}, got {})",
                        typed.len()
                    )))
                }
            });
        let typed = match typed {
            Ok(typed) => typed,
            Err(err) => return self.engine.reject_now(err),
        };
        let library = Arc::clone(&self.library);
        let (ncid, varid) = (self.parent_id, self.id);
        let (start, count, stride) = (start.to_vec(), count.to_vec(), stride.to_vec());
        self.engine.submit(
            move |ctx| -> Result<TypedValue> {
                let _guard = ctx.lock().shared();
                library.put_vars(ncid, varid, &start, &count, &stride, typed.buffer())?;
                debug!(task_id = %ctx.task_id(), ncid, varid, len = typed.len(), "wrote hyperslab");
                Ok(typed)
            },
            |env, typed| Ok(typed.to_host_value(env)),
        )
    }

    // ─── Storage settings ───────────────────────────────────────────────

    /// Compression settings as `{shuffle, deflate, level}`.
    pub fn deflate_info(&self) -> TaskFuture<HostObject, NcError> {
        let library = Arc::clone(&self.library);
        let (ncid, varid) = (self.parent_id, self.id);
        self.engine.submit(
            move |ctx| -> Result<DeflateInfo> {
                let _guard = ctx.lock().shared();
                let (shuffle, deflate, level) = library.inq_var_deflate(ncid, varid)?;
                Ok(DeflateInfo { shuffle, deflate, level })
            },
            |_env, info| Ok(HostObject::from(info)),
        )
    }

    /// Sets compression and resolves the resulting settings.
    pub fn set_deflate_info(&self, shuffle: bool, deflate: bool, level: i32) -> TaskFuture<HostObject, NcError> {
        let library = Arc::clone(&self.library);
        let (ncid, varid) = (self.parent_id, self.id);
        self.engine.submit(
            move |ctx| -> Result<DeflateInfo> {
                let _guard = ctx.lock().shared();
                library.def_var_deflate(ncid, varid, shuffle, deflate, level)?;
                let (shuffle, deflate, level) = library.inq_var_deflate(ncid, varid)?;
                Ok(DeflateInfo { shuffle, deflate, level })
            },
            |_env, info| Ok(HostObject::from(info)),
        )
    }

    /// Storage layout as `{mode, sizes}`.
    pub fn chunking(&self) -> TaskFuture<HostObject, NcError> {
        let library = Arc::clone(&self.library);
        let (ncid, varid) = (self.parent_id, self.id);
        self.engine.submit(
            move |ctx| -> Result<ChunkInfo> {
                let _guard = ctx.lock().shared();
                let (mode, sizes) = library.inq_var_chunking(ncid, varid)?;
                Ok(ChunkInfo { mode, sizes })
            },
            |_env, info| Ok(HostObject::from(info)),
        )
    }

    /// Sets the storage layout (`contiguous`, `chunked` or `compact`) and
    /// resolves the resulting layout. `sizes` is only used when chunked.
    pub fn set_chunking(&self, mode: &str, sizes: &[usize]) -> TaskFuture<HostObject, NcError> {
        let mode = match mode.parse::<Chunking>() {
            Ok(mode) => mode,
            Err(()) => {
                return self
                    .engine
                    .reject_now(NcError::argument(format!("Unknown chunking mode \"{mode}\"")));
            },
        };
        let library = Arc::clone(&self.library);
        let (ncid, varid) = (self.parent_id, self.id);
        let sizes = sizes.to_vec();
        self.engine.submit(
            move |ctx| -> Result<ChunkInfo> {
                let _guard = ctx.lock().shared();
                library.def_var_chunking(ncid, varid, mode, &sizes)?;
                let (mode, sizes) = library.inq_var_chunking(ncid, varid)?;
                Ok(ChunkInfo { mode, sizes })
            },
            |_env, info| Ok(HostObject::from(info)),
        )
    }

    // ─── Attributes ─────────────────────────────────────────────────────

    /// Variable attributes keyed by name; see [`attribute::list`].
    pub fn attributes(&self, with_types: bool) -> TaskFuture<HostObject, NcError> {
        attribute::list(&self.engine, &self.library, self.parent_id, self.id, with_types)
    }

    /// Writes a variable attribute; see [`attribute::add`].
    pub fn add_attribute(&self, name: &str, kind: &str, value: &HostValue) -> TaskFuture<HostObject, NcError> {
        attribute::add(&self.engine, &self.library, self.parent_id, self.id, name, kind, value)
    }

    /// Renames a variable attribute; see [`attribute::rename`].
    pub fn rename_attribute(&self, name: &str, new_name: &str) -> TaskFuture<String, NcError> {
        attribute::rename(&self.engine, &self.library, self.parent_id, self.id, name, new_name)
    }

    /// Deletes a variable attribute; see [`attribute::delete`].
    pub fn delete_attribute(&self, name: &str) -> TaskFuture<String, NcError> {
        attribute::delete(&self.engine, &self.library, self.parent_id, self.id, name)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("name", &*self.name.borrow())
            .field("kind", &self.kind)
            .field("dim_ids", &self.dim_ids)
            .finish()
    }
}

/// Elements covered by `count`, rejecting products that overflow `usize`.
fn element_count(count: &[usize]) -> Result<usize> {
    selection_len(count).ok_or_else(|| NcError::argument(format!("Selection {count:?} has too many elements")))
}

/// Current dimension lengths of a variable, outermost first.
fn shape_of(library: &dyn NcLibrary, ncid: i32, varid: i32) -> Result<Vec<usize>> {
    let meta = library.inq_var(ncid, varid)?;
    meta.dim_ids
        .iter()
        .map(|&dimid| Ok(library.inq_dim(ncid, dimid)?.1))
        .collect()
}
