//! In-memory array-file library.
//!
//! [`MemoryLibrary`] implements [`NcLibrary`] without touching the file
//! system. Datasets live in a registry keyed by path and survive `close`, so
//! a file can be closed and reopened like one on disk.
//!
//! # Handles
//!
//! Every `open`/`create` allocates a file handle `h`; the root group's ncid
//! is `h << 16` and group `g` of the same file is `(h << 16) | g`. Closing a
//! file invalidates every ncid derived from its handle.
//!
//! # Data Layout
//!
//! Variable data is stored row-major over the current dimension lengths.
//! Writing past the end of an unlimited dimension grows it and re-lays out
//! every variable that uses it. Unwritten elements read as zero (empty
//! strings for `string` variables).
//!
//! # Concurrency
//!
//! Both registries are `DashMap`s, so calls on different files proceed in
//! parallel. Define mode is not tracked: definitions and data access may be
//! interleaved freely.

use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::{
    check_hyperslab, last_index, selection_len, Chunking, FileFormat, LibResult, NcLibrary, StorageFormat, Status,
    VarMeta, GLOBAL,
};
use crate::types::{Buffer, ElementKind, Text};

const GROUP_BITS: i32 = 16;
const GROUP_MASK: i32 = (1 << GROUP_BITS) - 1;
const MAX_NAME: usize = 256;

/// One entry of the lifecycle journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryCall {
    /// A lifecycle call started.
    Enter {
        /// `create`, `open`, `sync` or `close`.
        op: &'static str,
        /// Path of the file.
        path: String,
    },
    /// A lifecycle call returned.
    Exit {
        /// `create`, `open`, `sync` or `close`.
        op: &'static str,
        /// Path of the file.
        path: String,
    },
}

#[derive(Debug, Clone)]
struct Handle {
    path: String,
    writable: bool,
}

#[derive(Debug, Clone)]
enum AttValue {
    Typed(Buffer),
    Raw { type_code: i32, len: usize },
}

#[derive(Debug, Clone)]
struct Attribute {
    name: String,
    value: AttValue,
}

#[derive(Debug, Clone)]
struct Dimension {
    name: String,
    len: usize,
    unlimited: bool,
    group: usize,
}

#[derive(Debug, Clone)]
struct Variable {
    name: String,
    kind: ElementKind,
    dim_ids: Vec<i32>,
    data: Buffer,
    atts: Vec<Attribute>,
    shuffle: bool,
    deflate: bool,
    level: i32,
    chunking: Chunking,
    chunk_sizes: Vec<usize>,
}

#[derive(Debug, Clone)]
struct Group {
    name: String,
    parent: Option<usize>,
    children: Vec<usize>,
    atts: Vec<Attribute>,
    vars: Vec<Variable>,
}

impl Group {
    fn new(name: &str, parent: Option<usize>) -> Self {
        Self {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            atts: Vec::new(),
            vars: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct Dataset {
    format: FileFormat,
    groups: Vec<Group>,
    dims: Vec<Dimension>,
}

impl Dataset {
    fn new(format: FileFormat) -> Self {
        Self {
            format,
            groups: vec![Group::new("/", None)],
            dims: Vec::new(),
        }
    }

    fn require_enhanced_model(&self) -> LibResult<()> {
        if self.format.is_classic_model() {
            Err(Status::ENOTNC4)
        } else {
            Ok(())
        }
    }

    fn require_kind(&self, kind: ElementKind) -> LibResult<()> {
        let classic = matches!(
            kind,
            ElementKind::Byte
                | ElementKind::Char
                | ElementKind::Short
                | ElementKind::Int
                | ElementKind::Float
                | ElementKind::Double
        );
        if self.format.is_classic_model() && !classic {
            Err(Status::EBADTYPE)
        } else {
            Ok(())
        }
    }

    fn is_visible(&self, dim: &Dimension, group: usize) -> bool {
        let mut current = Some(group);
        while let Some(g) = current {
            if dim.group == g {
                return true;
            }
            current = self.groups[g].parent;
        }
        false
    }

    fn dim(&self, dimid: i32) -> LibResult<&Dimension> {
        usize::try_from(dimid)
            .ok()
            .and_then(|i| self.dims.get(i))
            .ok_or(Status::EBADDIM)
    }

    fn var(&self, group: usize, varid: i32) -> LibResult<&Variable> {
        usize::try_from(varid)
            .ok()
            .and_then(|i| self.groups[group].vars.get(i))
            .ok_or(Status::ENOTVAR)
    }

    fn var_mut(&mut self, group: usize, varid: i32) -> LibResult<&mut Variable> {
        usize::try_from(varid)
            .ok()
            .and_then(|i| self.groups[group].vars.get_mut(i))
            .ok_or(Status::ENOTVAR)
    }

    fn shape(&self, var: &Variable) -> LibResult<Vec<usize>> {
        var.dim_ids.iter().map(|&id| self.dim(id).map(|d| d.len)).collect()
    }

    fn atts(&self, group: usize, varid: i32) -> LibResult<&Vec<Attribute>> {
        if varid == GLOBAL {
            Ok(&self.groups[group].atts)
        } else {
            self.var(group, varid).map(|v| &v.atts)
        }
    }

    fn atts_mut(&mut self, group: usize, varid: i32) -> LibResult<&mut Vec<Attribute>> {
        if varid == GLOBAL {
            Ok(&mut self.groups[group].atts)
        } else {
            self.var_mut(group, varid).map(|v| &mut v.atts)
        }
    }

    fn att(&self, group: usize, varid: i32, name: &str) -> LibResult<&AttValue> {
        self.atts(group, varid)?
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
            .ok_or(Status::ENOTATT)
    }

    fn put_att(&mut self, group: usize, varid: i32, name: &str, value: AttValue) -> LibResult<()> {
        validate_name(name)?;
        let atts = self.atts_mut(group, varid)?;
        match atts.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => atts.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
        Ok(())
    }

    /// Grows unlimited dimension `dimid` to `len` and re-lays out every
    /// variable that uses it.
    fn grow_dim(&mut self, dimid: i32, len: usize) -> LibResult<()> {
        let mut old_shapes = Vec::new();
        for (g, group) in self.groups.iter().enumerate() {
            for (v, var) in group.vars.iter().enumerate() {
                if var.dim_ids.contains(&dimid) {
                    old_shapes.push((g, v, self.shape(var)?));
                }
            }
        }
        let index = usize::try_from(dimid).map_err(|_| Status::EBADDIM)?;
        self.dims[index].len = len;
        for (g, v, old_shape) in old_shapes {
            let new_shape = self.shape(&self.groups[g].vars[v])?;
            let var = &mut self.groups[g].vars[v];
            var.data = relayout(&var.data, var.kind, &old_shape, &new_shape)?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> LibResult<()> {
    if name.is_empty() || name.contains('/') {
        Err(Status::EBADNAME)
    } else if name.len() > MAX_NAME {
        Err(Status::EMAXNAME)
    } else {
        Ok(())
    }
}

fn product(shape: &[usize]) -> usize {
    shape.iter().product()
}

fn linear(index: &[usize], shape: &[usize]) -> usize {
    index.iter().zip(shape).fold(0, |acc, (i, n)| acc * n + i)
}

fn relayout(data: &Buffer, kind: ElementKind, old_shape: &[usize], new_shape: &[usize]) -> LibResult<Buffer> {
    let mut next = Buffer::allocate(kind, product(new_shape));
    let mut positions = Vec::with_capacity(product(old_shape));
    let mut index = vec![0; old_shape.len()];
    for _ in 0..product(old_shape) {
        positions.push(linear(&index, new_shape));
        advance(&mut index, old_shape);
    }
    next.scatter(&positions, data).ok_or(Status::EINVAL)?;
    Ok(next)
}

// Odometer increment, last dimension fastest.
fn advance(index: &mut [usize], extent: &[usize]) {
    for d in (0..index.len()).rev() {
        index[d] += 1;
        if index[d] < extent[d] {
            return;
        }
        index[d] = 0;
    }
}

/// Linear indices of a strided hyperslab, row-major.
fn hyperslab(shape: &[usize], start: &[usize], count: &[usize], stride: &[isize]) -> LibResult<Vec<usize>> {
    let rank = shape.len();
    let steps = check_hyperslab(shape, start, count, stride)?;

    let total = product(count);
    let mut indices = Vec::with_capacity(total);
    let mut offset = vec![0; rank];
    for _ in 0..total {
        let position: Vec<usize> = (0..rank).map(|d| start[d] + offset[d] * steps[d]).collect();
        indices.push(linear(&position, shape));
        advance(&mut offset, count);
    }
    Ok(indices)
}

/// In-memory implementation of [`NcLibrary`].
///
/// # Examples
///
/// ```
/// use nc4async::library::{FileFormat, MemoryLibrary, NcLibrary, GLOBAL};
/// use nc4async::types::{Buffer, Elements};
///
/// let lib = MemoryLibrary::new();
/// let ncid = lib.create("demo.nc", FileFormat::Netcdf4, false).unwrap();
/// lib.put_att(ncid, GLOBAL, "rank", &Buffer::Int(Elements::Owned(vec![42]))).unwrap();
/// assert_eq!(lib.inq_natts(ncid, GLOBAL).unwrap(), 1);
/// lib.close(ncid).unwrap();
/// assert!(lib.contains("demo.nc"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryLibrary {
    datasets: DashMap<String, Dataset>,
    handles: DashMap<i32, Handle>,
    next_handle: AtomicI32,
    lifecycle_latency: Option<Duration>,
    journal: Mutex<Vec<LibraryCall>>,
}

impl MemoryLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every lifecycle call (`create`, `open`, `sync`, `close`) take
    /// at least `latency`.
    pub fn with_lifecycle_latency(mut self, latency: Duration) -> Self {
        self.lifecycle_latency = Some(latency);
        self
    }

    /// `true` if a dataset exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.datasets.contains_key(path)
    }

    /// Number of open file handles.
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    /// Lifecycle calls recorded so far, in order.
    pub fn journal(&self) -> Vec<LibraryCall> {
        self.journal.lock().clone()
    }

    /// Stores an attribute with an arbitrary type code, bypassing the typed
    /// put calls. Reading it back with a typed get fails with
    /// [`Status::EBADTYPE`].
    ///
    /// # Errors
    ///
    /// Same as [`NcLibrary::put_att`].
    pub fn put_raw_att(&self, ncid: i32, varid: i32, name: &str, type_code: i32, len: usize) -> LibResult<()> {
        self.write(ncid, |dataset, group| {
            dataset.put_att(group, varid, name, AttValue::Raw { type_code, len })
        })
    }

    fn lifecycle<T>(&self, op: &'static str, path: &str, call: impl FnOnce() -> LibResult<T>) -> LibResult<T> {
        self.journal.lock().push(LibraryCall::Enter {
            op,
            path: path.to_string(),
        });
        if let Some(latency) = self.lifecycle_latency {
            std::thread::sleep(latency);
        }
        let result = call();
        self.journal.lock().push(LibraryCall::Exit {
            op,
            path: path.to_string(),
        });
        result
    }

    fn new_handle(&self, path: &str, writable: bool) -> i32 {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        self.handles.insert(
            handle,
            Handle {
                path: path.to_string(),
                writable,
            },
        );
        handle << GROUP_BITS
    }

    fn handle(&self, ncid: i32) -> LibResult<(i32, Handle)> {
        let handle = ncid >> GROUP_BITS;
        self.handles
            .get(&handle)
            .map(|h| (handle, h.clone()))
            .ok_or(Status::EBADID)
    }

    fn read<T>(&self, ncid: i32, f: impl FnOnce(&Dataset, usize) -> LibResult<T>) -> LibResult<T> {
        let (_, handle) = self.handle(ncid)?;
        let dataset = self.datasets.get(&handle.path).ok_or(Status::EBADID)?;
        let group = group_index(ncid, &dataset)?;
        f(&dataset, group)
    }

    fn write<T>(&self, ncid: i32, f: impl FnOnce(&mut Dataset, usize) -> LibResult<T>) -> LibResult<T> {
        let (_, handle) = self.handle(ncid)?;
        if !handle.writable {
            return Err(Status::EPERM);
        }
        let mut dataset = self.datasets.get_mut(&handle.path).ok_or(Status::EBADID)?;
        let group = group_index(ncid, &dataset)?;
        f(&mut dataset, group)
    }
}

fn group_index(ncid: i32, dataset: &Dataset) -> LibResult<usize> {
    let group = usize::try_from(ncid & GROUP_MASK).map_err(|_| Status::EBADGRPID)?;
    if group < dataset.groups.len() {
        Ok(group)
    } else {
        Err(Status::EBADGRPID)
    }
}

fn group_ncid(ncid: i32, group: usize) -> LibResult<i32> {
    let group = i32::try_from(group).map_err(|_| Status::EBADGRPID)?;
    if group > GROUP_MASK {
        return Err(Status::EBADGRPID);
    }
    Ok((ncid & !GROUP_MASK) | group)
}

fn to_id(index: usize) -> LibResult<i32> {
    i32::try_from(index).map_err(|_| Status::EINVAL)
}

impl NcLibrary for MemoryLibrary {
    fn create(&self, path: &str, format: FileFormat, clobber: bool) -> LibResult<i32> {
        self.lifecycle("create", path, || {
            if !clobber && self.datasets.contains_key(path) {
                return Err(Status::EEXIST);
            }
            self.datasets.insert(path.to_string(), Dataset::new(format));
            Ok(self.new_handle(path, true))
        })
    }

    fn open(&self, path: &str, writable: bool) -> LibResult<i32> {
        self.lifecycle("open", path, || {
            if !self.datasets.contains_key(path) {
                return Err(Status::ENOENT);
            }
            Ok(self.new_handle(path, writable))
        })
    }

    fn close(&self, ncid: i32) -> LibResult<()> {
        let (handle, info) = self.handle(ncid)?;
        self.lifecycle("close", &info.path, || {
            self.handles.remove(&handle).map(|_| ()).ok_or(Status::EBADID)
        })
    }

    fn sync(&self, ncid: i32) -> LibResult<()> {
        let (_, info) = self.handle(ncid)?;
        self.lifecycle("sync", &info.path, || self.handle(ncid).map(|_| ()))
    }

    fn enddef(&self, ncid: i32) -> LibResult<()> {
        self.read(ncid, |_, _| Ok(()))
    }

    fn inq_format(&self, ncid: i32) -> LibResult<StorageFormat> {
        self.read(ncid, |dataset, _| Ok(dataset.format.storage()))
    }

    fn inq_grpname(&self, ncid: i32) -> LibResult<String> {
        self.read(ncid, |dataset, group| Ok(dataset.groups[group].name.clone()))
    }

    fn inq_grpname_full(&self, ncid: i32) -> LibResult<String> {
        self.read(ncid, |dataset, group| {
            let mut names = Vec::new();
            let mut current = group;
            while let Some(parent) = dataset.groups[current].parent {
                names.push(dataset.groups[current].name.as_str());
                current = parent;
            }
            names.reverse();
            Ok(format!("/{}", names.join("/")))
        })
    }

    fn rename_grp(&self, ncid: i32, name: &str) -> LibResult<()> {
        validate_name(name)?;
        self.write(ncid, |dataset, group| {
            let parent = dataset.groups[group].parent.ok_or(Status::EINVAL)?;
            let taken = dataset.groups[parent]
                .children
                .iter()
                .any(|&c| c != group && dataset.groups[c].name == name);
            if taken {
                return Err(Status::ENAMEINUSE);
            }
            dataset.groups[group].name = name.to_string();
            Ok(())
        })
    }

    fn def_grp(&self, parent: i32, name: &str) -> LibResult<i32> {
        validate_name(name)?;
        self.write(parent, |dataset, group| {
            dataset.require_enhanced_model()?;
            let taken = dataset.groups[group]
                .children
                .iter()
                .any(|&c| dataset.groups[c].name == name);
            if taken {
                return Err(Status::ENAMEINUSE);
            }
            let index = dataset.groups.len();
            let ncid = group_ncid(parent, index)?;
            dataset.groups.push(Group::new(name, Some(group)));
            dataset.groups[group].children.push(index);
            Ok(ncid)
        })
    }

    fn inq_grps(&self, ncid: i32) -> LibResult<Vec<i32>> {
        self.read(ncid, |dataset, group| {
            dataset.groups[group]
                .children
                .iter()
                .map(|&c| group_ncid(ncid, c))
                .collect()
        })
    }

    fn inq_grp_ncid(&self, ncid: i32, name: &str) -> LibResult<i32> {
        self.read(ncid, |dataset, group| {
            let child = dataset.groups[group]
                .children
                .iter()
                .copied()
                .find(|&c| dataset.groups[c].name == name)
                .ok_or(Status::ENOGRP)?;
            group_ncid(ncid, child)
        })
    }

    fn inq_dimids(&self, ncid: i32, include_parents: bool) -> LibResult<Vec<i32>> {
        self.read(ncid, |dataset, group| {
            dataset
                .dims
                .iter()
                .enumerate()
                .filter(|(_, dim)| {
                    if include_parents {
                        dataset.is_visible(dim, group)
                    } else {
                        dim.group == group
                    }
                })
                .map(|(i, _)| to_id(i))
                .collect()
        })
    }

    fn inq_dim(&self, ncid: i32, dimid: i32) -> LibResult<(String, usize)> {
        self.read(ncid, |dataset, _| {
            let dim = dataset.dim(dimid)?;
            Ok((dim.name.clone(), dim.len))
        })
    }

    fn def_dim(&self, ncid: i32, name: &str, len: usize) -> LibResult<i32> {
        validate_name(name)?;
        self.write(ncid, |dataset, group| {
            if dataset.dims.iter().any(|d| d.group == group && d.name == name) {
                return Err(Status::ENAMEINUSE);
            }
            let unlimited = len == 0;
            if unlimited && dataset.format.is_classic_model() && dataset.dims.iter().any(|d| d.unlimited) {
                return Err(Status::EUNLIMIT);
            }
            let id = to_id(dataset.dims.len())?;
            dataset.dims.push(Dimension {
                name: name.to_string(),
                len,
                unlimited,
                group,
            });
            Ok(id)
        })
    }

    fn inq_unlimdims(&self, ncid: i32) -> LibResult<Vec<i32>> {
        self.read(ncid, |dataset, group| {
            dataset
                .dims
                .iter()
                .enumerate()
                .filter(|(_, dim)| dim.unlimited && dataset.is_visible(dim, group))
                .map(|(i, _)| to_id(i))
                .collect()
        })
    }

    fn inq_varids(&self, ncid: i32) -> LibResult<Vec<i32>> {
        self.read(ncid, |dataset, group| (0..dataset.groups[group].vars.len()).map(to_id).collect())
    }

    fn inq_varid(&self, ncid: i32, name: &str) -> LibResult<i32> {
        self.read(ncid, |dataset, group| {
            let index = dataset.groups[group]
                .vars
                .iter()
                .position(|v| v.name == name)
                .ok_or(Status::ENOTVAR)?;
            to_id(index)
        })
    }

    fn inq_var(&self, ncid: i32, varid: i32) -> LibResult<VarMeta> {
        self.read(ncid, |dataset, group| {
            let var = dataset.var(group, varid)?;
            Ok(VarMeta {
                name: var.name.clone(),
                type_code: var.kind.code(),
                dim_ids: var.dim_ids.clone(),
                natts: var.atts.len(),
            })
        })
    }

    fn def_var(&self, ncid: i32, name: &str, kind: ElementKind, dim_ids: &[i32]) -> LibResult<i32> {
        validate_name(name)?;
        self.write(ncid, |dataset, group| {
            dataset.require_kind(kind)?;
            if dataset.groups[group].vars.iter().any(|v| v.name == name) {
                return Err(Status::ENAMEINUSE);
            }
            let mut shape = Vec::with_capacity(dim_ids.len());
            let mut chunk_sizes = Vec::with_capacity(dim_ids.len());
            for &id in dim_ids {
                let dim = dataset.dim(id)?;
                if !dataset.is_visible(dim, group) {
                    return Err(Status::EBADDIM);
                }
                shape.push(dim.len);
                chunk_sizes.push(if dim.unlimited { 1 } else { dim.len.max(1) });
            }
            let chunked = dim_ids.iter().any(|&id| dataset.dims[id as usize].unlimited);
            let var = Variable {
                name: name.to_string(),
                kind,
                dim_ids: dim_ids.to_vec(),
                data: Buffer::allocate(kind, product(&shape)),
                atts: Vec::new(),
                shuffle: false,
                deflate: false,
                level: 0,
                chunking: if chunked { Chunking::Chunked } else { Chunking::Contiguous },
                chunk_sizes: if chunked { chunk_sizes } else { Vec::new() },
            };
            let vars = &mut dataset.groups[group].vars;
            vars.push(var);
            to_id(vars.len() - 1)
        })
    }

    fn rename_var(&self, ncid: i32, varid: i32, name: &str) -> LibResult<()> {
        validate_name(name)?;
        self.write(ncid, |dataset, group| {
            let index = usize::try_from(varid).map_err(|_| Status::ENOTVAR)?;
            let vars = &mut dataset.groups[group].vars;
            if vars.iter().enumerate().any(|(i, v)| i != index && v.name == name) {
                return Err(Status::ENAMEINUSE);
            }
            let var = vars.get_mut(index).ok_or(Status::ENOTVAR)?;
            var.name = name.to_string();
            Ok(())
        })
    }

    fn get_vars(
        &self,
        ncid: i32,
        varid: i32,
        start: &[usize],
        count: &[usize],
        stride: &[isize],
        buffer: &mut Buffer,
    ) -> LibResult<()> {
        self.read(ncid, |dataset, group| {
            let var = dataset.var(group, varid)?;
            if buffer.kind() != var.kind {
                return Err(Status::EBADTYPE);
            }
            let indices = hyperslab(&dataset.shape(var)?, start, count, stride)?;
            if buffer.len() != indices.len() {
                return Err(Status::EINVAL);
            }
            *buffer = var.data.gather(&indices).ok_or(Status::EINVALCOORDS)?;
            Ok(())
        })
    }

    fn put_vars(
        &self,
        ncid: i32,
        varid: i32,
        start: &[usize],
        count: &[usize],
        stride: &[isize],
        buffer: &Buffer,
    ) -> LibResult<()> {
        self.write(ncid, |dataset, group| {
            let var = dataset.var(group, varid)?;
            if buffer.kind() != var.kind {
                return Err(Status::EBADTYPE);
            }
            if start.len() != var.dim_ids.len() || count.len() != var.dim_ids.len() {
                return Err(Status::EINVAL);
            }
            let total = selection_len(count).ok_or(Status::EEDGE)?;
            if buffer.len() != total {
                return Err(Status::EINVAL);
            }
            let mut growth = Vec::new();
            for (d, &dimid) in var.dim_ids.iter().enumerate() {
                let dim = dataset.dim(dimid)?;
                if dim.unlimited && total > 0 {
                    let step = stride.get(d).copied().unwrap_or(1).max(1).unsigned_abs();
                    let needed = last_index(start[d], count[d], step)
                        .and_then(|last| last.checked_add(1))
                        .ok_or(Status::EEDGE)?;
                    if needed > dim.len {
                        growth.push((dimid, needed));
                    }
                }
            }
            for (dimid, len) in growth {
                dataset.grow_dim(dimid, len)?;
            }

            let var = dataset.var(group, varid)?;
            let indices = hyperslab(&dataset.shape(var)?, start, count, stride)?;
            if buffer.len() != indices.len() {
                return Err(Status::EINVAL);
            }
            dataset
                .var_mut(group, varid)?
                .data
                .scatter(&indices, buffer)
                .ok_or(Status::EINVALCOORDS)
        })
    }

    fn inq_var_deflate(&self, ncid: i32, varid: i32) -> LibResult<(bool, bool, i32)> {
        self.read(ncid, |dataset, group| {
            let var = dataset.var(group, varid)?;
            Ok((var.shuffle, var.deflate, var.level))
        })
    }

    fn def_var_deflate(&self, ncid: i32, varid: i32, shuffle: bool, deflate: bool, level: i32) -> LibResult<()> {
        self.write(ncid, |dataset, group| {
            dataset.require_enhanced_model()?;
            if !(0..=9).contains(&level) {
                return Err(Status::EINVAL);
            }
            let shape = dataset.shape(dataset.var(group, varid)?)?;
            let var = dataset.var_mut(group, varid)?;
            var.shuffle = shuffle;
            var.deflate = deflate;
            var.level = if deflate { level } else { 0 };
            if deflate && var.chunking != Chunking::Chunked && !shape.is_empty() {
                var.chunking = Chunking::Chunked;
                var.chunk_sizes = shape.iter().map(|&n| n.max(1)).collect();
            }
            Ok(())
        })
    }

    fn inq_var_chunking(&self, ncid: i32, varid: i32) -> LibResult<(Chunking, Vec<usize>)> {
        self.read(ncid, |dataset, group| {
            let var = dataset.var(group, varid)?;
            Ok((var.chunking, var.chunk_sizes.clone()))
        })
    }

    fn def_var_chunking(&self, ncid: i32, varid: i32, mode: Chunking, sizes: &[usize]) -> LibResult<()> {
        self.write(ncid, |dataset, group| {
            dataset.require_enhanced_model()?;
            let var = dataset.var_mut(group, varid)?;
            match mode {
                Chunking::Chunked => {
                    if sizes.len() != var.dim_ids.len() || sizes.contains(&0) {
                        return Err(Status::EINVAL);
                    }
                    var.chunk_sizes = sizes.to_vec();
                },
                Chunking::Contiguous | Chunking::Compact => {
                    if var.deflate {
                        return Err(Status::EINVAL);
                    }
                    var.chunk_sizes.clear();
                },
            }
            var.chunking = mode;
            Ok(())
        })
    }

    fn inq_natts(&self, ncid: i32, varid: i32) -> LibResult<usize> {
        self.read(ncid, |dataset, group| Ok(dataset.atts(group, varid)?.len()))
    }

    fn inq_attname(&self, ncid: i32, varid: i32, index: usize) -> LibResult<String> {
        self.read(ncid, |dataset, group| {
            dataset
                .atts(group, varid)?
                .get(index)
                .map(|a| a.name.clone())
                .ok_or(Status::ENOTATT)
        })
    }

    fn inq_att(&self, ncid: i32, varid: i32, name: &str) -> LibResult<(i32, usize)> {
        self.read(ncid, |dataset, group| {
            Ok(match dataset.att(group, varid, name)? {
                AttValue::Typed(buffer) => (buffer.kind().code(), buffer.len()),
                AttValue::Raw { type_code, len } => (*type_code, *len),
            })
        })
    }

    fn get_att(&self, ncid: i32, varid: i32, name: &str, buffer: &mut Buffer) -> LibResult<()> {
        self.read(ncid, |dataset, group| match dataset.att(group, varid, name)? {
            AttValue::Typed(stored) => {
                if stored.kind().is_numeric() != buffer.kind().is_numeric() {
                    return Err(Status::ECHAR);
                }
                if stored.kind() != buffer.kind() {
                    return Err(Status::EBADTYPE);
                }
                if stored.len() != buffer.len() {
                    return Err(Status::EINVAL);
                }
                *buffer = stored.clone();
                Ok(())
            },
            AttValue::Raw { .. } => Err(Status::EBADTYPE),
        })
    }

    fn get_att_text(&self, ncid: i32, varid: i32, name: &str, text: &mut Text) -> LibResult<()> {
        self.read(ncid, |dataset, group| match dataset.att(group, varid, name)? {
            AttValue::Typed(Buffer::Char(stored)) => {
                if stored.len() != text.len() {
                    return Err(Status::EINVAL);
                }
                *text = stored.clone();
                Ok(())
            },
            AttValue::Typed(_) => Err(Status::ECHAR),
            AttValue::Raw { .. } => Err(Status::EBADTYPE),
        })
    }

    fn get_att_string(&self, ncid: i32, varid: i32, name: &str, strings: &mut [String]) -> LibResult<()> {
        self.read(ncid, |dataset, group| match dataset.att(group, varid, name)? {
            AttValue::Typed(Buffer::String(stored)) => {
                if stored.len() != strings.len() {
                    return Err(Status::EINVAL);
                }
                strings.clone_from_slice(stored);
                Ok(())
            },
            AttValue::Typed(_) | AttValue::Raw { .. } => Err(Status::EBADTYPE),
        })
    }

    fn put_att(&self, ncid: i32, varid: i32, name: &str, buffer: &Buffer) -> LibResult<()> {
        if !buffer.kind().is_numeric() {
            return Err(Status::EBADTYPE);
        }
        self.write(ncid, |dataset, group| {
            dataset.require_kind(buffer.kind())?;
            dataset.put_att(group, varid, name, AttValue::Typed(buffer.detached()))
        })
    }

    fn put_att_text(&self, ncid: i32, varid: i32, name: &str, text: &Text) -> LibResult<()> {
        self.write(ncid, |dataset, group| {
            dataset.put_att(group, varid, name, AttValue::Typed(Buffer::Char(text.clone())))
        })
    }

    fn put_att_string(&self, ncid: i32, varid: i32, name: &str, strings: &[String]) -> LibResult<()> {
        self.write(ncid, |dataset, group| {
            dataset.require_kind(ElementKind::String)?;
            dataset.put_att(group, varid, name, AttValue::Typed(Buffer::String(strings.to_vec())))
        })
    }

    fn rename_att(&self, ncid: i32, varid: i32, name: &str, new_name: &str) -> LibResult<()> {
        validate_name(new_name)?;
        self.write(ncid, |dataset, group| {
            let atts = dataset.atts_mut(group, varid)?;
            if name != new_name && atts.iter().any(|a| a.name == new_name) {
                return Err(Status::ENAMEINUSE);
            }
            let att = atts.iter_mut().find(|a| a.name == name).ok_or(Status::ENOTATT)?;
            att.name = new_name.to_string();
            Ok(())
        })
    }

    fn del_att(&self, ncid: i32, varid: i32, name: &str) -> LibResult<()> {
        self.write(ncid, |dataset, group| {
            let atts = dataset.atts_mut(group, varid)?;
            let index = atts.iter().position(|a| a.name == name).ok_or(Status::ENOTATT)?;
            atts.remove(index);
            Ok(())
        })
    }
}
