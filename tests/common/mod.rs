//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use nc4async::library::{Chunking, FileFormat, LibResult, MemoryLibrary, NcLibrary, StorageFormat, VarMeta};
use nc4async::types::{Buffer, ElementKind, Text};
use nc4async::{EngineConfig, EventLoop};
use parking_lot::Mutex;

pub fn event_loop() -> EventLoop {
    EventLoop::new(EngineConfig::default().with_worker_threads(4)).unwrap()
}

/// Wraps a [`MemoryLibrary`] and records the name of every call made
/// through it.
#[derive(Debug, Default)]
pub struct CountingLibrary {
    inner: MemoryLibrary,
    calls: Mutex<Vec<&'static str>>,
}

impl CountingLibrary {
    pub fn new(inner: MemoryLibrary) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn inner(&self) -> &MemoryLibrary {
        &self.inner
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().push(name);
    }
}

macro_rules! delegate {
    ($($name:ident(&self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)*) => {
        $(
            fn $name(&self $(, $arg: $ty)*) -> $ret {
                self.record(stringify!($name));
                self.inner.$name($($arg),*)
            }
        )*
    };
}

impl NcLibrary for CountingLibrary {
    delegate! {
        create(&self, path: &str, format: FileFormat, clobber: bool) -> LibResult<i32>;
        open(&self, path: &str, writable: bool) -> LibResult<i32>;
        close(&self, ncid: i32) -> LibResult<()>;
        sync(&self, ncid: i32) -> LibResult<()>;
        enddef(&self, ncid: i32) -> LibResult<()>;
        inq_format(&self, ncid: i32) -> LibResult<StorageFormat>;
        inq_grpname(&self, ncid: i32) -> LibResult<String>;
        inq_grpname_full(&self, ncid: i32) -> LibResult<String>;
        rename_grp(&self, ncid: i32, name: &str) -> LibResult<()>;
        def_grp(&self, parent: i32, name: &str) -> LibResult<i32>;
        inq_grps(&self, ncid: i32) -> LibResult<Vec<i32>>;
        inq_grp_ncid(&self, ncid: i32, name: &str) -> LibResult<i32>;
        inq_dimids(&self, ncid: i32, include_parents: bool) -> LibResult<Vec<i32>>;
        inq_dim(&self, ncid: i32, dimid: i32) -> LibResult<(String, usize)>;
        def_dim(&self, ncid: i32, name: &str, len: usize) -> LibResult<i32>;
        inq_unlimdims(&self, ncid: i32) -> LibResult<Vec<i32>>;
        inq_varids(&self, ncid: i32) -> LibResult<Vec<i32>>;
        inq_varid(&self, ncid: i32, name: &str) -> LibResult<i32>;
        inq_var(&self, ncid: i32, varid: i32) -> LibResult<VarMeta>;
        def_var(&self, ncid: i32, name: &str, kind: ElementKind, dim_ids: &[i32]) -> LibResult<i32>;
        rename_var(&self, ncid: i32, varid: i32, name: &str) -> LibResult<()>;
        get_vars(&self, ncid: i32, varid: i32, start: &[usize], count: &[usize], stride: &[isize], buffer: &mut Buffer) -> LibResult<()>;
        put_vars(&self, ncid: i32, varid: i32, start: &[usize], count: &[usize], stride: &[isize], buffer: &Buffer) -> LibResult<()>;
        inq_var_deflate(&self, ncid: i32, varid: i32) -> LibResult<(bool, bool, i32)>;
        def_var_deflate(&self, ncid: i32, varid: i32, shuffle: bool, deflate: bool, level: i32) -> LibResult<()>;
        inq_var_chunking(&self, ncid: i32, varid: i32) -> LibResult<(Chunking, Vec<usize>)>;
        def_var_chunking(&self, ncid: i32, varid: i32, mode: Chunking, sizes: &[usize]) -> LibResult<()>;
        inq_natts(&self, ncid: i32, varid: i32) -> LibResult<usize>;
        inq_attname(&self, ncid: i32, varid: i32, index: usize) -> LibResult<String>;
        inq_att(&self, ncid: i32, varid: i32, name: &str) -> LibResult<(i32, usize)>;
        get_att(&self, ncid: i32, varid: i32, name: &str, buffer: &mut Buffer) -> LibResult<()>;
        get_att_text(&self, ncid: i32, varid: i32, name: &str, text: &mut Text) -> LibResult<()>;
        get_att_string(&self, ncid: i32, varid: i32, name: &str, strings: &mut [String]) -> LibResult<()>;
        put_att(&self, ncid: i32, varid: i32, name: &str, buffer: &Buffer) -> LibResult<()>;
        put_att_text(&self, ncid: i32, varid: i32, name: &str, text: &Text) -> LibResult<()>;
        put_att_string(&self, ncid: i32, varid: i32, name: &str, strings: &[String]) -> LibResult<()>;
        rename_att(&self, ncid: i32, varid: i32, name: &str, new_name: &str) -> LibResult<()>;
        del_att(&self, ncid: i32, varid: i32, name: &str) -> LibResult<()>;
    }
}
