//! File handles: opening, creating, closing and syncing array files.
//!
//! [`open`] is the entry point. It returns a [`TaskFuture`] that resolves to
//! a [`File`] once the library has opened (or created) the file. Open,
//! create, sync and close hold the exclusive side of the engine's
//! file-lifecycle lock; every other operation holds the shared side.
//!
//! # Modes
//!
//! | Mode | Meaning |
//! |------|---------|
//! | `r`  | open read-only |
//! | `w`  | open for writing |
//! | `c`  | create, fail if the file exists |
//! | `c!` | create, replace an existing file |
//!
//! Formats (`classic`, `classic64`, `netcdf4`, `netcdf4classic`) only
//! matter for the create modes; `netcdf4` is the default.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use nc4async_tasks::{Engine, TaskFuture};
use tracing::{debug, warn};

use crate::entity::FileResult;
use crate::error::{NcError, Result};
use crate::group::Group;
use crate::library::{FileFormat, NcLibrary, StorageFormat};
use crate::types::{HostObject, HostValue};

/// How [`open`] treats the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// `r`
    Read,
    /// `w`
    Write,
    /// `c`
    Create,
    /// `c!`
    CreateClobber,
}

impl OpenMode {
    /// The mode token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::Write => "w",
            Self::Create => "c",
            Self::CreateClobber => "c!",
        }
    }
}

impl FromStr for OpenMode {
    type Err = NcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(Self::Read),
            "w" => Ok(Self::Write),
            "c" => Ok(Self::Create),
            "c!" => Ok(Self::CreateClobber),
            _ => Err(NcError::argument("Unknown file mode")),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_format(format: Option<&str>) -> Result<FileFormat> {
    match format {
        None => Ok(FileFormat::Netcdf4),
        Some(token) => token
            .parse()
            .map_err(|()| NcError::argument("Unknown file format")),
    }
}

/// Opens or creates the file at `path`.
///
/// Unknown modes and formats reject immediately, without scheduling work.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use nc4async::library::MemoryLibrary;
/// use nc4async::{EngineConfig, EventLoop};
///
/// let event_loop = EventLoop::new(EngineConfig::default()).unwrap();
/// let library = Arc::new(MemoryLibrary::new());
/// let inspect = event_loop.block_on(|engine| async move {
///     let file = nc4async::open(&engine, library, "demo.nc", "c", None).await?;
///     let shown = file.inspect();
///     file.close().await?;
///     Ok::<_, nc4async::NcError>(shown)
/// });
/// assert_eq!(inspect.unwrap(), "[hdf5 file demo.nc]");
/// ```
pub fn open(
    engine: &Engine,
    library: Arc<dyn NcLibrary>,
    path: &str,
    mode: &str,
    format: Option<&str>,
) -> TaskFuture<File, NcError> {
    let parsed = parse_format(format).and_then(|format| Ok((format, mode.parse::<OpenMode>()?)));
    let (format, mode) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => return engine.reject_now(err),
    };

    let path = path.to_string();
    let worker_library = Arc::clone(&library);
    let worker_path = path.clone();
    let file_engine = engine.clone();
    engine.submit(
        move |ctx| -> Result<FileResult> {
            let library = worker_library;
            let _guard = ctx.lock().exclusive();
            let id = match mode {
                OpenMode::Read => library.open(&worker_path, false)?,
                OpenMode::Write => library.open(&worker_path, true)?,
                OpenMode::Create => library.create(&worker_path, format, false)?,
                OpenMode::CreateClobber => library.create(&worker_path, format, true)?,
            };
            let result = FileResult {
                id,
                format: library.inq_format(id)?,
                group_name: library.inq_grpname(id)?,
            };
            debug!(task_id = %ctx.task_id(), ncid = id, path = %worker_path, mode = %mode, "file opened");
            Ok(result)
        },
        move |_env, result| Ok(File::new(file_engine, library, path, mode, result)),
    )
}

/// An open (or closed) array file.
///
/// Dropping a file that was never closed closes it synchronously.
pub struct File {
    engine: Engine,
    library: Arc<dyn NcLibrary>,
    id: i32,
    path: String,
    mode: OpenMode,
    format: StorageFormat,
    closed: Rc<Cell<bool>>,
    root: Group,
}

impl File {
    fn new(engine: Engine, library: Arc<dyn NcLibrary>, path: String, mode: OpenMode, result: FileResult) -> Self {
        let root = Group::new(engine.clone(), Arc::clone(&library), result.id, result.group_name);
        Self {
            engine,
            library,
            id: result.id,
            path,
            mode,
            format: result.format,
            closed: Rc::new(Cell::new(false)),
            root,
        }
    }

    /// The file's ncid.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Path the file was opened with.
    pub fn name(&self) -> &str {
        &self.path
    }

    /// Mode the file was opened with.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Storage format name (`netcdf3`, `hdf5`, ...).
    pub fn format(&self) -> &'static str {
        self.format.name()
    }

    /// `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// The root group.
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// `[<format> file <path>]`, prefixed with `Closed ` after close.
    pub fn inspect(&self) -> String {
        let prefix = if self.is_closed() { "Closed " } else { "" };
        format!("[{prefix}{} file {}]", self.format(), self.path)
    }

    /// Closes the file and resolves `{id, status}`, where `status` is the
    /// library's close status (0 on success).
    ///
    /// The file counts as closed as soon as this is called. Closing it again
    /// resolves the string `"File already closed"`.
    pub fn close(&self) -> TaskFuture<HostValue, NcError> {
        if self.closed.replace(true) {
            return self.engine.resolve_now(HostValue::from("File already closed"));
        }
        let library = Arc::clone(&self.library);
        let id = self.id;
        self.engine.submit(
            move |ctx| -> Result<i32> {
                let _guard = ctx.lock().exclusive();
                let status = match library.close(id) {
                    Ok(()) => 0,
                    Err(status) => {
                        warn!(task_id = %ctx.task_id(), ncid = id, status = %status, "close reported an error");
                        status.0
                    },
                };
                Ok(status)
            },
            move |_env, status| Ok(HostObject::new().with("id", id).with("status", status).into()),
        )
    }

    /// Flushes the file and resolves its id.
    pub fn sync(&self) -> TaskFuture<i32, NcError> {
        if let Err(err) = self.ensure_open() {
            return self.engine.reject_now(err);
        }
        let library = Arc::clone(&self.library);
        let id = self.id;
        self.engine.submit(
            move |ctx| -> Result<i32> {
                let _guard = ctx.lock().exclusive();
                library.sync(id)?;
                Ok(id)
            },
            |_env, id| Ok(id),
        )
    }

    /// Leaves define mode and resolves the file id.
    pub fn data_mode(&self) -> TaskFuture<i32, NcError> {
        if let Err(err) = self.ensure_open() {
            return self.engine.reject_now(err);
        }
        let library = Arc::clone(&self.library);
        let id = self.id;
        self.engine.submit(
            move |ctx| -> Result<i32> {
                let _guard = ctx.lock().shared();
                library.enddef(id)?;
                Ok(id)
            },
            |_env, id| Ok(id),
        )
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(NcError::FileClosed {
                path: self.path.clone(),
            })
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("format", &self.format.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if self.closed.replace(true) {
            return;
        }
        let _guard = self.engine.lock().exclusive();
        if let Err(status) = self.library.close(self.id) {
            warn!(ncid = self.id, status = %status, "close on drop failed");
        } else {
            debug!(ncid = self.id, path = %self.path, "file closed on drop");
        }
    }
}
