//! Attribute marshaling: list, add, rename and delete named attributes.
//!
//! Attributes are addressed by a `(ncid, varid)` pair, where `ncid` is the
//! containing file or group and `varid` is a variable id or
//! [`GLOBAL`](crate::library::GLOBAL) for group-level attributes.
//!
//! Every operation returns a [`TaskFuture`]. The library calls run in the
//! task's `work` closure under the shared file-lifecycle lock; host values
//! are only built in `on_complete`.

use std::sync::Arc;

use nc4async_tasks::{Engine, TaskFuture};
use tracing::debug;

use crate::error::{NcError, Result};
use crate::library::NcLibrary;
use crate::types::{Buffer, ElementKind, HostObject, HostValue, TypedValue};

/// Lists every attribute of `(ncid, varid)` in the library's enumeration
/// order.
///
/// With `with_types` each value is wrapped as `{type, value}`.
///
/// The listing fails as a whole if any attribute cannot be read, including
/// one whose stored type is not a supported element kind.
pub fn list(
    engine: &Engine,
    library: &Arc<dyn NcLibrary>,
    ncid: i32,
    varid: i32,
    with_types: bool,
) -> TaskFuture<HostObject, NcError> {
    let library = Arc::clone(library);
    engine.submit(
        move |ctx| -> Result<Vec<TypedValue>> {
            let _guard = ctx.lock().shared();
            let natts = library.inq_natts(ncid, varid)?;
            debug!(task_id = %ctx.task_id(), ncid, varid, natts, "listing attributes");
            (0..natts)
                .map(|index| {
                    let name = library.inq_attname(ncid, varid, index)?;
                    read(library.as_ref(), ncid, varid, &name)
                })
                .collect()
        },
        move |env, values| {
            let mut attributes = HostObject::new();
            for value in values {
                let name = value.name().to_string();
                let kind = value.kind();
                let host = value.to_host_value(env);
                if with_types {
                    attributes.insert(name, tagged(kind, host));
                } else {
                    attributes.insert(name, host);
                }
            }
            Ok(attributes)
        },
    )
}

/// Writes attribute `name` of type `kind` (a type token such as `"int"` or
/// `"f8"`) from a host value and resolves `{name: {type, value}}`.
///
/// An unknown type token or a value of the wrong shape rejects the returned
/// future immediately; no work is scheduled in that case. Typed arrays are
/// written straight from their backing store.
pub fn add(
    engine: &Engine,
    library: &Arc<dyn NcLibrary>,
    ncid: i32,
    varid: i32,
    name: &str,
    kind: &str,
    value: &HostValue,
) -> TaskFuture<HostObject, NcError> {
    let typed = kind
        .parse::<ElementKind>()
        .and_then(|kind| TypedValue::from_host_value(name, kind, value));
    let typed = match typed {
        Ok(typed) => typed,
        Err(err) => return engine.reject_now(err),
    };

    let library = Arc::clone(library);
    engine.submit(
        move |ctx| -> Result<TypedValue> {
            let _guard = ctx.lock().shared();
            debug!(
                task_id = %ctx.task_id(),
                ncid,
                varid,
                name = typed.name(),
                kind = %typed.kind(),
                len = typed.len(),
                "writing attribute"
            );
            write(library.as_ref(), ncid, varid, &typed)?;
            Ok(typed)
        },
        |env, typed| {
            let name = typed.name().to_string();
            let kind = typed.kind();
            let host = typed.to_host_value(env);
            Ok(HostObject::new().with(name, tagged(kind, host)))
        },
    )
}

/// Renames attribute `name` to `new_name`, resolving the new name.
pub fn rename(
    engine: &Engine,
    library: &Arc<dyn NcLibrary>,
    ncid: i32,
    varid: i32,
    name: &str,
    new_name: &str,
) -> TaskFuture<String, NcError> {
    let library = Arc::clone(library);
    let name = name.to_string();
    let new_name = new_name.to_string();
    engine.submit(
        move |ctx| -> Result<String> {
            let _guard = ctx.lock().shared();
            library.rename_att(ncid, varid, &name, &new_name)?;
            debug!(task_id = %ctx.task_id(), ncid, varid, from = %name, to = %new_name, "renamed attribute");
            Ok(new_name)
        },
        |_env, new_name| Ok(new_name),
    )
}

/// Deletes attribute `name`, resolving the deleted name.
pub fn delete(
    engine: &Engine,
    library: &Arc<dyn NcLibrary>,
    ncid: i32,
    varid: i32,
    name: &str,
) -> TaskFuture<String, NcError> {
    let library = Arc::clone(library);
    let name = name.to_string();
    engine.submit(
        move |ctx| -> Result<String> {
            let _guard = ctx.lock().shared();
            library.del_att(ncid, varid, &name)?;
            debug!(task_id = %ctx.task_id(), ncid, varid, name = %name, "deleted attribute");
            Ok(name)
        },
        |_env, name| Ok(name),
    )
}

/// Reads one attribute into a freshly allocated value.
pub(crate) fn read(library: &dyn NcLibrary, ncid: i32, varid: i32, name: &str) -> Result<TypedValue> {
    let (type_code, len) = library.inq_att(ncid, varid, name)?;
    let mut value = TypedValue::allocate_code(type_code, len)?;
    match value.buffer_mut() {
        Buffer::Char(text) => library.get_att_text(ncid, varid, name, text)?,
        Buffer::String(strings) => library.get_att_string(ncid, varid, name, strings)?,
        buffer => library.get_att(ncid, varid, name, buffer)?,
    }
    Ok(TypedValue::new(name, value.into_buffer()))
}

/// Writes one attribute through the put call matching its kind.
pub(crate) fn write(library: &dyn NcLibrary, ncid: i32, varid: i32, value: &TypedValue) -> Result<()> {
    let name = value.name();
    match value.buffer() {
        Buffer::Char(text) => library.put_att_text(ncid, varid, name, text)?,
        Buffer::String(strings) => library.put_att_string(ncid, varid, name, strings)?,
        buffer => library.put_att(ncid, varid, name, buffer)?,
    }
    Ok(())
}

fn tagged(kind: ElementKind, value: HostValue) -> HostObject {
    HostObject::new().with("type", kind.as_str()).with("value", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{FileFormat, MemoryLibrary, Status, GLOBAL};
    use crate::types::{Elements, Text};
    use pretty_assertions::assert_eq;

    fn library() -> (Arc<MemoryLibrary>, i32) {
        let lib = Arc::new(MemoryLibrary::new());
        let ncid = lib.create("attrs.nc", FileFormat::Netcdf4, false).unwrap();
        (lib, ncid)
    }

    #[test]
    fn read_dispatches_on_stored_kind() {
        let (lib, ncid) = library();
        lib.put_att_text(ncid, GLOBAL, "title", &Text::from("sst")).unwrap();
        lib.put_att(ncid, GLOBAL, "rank", &Buffer::Int(Elements::Owned(vec![3])))
            .unwrap();

        let title = read(lib.as_ref(), ncid, GLOBAL, "title").unwrap();
        assert_eq!(title.name(), "title");
        assert_eq!(title.buffer(), &Buffer::Char(Text::from("sst")));

        let rank = read(lib.as_ref(), ncid, GLOBAL, "rank").unwrap();
        assert_eq!(rank.kind(), ElementKind::Int);
        assert_eq!(rank.len(), 1);
    }

    #[test]
    fn read_rejects_unsupported_stored_types() {
        let (lib, ncid) = library();
        lib.put_raw_att(ncid, GLOBAL, "opaque", 14, 1).unwrap();
        let err = read(lib.as_ref(), ncid, GLOBAL, "opaque").unwrap_err();
        assert!(matches!(err, NcError::UnsupportedType(_)));
    }

    #[test]
    fn write_surfaces_library_status() {
        let (lib, ncid) = library();
        let value = TypedValue::new("x", Buffer::Int(Elements::Owned(vec![1])));
        let err = write(lib.as_ref(), ncid, 7, &value).unwrap_err();
        assert_eq!(
            err,
            NcError::Library {
                status: Status::ENOTVAR,
                message: Status::ENOTVAR.message().to_string(),
            }
        );
    }
}
