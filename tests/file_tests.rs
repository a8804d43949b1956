//! File lifecycle: open modes, formats, close, sync and the lifecycle lock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use nc4async::library::{LibraryCall, MemoryLibrary};
use nc4async::types::HostValue;
use nc4async::{File, NcError, OpenMode};
use serde_json::json;

use common::event_loop;

// ─── Opening ────────────────────────────────────────────────────────────────

mod opening {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn create_reports_format_and_mode() {
        let library = Arc::new(MemoryLibrary::new());
        let shown = event_loop()
            .block_on(|engine| {
                let library = Arc::clone(&library);
                async move {
                    let file = nc4async::open(&engine, library, "grid.nc", "c", None).await?;
                    assert_eq!(file.mode(), OpenMode::Create);
                    assert_eq!(file.name(), "grid.nc");
                    assert_eq!(file.root().name(), "/");
                    let shown = file.inspect();
                    file.close().await?;
                    Ok::<_, NcError>(shown)
                }
            })
            .unwrap();
        assert_eq!(shown, "[hdf5 file grid.nc]");
        assert!(library.contains("grid.nc"));
    }

    #[test]
    fn classic_formats_report_netcdf3() {
        let library = Arc::new(MemoryLibrary::new());
        let formats = event_loop()
            .block_on(|engine| async move {
                let mut formats = Vec::new();
                for (path, format) in [("a.nc", "classic"), ("b.nc", "classic64"), ("c.nc", "netcdf4classic")] {
                    let file = nc4async::open(&engine, library.clone(), path, "c", Some(format)).await?;
                    formats.push(file.format());
                    file.close().await?;
                }
                Ok::<_, NcError>(formats)
            })
            .unwrap();
        assert_eq!(formats, vec!["netcdf3", "netcdf3", "hdf5"]);
    }

    #[test]
    fn missing_file_rejects_with_library_message() {
        let library = Arc::new(MemoryLibrary::new());
        let event_loop = event_loop();
        let err = event_loop
            .block_on(|engine| async move { nc4async::open(&engine, library, "nope.nc", "r", None).await })
            .unwrap_err();
        assert_eq!(err.to_string(), "NetCDF4: No such file or directory");
        assert_eq!(event_loop.stats().scheduled, 1);
        assert_eq!(event_loop.stats().rejected, 1);
    }

    #[test]
    fn create_refuses_existing_unless_clobbering() {
        let library = Arc::new(MemoryLibrary::new());
        let (refused, clobbered) = event_loop().block_on(|engine| async move {
            let first = nc4async::open(&engine, library.clone(), "dup.nc", "c", None).await?;
            first.root().add_attribute("version", "int", &HostValue::from(1)).await?;
            first.close().await?;

            let refused = nc4async::open(&engine, library.clone(), "dup.nc", "c", None).await.err();
            let clobbered = nc4async::open(&engine, library, "dup.nc", "c!", None).await?;
            let attributes = clobbered.root().attributes(false).await?;
            Ok::<_, NcError>((refused, attributes))
        })
        .unwrap();
        assert_eq!(refused.unwrap().to_string(), "NetCDF4: File exists");
        assert!(clobbered.is_empty());
    }

    #[test]
    fn reopen_for_writing_sees_earlier_writes() {
        let library = Arc::new(MemoryLibrary::new());
        let listed = event_loop()
            .block_on(|engine| async move {
                let file = nc4async::open(&engine, library.clone(), "keep.nc", "c", None).await?;
                file.root().add_attribute("title", "char", &HostValue::from("run 1")).await?;
                file.close().await?;

                let file = nc4async::open(&engine, library, "keep.nc", "w", None).await?;
                file.root().add_attribute("run", "int", &HostValue::from(2)).await?;
                file.root().attributes(false).await
            })
            .unwrap();
        assert_eq!(listed.keys().collect::<Vec<_>>(), vec!["title", "run"]);
    }

    #[test]
    fn read_only_file_refuses_writes() {
        let library = Arc::new(MemoryLibrary::new());
        let err = event_loop()
            .block_on(|engine| async move {
                nc4async::open(&engine, library.clone(), "ro.nc", "c", None).await?.close().await?;
                let file = nc4async::open(&engine, library, "ro.nc", "r", None).await?;
                file.root().add_attribute("x", "int", &HostValue::from(1)).await
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "NetCDF4: NetCDF: Write to read only");
    }
}

// ─── Argument Validation ────────────────────────────────────────────────────

mod arguments {
    use super::*;
    use pretty_assertions::assert_eq;

    fn open_with(mode: &str, format: Option<&str>) -> (NcError, u64) {
        let library = Arc::new(MemoryLibrary::new());
        let event_loop = event_loop();
        let mode = mode.to_string();
        let format = format.map(str::to_string);
        let err = event_loop
            .block_on(|engine| async move {
                nc4async::open(&engine, library, "x.nc", &mode, format.as_deref()).await
            })
            .unwrap_err();
        (err, event_loop.stats().scheduled)
    }

    #[test]
    fn unknown_mode_rejects_without_scheduling() {
        let (err, scheduled) = open_with("a", None);
        assert_eq!(err, NcError::Argument("NetCDF4: Unknown file mode".to_string()));
        assert_eq!(scheduled, 0);
    }

    #[test]
    fn unknown_format_rejects_without_scheduling() {
        let (err, scheduled) = open_with("c", Some("zarr"));
        assert_eq!(err.to_string(), "NetCDF4: Unknown file format");
        assert_eq!(scheduled, 0);
    }

    #[test]
    fn format_is_checked_before_mode() {
        let (err, _) = open_with("?", Some("hdf4"));
        assert_eq!(err.to_string(), "NetCDF4: Unknown file format");
    }
}

// ─── Closing ────────────────────────────────────────────────────────────────

mod closing {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn close_resolves_id_and_status() {
        let library = Arc::new(MemoryLibrary::new());
        let (id, closed) = event_loop()
            .block_on(|engine| {
                let library = Arc::clone(&library);
                async move {
                    let file = nc4async::open(&engine, library, "close.nc", "c", None).await?;
                    let closed = file.close().await?;
                    Ok::<_, NcError>((file.id(), closed))
                }
            })
            .unwrap();
        assert_eq!(serde_json::to_value(closed).unwrap(), json!({"id": id, "status": 0}));
        assert_eq!(library.open_handles(), 0);
    }

    #[test]
    fn second_close_resolves_already_closed() {
        let library = Arc::new(MemoryLibrary::new());
        let event_loop = event_loop();
        let (second, shown) = event_loop
            .block_on(|engine| async move {
                let file = nc4async::open(&engine, library, "twice.nc", "c", None).await?;
                file.close().await?;
                assert!(file.is_closed());
                let second = file.close().await?;
                Ok::<_, NcError>((second, file.inspect()))
            })
            .unwrap();
        assert_eq!(second, HostValue::from("File already closed"));
        assert_eq!(shown, "[Closed hdf5 file twice.nc]");
        assert_eq!(event_loop.stats().scheduled, 2);
    }

    #[test]
    fn sync_and_data_mode_reject_after_close() {
        let library = Arc::new(MemoryLibrary::new());
        let event_loop = event_loop();
        let (synced, sync_err, mode_err) = event_loop.block_on(|engine| async move {
            let file = nc4async::open(&engine, library, "sync.nc", "c", None).await.unwrap();
            let synced = file.sync().await.unwrap() == file.id();
            file.close().await.unwrap();
            (synced, file.sync().await.unwrap_err(), file.data_mode().await.unwrap_err())
        });
        assert!(synced);
        let expected = NcError::FileClosed {
            path: "sync.nc".to_string(),
        };
        assert_eq!(sync_err, expected);
        assert_eq!(mode_err, expected);
        assert_eq!(sync_err.to_string(), "File already closed");
    }

    #[test]
    fn dropping_an_open_file_closes_it() {
        let library = Arc::new(MemoryLibrary::new());
        event_loop()
            .block_on(|engine| {
                let library = Arc::clone(&library);
                async move {
                    let file: File = nc4async::open(&engine, library, "drop.nc", "c", None).await?;
                    drop(file);
                    Ok::<_, NcError>(())
                }
            })
            .unwrap();
        assert_eq!(library.open_handles(), 0);
        let closes = library
            .journal()
            .into_iter()
            .filter(|call| matches!(call, LibraryCall::Exit { op: "close", .. }))
            .count();
        assert_eq!(closes, 1);
    }
}

// ─── Lifecycle Lock ─────────────────────────────────────────────────────────

mod lifecycle_lock {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lifecycle_calls_never_overlap() {
        let library = Arc::new(MemoryLibrary::new().with_lifecycle_latency(Duration::from_millis(5)));
        event_loop()
            .block_on(|engine| {
                let library = Arc::clone(&library);
                async move {
                    let pending: Vec<_> = (0..6)
                        .map(|i| nc4async::open(&engine, library.clone(), &format!("f{i}.nc"), "c", None))
                        .collect();
                    let mut files = Vec::new();
                    for future in pending {
                        files.push(future.await?);
                    }
                    let syncs: Vec<_> = files.iter().map(File::sync).collect();
                    let closes: Vec<_> = files.iter().map(File::close).collect();
                    for future in syncs {
                        // Syncs queued behind a close of the same file may see it closed.
                        let _ = future.await;
                    }
                    for future in closes {
                        future.await?;
                    }
                    Ok::<_, NcError>(())
                }
            })
            .unwrap();

        let journal = library.journal();
        assert!(journal.len() >= 6 * 4);
        for pair in journal.chunks(2) {
            match pair {
                [LibraryCall::Enter { op, path }, LibraryCall::Exit { op: exit_op, path: exit_path }] => {
                    assert_eq!(op, exit_op);
                    assert_eq!(path, exit_path);
                },
                other => panic!("interleaved lifecycle calls: {other:?}"),
            }
        }
        assert_eq!(library.open_handles(), 0);
    }

    #[test]
    fn close_and_reopen_of_one_file_do_not_interleave() {
        let library = Arc::new(MemoryLibrary::new().with_lifecycle_latency(Duration::from_millis(10)));
        let (closed, listed) = event_loop()
            .block_on(|engine| {
                let library = Arc::clone(&library);
                async move {
                    let file = nc4async::open(&engine, library.clone(), "a.nc", "c", None).await?;
                    file.root().add_attribute("run", "int", &HostValue::from(1)).await?;

                    let closing = file.close();
                    let reopening = nc4async::open(&engine, library, "a.nc", "w", None);
                    let closed = closing.await?;
                    let reopened = reopening.await?;

                    let listed = reopened.root().attributes(false).await?;
                    reopened.close().await?;
                    Ok::<_, NcError>((closed, listed))
                }
            })
            .unwrap();
        assert_eq!(serde_json::to_value(&closed).unwrap()["status"], json!(0));
        assert_eq!(listed.keys().collect::<Vec<_>>(), vec!["run"]);

        let journal = library.journal();
        let ops: Vec<&str> = journal
            .iter()
            .map(|call| match call {
                LibraryCall::Enter { op, .. } | LibraryCall::Exit { op, .. } => *op,
            })
            .collect();
        assert_eq!(ops.iter().filter(|op| **op == "open").count(), 2);
        assert_eq!(ops.iter().filter(|op| **op == "close").count(), 4);
        for pair in journal.chunks(2) {
            match pair {
                [LibraryCall::Enter { op, path }, LibraryCall::Exit { op: exit_op, path: exit_path }] => {
                    assert_eq!(op, exit_op);
                    assert_eq!(path, exit_path);
                    assert_eq!(path, "a.nc");
                },
                other => panic!("interleaved lifecycle calls: {other:?}"),
            }
        }
        assert_eq!(library.open_handles(), 0);
    }
}
