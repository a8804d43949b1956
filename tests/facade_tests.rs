//! Groups, dimensions and variables driven through file handles.

mod common;

use std::sync::Arc;

use nc4async::library::MemoryLibrary;
use nc4async::types::{HostValue, TypedArray};
use nc4async::{ElementKind, File, NcError};
use serde_json::json;

use common::event_loop;

/// Runs `body` against a freshly created NetCDF-4 file, closing it afterwards.
fn with_file<T, F, Fut>(body: F) -> Result<T, NcError>
where
    F: FnOnce(File) -> Fut,
    Fut: std::future::Future<Output = (File, Result<T, NcError>)>,
{
    let library = Arc::new(MemoryLibrary::new());
    event_loop().block_on(|engine| async move {
        let file = nc4async::open(&engine, library, "facade.nc", "c", None).await?;
        let (file, result) = body(file).await;
        file.close().await?;
        result
    })
}

fn to_json(value: impl serde::Serialize) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}

// ─── Groups ─────────────────────────────────────────────────────────────────

mod groups {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn nested_groups_report_full_paths() {
        let (path, names, shown) = with_file(|file| async move {
            let result = async {
                let forecast = file.root().add_subgroup("forecast").await?;
                let surface = forecast.add_subgroup("surface").await?;
                let path = surface.path().await?;
                let names: Vec<String> = file.root().subgroups().await?.into_keys().collect();
                Ok::<_, NcError>((path, names, forecast.inspect()))
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert_eq!(path, "/forecast/surface");
        assert_eq!(names, vec!["forecast"]);
        assert_eq!(shown, "[Group forecast]");
    }

    #[test]
    fn root_path_is_slash() {
        let path = with_file(|file| async move {
            let result = file.root().path().await;
            (file, result)
        })
        .unwrap();
        assert_eq!(path, "/");
    }

    #[test]
    fn subgroup_lookup_by_name() {
        let (found, missing) = with_file(|file| async move {
            let result = async {
                file.root().add_subgroup("obs").await?;
                let found = file.root().subgroup("obs").await?.path().await?;
                let missing = file.root().subgroup("model").await.unwrap_err();
                Ok::<_, NcError>((found, missing))
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert_eq!(found, "/obs");
        assert_eq!(missing.to_string(), "NetCDF4: Bad or missing group \"model\"");
    }

    #[test]
    fn renaming_updates_cached_name_and_path() {
        let (name, path) = with_file(|file| async move {
            let result = async {
                let group = file.root().add_subgroup("draft").await?;
                group.set_name("final").await?;
                Ok::<_, NcError>((group.name(), group.path().await?))
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert_eq!(name, "final");
        assert_eq!(path, "/final");
    }

    #[test]
    fn classic_files_have_no_subgroups() {
        let library = Arc::new(MemoryLibrary::new());
        let err = event_loop()
            .block_on(|engine| async move {
                let file = nc4async::open(&engine, library, "flat.nc", "c", Some("classic")).await?;
                file.root().add_subgroup("nested").await
            })
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "NetCDF4: NetCDF: Attempting netcdf-4 operation on netcdf-3 file"
        );
    }
}

// ─── Dimensions ─────────────────────────────────────────────────────────────

mod dimensions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_and_list_dimensions() {
        let (time, all, unlimited) = with_file(|file| async move {
            let result = async {
                let root = file.root();
                let time = root.add_dimension("time", None).await?;
                root.add_dimension("lat", Some(3)).await?;
                let all = root.dimensions(false).await?;
                let unlimited = root.dimensions(true).await?;
                Ok::<_, NcError>((time, all, unlimited))
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert_eq!(
            to_json(time),
            json!({"id": 0, "name": "time", "length": 0, "unlimited": true})
        );
        assert_eq!(
            to_json(all),
            json!({
                "time": {"id": 0, "name": "time", "length": 0, "unlimited": true},
                "lat": {"id": 1, "name": "lat", "length": 3, "unlimited": false},
            })
        );
        assert_eq!(unlimited.keys().collect::<Vec<_>>(), vec!["time"]);
    }

    #[test]
    fn zero_length_rejects_without_scheduling() {
        let library = Arc::new(MemoryLibrary::new());
        let event_loop = event_loop();
        let err = event_loop
            .block_on(|engine| async move {
                let file = nc4async::open(&engine, library, "zero.nc", "c", None).await?;
                file.root().add_dimension("x", Some(0)).await
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "NetCDF4: Expected positive integer as dimension length");
        assert_eq!(event_loop.stats().scheduled, 1);
    }

    #[test]
    fn subgroups_see_parent_dimensions() {
        let names = with_file(|file| async move {
            let result = async {
                file.root().add_dimension("lon", Some(4)).await?;
                let child = file.root().add_subgroup("child").await?;
                child.add_dimension("level", Some(2)).await?;
                child.dimensions(false).await
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert_eq!(names.keys().collect::<Vec<_>>(), vec!["lon", "level"]);
    }

    #[test]
    fn duplicate_name_is_a_library_error() {
        let err = with_file(|file| async move {
            let result = async {
                file.root().add_dimension("x", Some(2)).await?;
                file.root().add_dimension("x", Some(5)).await
            }
            .await;
            (file, result)
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "NetCDF4: NetCDF: String match to name in use");
    }
}

// ─── Variables ──────────────────────────────────────────────────────────────

mod variables {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn define_write_and_read_back() {
        let (shown, kind, block, one) = with_file(|file| async move {
            let result = async {
                let root = file.root();
                root.add_dimension("lat", Some(3)).await?;
                let temp = root.add_variable("temp", "float", &["lat"]).await?;
                let values = HostValue::from(TypedArray::from(vec![1.5_f32, 2.5, 3.5]));
                temp.write_slice(&[0], &[3], &values).await?;
                let block = temp.read_slice(&[0], &[3]).await?;
                let one = temp.read(&[1]).await?;
                Ok::<_, NcError>((temp.inspect(), temp.kind(), block, one))
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert_eq!(shown, "[Variable temp, type float, 1 dimension(s)]");
        assert_eq!(kind, ElementKind::Float);
        assert_eq!(block, HostValue::from(TypedArray::from(vec![1.5_f32, 2.5, 3.5])));
        assert_eq!(one, HostValue::from(2.5));
    }

    #[test]
    fn strided_access_skips_elements() {
        let (every_other, after) = with_file(|file| async move {
            let result = async {
                let root = file.root();
                root.add_dimension("x", Some(6)).await?;
                let x = root.add_variable("x", "int", &["x"]).await?;
                let values = HostValue::from(TypedArray::from(vec![0_i32, 1, 2, 3, 4, 5]));
                x.write_slice(&[0], &[6], &values).await?;
                let every_other = x.read_strided_slice(&[0], &[3], &[2]).await?;

                let ones = HostValue::from(TypedArray::from(vec![-1_i32, -1]));
                x.write_strided_slice(&[1], &[2], &[3], &ones).await?;
                let after = x.read_slice(&[0], &[6]).await?;
                Ok::<_, NcError>((every_other, after))
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert_eq!(every_other, HostValue::from(TypedArray::from(vec![0_i32, 2, 4])));
        assert_eq!(after, HostValue::from(TypedArray::from(vec![0_i32, -1, 2, 3, -1, 5])));
    }

    #[test]
    fn writes_past_the_end_grow_unlimited_dimensions() {
        let (block, dims) = with_file(|file| async move {
            let result = async {
                let root = file.root();
                root.add_dimension("time", None).await?;
                let t = root.add_variable("t", "double", &["time"]).await?;
                t.write(&[2], &HostValue::from(7.0)).await?;
                let block = t.read_slice(&[0], &[3]).await?;
                let dims = t.dimensions().await?;
                Ok::<_, NcError>((block, dims))
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert_eq!(block, HostValue::from(TypedArray::from(vec![0.0_f64, 0.0, 7.0])));
        assert_eq!(
            to_json(dims),
            json!({"time": {"id": 0, "name": "time", "length": 3, "unlimited": true}})
        );
    }

    #[test]
    fn scalar_variables_take_empty_indices() {
        let value = with_file(|file| async move {
            let result = async {
                let scalar = file.root().add_variable("count", "int64", &[]).await?;
                scalar.write(&[], &HostValue::BigInt(1 << 40)).await?;
                scalar.read(&[]).await
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert_eq!(value, HostValue::BigInt(1 << 40));
    }

    #[test]
    fn reading_outside_the_shape_is_a_library_error() {
        let err = with_file(|file| async move {
            let result = async {
                file.root().add_dimension("x", Some(2)).await?;
                let v = file.root().add_variable("v", "short", &["x"]).await?;
                v.read_slice(&[1], &[2]).await
            }
            .await;
            (file, result)
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "NetCDF4: NetCDF: Start+count exceeds dimension bound");
    }

    #[test]
    fn malformed_selections_reject_without_scheduling() {
        let library = Arc::new(MemoryLibrary::new());
        let event_loop = event_loop();
        let (rank, count) = event_loop.block_on(|engine| async move {
            let file = nc4async::open(&engine, library, "sel.nc", "c", None).await.unwrap();
            file.root().add_dimension("x", Some(4)).await.unwrap();
            let v = file.root().add_variable("v", "int", &["x"]).await.unwrap();
            let before = engine.stats().scheduled;
            let rank = v.read(&[0, 0]).await.unwrap_err();
            let short = HostValue::from(TypedArray::from(vec![1_i32, 2]));
            let count = v.write_slice(&[0], &[3], &short).await.unwrap_err();
            assert_eq!(engine.stats().scheduled, before);
            (rank, count)
        });
        assert!(rank.to_string().starts_with("NetCDF4: Wrong number of dimensions"));
        assert_eq!(count.to_string(), "NetCDF4: Wrong number of elements (expected 3, got 2)");
    }

    #[test]
    fn oversized_read_count_is_an_edge_error() {
        let err = with_file(|file| async move {
            let result = async {
                file.root().add_dimension("x", Some(3)).await?;
                let v = file.root().add_variable("v", "int", &["x"]).await?;
                let err = v.read_slice(&[0], &[usize::MAX]).await.unwrap_err();
                let strided = v.read_strided_slice(&[1], &[usize::MAX / 2], &[4]).await.unwrap_err();
                assert_eq!(strided, err);
                Ok::<_, NcError>(err)
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert!(matches!(err, NcError::Library { .. }));
        assert_eq!(err.to_string(), "NetCDF4: NetCDF: Start+count exceeds dimension bound");
    }

    #[test]
    fn overflowing_counts_reject_without_scheduling() {
        let library = Arc::new(MemoryLibrary::new());
        let event_loop = event_loop();
        let (read, write) = event_loop.block_on(|engine| async move {
            let file = nc4async::open(&engine, library, "huge.nc", "c", None).await.unwrap();
            file.root().add_dimension("y", Some(2)).await.unwrap();
            file.root().add_dimension("x", Some(2)).await.unwrap();
            let v = file.root().add_variable("v", "int", &["y", "x"]).await.unwrap();
            let before = engine.stats().scheduled;
            let huge = [1_usize << 33, 1 << 33];
            let read = v.read_slice(&[0, 0], &[usize::MAX, 2]).await.unwrap_err();
            let value = HostValue::from(TypedArray::from(vec![1_i32, 2, 3, 4]));
            let write = v.write_slice(&[0, 0], &huge, &value).await.unwrap_err();
            assert_eq!(engine.stats().scheduled, before);
            (read, write)
        });
        assert!(matches!(read, NcError::Argument(_)));
        assert!(write.to_string().contains("has too many elements"));
    }

    #[test]
    fn unknown_dimension_or_type_is_rejected() {
        let (dim, kind) = with_file(|file| async move {
            let dim = file.root().add_variable("v", "int", &["nope"]).await.unwrap_err();
            let kind = file.root().add_variable("w", "complex", &[]).await.unwrap_err();
            (file, Ok::<_, NcError>((dim, kind)))
        })
        .unwrap();
        assert_eq!(dim.to_string(), "NetCDF4: Bad or missing dimension \"nope\"");
        assert!(matches!(kind, NcError::UnsupportedType(_)));
    }

    #[test]
    fn lookup_listing_and_rename() {
        let (names, found, renamed) = with_file(|file| async move {
            let result = async {
                let root = file.root();
                root.add_dimension("x", Some(2)).await?;
                root.add_variable("b", "byte", &["x"]).await?;
                root.add_variable("a", "ubyte", &["x"]).await?;
                let names: Vec<String> = root.variables().await?.into_keys().collect();
                let found = root.variable("a").await?;
                found.set_name("alpha").await?;
                let renamed = root.variable("alpha").await?;
                Ok::<_, NcError>((names, found.name(), renamed.kind()))
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(found, "alpha");
        assert_eq!(renamed, ElementKind::UByte);
    }

    #[test]
    fn missing_variable_is_a_library_error() {
        let err = with_file(|file| async move {
            let result = file.root().variable("ghost").await;
            (file, result)
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "NetCDF4: NetCDF: Variable not found");
    }

    #[test]
    fn variable_attributes() {
        let listed = with_file(|file| async move {
            let result = async {
                file.root().add_dimension("x", Some(2)).await?;
                let v = file.root().add_variable("v", "float", &["x"]).await?;
                v.add_attribute("units", "char", &HostValue::from("K")).await?;
                v.add_attribute("scale", "float", &HostValue::from(0.5)).await?;
                v.rename_attribute("scale", "scale_factor").await?;
                v.attributes(true).await
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert_eq!(
            to_json(listed),
            json!({
                "units": {"type": "char", "value": "K"},
                "scale_factor": {"type": "float", "value": 0.5},
            })
        );
    }
}

// ─── Storage Settings ───────────────────────────────────────────────────────

mod storage {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deflate_switches_layout_to_chunked() {
        let (before, after, layout) = with_file(|file| async move {
            let result = async {
                file.root().add_dimension("x", Some(3)).await?;
                let v = file.root().add_variable("v", "double", &["x"]).await?;
                let before = v.deflate_info().await?;
                let after = v.set_deflate_info(true, true, 5).await?;
                let layout = v.chunking().await?;
                Ok::<_, NcError>((before, after, layout))
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert_eq!(to_json(before), json!({"shuffle": false, "deflate": false, "level": 0}));
        assert_eq!(to_json(after), json!({"shuffle": true, "deflate": true, "level": 5}));
        assert_eq!(to_json(layout), json!({"mode": "chunked", "sizes": [3]}));
    }

    #[test]
    fn chunking_round_trip() {
        let (chunked, contiguous) = with_file(|file| async move {
            let result = async {
                file.root().add_dimension("x", Some(8)).await?;
                let v = file.root().add_variable("v", "int", &["x"]).await?;
                let chunked = v.set_chunking("chunked", &[4]).await?;
                let contiguous = v.set_chunking("contiguous", &[]).await?;
                Ok::<_, NcError>((chunked, contiguous))
            }
            .await;
            (file, result)
        })
        .unwrap();
        assert_eq!(to_json(chunked), json!({"mode": "chunked", "sizes": [4]}));
        assert_eq!(to_json(contiguous), json!({"mode": "contiguous", "sizes": []}));
    }

    #[test]
    fn unknown_chunking_mode_is_an_argument_error() {
        let err = with_file(|file| async move {
            let result = async {
                let v = file.root().add_variable("v", "int", &[]).await?;
                v.set_chunking("striped", &[]).await
            }
            .await;
            (file, result)
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "NetCDF4: Unknown chunking mode \"striped\"");
    }
}
