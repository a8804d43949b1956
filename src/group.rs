//! Group handles: subgroups, dimensions, variables and group attributes.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use nc4async_tasks::{Engine, TaskFuture};
use tracing::debug;

use crate::attribute;
use crate::entity::{DimensionInfo, GroupResult, VariableInfo};
use crate::error::{NcError, Result};
use crate::library::{NcLibrary, GLOBAL};
use crate::types::{ElementKind, HostObject, HostValue};
use crate::variable::Variable;

/// A group inside an open file. Clones share the cached name.
#[derive(Clone)]
pub struct Group {
    engine: Engine,
    library: Arc<dyn NcLibrary>,
    id: i32,
    name: Rc<RefCell<String>>,
}

impl Group {
    pub(crate) fn new(engine: Engine, library: Arc<dyn NcLibrary>, id: i32, name: String) -> Self {
        Self {
            engine,
            library,
            id,
            name: Rc::new(RefCell::new(name)),
        }
    }

    fn child(&self, result: GroupResult) -> Self {
        Self::new(self.engine.clone(), Arc::clone(&self.library), result.id, result.name)
    }

    /// The group's ncid.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// The group name as last seen; `/` for the root group.
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    /// `[Group <name>]`
    pub fn inspect(&self) -> String {
        format!("[Group {}]", self.name.borrow())
    }

    /// Full path of the group, e.g. `/forecast/surface`.
    pub fn path(&self) -> TaskFuture<String, NcError> {
        let library = Arc::clone(&self.library);
        let id = self.id;
        self.engine.submit(
            move |ctx| -> Result<String> {
                let _guard = ctx.lock().shared();
                Ok(library.inq_grpname_full(id)?)
            },
            |_env, path| Ok(path),
        )
    }

    /// Renames the group and resolves the new name.
    pub fn set_name(&self, new_name: &str) -> TaskFuture<String, NcError> {
        let library = Arc::clone(&self.library);
        let id = self.id;
        let new_name = new_name.to_string();
        let cached = Rc::clone(&self.name);
        self.engine.submit(
            move |ctx| -> Result<String> {
                let _guard = ctx.lock().shared();
                library.rename_grp(id, &new_name)?;
                Ok(new_name)
            },
            move |_env, new_name| {
                cached.replace(new_name.clone());
                Ok(new_name)
            },
        )
    }

    /// Immediate subgroups keyed by name, in library order.
    pub fn subgroups(&self) -> TaskFuture<IndexMap<String, Group>, NcError> {
        let library = Arc::clone(&self.library);
        let id = self.id;
        let parent = self.clone();
        self.engine.submit(
            move |ctx| -> Result<Vec<GroupResult>> {
                let _guard = ctx.lock().shared();
                library
                    .inq_grps(id)?
                    .into_iter()
                    .map(|gid| {
                        Ok(GroupResult {
                            id: gid,
                            name: library.inq_grpname(gid)?,
                        })
                    })
                    .collect()
            },
            move |_env, groups| {
                Ok(groups
                    .into_iter()
                    .map(|result| (result.name.clone(), parent.child(result)))
                    .collect())
            },
        )
    }

    /// The subgroup called `name`.
    pub fn subgroup(&self, name: &str) -> TaskFuture<Group, NcError> {
        let library = Arc::clone(&self.library);
        let id = self.id;
        let name = name.to_string();
        let parent = self.clone();
        self.engine.submit(
            move |ctx| -> Result<GroupResult> {
                let _guard = ctx.lock().shared();
                let gid = library
                    .inq_grp_ncid(id, &name)
                    .map_err(|_| NcError::argument(format!("Bad or missing group \"{name}\"")))?;
                Ok(GroupResult { id: gid, name })
            },
            move |_env, result| Ok(parent.child(result)),
        )
    }

    /// Defines a subgroup.
    pub fn add_subgroup(&self, name: &str) -> TaskFuture<Group, NcError> {
        let library = Arc::clone(&self.library);
        let id = self.id;
        let name = name.to_string();
        let parent = self.clone();
        self.engine.submit(
            move |ctx| -> Result<GroupResult> {
                let _guard = ctx.lock().shared();
                let gid = library.def_grp(id, &name)?;
                debug!(task_id = %ctx.task_id(), parent = id, ncid = gid, name = %name, "group defined");
                Ok(GroupResult { id: gid, name })
            },
            move |_env, result| Ok(parent.child(result)),
        )
    }

    /// Dimensions visible from the group (including those of its ancestors),
    /// keyed by name. With `unlimited_only` only unlimited dimensions are
    /// listed.
    pub fn dimensions(&self, unlimited_only: bool) -> TaskFuture<HostObject, NcError> {
        let library = Arc::clone(&self.library);
        let id = self.id;
        self.engine.submit(
            move |ctx| -> Result<Vec<DimensionInfo>> {
                let _guard = ctx.lock().shared();
                let unlimited = library.inq_unlimdims(id)?;
                let dimids = if unlimited_only {
                    unlimited.clone()
                } else {
                    library.inq_dimids(id, true)?
                };
                dimids
                    .into_iter()
                    .map(|dimid| DimensionInfo::query(library.as_ref(), id, dimid, &unlimited))
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

    /// Defines a dimension of length `len`, or an unlimited one for `None`,
    /// and resolves its description.
    pub fn add_dimension(&self, name: &str, len: Option<usize>) -> TaskFuture<HostObject, NcError> {
        if len == Some(0) {
            return self
                .engine
                .reject_now(NcError::argument("Expected positive integer as dimension length"));
        }
        let library = Arc::clone(&self.library);
        let id = self.id;
        let name = name.to_string();
        self.engine.submit(
            move |ctx| -> Result<DimensionInfo> {
                let _guard = ctx.lock().shared();
                let dimid = library.def_dim(id, &name, len.unwrap_or(0))?;
                debug!(task_id = %ctx.task_id(), ncid = id, dimid, name = %name, "dimension defined");
                Ok(DimensionInfo {
                    id: dimid,
                    name,
                    len: len.unwrap_or(0),
                    unlimited: len.is_none(),
                })
            },
            |_env, dim| Ok(HostObject::from(dim)),
        )
    }

    /// Variables of the group keyed by name, in definition order.
    pub fn variables(&self) -> TaskFuture<IndexMap<String, Variable>, NcError> {
        let library = Arc::clone(&self.library);
        let id = self.id;
        let parent = self.clone();
        self.engine.submit(
            move |ctx| -> Result<Vec<VariableInfo>> {
                let _guard = ctx.lock().shared();
                library
                    .inq_varids(id)?
                    .into_iter()
                    .map(|varid| VariableInfo::query(library.as_ref(), id, varid))
                    .collect()
            },
            move |_env, infos| {
                infos
                    .into_iter()
                    .map(|info| Ok((info.name.clone(), parent.variable_from(info)?)))
                    .collect()
            },
        )
    }

    /// The variable called `name`.
    pub fn variable(&self, name: &str) -> TaskFuture<Variable, NcError> {
        let library = Arc::clone(&self.library);
        let id = self.id;
        let name = name.to_string();
        let parent = self.clone();
        self.engine.submit(
            move |ctx| -> Result<VariableInfo> {
                let _guard = ctx.lock().shared();
                let varid = library.inq_varid(id, &name)?;
                VariableInfo::query(library.as_ref(), id, varid)
            },
            move |_env, info| parent.variable_from(info),
        )
    }

    /// Defines a variable of type `kind` over the named dimensions.
    ///
    /// Dimension names are resolved against every dimension visible from
    /// the group. An unknown type token rejects immediately.
    pub fn add_variable(&self, name: &str, kind: &str, dims: &[&str]) -> TaskFuture<Variable, NcError> {
        let kind = match kind.parse::<ElementKind>() {
            Ok(kind) => kind,
            Err(err) => return self.engine.reject_now(err),
        };
        let library = Arc::clone(&self.library);
        let id = self.id;
        let name = name.to_string();
        let dims: Vec<String> = dims.iter().map(|d| (*d).to_string()).collect();
        let parent = self.clone();
        self.engine.submit(
            move |ctx| -> Result<VariableInfo> {
                let _guard = ctx.lock().shared();
                let dim_ids = resolve_dimensions(library.as_ref(), id, &dims)?;
                let varid = library.def_var(id, &name, kind, &dim_ids)?;
                debug!(task_id = %ctx.task_id(), ncid = id, varid, name = %name, kind = %kind, "variable defined");
                VariableInfo::query(library.as_ref(), id, varid)
            },
            move |_env, info| parent.variable_from(info),
        )
    }

    /// Group attributes keyed by name; see [`attribute::list`].
    pub fn attributes(&self, with_types: bool) -> TaskFuture<HostObject, NcError> {
        attribute::list(&self.engine, &self.library, self.id, GLOBAL, with_types)
    }

    /// Writes a group attribute; see [`attribute::add`].
    pub fn add_attribute(&self, name: &str, kind: &str, value: &HostValue) -> TaskFuture<HostObject, NcError> {
        attribute::add(&self.engine, &self.library, self.id, GLOBAL, name, kind, value)
    }

    /// Renames a group attribute; see [`attribute::rename`].
    pub fn rename_attribute(&self, name: &str, new_name: &str) -> TaskFuture<String, NcError> {
        attribute::rename(&self.engine, &self.library, self.id, GLOBAL, name, new_name)
    }

    /// Deletes a group attribute; see [`attribute::delete`].
    pub fn delete_attribute(&self, name: &str) -> TaskFuture<String, NcError> {
        attribute::delete(&self.engine, &self.library, self.id, GLOBAL, name)
    }

    fn variable_from(&self, info: VariableInfo) -> Result<Variable> {
        Variable::new(self.engine.clone(), Arc::clone(&self.library), info)
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.id)
            .field("name", &*self.name.borrow())
            .finish()
    }
}

fn resolve_dimensions(library: &dyn NcLibrary, ncid: i32, names: &[String]) -> Result<Vec<i32>> {
    let mut visible = Vec::new();
    for dimid in library.inq_dimids(ncid, true)? {
        let (name, _) = library.inq_dim(ncid, dimid)?;
        visible.push((name, dimid));
    }
    names
        .iter()
        .map(|wanted| {
            visible
                .iter()
                .rev()
                .find(|(name, _)| name == wanted)
                .map(|(_, dimid)| *dimid)
                .ok_or_else(|| NcError::argument(format!("Bad or missing dimension \"{wanted}\"")))
        })
        .collect()
}
