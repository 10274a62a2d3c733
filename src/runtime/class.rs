use crate::utils::error::GTError;

use super::base::ObjId;
use super::collector::CycleCollector;

/// Index into the collector's class table. Type identity is ClsId equality.
pub type ClsId = usize;

/// Class-supplied structured rendering hook. May fail or panic; the
/// formatter contains both.
pub type ReprFn = fn(&CycleCollector, ObjId) -> Result<String, GTError>;

#[derive(Debug, Clone)]
pub struct GTClass {
    pub(crate) name: String,
    pub(crate) module: String,
    qualified: String,
    pub(crate) has_finalizer: bool,
    pub(crate) repr_fn: Option<ReprFn>,
}

impl GTClass {
    pub fn new<S>(module: S, name: S) -> Self
    where
        S: ToString,
    {
        let module = module.to_string();
        let name = name.to_string();
        let qualified = format!("{}.{}", module, name);
        Self {
            name,
            module,
            qualified,
            has_finalizer: false,
            repr_fn: None,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_module(&self) -> &str {
        &self.module
    }

    /// `"<module>.<Name>"`, the form matched by name-based type suppression.
    pub fn qualified(&self) -> &str {
        &self.qualified
    }

    pub fn set_finalizer(&mut self, has_finalizer: bool) {
        self.has_finalizer = has_finalizer;
    }

    pub fn set_repr_fn(&mut self, repr_fn: ReprFn) {
        self.repr_fn = Some(repr_fn);
    }
}
