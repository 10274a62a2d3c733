use indexmap::IndexMap;
use smallvec::SmallVec;

use super::class::ClsId;

/// Slot handle into the collector arena. Freed slots are recycled, but a
/// slot stays pinned while the deferred-garbage list holds its object.
pub type ObjId = usize;

#[derive(Debug, Clone, Default)]
pub struct GTList {
    pub(crate) vs: Vec<ObjId>,
}

impl GTList {
    pub fn new() -> Self {
        Self { vs: Vec::new() }
    }

    pub fn get_items(&self) -> &[ObjId] {
        &self.vs
    }
}

#[derive(Debug, Clone, Default)]
pub struct GTInst {
    pub(crate) attrs: IndexMap<String, ObjId>,
}

impl GTInst {
    pub fn new() -> Self {
        Self {
            attrs: IndexMap::new(),
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<ObjId> {
        self.attrs.get(name).copied()
    }
}

#[derive(Debug, Clone)]
pub struct GTFrame {
    pub(crate) function: String,
    pub(crate) locals: SmallVec<[ObjId; 4]>,
}

impl GTFrame {
    pub fn new<S>(function: S) -> Self
    where
        S: ToString,
    {
        Self {
            function: function.to_string(),
            locals: SmallVec::new(),
        }
    }

    pub fn get_function(&self) -> &str {
        &self.function
    }
}

#[derive(Debug, Clone)]
pub struct GTCode {
    pub(crate) name: String,
    pub(crate) consts: SmallVec<[ObjId; 2]>,
}

impl GTCode {
    pub fn new<S>(name: S) -> Self
    where
        S: ToString,
    {
        Self {
            name: name.to_string(),
            consts: SmallVec::new(),
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
pub enum GTValue {
    Integer(i64),
    Float(f64),
    String(String),
    Bool(bool),
    List(GTList),
    Inst(GTInst),
    Frame(GTFrame),
    Code(GTCode),
    None,
}

#[derive(Debug)]
pub struct GTObject {
    pub(crate) cls: ClsId,
    pub(crate) value: GTValue,
    pub(crate) ref_count: u32,
    pub(crate) free: bool,
}

impl GTObject {
    pub fn new(value: GTValue, cls: ClsId) -> Self {
        Self {
            cls,
            value,
            ref_count: 1,
            free: false,
        }
    }

    /// Every object id this object keeps alive, one entry per reference.
    pub fn ref_ids(&self) -> SmallVec<[ObjId; 4]> {
        let mut out = SmallVec::new();
        match &self.value {
            GTValue::List(l) => out.extend_from_slice(&l.vs),
            GTValue::Inst(inst) => out.extend(inst.attrs.values().copied()),
            GTValue::Frame(f) => out.extend_from_slice(&f.locals),
            GTValue::Code(c) => out.extend_from_slice(&c.consts),
            _ => {}
        }
        out
    }
}
