use std::time::Instant;

use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;

use crate::utils::error::{GTErrCode, GTError};

use super::base::{GTObject, GTValue, ObjId};
use super::class::{ClsId, GTClass};
use super::{CollectStats, GarbageCollector};

/// Classes registered by `CycleCollector::new`, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreCls {
    IntegerCls = 0,
    FloatCls = 1,
    StringCls = 2,
    BoolCls = 3,
    NoneCls = 4,
    ListCls = 5,
    FrameCls = 6,
    CodeCls = 7,
}

impl CoreCls {
    pub fn get_id(self) -> ClsId {
        self as ClsId
    }
}

/// Reference-counting object arena with a deferred cycle collector.
///
/// Objects that only die through a reference cycle survive `drop_ref` and are
/// found by `collect`. In retain-all mode the collector appends them to the
/// deferred-garbage list instead of freeing them; objects whose class has a
/// finalizer are never freed by a pass and always land on that list.
pub struct CycleCollector {
    // Store all objects
    objects: Vec<Option<Box<GTObject>>>,
    // Free slots for objects
    free_slots: Vec<usize>,

    classes: Vec<GTClass>,
    class_names: AHashMap<String, ClsId>,

    // Append-only; entries own one reference to their object
    garbage: Vec<ObjId>,
    uncollectable: u64,

    retain_all: bool,
    session_open: bool,

    pub(crate) stats: CollectStats,
}

impl Default for CycleCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleCollector {
    pub fn new() -> Self {
        let mut gc = Self {
            objects: Vec::new(),
            free_slots: Vec::new(),
            classes: Vec::new(),
            class_names: AHashMap::new(),
            garbage: Vec::new(),
            uncollectable: 0,
            retain_all: false,
            session_open: false,
            stats: CollectStats::default(),
        };

        // Table order must match CoreCls
        for name in [
            "Integer", "Float", "String", "Bool", "NoneType", "List", "Frame", "Code",
        ] {
            gc.register_class(GTClass::new("core", name));
        }

        gc
    }

    pub fn register_class(&mut self, cls: GTClass) -> ClsId {
        let id = self.classes.len();
        self.class_names.insert(cls.qualified().to_string(), id);
        self.classes.push(cls);
        id
    }

    pub fn get_class(&self, cls: ClsId) -> &GTClass {
        &self.classes[cls]
    }

    pub fn lookup_class(&self, qualified: &str) -> Option<ClsId> {
        self.class_names.get(qualified).copied()
    }

    pub fn qualified_name(&self, cls: ClsId) -> &str {
        self.classes[cls].qualified()
    }

    #[cfg_attr(feature = "more_inline", inline(always))]
    pub fn is_alive(&self, id: ObjId) -> bool {
        matches!(self.objects.get(id), Some(Some(obj)) if !obj.free)
    }

    #[cfg_attr(feature = "more_inline", inline(always))]
    pub fn cls_of(&self, id: ObjId) -> Option<ClsId> {
        match self.objects.get(id) {
            Some(Some(obj)) if !obj.free => Some(obj.cls),
            _ => None,
        }
    }

    /// Stable identity for an object: the address of its boxed slot. Valid
    /// for as long as the object is alive.
    pub fn address_of(&self, id: ObjId) -> Option<usize> {
        match self.objects.get(id) {
            Some(Some(obj)) if !obj.free => Some(&**obj as *const GTObject as usize),
            _ => None,
        }
    }

    pub fn value_of(&self, id: ObjId) -> Option<&GTValue> {
        match self.objects.get(id) {
            Some(Some(obj)) if !obj.free => Some(&obj.value),
            _ => None,
        }
    }

    pub fn ref_count_of(&self, id: ObjId) -> Option<u32> {
        match self.objects.get(id) {
            Some(Some(obj)) if !obj.free => Some(obj.ref_count),
            _ => None,
        }
    }

    pub fn children_of(&self, id: ObjId) -> SmallVec<[ObjId; 4]> {
        match self.objects.get(id) {
            Some(Some(obj)) if !obj.free => obj.ref_ids(),
            _ => SmallVec::new(),
        }
    }

    pub fn get_stats(&self) -> &CollectStats {
        &self.stats
    }

    pub fn garbage(&self) -> &[ObjId] {
        &self.garbage
    }

    #[cfg_attr(feature = "more_inline", inline(always))]
    pub fn incref(&mut self, id: ObjId) {
        if let Some(obj) = self.objects.get_mut(id).and_then(|s| s.as_mut()) {
            if !obj.free {
                obj.ref_count += 1;
            }
        }
    }

    /// Release one reference. Hitting zero reclaims the object immediately
    /// and releases everything it references; cycles never reach zero here
    /// and are left for `collect`.
    pub fn drop_ref(&mut self, id: ObjId) {
        let mut work: Vec<ObjId> = vec![id];
        while let Some(id) = work.pop() {
            let mut dead = false;
            let mut children: SmallVec<[ObjId; 4]> = SmallVec::new();
            if let Some(obj) = self.objects.get_mut(id).and_then(|s| s.as_mut()) {
                if obj.free || obj.ref_count == 0 {
                    continue;
                }
                obj.ref_count -= 1;
                if obj.ref_count == 0 {
                    children = obj.ref_ids();
                    dead = true;
                }
            }
            if dead {
                work.extend(children.iter().copied());
                self.free_slot(id);
            }
        }
    }

    pub fn list_push(&mut self, list: ObjId, item: ObjId) -> Result<(), GTError> {
        if !self.is_alive(item) {
            return Err(GTError::new(
                format!("object {} is not alive", item),
                GTErrCode::NotValidObject,
            ));
        }
        let obj = self.live_mut(list)?;
        match &mut obj.value {
            GTValue::List(l) => l.vs.push(item),
            _ => {
                return Err(GTError::new(
                    "list_push target is not a List",
                    GTErrCode::NotValidObject,
                ))
            }
        }
        self.incref(item);
        Ok(())
    }

    pub fn set_attr(&mut self, inst: ObjId, name: &str, val: ObjId) -> Result<(), GTError> {
        if !self.is_alive(val) {
            return Err(GTError::new(
                format!("object {} is not alive", val),
                GTErrCode::NotValidObject,
            ));
        }
        let obj = self.live_mut(inst)?;
        let old = match &mut obj.value {
            GTValue::Inst(i) => i.attrs.insert(name.to_string(), val),
            _ => {
                return Err(GTError::new(
                    "set_attr target is not an Inst",
                    GTErrCode::NotValidObject,
                ))
            }
        };
        self.incref(val);
        if let Some(old) = old {
            self.drop_ref(old);
        }
        Ok(())
    }

    pub fn frame_push_local(&mut self, frame: ObjId, val: ObjId) -> Result<(), GTError> {
        if !self.is_alive(val) {
            return Err(GTError::new(
                format!("object {} is not alive", val),
                GTErrCode::NotValidObject,
            ));
        }
        let obj = self.live_mut(frame)?;
        match &mut obj.value {
            GTValue::Frame(f) => f.locals.push(val),
            _ => {
                return Err(GTError::new(
                    "frame_push_local target is not a Frame",
                    GTErrCode::NotValidObject,
                ))
            }
        }
        self.incref(val);
        Ok(())
    }

    pub fn code_push_const(&mut self, code: ObjId, val: ObjId) -> Result<(), GTError> {
        if !self.is_alive(val) {
            return Err(GTError::new(
                format!("object {} is not alive", val),
                GTErrCode::NotValidObject,
            ));
        }
        let obj = self.live_mut(code)?;
        match &mut obj.value {
            GTValue::Code(c) => c.consts.push(val),
            _ => {
                return Err(GTError::new(
                    "code_push_const target is not a Code",
                    GTErrCode::NotValidObject,
                ))
            }
        }
        self.incref(val);
        Ok(())
    }

    fn live_mut(&mut self, id: ObjId) -> Result<&mut GTObject, GTError> {
        match self.objects.get_mut(id).and_then(|s| s.as_mut()) {
            Some(obj) if !obj.free => Ok(obj),
            _ => Err(GTError::new(
                format!("object {} is not alive", id),
                GTErrCode::NotValidObject,
            )),
        }
    }

    fn free_slot(&mut self, id: ObjId) {
        if let Some(obj) = self.objects.get_mut(id).and_then(|s| s.as_mut()) {
            obj.free = true;
            obj.value = GTValue::None;
            obj.ref_count = 0;
            self.free_slots.push(id);
            self.stats.count_free += 1;
        }
    }

    fn live_ids(&self) -> Vec<ObjId> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Some(obj) if !obj.free))
            .map(|(i, _)| i)
            .collect()
    }
}

impl GarbageCollector for CycleCollector {
    #[cfg_attr(feature = "more_inline", inline(always))]
    fn new_object(&mut self, value: GTValue, cls: ClsId) -> ObjId {
        // Reuse free slot if available
        if let Some(free_idx) = self.free_slots.pop() {
            let slot = &mut self.objects[free_idx];
            match slot {
                Some(obj) => {
                    obj.value = value;
                    obj.cls = cls;
                    obj.free = false;
                    obj.ref_count = 1;
                }
                None => *slot = Some(Box::new(GTObject::new(value, cls))),
            }
            return free_idx;
        }
        self.objects.push(Some(Box::new(GTObject::new(value, cls))));
        self.objects.len() - 1
    }

    fn collect(&mut self) {
        let start = Instant::now();
        let live = self.live_ids();

        // Trial deletion: subtract every internal reference, anything with a
        // reference left over is externally held and roots the mark phase.
        let mut gc_refs: AHashMap<ObjId, i64> = AHashMap::with_capacity(live.len());
        for &id in &live {
            if let Some(rc) = self.ref_count_of(id) {
                gc_refs.insert(id, rc as i64);
            }
        }
        for &id in &live {
            for child in self.children_of(id) {
                if let Some(r) = gc_refs.get_mut(&child) {
                    *r -= 1;
                }
            }
        }

        let mut reachable: AHashSet<ObjId> = AHashSet::with_capacity(live.len());
        let mut stack: Vec<ObjId> = live
            .iter()
            .copied()
            .filter(|id| gc_refs.get(id).map_or(false, |r| *r > 0))
            .collect();
        while let Some(id) = stack.pop() {
            if reachable.insert(id) {
                for child in self.children_of(id) {
                    if !reachable.contains(&child) {
                        stack.push(child);
                    }
                }
            }
        }

        // Slot order, so deferred-list appends are deterministic
        let unreachable: Vec<ObjId> = live
            .iter()
            .copied()
            .filter(|id| !reachable.contains(id))
            .collect();

        #[cfg(feature = "collect_trace")]
        log::trace!("collect: unreachable set {:?}", unreachable);

        // An unreachable object with a finalizer cannot be torn down safely,
        // and neither can anything it still reaches inside the garbage set.
        let unreachable_set: AHashSet<ObjId> = unreachable.iter().copied().collect();
        let mut uncollectable: AHashSet<ObjId> = AHashSet::new();
        let mut seeds: Vec<ObjId> = unreachable
            .iter()
            .copied()
            .filter(|&id| {
                self.cls_of(id)
                    .map_or(false, |cls| self.classes[cls].has_finalizer)
            })
            .collect();
        while let Some(id) = seeds.pop() {
            if unreachable_set.contains(&id) && uncollectable.insert(id) {
                seeds.extend(self.children_of(id).iter().copied());
            }
        }

        let mut count_uncollectable = 0u64;
        let mut count_retained = 0u64;
        let mut freed = 0u64;
        for &id in &unreachable {
            if uncollectable.contains(&id) {
                // The deferred list owns this reference from now on
                self.incref(id);
                self.garbage.push(id);
                count_uncollectable += 1;
            }
        }
        self.uncollectable += count_uncollectable;

        let remaining: Vec<ObjId> = unreachable
            .iter()
            .copied()
            .filter(|id| !uncollectable.contains(id))
            .collect();

        if self.retain_all {
            for &id in &remaining {
                self.incref(id);
                self.garbage.push(id);
                count_retained += 1;
            }
        } else {
            let remaining_set: AHashSet<ObjId> = remaining.iter().copied().collect();
            // Release references leaving the dying group, then tear the
            // group down directly; refcounts inside it are cycle-inflated.
            for &id in &remaining {
                for child in self.children_of(id) {
                    if !remaining_set.contains(&child) {
                        self.drop_ref(child);
                    }
                }
            }
            for &id in &remaining {
                self.free_slot(id);
                freed += 1;
            }
        }

        let elapsed = start.elapsed().as_micros() as u64;
        self.stats.collect_count += 1;
        self.stats.collect_time += elapsed;
        self.stats.count_retained += count_retained;
        self.stats.count_uncollectable += count_uncollectable;

        log::debug!(
            "collect pass: {} cyclic freed, {} retained, {} uncollectable, {}us",
            freed,
            count_retained,
            count_uncollectable,
            elapsed
        );
    }

    fn open_session(&mut self) -> Result<(), GTError> {
        if self.session_open {
            return Err(GTError::new(
                "collector diagnostic session already open",
                GTErrCode::SessionBusy,
            ));
        }
        self.session_open = true;
        Ok(())
    }

    fn close_session(&mut self) {
        self.retain_all = false;
        self.session_open = false;
    }

    fn set_retain_all(&mut self, retain: bool) {
        self.retain_all = retain;
    }

    fn garbage_len(&self) -> usize {
        self.garbage.len()
    }

    fn garbage_from(&self, index: usize) -> &[ObjId] {
        &self.garbage[index.min(self.garbage.len())..]
    }

    fn uncollectable_count(&self) -> u64 {
        self.uncollectable
    }
}
