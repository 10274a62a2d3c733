use crate::utils::error::GTError;

use self::base::{GTValue, ObjId};
use self::class::ClsId;

pub mod base;
pub mod class;
pub mod collector;

/// The collector surface the tracking engine consumes: force a full pass,
/// toggle the retain-all diagnostic mode inside an exclusive session, and
/// inspect the append-only deferred-garbage list.
pub trait GarbageCollector {
    fn new_object(&mut self, value: GTValue, cls: ClsId) -> ObjId;

    fn collect(&mut self);

    /// Acquire the exclusive diagnostic session. At most one tracking window
    /// may hold it across the process.
    fn open_session(&mut self) -> Result<(), GTError>;

    fn close_session(&mut self);

    fn set_retain_all(&mut self, retain: bool);

    fn garbage_len(&self) -> usize;

    fn garbage_from(&self, index: usize) -> &[ObjId];

    fn uncollectable_count(&self) -> u64;
}

#[derive(Debug, Default)]
pub struct CollectStats {
    pub(crate) collect_count: u64,
    pub(crate) count_free: u64,
    pub(crate) count_retained: u64,
    pub(crate) count_uncollectable: u64,
    pub(crate) collect_time: u64, // in microseconds
}

impl CollectStats {
    pub fn get_collect_count(&self) -> u64 {
        self.collect_count
    }

    pub fn get_count_free(&self) -> u64 {
        self.count_free
    }

    pub fn get_count_retained(&self) -> u64 {
        self.count_retained
    }

    pub fn get_count_uncollectable(&self) -> u64 {
        self.count_uncollectable
    }

    pub fn get_collect_time(&self) -> u64 {
        self.collect_time
    }
}
