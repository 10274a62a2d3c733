use crate::runtime::base::ObjId;
use crate::runtime::class::ClsId;
use crate::runtime::collector::{CoreCls, CycleCollector};
use crate::runtime::GarbageCollector;
use crate::utils::error::GTError;

use super::format::format_object;

pub const DEFAULT_MAX_REPORT_ITEMS: usize = 10;

/// One entry of a type-suppression filter: a runtime type identity, or the
/// qualified `"<module>.<Name>"` form of one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpec {
    Cls(ClsId),
    Name(String),
}

impl From<ClsId> for TypeSpec {
    fn from(cls: ClsId) -> Self {
        TypeSpec::Cls(cls)
    }
}

impl From<&str> for TypeSpec {
    fn from(name: &str) -> Self {
        TypeSpec::Name(name.to_string())
    }
}

/// Named tracker for cycle garbage that emerged during a tracking window.
///
/// A window brackets a monitored code region: `start` snapshots the
/// collector's deferred-garbage list and turns retention on, `stop` computes
/// the window's slice of that list and runs the suppression rules over it.
/// Garbage objects here are objects that are already out of use but keep
/// themselves alive through reference cycles.
pub struct GarbageTracker {
    name: String,
    enabled: bool,
    // Canonical policy: collected-but-cyclic garbage counts by default;
    // when false only uncollectable growth dirties the verdict.
    check_collected: bool,
    ignored: bool,
    open: bool,
    start_index: usize,
    start_uncollectable: u64,
    window_uncollectable: u64,
    uncollectable_total: u64,
    captured: Vec<ObjId>,
    ignored_types: Vec<TypeSpec>,
}

impl GarbageTracker {
    pub fn new<S>(name: S) -> Self
    where
        S: ToString,
    {
        Self {
            name: name.to_string(),
            enabled: false,
            check_collected: true,
            ignored: false,
            open: false,
            start_index: 0,
            start_uncollectable: 0,
            window_uncollectable: 0,
            uncollectable_total: 0,
            captured: Vec::new(),
            ignored_types: Vec::new(),
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_check_collected(&mut self, check_collected: bool) {
        self.check_collected = check_collected;
    }

    pub fn ignored(&self) -> bool {
        self.ignored
    }

    /// New garbage objects that emerged during the last closed window.
    pub fn garbage(&self) -> &[ObjId] {
        &self.captured
    }

    /// Uncollectable objects observed across all windows of this tracker.
    /// Never decreases.
    pub fn uncollectable_count(&self) -> u64 {
        self.uncollectable_total
    }

    pub fn window_uncollectable(&self) -> u64 {
        self.window_uncollectable
    }

    /// Open the tracking window. Must be called before the code to be
    /// tracked is run.
    ///
    /// Collecting before the baseline index is recorded flushes garbage left
    /// by unrelated prior code, so the baseline covers only already-known
    /// entries. Fails with `SessionBusy` when any window is open anywhere in
    /// the process.
    pub fn start(&mut self, gc: &mut CycleCollector) -> Result<(), GTError> {
        if !self.enabled {
            return Ok(());
        }
        gc.open_session()?;
        self.open = true;
        self.ignored = false;
        self.ignored_types.clear();
        gc.set_retain_all(false);
        gc.collect();
        self.start_index = gc.garbage_len();
        self.start_uncollectable = gc.uncollectable_count();
        gc.set_retain_all(true);
        log::debug!(
            "tracker {}: window open, baseline index {}",
            self.name,
            self.start_index
        );
        Ok(())
    }

    /// Veto the current window; `stop` will discard its result.
    pub fn ignore(&mut self) {
        if self.enabled {
            self.ignored = true;
        }
    }

    /// Close the tracking window. Must be called after the code to be
    /// tracked is run.
    pub fn stop(&mut self, gc: &mut CycleCollector) {
        if !self.enabled || !self.open {
            return;
        }
        self.open = false;
        gc.collect();
        gc.set_retain_all(false);
        // The collector only appends while retention is on, so the slice
        // from the baseline index is exactly this window's garbage.
        let delta: Vec<ObjId> = gc.garbage_from(self.start_index).to_vec();
        gc.close_session();

        self.window_uncollectable = gc.uncollectable_count() - self.start_uncollectable;
        self.uncollectable_total += self.window_uncollectable;
        log::debug!(
            "tracker {}: window closed, {} new entries, {} uncollectable",
            self.name,
            delta.len(),
            self.window_uncollectable
        );

        if self.ignored {
            self.captured = Vec::new();
            return;
        }

        // Exception plumbing in test harnesses leaves frame and code cycles
        // behind. One such item means the window cannot attribute the rest,
        // so the whole delta goes.
        let contaminated = delta.iter().any(|&id| {
            matches!(gc.cls_of(id), Some(cls)
                if cls == CoreCls::FrameCls.get_id() || cls == CoreCls::CodeCls.get_id())
        });
        if contaminated {
            self.captured = Vec::new();
            return;
        }

        self.captured = delta;
        self.apply_type_specs(gc);
    }

    /// Add suppression specs for the current window and apply them to
    /// whatever is captured right now. Specs are forgotten at the next
    /// `start`.
    pub fn ignore_types<I>(&mut self, gc: &CycleCollector, specs: I)
    where
        I: IntoIterator<Item = TypeSpec>,
    {
        self.ignored_types.extend(specs);
        self.apply_type_specs(gc);
    }

    // One matching object vetoes the whole window: a single conceptual leak
    // may decompose into several captured sub-objects, and a partial
    // remainder could not be attributed to anything.
    fn apply_type_specs(&mut self, gc: &CycleCollector) {
        if self.ignored_types.is_empty() || self.captured.is_empty() {
            return;
        }
        let hit = self.captured.iter().any(|&id| {
            let cls = match gc.cls_of(id) {
                Some(cls) => cls,
                None => return false,
            };
            self.ignored_types.iter().any(|spec| match spec {
                TypeSpec::Cls(c) => *c == cls,
                TypeSpec::Name(n) => gc.qualified_name(cls) == n,
            })
        });
        if hit {
            self.captured = Vec::new();
        }
    }

    /// True when the last window left nothing behind.
    pub fn is_clean(&self) -> bool {
        (!self.check_collected || self.captured.is_empty()) && self.window_uncollectable == 0
    }

    /// Multi-line report of the captured objects, at most `max_items` of
    /// them, headed by the caller-supplied location label.
    pub fn build_report(&self, gc: &CycleCollector, location: &str, max_items: usize) -> String {
        let mut out = format!(
            "{num} garbage objects left by {loc}:\n",
            num = self.captured.len(),
            loc = location
        );
        for (i, &id) in self.captured.iter().enumerate() {
            if i >= max_items {
                out.push_str("...\n");
                break;
            }
            out.push_str(&format!("{}: {}\n", i + 1, format_object(gc, id)));
        }
        out
    }
}
