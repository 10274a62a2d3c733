use crate::runtime::collector::CycleCollector;
use crate::utils::error::{GTErrCode, GTError};

use super::registry::TrackerRegistry;
use super::tracker::DEFAULT_MAX_REPORT_ITEMS;

/// Registry name shared by every `assert_no_garbage` call site, so repeated
/// calls accumulate on one tracker.
pub const SHARED_TRACKER_NAME: &str = "gctrack.assert_no_garbage";

/// Run `f` inside a tracking window on the named tracker.
///
/// Returns the closure's value when the window is clean, otherwise
/// `GarbageFound` carrying the full report. `location` is a
/// `"module::function"`-style label for that report.
pub fn checked<R, F>(
    registry: &mut TrackerRegistry,
    gc: &mut CycleCollector,
    name: &str,
    location: &str,
    f: F,
) -> Result<R, GTError>
where
    F: FnOnce(&mut CycleCollector) -> R,
{
    let tracker = registry.get_or_create(name);
    tracker.enable(true);
    tracker.start(gc)?;
    let ret = f(&mut *gc);
    tracker.stop(gc);
    if tracker.is_clean() {
        Ok(ret)
    } else {
        Err(GTError::new(
            tracker.build_report(gc, location, DEFAULT_MAX_REPORT_ITEMS),
            GTErrCode::GarbageFound,
        ))
    }
}

/// `checked` on the shared tracker, panicking with the report when the
/// monitored code left garbage behind. The code under `f` has to release
/// everything it creates; whether it actually does is exactly what this
/// asserts.
pub fn assert_no_garbage<R, F>(
    registry: &mut TrackerRegistry,
    gc: &mut CycleCollector,
    location: &str,
    f: F,
) -> R
where
    F: FnOnce(&mut CycleCollector) -> R,
{
    match checked(registry, gc, SHARED_TRACKER_NAME, location, f) {
        Ok(ret) => ret,
        Err(e) => panic!("{}", e.message()),
    }
}
