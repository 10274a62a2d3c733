#[cfg(test)]
mod track_tests {
    use crate::runtime::base::{GTFrame, GTInst, GTList, GTValue, ObjId};
    use crate::runtime::class::GTClass;
    use crate::runtime::collector::{CoreCls, CycleCollector};
    use crate::runtime::GarbageCollector;
    use crate::track::registry::TrackerRegistry;
    use crate::track::scope::{assert_no_garbage, checked, SHARED_TRACKER_NAME};
    use crate::track::tracker::{GarbageTracker, TypeSpec};
    use crate::utils::error::GTErrCode;
    use crate::utils::logger;

    // A list that holds the only reference to itself: unreachable, but
    // refcounting alone can never reclaim it.
    fn make_cycle(gc: &mut CycleCollector) -> ObjId {
        let l = gc.new_object(GTValue::List(GTList::new()), CoreCls::ListCls.get_id());
        gc.list_push(l, l).unwrap();
        gc.drop_ref(l);
        l
    }

    fn make_finalizer_pair(gc: &mut CycleCollector) -> (ObjId, ObjId) {
        let mut cls = GTClass::new("tests", "Hoarder");
        cls.set_finalizer(true);
        let cls = gc.register_class(cls);
        let a = gc.new_object(GTValue::Inst(GTInst::new()), cls);
        let b = gc.new_object(GTValue::Inst(GTInst::new()), cls);
        gc.set_attr(a, "other", b).unwrap();
        gc.set_attr(b, "other", a).unwrap();
        gc.drop_ref(a);
        gc.drop_ref(b);
        (a, b)
    }

    #[test]
    fn test_registry_same_name_same_instance() {
        let mut reg = TrackerRegistry::new();
        let p1 = reg.get_or_create("pytest") as *const GarbageTracker;
        let p2 = reg.get_or_create("pytest") as *const GarbageTracker;
        assert_eq!(p1, p2);

        reg.get_or_create("pytest").enable(true);
        assert!(reg.get_or_create("pytest").enabled());
        assert!(!reg.get_or_create("unittest").enabled());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_disabled_tracker_captures_nothing() {
        logger::init();
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("disabled");
        tracker.start(&mut gc).unwrap();
        make_cycle(&mut gc);
        tracker.stop(&mut gc);

        assert!(tracker.garbage().is_empty());
        assert!(tracker.is_clean());
    }

    #[test]
    fn test_clean_window() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("clean");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();

        let l = gc.new_object(GTValue::List(GTList::new()), CoreCls::ListCls.get_id());
        let i = gc.new_object(GTValue::Integer(1), CoreCls::IntegerCls.get_id());
        gc.list_push(l, i).unwrap();
        gc.drop_ref(i);
        gc.drop_ref(l);

        tracker.stop(&mut gc);
        assert!(tracker.garbage().is_empty());
        assert!(tracker.is_clean());
    }

    #[test]
    fn test_cycle_is_captured() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("cycle");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        let l = make_cycle(&mut gc);
        tracker.stop(&mut gc);

        assert_eq!(tracker.garbage(), &[l]);
        assert_eq!(gc.cls_of(l), Some(CoreCls::ListCls.get_id()));
        assert!(!tracker.is_clean());
    }

    #[test]
    fn test_ignored_window_discards_delta() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("ignored");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        make_cycle(&mut gc);
        tracker.ignore();
        tracker.stop(&mut gc);

        assert!(tracker.garbage().is_empty());
        assert!(tracker.is_clean());
    }

    #[test]
    fn test_garbage_left_before_start_is_flushed() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        // Unrelated prior code left a cycle behind; start() must collect it
        // away before recording the baseline.
        make_cycle(&mut gc);

        let tracker = reg.get_or_create("baseline");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        tracker.stop(&mut gc);

        assert!(tracker.garbage().is_empty());
        assert!(tracker.is_clean());
    }

    #[test]
    fn test_type_suppression_by_identity() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("by-identity");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        make_cycle(&mut gc);
        tracker.ignore_types(&gc, [TypeSpec::Cls(CoreCls::ListCls.get_id())]);
        tracker.stop(&mut gc);

        assert!(tracker.garbage().is_empty());
        assert!(tracker.is_clean());
    }

    #[test]
    fn test_unrelated_type_spec_keeps_delta() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("unrelated");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        make_cycle(&mut gc);
        tracker.ignore_types(&gc, [TypeSpec::Cls(CoreCls::IntegerCls.get_id())]);
        tracker.stop(&mut gc);

        assert_eq!(tracker.garbage().len(), 1);
    }

    #[test]
    fn test_type_suppression_by_qualified_name() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();
        let node_cls = gc.register_class(GTClass::new("widgets", "Node"));

        let tracker = reg.get_or_create("by-name");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        let node = gc.new_object(GTValue::Inst(GTInst::new()), node_cls);
        gc.set_attr(node, "me", node).unwrap();
        gc.drop_ref(node);
        tracker.ignore_types(&gc, [TypeSpec::from("widgets.Node")]);
        tracker.stop(&mut gc);

        assert!(tracker.garbage().is_empty());
    }

    #[test]
    fn test_one_match_vetoes_the_whole_window() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("veto");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        // Two independent leaks; suppressing the list must drop both.
        make_cycle(&mut gc);
        let node_cls = gc.register_class(GTClass::new("widgets", "Node"));
        let node = gc.new_object(GTValue::Inst(GTInst::new()), node_cls);
        gc.set_attr(node, "me", node).unwrap();
        gc.drop_ref(node);
        tracker.ignore_types(&gc, [TypeSpec::Cls(CoreCls::ListCls.get_id())]);
        tracker.stop(&mut gc);

        assert!(tracker.garbage().is_empty());
    }

    #[test]
    fn test_type_filter_is_idempotent() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("idempotent");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        make_cycle(&mut gc);
        tracker.stop(&mut gc);
        assert_eq!(tracker.garbage().len(), 1);

        let unrelated = [TypeSpec::Cls(CoreCls::IntegerCls.get_id())];
        tracker.ignore_types(&gc, unrelated.clone());
        tracker.ignore_types(&gc, unrelated);
        assert_eq!(tracker.garbage().len(), 1);

        let matching = [TypeSpec::Cls(CoreCls::ListCls.get_id())];
        tracker.ignore_types(&gc, matching.clone());
        tracker.ignore_types(&gc, matching);
        assert!(tracker.garbage().is_empty());
    }

    #[test]
    fn test_type_specs_do_not_survive_the_next_start() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("window-scoped");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        make_cycle(&mut gc);
        tracker.ignore_types(&gc, [TypeSpec::Cls(CoreCls::ListCls.get_id())]);
        tracker.stop(&mut gc);
        assert!(tracker.garbage().is_empty());

        tracker.start(&mut gc).unwrap();
        make_cycle(&mut gc);
        tracker.stop(&mut gc);
        assert_eq!(tracker.garbage().len(), 1);
    }

    #[test]
    fn test_captured_is_replaced_wholesale() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("wholesale");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        make_cycle(&mut gc);
        tracker.stop(&mut gc);
        assert_eq!(tracker.garbage().len(), 1);

        tracker.start(&mut gc).unwrap();
        tracker.stop(&mut gc);
        assert!(tracker.garbage().is_empty());
    }

    #[test]
    fn test_frame_artifact_discards_whole_delta() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("contaminated");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        // A raise helper left a frame cycle next to a real leak; the window
        // cannot attribute either, so both go.
        let f = gc.new_object(
            GTValue::Frame(GTFrame::new("raises")),
            CoreCls::FrameCls.get_id(),
        );
        gc.frame_push_local(f, f).unwrap();
        gc.drop_ref(f);
        make_cycle(&mut gc);
        tracker.stop(&mut gc);

        assert!(tracker.garbage().is_empty());
        assert!(tracker.is_clean());
    }

    #[test]
    fn test_uncollectable_growth_dirties_the_verdict() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("uncollectable");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        make_finalizer_pair(&mut gc);
        tracker.stop(&mut gc);

        assert_eq!(tracker.garbage().len(), 2);
        assert_eq!(tracker.window_uncollectable(), 2);
        assert_eq!(tracker.uncollectable_count(), 2);
        assert!(!tracker.is_clean());

        // The lifetime counter is monotonic; a clean window leaves it alone.
        tracker.start(&mut gc).unwrap();
        tracker.stop(&mut gc);
        assert_eq!(tracker.uncollectable_count(), 2);
        assert!(tracker.is_clean());
    }

    #[test]
    fn test_uncollectable_left_before_start_stays_out_of_the_window() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        make_finalizer_pair(&mut gc);

        let tracker = reg.get_or_create("pre-existing");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        tracker.stop(&mut gc);

        assert!(tracker.garbage().is_empty());
        assert_eq!(tracker.window_uncollectable(), 0);
        assert!(tracker.is_clean());
    }

    #[test]
    fn test_check_collected_off_only_monitors_uncollectable() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("leaks-only");
        tracker.enable(true);
        tracker.set_check_collected(false);
        tracker.start(&mut gc).unwrap();
        make_cycle(&mut gc);
        tracker.stop(&mut gc);

        assert_eq!(tracker.garbage().len(), 1);
        assert!(tracker.is_clean());

        tracker.start(&mut gc).unwrap();
        make_finalizer_pair(&mut gc);
        tracker.stop(&mut gc);
        assert!(!tracker.is_clean());
    }

    #[test]
    fn test_overlapping_windows_are_rejected() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        reg.get_or_create("one").enable(true);
        reg.get_or_create("two").enable(true);

        reg.get_or_create("one").start(&mut gc).unwrap();
        make_cycle(&mut gc);
        let err = reg.get_or_create("two").start(&mut gc).unwrap_err();
        assert_eq!(err.code(), GTErrCode::SessionBusy);

        // A stop on the rejected tracker never opened a window, so the
        // first tracker's retention must survive it.
        reg.get_or_create("two").stop(&mut gc);
        reg.get_or_create("one").stop(&mut gc);
        assert_eq!(reg.get("one").unwrap().garbage().len(), 1);

        reg.get_or_create("two").start(&mut gc).unwrap();
        reg.get_or_create("two").stop(&mut gc);
        assert!(reg.get("two").unwrap().garbage().is_empty());
    }

    #[test]
    fn test_report_caps_items_and_marks_the_rest() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("report");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        for _ in 0..12 {
            make_cycle(&mut gc);
        }
        tracker.stop(&mut gc);

        let report = tracker.build_report(&gc, "tests::test_report", 10);
        assert!(report.starts_with("12 garbage objects left by tests::test_report:\n"));
        assert!(report.contains("1: <class 'core.List'> object at 0x"));
        assert!(report.contains("10: <class 'core.List'>"));
        assert!(!report.contains("11: "));
        assert!(report.ends_with("...\n"));
    }

    #[test]
    fn test_checked_passes_value_through_on_clean_run() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let got = checked(&mut reg, &mut gc, "scope", "tests::clean_run", |gc| {
            let i = gc.new_object(GTValue::Integer(9), CoreCls::IntegerCls.get_id());
            gc.drop_ref(i);
            9
        })
        .unwrap();
        assert_eq!(got, 9);
    }

    #[test]
    fn test_checked_reports_leaky_run() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let err = checked(&mut reg, &mut gc, "scope", "tests::leaky_run", |gc| {
            make_cycle(gc);
        })
        .unwrap_err();
        assert_eq!(err.code(), GTErrCode::GarbageFound);
        assert!(err.message().contains("garbage objects left by tests::leaky_run"));
    }

    #[test]
    fn test_assert_no_garbage_shares_one_tracker() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        assert_no_garbage(&mut reg, &mut gc, "tests::first", |gc| {
            let i = gc.new_object(GTValue::Integer(1), CoreCls::IntegerCls.get_id());
            gc.drop_ref(i);
        });
        assert_no_garbage(&mut reg, &mut gc, "tests::second", |_| {});

        assert_eq!(reg.len(), 1);
        assert!(reg.get(SHARED_TRACKER_NAME).is_some());
    }

    #[test]
    #[should_panic(expected = "garbage objects left by tests::leaky")]
    fn test_assert_no_garbage_panics_with_report() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        assert_no_garbage(&mut reg, &mut gc, "tests::leaky", |gc| {
            make_cycle(gc);
        });
    }

    #[test]
    fn test_graph_dump_writes_dot_and_touches_nothing() {
        let mut gc = CycleCollector::new();
        let mut reg = TrackerRegistry::new();

        let tracker = reg.get_or_create("graph");
        tracker.enable(true);
        tracker.start(&mut gc).unwrap();
        let l = make_cycle(&mut gc);
        tracker.stop(&mut gc);
        assert_eq!(tracker.garbage(), &[l]);

        let path = std::env::temp_dir().join("gctrack_refs_test.dot");
        crate::track::graph::dump_ref_graph(&gc, l, 4, &path).unwrap();
        let dot = std::fs::read_to_string(&path).unwrap();
        assert!(dot.starts_with("digraph refs {"));
        assert!(dot.contains("->"));
        let _ = std::fs::remove_file(&path);

        assert_eq!(tracker.garbage(), &[l]);
        assert!(!tracker.is_clean());
    }
}
