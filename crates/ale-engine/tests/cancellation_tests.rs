//! Cooperative cancellation: scope-targeted cancel and unregistration

use ale_analysis_api::{EngineConfig, FileEvent, FileEventKind, PluginSet, ScopeId};
use ale_engine::Engine;
use ale_test_utils::{analysis_config, descriptor, init_tracing, source, FakeAnalyzer, FakeFactory};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

fn start_engine(analyzer: FakeAnalyzer) -> Engine {
    init_tracing();
    let factory = Arc::new(FakeFactory::new(analyzer));
    Engine::start(EngineConfig::new(), PluginSet::empty(), factory).unwrap()
}

#[tokio::test]
async fn cancel_hits_executing_and_queued_copies() {
    let gate = Arc::new(Semaphore::new(0));
    let started = Arc::new(Notify::new());
    let analyzer = FakeAnalyzer::new()
        .with_gate(Arc::clone(&gate))
        .with_analysis_started(Arc::clone(&started));
    let record = analyzer.record();
    let engine = start_engine(analyzer);
    let m1 = ScopeId::new("m1");

    engine
        .register_scope(m1.clone(), descriptor(&["a.py"]))
        .unwrap()
        .await
        .unwrap();

    let executing = engine
        .run_analysis(Some(m1.clone()), analysis_config(&["a.py"]), Arc::new(|_| {}), None)
        .unwrap();
    started.notified().await;

    let queued_one = engine
        .run_analysis(Some(m1.clone()), analysis_config(&["a.py"]), Arc::new(|_| {}), None)
        .unwrap();
    let queued_two = engine
        .run_analysis(Some(m1.clone()), analysis_config(&["a.py"]), Arc::new(|_| {}), None)
        .unwrap();

    assert_eq!(engine.cancel(&m1), 3);

    assert!(executing.await.unwrap_err().is_cancelled());
    assert!(queued_one.await.unwrap_err().is_cancelled());
    assert!(queued_two.await.unwrap_err().is_cancelled());

    // only the executing one ever reached the analyzer
    assert_eq!(record.analyzed().len(), 1);

    // the scope registration itself is untouched
    gate.add_permits(1);
    engine
        .run_analysis(Some(m1), analysis_config(&["a.py"]), Arc::new(|_| {}), None)
        .unwrap()
        .await
        .unwrap();
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn cancel_leaves_other_scopes_alone() {
    let gate = Arc::new(Semaphore::new(0));
    let started = Arc::new(Notify::new());
    let analyzer = FakeAnalyzer::new()
        .with_gate(Arc::clone(&gate))
        .with_analysis_started(Arc::clone(&started));
    let engine = start_engine(analyzer);
    let m1 = ScopeId::new("m1");
    let m2 = ScopeId::new("m2");

    engine
        .register_scope(m1.clone(), descriptor(&["a.py"]))
        .unwrap()
        .await
        .unwrap();
    engine
        .register_scope(m2.clone(), descriptor(&["b.py"]))
        .unwrap()
        .await
        .unwrap();

    let doomed = engine
        .run_analysis(Some(m1.clone()), analysis_config(&["a.py"]), Arc::new(|_| {}), None)
        .unwrap();
    started.notified().await;
    let survivor = engine
        .run_analysis(Some(m2), analysis_config(&["b.py"]), Arc::new(|_| {}), None)
        .unwrap();

    assert_eq!(engine.cancel(&m1), 1);
    gate.add_permits(1);

    assert!(doomed.await.unwrap_err().is_cancelled());
    let results = survivor.await.unwrap();
    assert_eq!(results.indexed_file_count, 1);
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn unregister_cancels_work_queued_behind_it() {
    let gate = Arc::new(Semaphore::new(0));
    let started = Arc::new(Notify::new());
    let analyzer = FakeAnalyzer::new()
        .with_gate(Arc::clone(&gate))
        .with_analysis_started(Arc::clone(&started));
    let record = analyzer.record();
    let engine = start_engine(analyzer);
    let m1 = ScopeId::new("m1");

    engine
        .register_scope(m1.clone(), descriptor(&["a.py"]))
        .unwrap()
        .await
        .unwrap();

    // a transient analysis keeps the worker busy so everything below is
    // still queued when the unregister finally executes
    let blocker = engine
        .run_analysis(None, analysis_config(&["x.py"]), Arc::new(|_| {}), None)
        .unwrap();
    started.notified().await;

    let unregistered = engine.unregister_scope(m1.clone()).unwrap();
    let doomed_analysis = engine
        .run_analysis(Some(m1.clone()), analysis_config(&["a.py"]), Arc::new(|_| {}), None)
        .unwrap();
    let doomed_event = engine
        .notify_file_event(m1, FileEvent::new(FileEventKind::Created, source("b.py")))
        .unwrap();

    gate.add_permits(1);
    blocker.await.unwrap();
    unregistered.await.unwrap();
    assert!(doomed_analysis.await.unwrap_err().is_cancelled());
    assert!(doomed_event.await.unwrap_err().is_cancelled());

    // skipped entries never reached the analyzer
    assert_eq!(record.analyzed().len(), 1);
    assert!(record.stopped().contains(&"m1".to_owned()));
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn cancel_callbacks_may_reenter_the_engine() {
    let gate = Arc::new(Semaphore::new(0));
    let started = Arc::new(Notify::new());
    let engine_slot: Arc<Mutex<Option<Arc<Engine>>>> = Arc::new(Mutex::new(None));

    // an in-flight command propagating cancellation into a nested call may
    // end up calling back into the engine; that must not deadlock
    let reentrant = Arc::clone(&engine_slot);
    let analyzer = FakeAnalyzer::new()
        .with_gate(Arc::clone(&gate))
        .with_analysis_started(Arc::clone(&started))
        .with_cancel_callback(Arc::new(move || {
            if let Some(engine) = reentrant.lock().as_ref() {
                engine.cancel(&ScopeId::new("elsewhere"));
            }
        }));
    let engine = Arc::new(start_engine(analyzer));
    *engine_slot.lock() = Some(Arc::clone(&engine));
    let m1 = ScopeId::new("m1");

    engine
        .register_scope(m1.clone(), descriptor(&["a.py"]))
        .unwrap()
        .await
        .unwrap();
    let running = engine
        .run_analysis(Some(m1.clone()), analysis_config(&["a.py"]), Arc::new(|_| {}), None)
        .unwrap();
    started.notified().await;

    assert_eq!(engine.cancel(&m1), 1);
    assert!(running.await.unwrap_err().is_cancelled());
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn unregistering_unknown_scope_is_a_noop() {
    let engine = start_engine(FakeAnalyzer::new());
    engine
        .unregister_scope(ScopeId::new("ghost"))
        .unwrap()
        .await
        .unwrap();
    engine.stop().await.unwrap();
}

#[tokio::test]
async fn skipped_commands_have_no_side_effects() {
    let gate = Arc::new(Semaphore::new(0));
    let started = Arc::new(Notify::new());
    let analyzer = FakeAnalyzer::new()
        .with_gate(Arc::clone(&gate))
        .with_analysis_started(Arc::clone(&started));
    let record = analyzer.record();
    let engine = start_engine(analyzer);
    let m1 = ScopeId::new("m1");

    engine
        .register_scope(m1.clone(), descriptor(&["a.py"]))
        .unwrap()
        .await
        .unwrap();

    let blocker = engine
        .run_analysis(None, analysis_config(&["x.py"]), Arc::new(|_| {}), None)
        .unwrap();
    started.notified().await;

    let skipped_config = analysis_config(&["a.py"]);
    let skipped_id = skipped_config.analysis_id;
    let skipped = engine
        .run_analysis(Some(m1.clone()), skipped_config, Arc::new(|_| {}), None)
        .unwrap();
    engine.cancel(&m1);

    gate.add_permits(1);
    blocker.await.unwrap();
    assert!(skipped.await.unwrap_err().is_cancelled());
    assert!(!record.analyzed().contains(&skipped_id));
    engine.stop().await.unwrap();
}
