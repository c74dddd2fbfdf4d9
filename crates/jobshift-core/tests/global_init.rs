//! Process-wide coordinator initialization.
//!
//! Kept in its own test binary: the instance lives for the whole process.

use std::sync::Arc;

use jobshift_core::coordinator::{self, ExecutionContext, MIGRATE_COMMAND};
use jobshift_core::CoordinatorSettings;

#[test]
fn test_init_is_idempotent_across_threads() {
    assert!(coordinator::instance().is_none());

    let settings = CoordinatorSettings::temporary().with_context(ExecutionContext::CommandLine);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let settings = settings.clone();
            std::thread::spawn(move || coordinator::init(&settings).unwrap())
        })
        .collect();
    let started: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let first = coordinator::instance().unwrap();
    assert!(started.iter().all(|c| Arc::ptr_eq(c, &first)));

    // Later settings are ignored.
    let again = coordinator::init(&CoordinatorSettings::temporary()).unwrap();
    assert!(Arc::ptr_eq(&again, &first));
    assert_eq!(again.execution_context(), ExecutionContext::CommandLine);

    // A fresh database has no canonical schema, so nothing is registered.
    assert!(!first.is_active());
    assert!(!coordinator::commands().contains(MIGRATE_COMMAND));
}
