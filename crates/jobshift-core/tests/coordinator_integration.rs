//! End-to-end tests for the migration coordinator over an on-disk database.

use std::time::{Duration, Instant};

use jobshift_core::backend::{
    CANONICAL_LOGGER, CANONICAL_STORE, HYBRID_STORE, LEGACY_LOGGER, LEGACY_STORE,
};
use jobshift_core::coordinator::{CommandRegistry, ExecutionContext, MIGRATE_COMMAND};
use jobshift_core::migration::MigrationStatus;
use jobshift_core::{
    BackendRegistry, CoordinatorSettings, JobRecord, MigrationPhase, MigrationScheduler,
    SledMigrationScheduler, StoreResolution,
};

fn seed_legacy(db: &sled::Db, count: u64) -> Vec<u64> {
    let backends = BackendRegistry::with_defaults(db);
    let store = backends.create_store(LEGACY_STORE).unwrap();
    let logger = backends.create_logger(LEGACY_LOGGER).unwrap();
    (1..=count)
        .map(|user| {
            let job = JobRecord::new("send_digest", 1_700_000_000 + user)
                .with_args(serde_json::json!({ "user": user }));
            let id = store.save(&job).unwrap();
            logger.log(id, "scheduled").unwrap();
            id
        })
        .collect()
}

#[test]
fn test_full_migration_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let settings = CoordinatorSettings::new(dir.path())
        .with_context(ExecutionContext::CommandLine)
        .with_batch_size(2)
        .with_worker_interval(Duration::from_secs(60));
    let legacy_ids;

    // Legacy data, no canonical schema yet.
    {
        let db = settings.open_db().unwrap();
        legacy_ids = seed_legacy(&db, 5);

        let coordinator = settings.builder(&db).unwrap().build();
        let commands = CommandRegistry::new();
        assert!(!coordinator.start(&commands).unwrap());
        assert_eq!(
            coordinator.store_class().unwrap(),
            StoreResolution::Passthrough(LEGACY_STORE.to_string())
        );
        assert!(!coordinator.on_request_end().unwrap());
        assert!(commands.is_empty());
        assert_eq!(coordinator.phase().unwrap(), MigrationPhase::DependenciesNotMet);
        db.flush().unwrap();
    }

    // Schema installed: the migration window opens.
    {
        let db = settings.open_db().unwrap();
        SledMigrationScheduler::open(&db)
            .unwrap()
            .install_schema()
            .unwrap();

        let coordinator = settings.builder(&db).unwrap().build();
        let commands = CommandRegistry::new();
        assert!(coordinator.start(&commands).unwrap());
        assert!(commands.contains(MIGRATE_COMMAND));

        let store = coordinator.store_class().unwrap();
        assert_eq!(store.class(), HYBRID_STORE);
        assert_eq!(coordinator.logger_class(&store).unwrap(), CANONICAL_LOGGER);

        // Legacy jobs stay visible and new jobs land in canonical storage.
        let hybrid = coordinator.backends().create_store(store.class()).unwrap();
        assert_eq!(hybrid.count().unwrap(), 5);
        assert!(hybrid.get(legacy_ids[2]).unwrap().is_some());
        let new_id = hybrid.save(&JobRecord::new("cleanup", 1_800_000_000)).unwrap();
        let canonical = coordinator.backends().create_store(CANONICAL_STORE).unwrap();
        assert!(canonical.get(new_id).unwrap().is_some());

        assert!(coordinator.on_request_end().unwrap());
        assert!(!coordinator.on_request_end().unwrap());
        assert_eq!(coordinator.phase().unwrap(), MigrationPhase::Scheduled);
        assert!(coordinator
            .on_operator_screen_render("tools.scheduled-jobs")
            .unwrap()
            .is_some());

        let command = commands.get(MIGRATE_COMMAND).unwrap();
        let summary = command.run(&settings.run_options()).unwrap();
        assert_eq!(summary.moved, 5);
        assert_eq!(summary.batches, 3);
        assert!(summary.complete);

        let store = coordinator.store_class().unwrap();
        assert_eq!(store, StoreResolution::PostMigration);
        assert_eq!(store.class(), CANONICAL_STORE);
        assert_eq!(coordinator.logger_class(&store).unwrap(), CANONICAL_LOGGER);
        assert!(!coordinator.eligible().unwrap());
        assert!(coordinator
            .on_operator_screen_render("tools.scheduled-jobs")
            .unwrap()
            .is_none());

        assert_eq!(canonical.count().unwrap(), 6);
        let logs = coordinator.backends().create_logger(CANONICAL_LOGGER).unwrap();
        let migrated = canonical.get(legacy_ids[2]).unwrap().unwrap();
        assert_eq!(migrated.args["user"], 3);
        assert_eq!(logs.entries(migrated.id).unwrap()[0].message, "scheduled");
        db.flush().unwrap();
    }

    // Completion survives a restart.
    {
        let db = settings.open_db().unwrap();
        let scheduler = SledMigrationScheduler::open(&db).unwrap();
        assert!(scheduler.is_complete().unwrap());
        let state = scheduler.state().unwrap();
        assert_eq!(state.status, MigrationStatus::Complete);
        assert!(state.scheduled_at.is_some());
        assert!(state.completed_at.is_some());

        let coordinator = settings.builder(&db).unwrap().build();
        let commands = CommandRegistry::new();
        assert!(coordinator.start(&commands).unwrap());
        assert!(commands.is_empty());
        assert!(!coordinator.on_request_end().unwrap());
        assert_eq!(coordinator.store_class().unwrap().class(), CANONICAL_STORE);
    }
}

#[test]
fn test_custom_store_migrates_only_with_opt_in() {
    let dir = tempfile::tempdir().unwrap();
    let settings = CoordinatorSettings::new(dir.path())
        .with_context(ExecutionContext::CommandLine)
        .with_store_class("MyCustomStore")
        .with_logger_class("MyCustomLogger");

    {
        let db = settings.open_db().unwrap();
        SledMigrationScheduler::open(&db)
            .unwrap()
            .install_schema()
            .unwrap();

        let coordinator = settings.builder(&db).unwrap().build();
        let commands = CommandRegistry::new();
        assert!(coordinator.start(&commands).unwrap());

        let store = coordinator.store_class().unwrap();
        assert_eq!(store, StoreResolution::Custom("MyCustomStore".to_string()));
        assert_eq!(coordinator.logger_class(&store).unwrap(), "MyCustomLogger");

        let custom = coordinator.backends().create_store("MyCustomStore").unwrap();
        let custom_logs = coordinator.backends().create_logger("MyCustomLogger").unwrap();
        let id = custom.save(&JobRecord::new("nightly_report", 42)).unwrap();
        custom_logs.log(id, "created by host").unwrap();

        // Without an opt-in nothing surfaces.
        assert!(!coordinator.eligible().unwrap());
        assert!(commands.is_empty());
        assert!(coordinator
            .on_operator_screen_render("tools.scheduled-jobs")
            .unwrap()
            .is_none());
        db.flush().unwrap();
    }

    let settings = settings.with_allow_custom_migration(true);
    {
        let db = settings.open_db().unwrap();
        let coordinator = settings.builder(&db).unwrap().build();
        let commands = CommandRegistry::new();
        assert!(coordinator.start(&commands).unwrap());
        assert!(coordinator.eligible().unwrap());

        let config = coordinator.build_default_config().unwrap();
        assert_eq!(config.source_store().unwrap().class_name(), "MyCustomStore");
        assert_eq!(config.source_logger().unwrap().class_name(), "MyCustomLogger");

        let summary = commands
            .get(MIGRATE_COMMAND)
            .unwrap()
            .run(&settings.run_options())
            .unwrap();
        assert_eq!(summary.moved, 1);
        assert!(summary.complete);

        let canonical = coordinator.backends().create_store(CANONICAL_STORE).unwrap();
        let job = canonical.fetch_batch(1).unwrap().remove(0);
        assert_eq!(job.hook, "nightly_report");
        let logs = coordinator.backends().create_logger(CANONICAL_LOGGER).unwrap();
        assert_eq!(logs.entries(job.id).unwrap()[0].message, "created by host");

        // Completion wins over the host's override.
        assert_eq!(coordinator.store_class().unwrap().class(), CANONICAL_STORE);
    }
}

#[test]
fn test_scheduled_migration_completes_in_background() {
    let dir = tempfile::tempdir().unwrap();
    let settings = CoordinatorSettings::new(dir.path())
        .with_batch_size(2)
        .with_worker_interval(Duration::from_millis(10));

    let db = settings.open_db().unwrap();
    let legacy_ids = seed_legacy(&db, 5);
    SledMigrationScheduler::open(&db)
        .unwrap()
        .install_schema()
        .unwrap();

    let coordinator = settings.builder(&db).unwrap().build();
    let commands = CommandRegistry::new();
    assert!(coordinator.start(&commands).unwrap());
    assert!(commands.is_empty());
    assert_eq!(coordinator.store_class().unwrap().class(), HYBRID_STORE);

    assert!(coordinator.on_request_end().unwrap());

    let deadline = Instant::now() + Duration::from_secs(10);
    while !coordinator.scheduler().is_complete().unwrap() {
        assert!(Instant::now() < deadline, "migration did not complete");
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(coordinator.phase().unwrap(), MigrationPhase::Complete);
    assert_eq!(coordinator.store_class().unwrap(), StoreResolution::PostMigration);

    let backends = coordinator.backends();
    assert_eq!(backends.create_store(LEGACY_STORE).unwrap().count().unwrap(), 0);
    let canonical = backends.create_store(CANONICAL_STORE).unwrap();
    assert_eq!(canonical.count().unwrap(), 5);
    let logs = backends.create_logger(CANONICAL_LOGGER).unwrap();
    for id in legacy_ids {
        assert!(canonical.get(id).unwrap().is_some());
        assert_eq!(logs.entries(id).unwrap()[0].message, "scheduled");
    }

    let state = SledMigrationScheduler::open(&db).unwrap().state().unwrap();
    assert_eq!(state.status, MigrationStatus::Complete);
    assert!(state.completed_at.is_some());
}
