//! Migration coordinator.
//!
//! Decides, on every access, which store and logger classes the host should
//! use, schedules the background migration at most once per eligible window,
//! and gates every migration side effect (scheduler hooks, the bulk migrate
//! command, the operator notice) behind the same eligibility check.
//!
//! The host drives it through explicit lifecycle calls:
//!
//! | Call | When |
//! |------|------|
//! | [`MigrationCoordinator::start`] | bootstrap, once |
//! | [`MigrationCoordinator::store_class`] / [`logger_class`](MigrationCoordinator::logger_class) | backend selection |
//! | [`MigrationCoordinator::on_request_end`] | request teardown |
//! | [`MigrationCoordinator::on_operator_screen_render`] | operator screen load |
//!
//! If the scheduler reports missing dependencies at start the coordinator
//! stays inert: resolution passes the host's choice through and nothing is
//! scheduled, registered or shown.

pub mod command;
pub mod gate;
pub mod notice;
pub mod overrides;
pub mod resolver;

pub use command::{BulkMigrateCommand, CommandRegistry, MIGRATE_COMMAND};
pub use gate::{MigrationGate, OptIn};
pub use notice::{Notice, NoticeLevel, DEFAULT_NOTICE_SCREENS};
pub use overrides::OverrideState;
pub use resolver::{BackendResolver, DefaultResolver, StoreResolution};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::classes::{
    CANONICAL_LOGGER, DEFAULT_LOGGER_MARKER, DEFAULT_STORE_MARKER, LEGACY_LOGGER, LEGACY_STORE,
    MIGRATION_STORE,
};
use crate::backend::BackendRegistry;
use crate::error::Result;
use crate::migration::{
    BatchRunner, MigrationConfig, MigrationPhase, MigrationScheduler, MigrationStep, RunOptions,
    RunSummary, TracingProgressReporter, DEFAULT_BATCH_SIZE,
};
use crate::settings::CoordinatorSettings;

/// Host filter over a backend class name.
pub type ClassFilter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Host adjustment of the assembled migration config.
pub type ConfigFinalizer = Arc<dyn Fn(MigrationConfig) -> MigrationConfig + Send + Sync>;

type ResolverFactory =
    Box<dyn FnOnce(Arc<dyn MigrationScheduler>, Arc<OverrideState>) -> Arc<dyn BackendResolver>>;

/// How the host process is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    /// Serving requests.
    #[default]
    Request,
    /// Running a command-line tool.
    CommandLine,
}

/// Builder for [`MigrationCoordinator`].
pub struct CoordinatorBuilder {
    scheduler: Arc<dyn MigrationScheduler>,
    backends: Arc<BackendRegistry>,
    context: ExecutionContext,
    batch_size: usize,
    notice_screens: Vec<String>,
    store_filter: Option<ClassFilter>,
    logger_filter: Option<ClassFilter>,
    opt_in: Option<OptIn>,
    finalize_config: Option<ConfigFinalizer>,
    resolver: Option<ResolverFactory>,
}

impl CoordinatorBuilder {
    /// Set the execution context.
    pub fn execution_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    /// Jobs moved per background migration step.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Replace the screens that show the migration notice.
    pub fn notice_screens<I, S>(mut self, screens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.notice_screens = screens.into_iter().map(Into::into).collect();
        self
    }

    /// Host filter producing the requested store class from the default.
    pub fn store_filter(
        mut self,
        filter: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.store_filter = Some(Arc::new(filter));
        self
    }

    /// Host filter producing the requested logger class from the default.
    pub fn logger_filter(
        mut self,
        filter: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.logger_filter = Some(Arc::new(filter));
        self
    }

    /// Opt in to migrating out of a host-provided store. Default: never.
    pub fn allow_custom_migration(
        mut self,
        opt_in: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        self.opt_in = Some(Arc::new(opt_in));
        self
    }

    /// Adjust or replace the default migration config before use.
    pub fn finalize_config(
        mut self,
        finalize: impl Fn(MigrationConfig) -> MigrationConfig + Send + Sync + 'static,
    ) -> Self {
        self.finalize_config = Some(Arc::new(finalize));
        self
    }

    /// Replace the default resolver.
    ///
    /// The factory receives the scheduler and the override state so a custom
    /// resolver can still record overrides for config assembly.
    pub fn with_resolver<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(Arc<dyn MigrationScheduler>, Arc<OverrideState>) -> Arc<dyn BackendResolver>
            + 'static,
    {
        self.resolver = Some(Box::new(factory));
        self
    }

    /// Build the coordinator.
    pub fn build(self) -> Arc<MigrationCoordinator> {
        let overrides = Arc::new(OverrideState::new());
        let resolver: Arc<dyn BackendResolver> = match self.resolver {
            Some(factory) => factory(Arc::clone(&self.scheduler), Arc::clone(&overrides)),
            None => Arc::new(DefaultResolver::new(
                Arc::clone(&self.scheduler),
                Arc::clone(&overrides),
            )),
        };
        let gate = MigrationGate::new(
            Arc::clone(&self.scheduler),
            Arc::clone(&overrides),
            self.opt_in,
        );

        Arc::new(MigrationCoordinator {
            scheduler: self.scheduler,
            backends: self.backends,
            overrides,
            resolver,
            gate,
            context: self.context,
            batch_size: self.batch_size,
            notice_screens: self.notice_screens,
            store_filter: self.store_filter,
            logger_filter: self.logger_filter,
            finalize_config: self.finalize_config,
            started: AtomicBool::new(false),
            active: AtomicBool::new(false),
            run_lock: Mutex::new(()),
        })
    }
}

/// Coordinates the live migration of scheduled jobs to the canonical store.
pub struct MigrationCoordinator {
    scheduler: Arc<dyn MigrationScheduler>,
    backends: Arc<BackendRegistry>,
    overrides: Arc<OverrideState>,
    resolver: Arc<dyn BackendResolver>,
    gate: MigrationGate,
    context: ExecutionContext,
    batch_size: usize,
    notice_screens: Vec<String>,
    store_filter: Option<ClassFilter>,
    logger_filter: Option<ClassFilter>,
    finalize_config: Option<ConfigFinalizer>,
    started: AtomicBool,
    active: AtomicBool,
    /// Serializes migration runs in this process.
    run_lock: Mutex<()>,
}

impl MigrationCoordinator {
    /// Start building a coordinator over a scheduler and backend registry.
    pub fn builder(
        scheduler: Arc<dyn MigrationScheduler>,
        backends: Arc<BackendRegistry>,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder {
            scheduler,
            backends,
            context: ExecutionContext::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            notice_screens: DEFAULT_NOTICE_SCREENS.iter().map(|s| s.to_string()).collect(),
            store_filter: None,
            logger_filter: None,
            opt_in: None,
            finalize_config: None,
            resolver: None,
        }
    }

    /// Bootstrap. Returns whether the coordinator is active.
    ///
    /// Only the first call decides; with unmet dependencies the coordinator
    /// stays inert for its lifetime.
    pub fn start(self: &Arc<Self>, commands: &CommandRegistry) -> Result<bool> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(self.is_active());
        }

        if !self.scheduler.dependencies_met()? {
            info!("job store migration dependencies not met, coordinator inactive");
            return Ok(false);
        }

        self.active.store(true, Ordering::SeqCst);
        debug!(context = ?self.context, "migration coordinator active");

        // Eligibility and the migration source depend on host overrides.
        let store = self.store_class()?;
        let logger = self.logger_class(&store)?;
        debug!(store = %store, logger = %logger, "resolved job backends at start");
        self.maybe_activate(commands)?;
        Ok(true)
    }

    /// Whether [`start`](Self::start) found dependencies met.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Wire scheduler hooks and the migrate command when eligible.
    pub fn maybe_activate(self: &Arc<Self>, commands: &CommandRegistry) -> Result<bool> {
        if !self.gate.eligible()? {
            return Ok(false);
        }
        self.scheduler.activate_hooks(self.migration_step())?;
        self.maybe_register_command(commands)?;
        Ok(true)
    }

    /// Background step handed to the scheduler. Holds the coordinator weakly.
    fn migration_step(self: &Arc<Self>) -> MigrationStep {
        let coordinator = Arc::downgrade(self);
        Arc::new(move || match coordinator.upgrade() {
            Some(coordinator) => coordinator.run_migration_batch().map(Some),
            None => Ok(None),
        })
    }

    /// Move one batch of jobs out of the migration source.
    ///
    /// Returns how many moved; zero means the source is drained.
    pub fn run_migration_batch(&self) -> Result<usize> {
        let _guard = self.run_lock.lock();
        let config = self.build_default_config()?;
        BatchRunner::new(&config, self.scheduler())?.run_batch(self.batch_size)
    }

    /// Run the migration in the foreground.
    pub fn run_migration(&self, options: &RunOptions) -> Result<RunSummary> {
        let _guard = self.run_lock.lock();
        let config = self.build_default_config()?;
        info!(?config, batch_size = options.batch_size, "running bulk job migration");
        BatchRunner::new(&config, self.scheduler())?.run(options)
    }

    /// Register the bulk migrate command when running from the command line.
    ///
    /// Returns whether a command was registered by this call.
    pub fn maybe_register_command(self: &Arc<Self>, commands: &CommandRegistry) -> Result<bool> {
        if self.context != ExecutionContext::CommandLine
            || !self.gate.eligible()?
            || !self.scheduler.dependencies_met()?
            || commands.contains(MIGRATE_COMMAND)
        {
            return Ok(false);
        }

        commands.register(BulkMigrateCommand::new(Arc::clone(self)))?;
        info!(command = MIGRATE_COMMAND, "registered migration command");
        Ok(true)
    }

    /// Resolve a requested store class.
    pub fn resolve_store(&self, requested: &str) -> Result<StoreResolution> {
        if !self.is_active() {
            return Ok(StoreResolution::Passthrough(requested.to_string()));
        }
        self.resolver.resolve_store(requested)
    }

    /// Resolve a requested logger class given the store decision.
    pub fn resolve_logger(&self, store: &StoreResolution, requested: &str) -> Result<String> {
        if !self.is_active() {
            return Ok(requested.to_string());
        }
        self.resolver.resolve_logger(store, requested)
    }

    /// The store class the host should use right now.
    pub fn store_class(&self) -> Result<StoreResolution> {
        let requested = match &self.store_filter {
            Some(filter) => filter(DEFAULT_STORE_MARKER),
            None => DEFAULT_STORE_MARKER.to_string(),
        };
        self.resolve_store(&requested)
    }

    /// The logger class the host should use alongside `store`.
    pub fn logger_class(&self, store: &StoreResolution) -> Result<String> {
        let requested = match &self.logger_filter {
            Some(filter) => filter(DEFAULT_LOGGER_MARKER),
            None => DEFAULT_LOGGER_MARKER.to_string(),
        };
        self.resolve_logger(store, &requested)
    }

    /// See [`MigrationGate::allow_custom_migration`].
    pub fn allow_custom_migration(&self) -> bool {
        self.gate.allow_custom_migration()
    }

    /// See [`MigrationGate::eligible`].
    pub fn eligible(&self) -> Result<bool> {
        self.gate.eligible()
    }

    /// Request teardown: schedule the migration if it is not already.
    pub fn on_request_end(&self) -> Result<bool> {
        if !self.is_active() {
            return Ok(false);
        }
        self.schedule_migration_if_needed()
    }

    /// Enqueue the migration unless it is already scheduled or complete.
    ///
    /// Safe to call redundantly and concurrently; the scheduler guarantees a
    /// single enqueue. Returns whether this call enqueued.
    pub fn schedule_migration_if_needed(&self) -> Result<bool> {
        if self.scheduler.is_complete()? || self.scheduler.is_scheduled()? {
            return Ok(false);
        }
        self.scheduler.schedule_migration()
    }

    /// Operator screen load: the notice to show, if any.
    pub fn on_operator_screen_render(&self, screen_id: &str) -> Result<Option<Notice>> {
        if !self.is_active() || !self.notice_screens.iter().any(|s| s == screen_id) {
            return Ok(None);
        }
        self.maybe_show_notice()
    }

    /// The migration notice when eligible.
    pub fn maybe_show_notice(&self) -> Result<Option<Notice>> {
        if !self.gate.eligible()? {
            return Ok(None);
        }
        Ok(Some(Notice::migration_in_progress()))
    }

    /// Assemble the config for a migration run.
    ///
    /// The source is the captured host override when there is one, otherwise
    /// the legacy backends. The destination is always canonical.
    pub fn build_default_config(&self) -> Result<MigrationConfig> {
        let source_store = self.overrides.store_override().unwrap_or(LEGACY_STORE);
        let source_logger = self.overrides.logger_override().unwrap_or(LEGACY_LOGGER);

        let mut config = MigrationConfig::new();
        config
            .set_source_store(self.backends.create_store(source_store)?)
            .set_source_logger(self.backends.create_logger(source_logger)?)
            .set_destination_store(self.backends.create_store(MIGRATION_STORE)?)
            .set_destination_logger(self.backends.create_logger(CANONICAL_LOGGER)?);

        if self.context == ExecutionContext::CommandLine {
            config.set_progress_reporter(Arc::new(TracingProgressReporter::new()));
        }

        Ok(match &self.finalize_config {
            Some(finalize) => finalize(config),
            None => config,
        })
    }

    /// The currently observed migration phase.
    pub fn phase(&self) -> Result<MigrationPhase> {
        MigrationPhase::observe(self.scheduler.as_ref())
    }

    /// Shared handle to the scheduler.
    pub fn scheduler(&self) -> Arc<dyn MigrationScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Backend classes the coordinator resolves against.
    pub fn backends(&self) -> &Arc<BackendRegistry> {
        &self.backends
    }

    /// Host overrides captured during resolution.
    pub fn overrides(&self) -> &OverrideState {
        &self.overrides
    }

    /// How the host process is running.
    pub fn execution_context(&self) -> ExecutionContext {
        self.context
    }
}

static INSTANCE: OnceLock<Arc<MigrationCoordinator>> = OnceLock::new();
static COMMANDS: OnceLock<CommandRegistry> = OnceLock::new();
static INIT_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Initialize and start the process-wide coordinator.
///
/// The first call opens the database named by `settings`, builds the
/// coordinator over a fresh [`SledMigrationScheduler`](crate::migration::SledMigrationScheduler)
/// and starts it. Later calls return the same instance and ignore `settings`.
pub fn init(settings: &CoordinatorSettings) -> Result<Arc<MigrationCoordinator>> {
    if let Some(coordinator) = INSTANCE.get() {
        return Ok(Arc::clone(coordinator));
    }

    let _guard = INIT_LOCK.lock();
    if let Some(coordinator) = INSTANCE.get() {
        return Ok(Arc::clone(coordinator));
    }

    let db = settings.open_db()?;
    let coordinator = settings.builder(&db)?.build();
    coordinator.start(commands())?;

    let _ = INSTANCE.set(Arc::clone(&coordinator));
    Ok(coordinator)
}

/// The process-wide coordinator, if [`init`] has run.
pub fn instance() -> Option<Arc<MigrationCoordinator>> {
    INSTANCE.get().cloned()
}

/// Command registry used by the process-wide coordinator.
pub fn commands() -> &'static CommandRegistry {
    COMMANDS.get_or_init(CommandRegistry::new)
}
