//! Database readiness bootstrapper
//!
//! Runs once at startup, before the host serves anything. It reads the
//! store's connectivity and change history, classifies the situation into a
//! [`ReconciliationDecision`] and executes the matching action:
//!
//! | Observation | Decision | Action |
//! |-------------|----------|--------|
//! | unreachable, or no applied and no pending changes | `NoMigrationHistory` | create-from-model |
//! | pending changes exist | `HasPendingChanges` | apply-pending, in declared order |
//! | otherwise | `UpToDate` | no-op |
//!
//! # Concurrency
//!
//! The read-then-act sequence is not atomic. Two processes bootstrapping the
//! same store at once can both observe `NoMigrationHistory` and both attempt
//! create-from-model. Hosts running several instances must serialize calls to
//! [`migrate_database`] externally (a lock or a leader gate upstream).
//!
//! ```rust,ignore
//! use dbready::bootstrap::{Bootstrapper, TracingLogger};
//! use dbready::database::{SchemaModel, SqliteStoreFactory};
//!
//! let model = SchemaModel::from_dir("./schema")?;
//! let factory = SqliteStoreFactory::new("./app.sqlite3", model);
//! let report = Bootstrapper::new(Some(&TracingLogger)).run(&factory)?;
//! println!("{}", report.decision);
//! ```

mod error;
mod logger;

pub use error::{BootstrapError, Phase};
pub use logger::{BootstrapLogger, TracingLogger};

use logger::emit;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::Level;

/// Identifier of one schema change
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChangeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChangeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Scoped connection to the store, bound to the application's declared schema
///
/// The handle is released when dropped. The bootstrapper holds exactly one for
/// the whole run, so release happens on success, no-op and failure alike.
pub trait StoreHandle {
    /// Whether the store is currently reachable
    fn can_connect(&mut self) -> Result<bool, BootstrapError>;

    /// Changes recorded in the store's own history, in application order
    fn applied_changes(&mut self) -> Result<Vec<ChangeId>, BootstrapError>;

    /// Declared changes not yet in the history, in declared order
    fn pending_changes(&mut self) -> Result<Vec<ChangeId>, BootstrapError>;

    /// Materialize the full current schema in one operation
    fn create_from_model(&mut self) -> Result<(), BootstrapError>;

    /// Apply one pending change; atomicity of the change is the handle's concern
    fn apply_change(&mut self, change: &ChangeId) -> Result<(), BootstrapError>;
}

/// Produces scoped store handles
pub trait StoreFactory {
    type Handle: StoreHandle;

    fn open_scope(&self) -> Result<Self::Handle, BootstrapError>;
}

/// Host application as seen by [`migrate_database`]
pub trait BootstrapHost {
    type Factory: StoreFactory;

    fn store_factory(&self) -> &Self::Factory;

    /// Optional logger; the default is silence
    fn logger(&self) -> Option<&dyn BootstrapLogger> {
        None
    }
}

/// One consistent read of store state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreObservation {
    pub can_connect: bool,
    pub applied: Vec<ChangeId>,
    pub pending: Vec<ChangeId>,
}

/// Reconciliation case, recomputed on every run and never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationDecision {
    NoMigrationHistory,
    HasPendingChanges,
    UpToDate,
}

impl ReconciliationDecision {
    /// Classify an observation
    ///
    /// An unreachable store short-circuits to `NoMigrationHistory` regardless
    /// of the change lists.
    pub fn classify(observation: &StoreObservation) -> Self {
        if !observation.can_connect
            || (observation.applied.is_empty() && observation.pending.is_empty())
        {
            Self::NoMigrationHistory
        } else if !observation.pending.is_empty() {
            Self::HasPendingChanges
        } else {
            Self::UpToDate
        }
    }
}

impl fmt::Display for ReconciliationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMigrationHistory => write!(f, "no migration history"),
            Self::HasPendingChanges => write!(f, "has pending changes"),
            Self::UpToDate => write!(f, "up to date"),
        }
    }
}

/// Action selected for a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "changes", rename_all = "snake_case")]
pub enum ReconciliationAction {
    CreateFromModel,
    ApplyPending(Vec<ChangeId>),
    NoOp,
}

impl ReconciliationAction {
    fn for_decision(decision: ReconciliationDecision, observation: &StoreObservation) -> Self {
        match decision {
            ReconciliationDecision::NoMigrationHistory => Self::CreateFromModel,
            ReconciliationDecision::HasPendingChanges => {
                Self::ApplyPending(observation.pending.clone())
            }
            ReconciliationDecision::UpToDate => Self::NoOp,
        }
    }

    /// Whether executing this action mutates the store
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::NoOp)
    }
}

impl fmt::Display for ReconciliationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateFromModel => write!(f, "create-from-model"),
            Self::ApplyPending(changes) => write!(f, "apply-pending ({} changes)", changes.len()),
            Self::NoOp => write!(f, "no-op"),
        }
    }
}

/// Observation plus the decision it leads to, without acting on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapPlan {
    pub observation: StoreObservation,
    pub decision: ReconciliationDecision,
    pub action: ReconciliationAction,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub decision: ReconciliationDecision,
    pub action: ReconciliationAction,
    /// Changes applied by apply-pending, in order
    pub applied_changes: Vec<ChangeId>,
}

/// The startup reconciliation routine
///
/// Not safe to run concurrently against one store; see the module docs.
#[derive(Clone, Copy, Default)]
pub struct Bootstrapper<'a> {
    logger: Option<&'a dyn BootstrapLogger>,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(logger: Option<&'a dyn BootstrapLogger>) -> Self {
        Self { logger }
    }

    /// Observe and classify without mutating the store
    pub fn plan<F: StoreFactory>(&self, factory: &F) -> Result<BootstrapPlan, BootstrapError> {
        let mut handle = self.open_scope(factory)?;
        self.plan_with(&mut handle)
    }

    /// Observe, classify and execute the matching action
    ///
    /// Errors are logged with their phase and returned unchanged.
    pub fn run<F: StoreFactory>(&self, factory: &F) -> Result<BootstrapReport, BootstrapError> {
        let mut handle = self.open_scope(factory)?;
        let plan = self.plan_with(&mut handle)?;

        let applied_changes = match &plan.action {
            ReconciliationAction::CreateFromModel => {
                self.info(Phase::CreateFromModel, "creating schema from model");
                self.guard(Phase::CreateFromModel, handle.create_from_model())?;
                self.info(Phase::CreateFromModel, "schema created from model");
                Vec::new()
            }
            ReconciliationAction::ApplyPending(pending) => {
                self.apply_pending(&mut handle, pending)?;
                pending.clone()
            }
            ReconciliationAction::NoOp => {
                self.info(Phase::Classify, "database is up to date, nothing to do");
                Vec::new()
            }
        };

        Ok(BootstrapReport {
            decision: plan.decision,
            action: plan.action,
            applied_changes,
        })
    }

    fn open_scope<F: StoreFactory>(&self, factory: &F) -> Result<F::Handle, BootstrapError> {
        self.guard(Phase::OpenScope, factory.open_scope())
    }

    fn plan_with<H: StoreHandle>(&self, handle: &mut H) -> Result<BootstrapPlan, BootstrapError> {
        let observation = self.observe(handle)?;
        let decision = ReconciliationDecision::classify(&observation);
        let action = ReconciliationAction::for_decision(decision, &observation);
        self.info(
            Phase::Classify,
            &format!("decision: {}, action: {}", decision, action),
        );

        Ok(BootstrapPlan {
            observation,
            decision,
            action,
        })
    }

    fn observe<H: StoreHandle>(&self, handle: &mut H) -> Result<StoreObservation, BootstrapError> {
        let can_connect = self.guard(Phase::Connect, handle.can_connect())?;
        self.info(Phase::Connect, &format!("store reachable: {}", can_connect));

        if !can_connect {
            return Ok(StoreObservation::default());
        }

        let applied = self.guard(Phase::ListApplied, handle.applied_changes())?;
        self.info(
            Phase::ListApplied,
            &format!("applied changes: {}", applied.len()),
        );

        let pending = self.guard(Phase::ListPending, handle.pending_changes())?;
        self.info(
            Phase::ListPending,
            &format!("pending changes: {}", pending.len()),
        );

        Ok(StoreObservation {
            can_connect,
            applied,
            pending,
        })
    }

    fn apply_pending<H: StoreHandle>(
        &self,
        handle: &mut H,
        pending: &[ChangeId],
    ) -> Result<(), BootstrapError> {
        for (i, change) in pending.iter().enumerate() {
            self.info(
                Phase::ApplyPending,
                &format!("applying change {} ({}/{})", change, i + 1, pending.len()),
            );
            self.guard(Phase::ApplyPending, handle.apply_change(change))?;
        }
        self.info(
            Phase::ApplyPending,
            &format!("applied {} pending changes", pending.len()),
        );
        Ok(())
    }

    /// Log a failure with its phase, then pass the result through untouched
    fn guard<T>(&self, phase: Phase, result: Result<T, BootstrapError>) -> Result<T, BootstrapError> {
        if let Err(err) = &result {
            let message = match err.change_id() {
                Some(change) => format!("{} failed at change {}: {}", phase, change, err),
                None => format!("{} failed: {}", phase, err),
            };
            emit(self.logger, Level::ERROR, phase, &message);
        }
        result
    }

    fn info(&self, phase: Phase, message: &str) {
        emit(self.logger, Level::INFO, phase, message);
    }
}

/// Bring the host's store up to date and hand the host back
///
/// Intended to be called once during startup. On failure the original error
/// is returned so the caller can abort startup.
pub fn migrate_database<H: BootstrapHost>(host: H) -> Result<H, BootstrapError> {
    Bootstrapper::new(host.logger()).run(host.store_factory())?;
    Ok(host)
}
