//! Tally Core - identity, sessions and ledger for personal finance tracking
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities and validation (Identity, Session, Transaction, Summary)
//! - **ports**: Trait definitions for external dependencies (stores, clock)
//! - **services**: Business logic orchestration (auth, sessions, ledger, dashboard)
//! - **adapters**: Concrete implementations (DuckDB, manual clock)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbRepository;
use config::Config;
use ports::{Clock, SystemClock};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult, ValidationErrors};
pub use domain::{
    aggregate, Identity, ProviderAssertion, PublicTransaction, RegistrationForm, SessionToken,
    Summary, Transaction, TransactionDraft, TransactionInput, TransactionKind,
};

/// Database file inside the data directory
pub const DB_FILENAME: &str = "tally.duckdb";

/// Main context for Tally operations
///
/// The primary entry point for all business logic. It holds the store,
/// configuration, event log and every service, all sharing one clock.
pub struct TallyContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub logger: Arc<LoggingService>,
    pub auth_service: AuthService,
    pub session_service: SessionService,
    pub ledger_service: LedgerService,
    pub dashboard_service: DashboardService,
}

impl TallyContext {
    /// Open (or create) the data directory's database and event log
    pub fn new(data_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        let config = Config::load(data_dir)?;
        let repository = Arc::new(
            DuckDbRepository::new(&data_dir.join(DB_FILENAME)).context("Failed to open database")?,
        );
        let logger = Arc::new(
            LoggingService::new(data_dir, entry_point, env!("CARGO_PKG_VERSION"))
                .context("Failed to open event log")?,
        );

        Self::assemble(config, repository, logger, Arc::new(SystemClock))
    }

    /// Everything in memory; nothing touches the filesystem
    pub fn in_memory(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let repository = Arc::new(DuckDbRepository::open_in_memory()?);
        let logger = Arc::new(LoggingService::open_in_memory(
            EntryPoint::Cli,
            env!("CARGO_PKG_VERSION"),
        )?);
        Self::assemble(config, repository, logger, clock)
    }

    fn assemble(
        config: Config,
        repository: Arc<DuckDbRepository>,
        logger: Arc<LoggingService>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        repository.ensure_schema().context("Failed to migrate database")?;

        let passwords = PasswordService::new(&config.password_params)?;

        let auth_service = AuthService::new(repository.clone(), passwords, Arc::clone(&clock))
            .with_logger(Arc::clone(&logger));
        let session_service = SessionService::new(
            repository.clone(),
            repository.clone(),
            Arc::clone(&clock),
            config.session_ttl,
            config.sliding_sessions,
        );
        let ledger_service = LedgerService::new(repository.clone(), Arc::clone(&clock));
        let dashboard_service = DashboardService::new(repository.clone(), config.recent_limit);

        Ok(Self {
            config,
            repository,
            logger,
            auth_service,
            session_service,
            ledger_service,
            dashboard_service,
        })
    }
}
