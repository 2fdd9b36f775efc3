//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod auth;
mod dashboard;
mod ledger;
pub mod logging;
pub mod migration;
mod password;
mod session;

pub use auth::AuthService;
pub use dashboard::{Dashboard, DashboardService, DEFAULT_RECENT_LIMIT};
pub use ledger::LedgerService;
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use password::PasswordService;
pub use session::SessionService;
