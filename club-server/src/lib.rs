//! Club membership server
//!
//! Approval and linking protocol over a transactional document store,
//! plus realtime listeners and first sign-in profile bootstrap.
//!
//! ```text
//! club-server/src/
//! ├── db/            # redb document store, transactions, live listeners
//! ├── approval/      # approve / reject / link / unlink
//! ├── registration   # registration submission
//! ├── audit/         # audit trail entries
//! ├── profile/       # profile resolution and bootstrap
//! ├── auth/          # JWT, session revocation
//! ├── api/           # HTTP routes
//! ├── core/          # config, state, server
//! └── utils/         # logging
//! ```

pub mod api;
pub mod approval;
pub mod audit;
pub mod auth;
pub mod core;
pub mod db;
pub mod profile;
pub mod registration;
pub mod utils;

pub use approval::ApprovalService;
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerState};
pub use db::DocStore;
pub use profile::ProfileResolver;
pub use registration::RegistrationService;
pub use shared::{AppError, AppResult};
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};

/// Security event on the `security` log target
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

/// Load `.env`, prepare the work directory and start logging
pub fn setup_environment(config: &Config) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.work_dir)?;
    let log_dir = config.log_dir();
    init_logger_with_file(&config.log_level, config.log_json, Some(&log_dir))?;
    Ok(())
}
