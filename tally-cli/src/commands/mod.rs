//! CLI command implementations

pub mod account;
pub mod dashboard;
pub mod logs;
pub mod transaction;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tally_core::services::{EntryPoint, LogEvent};
use tally_core::{Identity, SessionToken, TallyContext};

/// File in the data directory holding the current session token
const SESSION_FILE: &str = "session";

/// Data directory from `TALLY_DIR`, or `~/.tally`
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TALLY_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".tally"))
        .context("Could not find home directory; set TALLY_DIR")
}

pub fn get_context() -> Result<TallyContext> {
    let data_dir = get_data_dir()?;
    TallyContext::new(&data_dir, EntryPoint::Cli).context("Failed to initialize tally context")
}

/// Record a command in the event log; failures never break the command
pub fn log_command(ctx: &TallyContext, command: &str, identity: Option<&Identity>) {
    let mut event = LogEvent::new("command_executed").with_command(command);
    if let Some(identity) = identity {
        event = event.with_identity(identity.id);
    }
    let _ = ctx.logger.log(event);
}

fn session_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(SESSION_FILE))
}

pub fn read_session_token() -> Result<Option<SessionToken>> {
    let path = session_path()?;
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let token = SessionToken::from_client(content);
    Ok((!token.as_str().is_empty()).then_some(token))
}

pub fn write_session_token(token: &SessionToken) -> Result<()> {
    let path = session_path()?;
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.write_all(token.as_str().as_bytes())?;
    Ok(())
}

pub fn clear_session_token() -> Result<()> {
    let path = session_path()?;
    if path.exists() {
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// The logged in identity, or an error telling the user to log in
pub async fn require_identity(ctx: &TallyContext) -> Result<Identity> {
    let identity = match read_session_token()? {
        Some(token) => ctx.session_service.resolve(&token).await?,
        None => None,
    };
    identity.context("Not logged in. Run 'tally login' first.")
}

/// Start a session and remember its token
pub async fn start_session(ctx: &TallyContext, identity: &Identity) -> Result<()> {
    // Replace any session this terminal already had
    if let Some(previous) = read_session_token()? {
        ctx.session_service.destroy(&previous).await?;
    }
    let token = ctx.session_service.create(identity.id).await?;
    write_session_token(&token)
}
