//! Account commands - register, log in and out, link providers

use std::io::BufRead;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use tally_core::{Identity, OperationResult, ProviderAssertion, RegistrationForm};

use super::{
    clear_session_token, get_context, log_command, read_session_token, require_identity,
    start_session,
};
use crate::output;

/// Profile fields handed over by an identity provider
#[derive(Args)]
pub struct AssertionArgs {
    /// Provider name (e.g. github)
    #[arg(long)]
    pub provider: String,
    /// Provider-issued subject id
    #[arg(long)]
    pub subject: String,
    /// Display name from the provider
    #[arg(long)]
    pub display_name: Option<String>,
    /// Username from the provider
    #[arg(long)]
    pub username: Option<String>,
    /// Email from the provider
    #[arg(long)]
    pub email: Option<String>,
    /// Avatar URL from the provider
    #[arg(long)]
    pub avatar: Option<String>,
}

impl AssertionArgs {
    fn into_assertion(self) -> ProviderAssertion {
        ProviderAssertion {
            provider: self.provider,
            subject: self.subject,
            display_name: self.display_name,
            username: self.username,
            email: self.email,
            avatar_ref: self.avatar,
        }
    }
}

fn prompt_text(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::new().with_prompt(prompt).interact_text()?),
    }
}

/// Password from the terminal, or one line of stdin when piped
fn read_password(prompt: &str) -> Result<String> {
    if atty::isnt(atty::Stream::Stdin) {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }
    Ok(Password::new().with_prompt(prompt).interact()?)
}

/// Spinner while the slow password hash runs
fn spinner(message: &'static str, json: bool) -> Option<ProgressBar> {
    if json || atty::isnt(atty::Stream::Stderr) {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    Some(bar)
}

fn print_identity(identity: &Identity) {
    println!("  Name: {}", identity.display_name);
    if let Some(email) = &identity.email {
        println!("  Email: {}", email);
    }
    if let Some(external_id) = &identity.external_id {
        println!("  Linked: {}", external_id);
    }
    println!("  ID: {}", identity.id.to_string().dimmed());
}

pub async fn register(name: Option<String>, email: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;

    let name = prompt_text(name, "Name")?;
    let email = prompt_text(email, "Email")?;
    let password = read_password("Password")?;
    let confirm = read_password("Confirm password")?;

    let form = RegistrationForm::new(name, email, password, confirm);
    let bar = spinner("Creating account...", json);
    let result = ctx.auth_service.register(&form).await;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    if json {
        let failed = result.is_err();
        println!("{}", serde_json::to_string_pretty(&OperationResult::from(result))?);
        if failed {
            std::process::exit(1);
        }
        return Ok(());
    }

    let identity = result?;
    log_command(&ctx, "register", Some(&identity));
    output::success("Account created. Run 'tally login' to start a session.");
    print_identity(&identity);
    Ok(())
}

pub async fn login(email: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;

    let email = prompt_text(email, "Email")?;
    let password = read_password("Password")?;

    let bar = spinner("Checking credentials...", json);
    let result = ctx.auth_service.login_local(&email, &password).await;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    let identity = result?;

    start_session(&ctx, &identity).await?;
    log_command(&ctx, "login", Some(&identity));

    if json {
        println!("{}", serde_json::to_string_pretty(&identity)?);
    } else {
        output::success(&format!("Logged in as {}", identity.display_name));
    }
    Ok(())
}

pub async fn login_external(args: AssertionArgs, link: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let assertion = args.into_assertion();

    let identity = if link {
        let current = require_identity(&ctx).await?;
        let linked = ctx.auth_service.link_external(&current, &assertion).await?;
        log_command(&ctx, "link", Some(&linked));
        linked
    } else {
        let identity = ctx.auth_service.login_external(&assertion).await?;
        start_session(&ctx, &identity).await?;
        log_command(&ctx, "login-external", Some(&identity));
        identity
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&identity)?);
    } else if link {
        output::success(&format!("Linked {} to {}", assertion.qualified_id(), identity.display_name));
    } else {
        output::success(&format!("Logged in as {}", identity.display_name));
    }
    Ok(())
}

pub async fn logout() -> Result<()> {
    let ctx = get_context()?;
    match read_session_token()? {
        Some(token) => {
            ctx.session_service.destroy(&token).await?;
            clear_session_token()?;
            log_command(&ctx, "logout", None);
            output::success("Logged out");
        }
        None => output::info("Not logged in"),
    }
    Ok(())
}

pub async fn whoami(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let identity = match read_session_token()? {
        Some(token) => ctx.session_service.resolve(&token).await?,
        None => None,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&identity)?);
        return Ok(());
    }

    match identity {
        Some(identity) => {
            println!("{}", "Logged in".bold());
            print_identity(&identity);
        }
        None => {
            // A stale token is of no further use
            clear_session_token()?;
            output::warning("Not logged in");
        }
    }
    Ok(())
}

pub async fn purge_sessions(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let purged = ctx.session_service.purge_expired().await?;

    if json {
        println!("{}", serde_json::json!({ "purged": purged }));
    } else {
        println!("Removed {} expired session(s)", purged);
    }
    Ok(())
}
