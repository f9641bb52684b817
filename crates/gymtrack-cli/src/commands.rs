//! Command handlers.
//!
//! `App` is the presentation layer: it reads the session state to decide
//! what a command may do, calls the session manager for auth and profile
//! changes, and calls the API client for everything else.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, Result};
use tracing::{error, warn};

use gymtrack_core::api::NewAccount;
use gymtrack_core::auth::ProfileUpdate;
use gymtrack_core::models::history::total_entries;
use gymtrack_core::models::UserProfile;
use gymtrack_core::utils::{format_date, truncate};
use gymtrack_core::validation::{fields, sign_in_rules, sign_up_rules, FormValues};
use gymtrack_core::{ApiClient, ApiError, Config, SessionError, SessionManager, SessionState};

use crate::Command;

/// Column width for exercise names in listings
const NAME_COLUMN_WIDTH: usize = 28;

pub struct App {
    config: Config,
    api: ApiClient,
    session: SessionManager,
}

impl App {
    pub fn new(config: Config, api: ApiClient, session: SessionManager) -> Self {
        Self {
            config,
            api,
            session,
        }
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        let result = match command {
            Command::Login { email } => self.login(email).await,
            Command::Signup { name, email } => self.signup(name, email).await,
            Command::Logout => self.logout().await,
            Command::Whoami { json } => self.whoami(json),
            Command::Groups => self.groups().await,
            Command::Exercises { group } => self.exercises(&group).await,
            Command::Exercise { id } => self.exercise(&id).await,
            Command::Done { id } => self.done(&id).await,
            Command::History { json } => self.history(json).await,
            Command::Profile { name, password } => self.profile(name, password).await,
            Command::Avatar { path } => self.avatar(&path).await,
        };

        if let Err(ref e) = result {
            error!(error = %e, "Command failed");
            self.after_failure(e).await;
        }
        result
    }

    /// Sign out if the server no longer accepts the saved token.
    async fn after_failure(&self, err: &anyhow::Error) {
        if matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized(_)))
            && self.session.is_authenticated()
        {
            warn!("Saved session rejected by server, signing out");
            self.session.sign_out().await;
        }
    }

    /// Message to show the user for a failed command.
    pub fn describe_error(&self, err: &anyhow::Error) -> String {
        if let Some(e) = err.downcast_ref::<SessionError>() {
            return e.user_message();
        }
        match err.downcast_ref::<ApiError>() {
            Some(ApiError::Unauthorized(_)) => {
                "Your session has expired. Run `gymtrack login` again.".to_string()
            }
            Some(ApiError::NetworkError(_)) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            Some(e) => e.to_string(),
            None => err.to_string(),
        }
    }

    fn require_session(&self) -> Result<UserProfile> {
        match self.session.state() {
            SessionState::Authenticated { profile, .. } => Ok(profile),
            _ => Err(anyhow!("Not signed in. Run `gymtrack login` first.")),
        }
    }

    // ===== Auth =====

    async fn login(&mut self, email: Option<String>) -> Result<()> {
        if let Some(profile) = self.session.profile() {
            println!("Already signed in as {}.", profile.display_name());
            return Ok(());
        }

        let email = match email {
            Some(email) => email,
            None => prompt_with_default("Email", self.config.last_email.as_deref())?,
        };
        let password = rpassword::prompt_password("Password: ")?;

        sign_in_rules().validate(
            &FormValues::new()
                .with(fields::EMAIL, email.as_str())
                .with(fields::PASSWORD, password.as_str()),
        )?;

        println!("Signing in...");
        let user = self.session.sign_in(&email, &password).await?;

        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Welcome, {}!", user.display_name());
        Ok(())
    }

    async fn signup(&mut self, name: Option<String>, email: Option<String>) -> Result<()> {
        if self.session.is_authenticated() {
            return Err(anyhow!("Already signed in. Run `gymtrack logout` first."));
        }

        let name = match name {
            Some(name) => name,
            None => prompt("Name")?,
        };
        let email = match email {
            Some(email) => email,
            None => prompt("Email")?,
        };
        let password = rpassword::prompt_password("Password: ")?;
        let password_confirm = rpassword::prompt_password("Confirm password: ")?;

        sign_up_rules().validate(
            &FormValues::new()
                .with(fields::NAME, name.as_str())
                .with(fields::EMAIL, email.as_str())
                .with(fields::PASSWORD, password.as_str())
                .with(fields::PASSWORD_CONFIRM, password_confirm.as_str()),
        )?;

        self.api
            .create_account(&NewAccount {
                name: name.trim().to_string(),
                email: email.trim().to_string(),
                password: password.clone(),
            })
            .await?;
        println!("Account created.");

        let user = self.session.sign_in(&email, &password).await?;
        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Welcome, {}!", user.display_name());
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        if !self.session.is_authenticated() {
            println!("Not signed in.");
            return Ok(());
        }
        self.session.sign_out().await;
        println!("Signed out.");
        Ok(())
    }

    fn whoami(&self, json: bool) -> Result<()> {
        let profile = self.require_session()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&profile)?);
            return Ok(());
        }

        println!("Hello, {}", profile.display_name());
        println!("  id:     {}", profile.id);
        println!("  email:  {}", profile.email);
        match profile.avatar_url(self.api.base_url()) {
            Some(url) => println!("  avatar: {}", url),
            None => println!("  avatar: (default)"),
        }
        Ok(())
    }

    // ===== Exercises =====

    async fn groups(&self) -> Result<()> {
        self.require_session()?;
        let groups = self.api.fetch_groups().await?;
        for group in &groups {
            println!("{}", group);
        }
        Ok(())
    }

    async fn exercises(&self, group: &str) -> Result<()> {
        self.require_session()?;
        let exercises = self.api.fetch_exercises_by_group(group).await?;

        println!("Exercises ({})", exercises.len());
        for exercise in &exercises {
            println!(
                "  {:>4}  {:<width$}  {}",
                exercise.id,
                truncate(&exercise.name, NAME_COLUMN_WIDTH),
                exercise.prescription(),
                width = NAME_COLUMN_WIDTH
            );
        }
        Ok(())
    }

    async fn exercise(&self, id: &str) -> Result<()> {
        self.require_session()?;
        let exercise = self.api.fetch_exercise(id).await?;
        let base = self.api.base_url();

        println!("{}", exercise.name);
        println!("  group:       {}", exercise.group);
        println!("  series:      {}", exercise.series);
        println!("  repetitions: {}", exercise.repetitions);
        println!("  demo:        {}", exercise.demo_url(base));
        println!("  thumb:       {}", exercise.thumb_url(base));
        if let Some(ref updated) = exercise.updated_at {
            println!("  updated:     {}", format_date(updated));
        }
        Ok(())
    }

    async fn done(&self, id: &str) -> Result<()> {
        self.require_session()?;
        self.api.register_history(id).await?;
        println!("Congratulations! Exercise registered in your history.");
        Ok(())
    }

    async fn history(&self, json: bool) -> Result<()> {
        self.require_session()?;
        let days = self.api.fetch_history().await?;

        if json {
            println!("{}", serde_json::to_string_pretty(&days)?);
            return Ok(());
        }

        if total_entries(&days) == 0 {
            println!("No exercises registered yet.\nHow about a workout today?");
            return Ok(());
        }

        for day in days.iter().filter(|d| !d.is_empty()) {
            println!("{}", day.title);
            for entry in &day.data {
                println!("  {:>5}  {} ({})", entry.hour, entry.name, entry.group);
            }
        }
        Ok(())
    }

    // ===== Profile =====

    async fn profile(&self, name: Option<String>, change_password: bool) -> Result<()> {
        let current = self.require_session()?;

        let mut update = ProfileUpdate {
            name: name.unwrap_or(current.name),
            ..Default::default()
        };
        if change_password {
            update.old_password = Some(rpassword::prompt_password("Current password: ")?);
            update.password = Some(rpassword::prompt_password("New password: ")?);
            update.password_confirm = Some(rpassword::prompt_password("Confirm new password: ")?);
        }

        let updated = self.session.save_profile(update).await?;
        println!("Profile updated. Name: {}", updated.name);
        Ok(())
    }

    async fn avatar(&self, path: &Path) -> Result<()> {
        self.require_session()?;
        let updated = self.session.change_avatar(path).await?;
        match updated.avatar_url(self.api.base_url()) {
            Some(url) => println!("Photo updated: {}", url),
            None => println!("Photo updated."),
        }
        Ok(())
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_with_default(label: &str, default: Option<&str>) -> Result<String> {
    let Some(default) = default else {
        return prompt(label);
    };

    print!("{} [{}]: ", label, default);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    Ok(if input.is_empty() {
        default.to_string()
    } else {
        input.to_string()
    })
}
