//! Interactive command loop around the session store.
//!
//! Every line the user enters counts as activity for the idle monitor.
//! Session notices (sign-in, idle expiry, forced logout) are printed as they
//! arrive, like toasts.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use authshell_core::auth::{AuthError, IdleMonitor, SessionEvent, SessionStore};
use authshell_core::models::{ProfileUpdate, User};
use authshell_core::Config;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::forms;

const HELP: &str = "\
Commands:
  login                    sign in with email and password
  register                 create an account
  status                   show who is signed in
  profile                  fetch your profile from the server
  update <field> <value>   change a profile field (username, email, ...)
  password                 change your password
  logout                   sign out
  help                     show this help
  quit                     exit";

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Login,
    Register,
    Status,
    Profile,
    Update { field: String, value: String },
    Password,
    Logout,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let name = parts.next()?;
        let command = match name.to_ascii_lowercase().as_str() {
            "login" => Command::Login,
            "register" => Command::Register,
            "status" | "whoami" => Command::Status,
            "profile" | "me" => Command::Profile,
            "update" => {
                let field = parts.next().unwrap_or_default().to_string();
                let value = parts.collect::<Vec<_>>().join(" ");
                Command::Update { field, value }
            }
            "password" => Command::Password,
            "logout" => Command::Logout,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }
}

pub struct App {
    config: Config,
    store: Arc<SessionStore>,
    _monitor: IdleMonitor,
    notices: JoinHandle<()>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let api = config.api_client()?;
        let storage = config.session_storage()?;
        let store = Arc::new(SessionStore::new(api, storage));
        let monitor = IdleMonitor::spawn(store.clone(), config.idle_policy());
        let notices = tokio::spawn(print_notices(store.clone()));

        Ok(Self {
            config,
            store,
            _monitor: monitor,
            notices,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("authshell - connected to {}", self.store.api().base_url());
        self.print_status();
        println!("Type 'help' for commands.");

        loop {
            let Some(line) = read_line("authshell> ").await? else {
                break;
            };
            self.store.record_activity();

            let Some(command) = Command::parse(&line) else {
                continue;
            };
            debug!(?command, "Command entered");
            if command == Command::Quit {
                break;
            }
            self.execute(command).await?;
        }

        self.notices.abort();
        Ok(())
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login => self.login().await?,
            Command::Register => self.register().await?,
            Command::Status => self.print_status(),
            Command::Profile => match self.store.get_profile().await {
                Ok(user) => print_user(&user),
                Err(e) => report(&e),
            },
            Command::Update { field, value } => self.update(field, value).await,
            Command::Password => self.change_password().await?,
            Command::Logout => {
                if self.store.is_authenticated() {
                    self.store.logout().await;
                } else {
                    println!("You are not signed in.");
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
            Command::Unknown(name) => println!("Unknown command '{name}'. Type 'help'."),
        }
        Ok(())
    }

    async fn login(&mut self) -> Result<()> {
        let default_email = self.config.last_email.clone().unwrap_or_default();
        let label = if default_email.is_empty() {
            "Email: ".to_string()
        } else {
            format!("Email [{default_email}]: ")
        };
        let mut email = read_line(&label).await?.unwrap_or_default();
        if email.trim().is_empty() {
            email = default_email;
        }
        let password = read_password("Password: ").await?;

        let credentials = match forms::login(email, password) {
            Ok(credentials) => credentials,
            Err(message) => {
                println!("{message}");
                return Ok(());
            }
        };

        match self.store.login(&credentials).await {
            Ok(_) => {
                self.config.last_email = Some(credentials.email);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
            }
            Err(e) => report(&e),
        }
        Ok(())
    }

    async fn register(&mut self) -> Result<()> {
        let username = read_line("Username: ").await?.unwrap_or_default();
        let email = read_line("Email: ").await?.unwrap_or_default();
        let password = read_password("Password: ").await?;
        let confirm = read_password("Confirm password: ").await?;

        let registration = match forms::register(username, email, password, confirm) {
            Ok(registration) => registration,
            Err(message) => {
                println!("{message}");
                return Ok(());
            }
        };

        // the SignedIn notice confirms success
        if let Err(e) = self.store.register(&registration).await {
            report(&e);
        }
        Ok(())
    }

    async fn update(&mut self, field: String, value: String) {
        let update = profile_update(field, value);
        if update.is_empty() {
            println!("Usage: update <field> <value>");
            return;
        }

        match self.store.update_profile(&update).await {
            Ok(user) => {
                println!("Profile updated successfully");
                print_user(&user);
            }
            Err(e) => report(&e),
        }
    }

    async fn change_password(&mut self) -> Result<()> {
        if !self.store.is_authenticated() {
            report(&AuthError::NotAuthenticated);
            return Ok(());
        }
        let current = read_password("Current password: ").await?;
        let new = read_password("New password: ").await?;
        let confirm = read_password("Confirm new password: ").await?;

        let change = match forms::password_change(current, new, confirm) {
            Ok(change) => change,
            Err(message) => {
                println!("{message}");
                return Ok(());
            }
        };

        match self.store.change_password(&change).await {
            Ok(()) => println!("Password updated successfully"),
            Err(e) => report(&e),
        }
        Ok(())
    }

    fn print_status(&self) {
        let snapshot = self.store.snapshot();
        match snapshot.user {
            Some(user) if snapshot.is_authenticated => {
                println!("Signed in as {} <{}>", user.display_name(), user.email);
                if let Some(at) = snapshot.last_activity_at {
                    println!("Last activity: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
                }
            }
            _ => println!("Not signed in."),
        }
    }
}

/// Build a single-field profile edit. Empty if either part is missing.
fn profile_update(field: String, value: String) -> ProfileUpdate {
    let mut update = ProfileUpdate::default();
    if field.is_empty() || value.is_empty() {
        return update;
    }
    if field == "username" {
        update.username = Some(value);
    } else if field == "email" {
        update.email = Some(value);
    } else {
        update.extra.insert(field, serde_json::Value::String(value));
    }
    update
}

fn report(err: &AuthError) {
    println!("Error: {err}");
    if err.is_session_fatal() {
        println!("Type 'login' to sign in.");
    }
}

/// Strings print bare, anything else as JSON
fn field_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn print_user(user: &User) {
    println!("  username: {}", user.username);
    println!("  email:    {}", user.email);
    if let Some(ref role) = user.role {
        println!("  role:     {}", field_text(role));
    }
    for (key, value) in &user.extra {
        println!("  {key}: {}", field_text(value));
    }
}

/// Print session notices as they happen
async fn print_notices(store: Arc<SessionStore>) {
    let mut events = store.events();
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(notice) = event.notice() {
                    match event {
                        SessionEvent::IdleExpired | SessionEvent::SessionInvalidated => {
                            println!("\n! {notice}")
                        }
                        _ => println!("{notice}"),
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "Missed session notices"),
            Err(RecvError::Closed) => return,
        }
    }
}

/// Read one line from stdin without blocking the runtime.
/// Returns `None` at end of input.
async fn read_line(prompt: &str) -> Result<Option<String>> {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || -> Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    })
    .await
    .context("Input task failed")?
}

async fn read_password(prompt: &str) -> Result<String> {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
        .await
        .context("Input task failed")?
        .context("Failed to read password")
}
