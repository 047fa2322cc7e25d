pub mod commands;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::auth::{self, Session};
use crate::config::Settings;
use crate::error::PortalError;
use crate::smsapi::{Gateway, SendChampClient};
use crate::srdb::Db;

/// One operator's console: the store, the gateway (if configured), the
/// academic session label and whoever is logged in.
///
/// Commands take `&mut self`, so one command always finishes before the next
/// starts.
pub struct Console<G: Gateway> {
    db: Db,
    gateway: Option<G>,
    academic_session: String,
    session: Option<Session>,
}

impl<G: Gateway> Console<G> {
    pub fn new(db: Db, gateway: Option<G>, academic_session: impl Into<String>) -> Self {
        Self {
            db,
            gateway,
            academic_session: academic_session.into(),
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Runs one command line and returns the reply. Errors are turned into a
    /// reply; they never end the console.
    pub async fn handle_line(&mut self, line: &str) -> String {
        match commands::Commands::run_command(self, line).await {
            Ok(message) => message,
            Err(err) => {
                log::debug!("[handle_line] Command failed: {err:#}");
                format!("Error: {err}")
            }
        }
    }

    fn gateway(&self) -> Result<&G, PortalError> {
        self.gateway.as_ref().ok_or(PortalError::GatewayNotConfigured)
    }

    fn current(&self) -> Result<&Session, PortalError> {
        self.session.as_ref().ok_or(PortalError::NotLoggedIn)
    }
}

/// Opens the database, seeds the admin account and serves commands from stdin
/// until it closes.
pub async fn run_console(settings: Settings) -> Result<()> {
    let db = Db::open(&settings.database_path)
        .with_context(|| format!("Could not open database at {}", settings.database_path.display()))?;

    if let Some(admin) = &settings.admin {
        auth::seed_admin(&db, &admin.name, &admin.email, &admin.password)?;
    }

    let gateway = match SendChampClient::new(&settings.sms) {
        Ok(client) => Some(client),
        Err(err) => {
            log::warn!("SMS notifications are disabled: {err:#}");
            None
        }
    };

    let mut console = Console::new(db, gateway, settings.session.clone());
    log::info!("Portal ready (session {}). Type `help` for commands.", settings.session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = console.handle_line(line).await;
        if response.is_empty() {
            continue;
        }

        stdout.write_all(response.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    log::info!("Input closed, shutting down.");
    Ok(())
}
