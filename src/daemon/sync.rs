use crate::core::config::{DaemonConfig, SubscriptionConfig};
use crate::core::error::SyncError;
use crate::daemon::profile::{subscription_text, ClientProfile};
use crate::daemon::restart::{RestartQueue, Restarter};
use crate::daemon::schema::{Client, ConfigDocument, Inbound};
use crate::models::user::User;
use crate::stores::user_store::UserStore;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// Keeps the daemon's config file in step with the user store.
///
/// The file is always rebuilt from the template plus the full list of
/// non-banned users; it is never patched in place. A rendered document is
/// re-parsed before anything on disk is touched, so a bad template leaves the
/// live config as it was.
pub struct ConfigSynchronizer {
    users: Arc<UserStore>,
    config_path: PathBuf,
    template_path: PathBuf,
    backup_path: PathBuf,
    inbound_tag: Option<String>,
    subscription: SubscriptionConfig,
    restarter: Restarter,
    queue: RestartQueue,
    lock: Mutex<()>,
}

impl ConfigSynchronizer {
    /// Must be called inside a tokio runtime; the restart worker is spawned here.
    pub fn new(
        users: Arc<UserStore>,
        daemon: &DaemonConfig,
        subscription: &SubscriptionConfig,
    ) -> Self {
        let restarter = Restarter::new(daemon.restart_command.clone());
        let queue = RestartQueue::spawn(
            restarter.clone(),
            daemon.restart_delay(),
            daemon.restart_queue,
        );

        Self {
            users,
            config_path: daemon.config_path.clone(),
            template_path: daemon.template_path.clone(),
            backup_path: daemon.backup_path(),
            inbound_tag: daemon.inbound_tag.clone(),
            subscription: subscription.clone(),
            restarter,
            queue,
            lock: Mutex::new(()),
        }
    }

    /// Rebuild the daemon config from the template and the active users.
    /// Returns the number of clients written.
    pub fn regenerate(&self) -> Result<usize, SyncError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let template = fs::read(&self.template_path).map_err(|source| SyncError::Template {
            path: self.template_path.display().to_string(),
            source,
        })?;

        let mut document = ConfigDocument::parse(&template)?;

        let clients: Vec<Client> = self
            .users
            .active()
            .iter()
            .map(|user| Client::for_user(user))
            .collect();
        let count = clients.len();

        if !document.set_clients(self.inbound_tag.as_deref(), clients) {
            return Err(SyncError::InboundNotFound);
        }

        let rendered = document.to_pretty_bytes()?;

        // Validate what is about to be written, not what we think we wrote
        let written = ConfigDocument::parse(&rendered)?;
        let inbound = written
            .managed_inbound(self.inbound_tag.as_deref())
            .ok_or(SyncError::InboundNotFound)?;

        self.install(&rendered)?;

        info!(
            clients = count,
            path = %self.config_path.display(),
            "Daemon config regenerated"
        );

        self.write_subscription(inbound);

        Ok(count)
    }

    fn install(&self, rendered: &[u8]) -> Result<(), SyncError> {
        install_config(&self.config_path, &self.backup_path, |path| {
            fs::write(path, rendered)
        })
    }

    fn write_subscription(&self, inbound: &Inbound) {
        let text = subscription_text(inbound, &self.subscription.host, self.subscription.port);

        if let Err(e) = fs::write(&self.subscription.path, text) {
            warn!(
                error = %e,
                path = %self.subscription.path.display(),
                "Failed to write subscription file"
            );
        }
    }

    /// Restart the daemon now and wait for the process manager to answer
    pub async fn restart(&self) -> Result<(), SyncError> {
        self.restarter.restart().await
    }

    /// Queue a restart for the background worker. Returns `false` if the
    /// request was dropped.
    pub fn schedule_restart(&self) -> bool {
        self.queue.schedule()
    }

    /// Regenerate and, on success, queue a restart so the daemon picks it up
    pub fn apply(&self) -> Result<usize, SyncError> {
        let count = self.regenerate()?;
        self.schedule_restart();
        Ok(count)
    }

    /// Connection details for `user`, taken from the live config file
    pub fn client_profile(&self, user: &User) -> Result<ClientProfile, SyncError> {
        let bytes = fs::read(&self.config_path)?;
        let document = ConfigDocument::parse(&bytes)?;

        let inbound = document
            .managed_inbound(self.inbound_tag.as_deref())
            .ok_or(SyncError::InboundNotFound)?;

        let client = inbound
            .clients()
            .iter()
            .find(|client| client.id == user.uuid)
            .cloned()
            .ok_or_else(|| SyncError::ClientNotFound(user.uuid.clone()))?;

        ClientProfile::new(inbound, client, &self.subscription.host, self.subscription.port)
            .ok_or_else(|| SyncError::Profile("managed inbound has no port".to_string()))
    }

    /// Contents of the shared subscription file
    pub fn subscription(&self) -> Result<String, SyncError> {
        Ok(fs::read_to_string(&self.subscription.path)?)
    }
}

/// Move the previous config aside and let `write` put the new one at
/// `config_path`, moving the backup back if the write fails
fn install_config<W>(config_path: &Path, backup_path: &Path, write: W) -> Result<(), SyncError>
where
    W: FnOnce(&Path) -> io::Result<()>,
{
    let backed_up = match fs::rename(config_path, backup_path) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %config_path.display(), "No previous daemon config to back up");
            false
        }
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = write(config_path) {
        error!(error = %e, path = %config_path.display(), "Failed to write daemon config");

        if backed_up {
            if let Err(restore) = fs::rename(backup_path, config_path) {
                error!(error = %restore, "Failed to restore daemon config from backup");
            }
        } else if let Err(cleanup) = fs::remove_file(config_path) {
            if cleanup.kind() != ErrorKind::NotFound {
                warn!(error = %cleanup, "Failed to remove partial daemon config");
            }
        }

        return Err(e.into());
    }

    Ok(())
}
