//! Backend server: hosts a [`ConfigBackend`] on a Unix socket

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use super::{BackendRequest, BackendResponse, is_disconnect};
use crate::backend::ConfigBackend;

/// Server listener; removes its socket file when dropped
pub struct BackendServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl BackendServer {
    /// Create server and bind to specific socket path.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create socket directory: {}", parent.display())
            })?;
        }

        if socket_path.exists() {
            std::fs::remove_file(&socket_path).with_context(|| {
                format!("Failed to remove stale socket: {}", socket_path.display())
            })?;
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind socket at {}", socket_path.display()))?;

        // Owner only
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                .context("Failed to set socket permissions")?;
        }

        Ok(Self {
            listener,
            socket_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept clients until `shutdown` resolves, one task per connection
    pub async fn serve(
        self,
        backend: Arc<dyn ConfigBackend>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        info!(socket = %self.socket_path.display(), "Backend server listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Backend server shutting down");
                    break;
                }
                accepted = self.listener.accept() => {
                    let (stream, _addr) = accepted.context("Failed to accept IPC connection")?;
                    let backend = backend.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, backend).await {
                            warn!(error = ?e, "IPC connection failed");
                        }
                    });
                }
            }
        }
        Ok(())
    }
}

impl Drop for BackendServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn handle_connection(mut stream: UnixStream, backend: Arc<dyn ConfigBackend>) -> Result<()> {
    debug!("Client connected");
    loop {
        let request: BackendRequest = match super::read_message(&mut stream).await {
            Ok(request) => request,
            Err(e) if is_disconnect(&e) => {
                debug!("Client disconnected");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        debug!(?request, "Received backend request");
        let response = dispatch(backend.as_ref(), request).await;
        super::write_message(&mut stream, &response).await?;
    }
}

/// Run one request against the backend and wrap the outcome for the wire
pub async fn dispatch(backend: &dyn ConfigBackend, request: BackendRequest) -> BackendResponse {
    let result = match request {
        BackendRequest::ListProfiles => backend.list_profiles().await.map(BackendResponse::listing),
        BackendRequest::CreateProfile { name, source } => backend
            .create_profile(&name, &source)
            .await
            .map(|()| BackendResponse::ok()),
        BackendRequest::DeleteProfile { name } => backend
            .delete_profile(&name)
            .await
            .map(|()| BackendResponse::ok()),
        BackendRequest::RenameProfile { old_name, new_name } => backend
            .rename_profile(&old_name, &new_name)
            .await
            .map(|()| BackendResponse::ok()),
        BackendRequest::SetCurrentProfile { name } => backend
            .set_current_profile(&name)
            .await
            .map(|()| BackendResponse::ok()),
        BackendRequest::UpdateProfileConfig { name, config } => backend
            .update_profile_config(&name, &config)
            .await
            .map(|()| BackendResponse::ok()),
        BackendRequest::GetProfileConfig { name } => backend
            .get_profile_config(&name)
            .await
            .map(BackendResponse::config),
        BackendRequest::Ping => Ok(BackendResponse::ok()),
    };

    result.unwrap_or_else(|e| {
        debug!(error = %e, "Backend request failed");
        BackendResponse::failure(&e)
    })
}
