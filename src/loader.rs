use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ApiGateway, FetchPayload, UPLOAD_PATH};
use crate::app::{AppCommand, FetchTicket, PlannedFetch};
use crate::error::{ActionError, FetchError};
use crate::model::{FetchRequest, PodAction};

/// Fetches issued as soon as the session gate is unlocked. Members are independent.
pub const STARTUP_BATCH: [FetchRequest; 4] = [
    FetchRequest::ClusterInfo,
    FetchRequest::Namespaces,
    FetchRequest::Nodes,
    FetchRequest::PersistentVolumes,
];

/// Result of a spawned network call, delivered back to the event loop.
#[derive(Debug)]
pub enum Completion {
    Fetch {
        ticket: FetchTicket,
        result: Result<FetchPayload, FetchError>,
    },
    Action {
        action: PodAction,
        result: Result<(), ActionError>,
    },
    Upload {
        result: Result<bool, FetchError>,
    },
}

/// Runs [`AppCommand`]s as detached tasks. Nothing here touches application state.
#[derive(Clone)]
pub struct Dispatcher {
    gateway: ApiGateway,
    tx: mpsc::UnboundedSender<Completion>,
}

impl Dispatcher {
    pub fn new(gateway: ApiGateway, tx: mpsc::UnboundedSender<Completion>) -> Self {
        Self { gateway, tx }
    }

    pub fn execute(&self, command: AppCommand) {
        match command {
            AppCommand::None => {}
            AppCommand::Fetch(batch) => {
                for planned in batch {
                    self.spawn_fetch(planned);
                }
            }
            AppCommand::RunAction(action) => self.spawn_action(action),
            AppCommand::Upload { path } => self.spawn_upload(path),
        }
    }

    fn spawn_fetch(&self, planned: PlannedFetch) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let PlannedFetch { ticket, request } = planned;
            debug!("fetch {} v{}", request.path(), ticket.version);
            let result = gateway.fetch(&request).await;
            send(&tx, Completion::Fetch { ticket, result });
        });
    }

    fn spawn_action(&self, action: PodAction) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = gateway.run_action(&action).await;
            send(&tx, Completion::Action { action, result });
        });
    }

    fn spawn_upload(&self, path: PathBuf) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    let file_name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "kubeconfig".to_string());
                    gateway.upload_credentials(file_name, bytes).await
                }
                Err(error) => Err(FetchError::Transport {
                    path: UPLOAD_PATH.to_string(),
                    reason: format!("failed to read {}: {error}", path.display()),
                }),
            };
            send(&tx, Completion::Upload { result });
        });
    }
}

fn send(tx: &mpsc::UnboundedSender<Completion>, completion: Completion) {
    if tx.send(completion).is_err() {
        warn!("event loop closed before completion was delivered");
    }
}
