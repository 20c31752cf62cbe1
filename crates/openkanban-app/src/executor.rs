use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use openkanban_agent::StatusDetector;
use openkanban_core::{ProjectRegistry, TicketStore};
use openkanban_ui::{Command, Event};
use openkanban_vcs::WorktreeManager;

/// Runs commands off the update loop. Each command resolves to at most one
/// event posted back to the queue; pane lifecycle notifications arrive
/// separately through the pane event sink.
pub struct CommandExecutor {
    event_tx: mpsc::Sender<Event>,
    detector: Arc<StatusDetector>,
    store: TicketStore,
    projects_path: PathBuf,
    pane_sink: openkanban_runtime::PaneEventSink,
}

impl CommandExecutor {
    pub fn new(
        event_tx: mpsc::Sender<Event>,
        detector: Arc<StatusDetector>,
        store: TicketStore,
        projects_path: PathBuf,
    ) -> Self {
        let sink_tx = event_tx.clone();
        let pane_sink: openkanban_runtime::PaneEventSink = Arc::new(move |pane_event| {
            // Called from pane worker threads; blocks them, never the loop.
            let _ = sink_tx.blocking_send(Event::Pane(pane_event));
        });
        Self {
            event_tx,
            detector,
            store,
            projects_path,
            pane_sink,
        }
    }

    pub fn spawn(&self, command: Command) {
        match command {
            Command::Tick { kind, delay } => {
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = event_tx.send(Event::Tick(kind)).await;
                });
            }
            Command::CreateWorktree {
                ticket,
                repo_path,
                branch,
            } => {
                let event_tx = self.event_tx.clone();
                tokio::task::spawn_blocking(move || {
                    let manager = WorktreeManager::new(repo_path);
                    let result = manager.default_branch().and_then(|base_branch| {
                        manager
                            .create_worktree(&branch, &base_branch)
                            .map(|path| (path, base_branch))
                    });
                    let event = match result {
                        Ok((path, base_branch)) => Event::WorktreeCreated {
                            ticket,
                            path,
                            branch,
                            base_branch,
                        },
                        Err(error) => Event::SpawnFailed {
                            ticket,
                            error: error.to_string(),
                        },
                    };
                    let _ = event_tx.blocking_send(event);
                });
            }
            Command::StartAgent {
                ticket,
                session,
                workdir,
                command,
                cols,
                rows,
            } => {
                let event_tx = self.event_tx.clone();
                let sink = Arc::clone(&self.pane_sink);
                tokio::task::spawn_blocking(move || {
                    let mut pane = openkanban_runtime::Pane::new(session, cols, rows, workdir);
                    let event = match pane.start(
                        &command.program,
                        &command.args,
                        &command.environment,
                        sink,
                    ) {
                        Ok(()) => Event::SpawnComplete {
                            ticket,
                            pane: Box::new(pane),
                        },
                        Err(error) => Event::SpawnFailed {
                            ticket,
                            error: error.to_string(),
                        },
                    };
                    let _ = event_tx.blocking_send(event);
                });
            }
            Command::ClosePane {
                mut pane,
                session,
                final_status,
                cleanup_status_files,
            } => {
                tokio::task::spawn_blocking(move || {
                    pane.close();
                    if let Some(status) = final_status {
                        if let Err(error) = openkanban_agent::write_status_file(&session, status) {
                            debug!(%error, "final status write skipped");
                        }
                    }
                    if cleanup_status_files {
                        openkanban_agent::cleanup_status_files(&session);
                    }
                });
            }
            Command::RemoveWorktree {
                repo_path,
                worktree_path,
            } => {
                tokio::task::spawn_blocking(move || {
                    WorktreeManager::new(repo_path).remove_worktree(&worktree_path);
                });
            }
            Command::SaveTickets { project, tickets } => {
                let event_tx = self.event_tx.clone();
                let store = self.store.clone();
                tokio::task::spawn_blocking(move || {
                    if let Err(error) = store.save(&project, &tickets) {
                        warn!(%error, "ticket save failed");
                        let _ = event_tx.blocking_send(Event::Notification(format!(
                            "Save failed: {error}"
                        )));
                    }
                });
            }
            Command::SaveProjects { projects } => {
                let event_tx = self.event_tx.clone();
                let path = self.projects_path.clone();
                tokio::task::spawn_blocking(move || {
                    if let Err(error) = ProjectRegistry::new(projects).save(&path) {
                        warn!(%error, "project registry save failed");
                        let _ = event_tx.blocking_send(Event::Notification(format!(
                            "Save failed: {error}"
                        )));
                    }
                });
            }
            Command::ClassifyStatuses { inputs } => {
                let event_tx = self.event_tx.clone();
                let detector = Arc::clone(&self.detector);
                tokio::task::spawn_blocking(move || {
                    let statuses: Vec<_> = inputs
                        .into_iter()
                        .map(|input| {
                            let status = detector.detect(
                                &input.session,
                                &input.screen_text,
                                input.running,
                            );
                            (input.ticket, status)
                        })
                        .collect();
                    let _ = event_tx.blocking_send(Event::StatusesClassified(statuses));
                });
            }
            Command::WriteStatusFile { session, status } => {
                tokio::task::spawn_blocking(move || {
                    if let Err(error) = openkanban_agent::write_status_file(&session, status) {
                        debug!(%error, "status side-channel write skipped");
                    }
                });
            }
        }
    }
}
