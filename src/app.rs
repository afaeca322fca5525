use std::path::{Path, PathBuf};

use iced::Task;
use tokio::sync::mpsc;

use crate::config::SshConfig;
use crate::domain::{TerminalStatus, TransferRequest};
use crate::transfer::{StopOutcome, TransferController, TransferEvent};
use crate::ui::{DownloadMessage, DownloadView};

pub struct DownloadApp {
    view: DownloadView,
    controller: TransferController,
    // Reserved for the auxiliary SSH transport; the download core
    // never touches it.
    #[allow(dead_code)]
    ssh_config: SshConfig,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadApp {
    pub fn new() -> Self {
        Self {
            view: DownloadView::default(),
            controller: TransferController::new(),
            ssh_config: crate::config::load(Path::new("config.json")),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Ui(DownloadMessage),
    /// (Chosen directory, download URL)
    DestinationChosen(Option<PathBuf>, String),
    TransferStarted,
    StartRejected(String),
    Transfer(TransferEvent),
    StopFinished(StopOutcome),
}

/// Internal state for the transfer event stream
enum ShellTransfer {
    Start {
        controller: TransferController,
        request: TransferRequest,
    },
    Receiving(mpsc::UnboundedReceiver<TransferEvent>),
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::Ui(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::DownloadPressed => {
                    if app.view.url.is_empty() || app.view.is_downloading {
                        return Task::none();
                    }

                    if crate::utils::filename_from_url(&app.view.url).is_none() {
                        app.view.status_message = "Invalid download URL".to_string();
                        return Task::none();
                    }

                    // Single-shot: keep the Download affordance disabled from
                    // the moment the chooser opens, not just once the
                    // transfer is accepted.
                    app.view.is_downloading = true;
                    app.view.status_message = "Choose a destination folder...".to_string();
                    let url = app.view.url.clone();

                    // Step 1: let the user pick the destination directory,
                    // anchored at the desktop like a fresh install expects
                    return Task::perform(
                        async move {
                            let mut dialog = rfd::AsyncFileDialog::new();
                            if let Some(desktop) =
                                dirs::desktop_dir().or_else(dirs::home_dir)
                            {
                                dialog = dialog.set_directory(desktop);
                            }
                            let dir = dialog
                                .pick_folder()
                                .await
                                .map(|handle| handle.path().to_path_buf());
                            (dir, url)
                        },
                        |(dir, url)| Message::DestinationChosen(dir, url),
                    );
                }
                DownloadMessage::StopPressed => {
                    let controller = app.controller.clone();
                    return Task::perform(
                        async move { controller.stop().await },
                        Message::StopFinished,
                    );
                }
                DownloadMessage::UrlChanged(_) => {}
            }
        }
        Message::DestinationChosen(dir_opt, url) => {
            match dir_opt {
                Some(dir) => {
                    // Filename comes from the URL's final path segment
                    let Some(filename) = crate::utils::filename_from_url(&url) else {
                        app.view.status_message = "Invalid download URL".to_string();
                        return Task::none();
                    };

                    let request = TransferRequest {
                        url,
                        destination: dir.join(filename),
                    };
                    app.view.status_message =
                        format!("Downloading to: {}", request.destination.display());

                    // Step 2: start the transfer and forward its events
                    // onto the update loop
                    return Task::stream(futures::stream::unfold(
                        ShellTransfer::Start {
                            controller: app.controller.clone(),
                            request,
                        },
                        |state| async move {
                            match state {
                                ShellTransfer::Start {
                                    controller,
                                    request,
                                } => match controller.start(request).await {
                                    Ok(rx) => Some((
                                        Message::TransferStarted,
                                        ShellTransfer::Receiving(rx),
                                    )),
                                    Err(e) => Some((
                                        Message::StartRejected(e.to_string()),
                                        ShellTransfer::Receiving(
                                            // Empty channel: the stream ends
                                            // on the next poll.
                                            mpsc::unbounded_channel().1,
                                        ),
                                    )),
                                },
                                ShellTransfer::Receiving(mut rx) => rx
                                    .recv()
                                    .await
                                    .map(|event| {
                                        (Message::Transfer(event), ShellTransfer::Receiving(rx))
                                    }),
                            }
                        },
                    ));
                }
                None => {
                    // User dismissed the folder chooser
                    app.view.is_downloading = false;
                    app.view.status_message = "Download cancelled".to_string();
                }
            }
        }
        Message::TransferStarted => {
            app.view.is_downloading = true;
            app.view.progress = None;
        }
        Message::StartRejected(reason) => {
            app.view.is_downloading = false;
            app.view.status_message = reason;
        }
        Message::Transfer(TransferEvent::Progress(snapshot)) => {
            app.view.progress = Some(snapshot);
        }
        Message::Transfer(TransferEvent::Finished(status)) => {
            app.view.is_downloading = false;
            app.view.status_message = match status {
                TerminalStatus::Completed => "Download has completed.".to_string(),
                TerminalStatus::Cancelled => "Download has been stopped.".to_string(),
                TerminalStatus::Failed(e) => format!("Failed to download file: {}", e),
            };
        }
        Message::StopFinished(outcome) => {
            if outcome == StopOutcome::NotRunning {
                app.view.status_message = "No active download to stop.".to_string();
            }
        }
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::Ui)
}
