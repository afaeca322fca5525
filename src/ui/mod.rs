use iced::{
    widget::{button, column, progress_bar, row, text, text_input, Space},
    Element, Length,
};

use crate::domain::ProgressSnapshot;
use crate::utils::{format_kbps, format_mb};

/// Main view state
pub struct DownloadView {
    pub url: String,
    pub status_message: String,
    pub is_downloading: bool,
    pub progress: Option<ProgressSnapshot>,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            url: String::new(),
            status_message: "Enter a URL to download".to_string(),
            is_downloading: false,
            progress: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    DownloadPressed,
    StopPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.url = url;
            }
            DownloadMessage::DownloadPressed | DownloadMessage::StopPressed => {
                // Handled by the app
            }
        }
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let percentage = self.progress.and_then(|s| s.percentage);

        let percentage_label = percentage
            .map(|p| format!("{:.2}%", p))
            .unwrap_or_default();

        let downloaded_label = self
            .progress
            .map(|s| format!("Downloaded: {}", format_mb(s.bytes_downloaded)))
            .unwrap_or_default();

        let bandwidth_label = self
            .progress
            .and_then(|s| s.bandwidth_bps)
            .map(|b| format!("Bandwidth: {}", format_kbps(b)))
            .unwrap_or_default();

        column![
            text("Download Manager").size(32),
            Space::new().height(Length::Fixed(20.0)),
            text("URL:").size(16),
            text_input("https://...", &self.url)
                .on_input(DownloadMessage::UrlChanged)
                .padding(10),
            Space::new().height(Length::Fixed(10.0)),
            row![
                button("Download")
                    .on_press_maybe(
                        (!self.is_downloading).then_some(DownloadMessage::DownloadPressed)
                    )
                    .padding([10, 20]),
                button("Stop")
                    .on_press_maybe(self.is_downloading.then_some(DownloadMessage::StopPressed))
                    .padding([10, 20]),
            ]
            .spacing(10),
            Space::new().height(Length::Fixed(10.0)),
            progress_bar(0.0..=100.0, percentage.unwrap_or(0.0) as f32),
            text(percentage_label).size(14),
            text(downloaded_label).size(14),
            text(bandwidth_label).size(14),
            Space::new().height(Length::Fixed(10.0)),
            text(&self.status_message).size(14),
        ]
        .padding(20)
        .spacing(10)
        .into()
    }
}
