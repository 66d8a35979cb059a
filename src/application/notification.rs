// Notification surface - transient notices and alert history
use crate::application::error::ServiceResult;
use crate::application::monitor_repository::MonitorRepository;
use crate::domain::alert::{Alert, AlertView};
use crate::domain::vat::UNKNOWN_VAT_NAME;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeVariant {
    Default,
    Destructive,
}

/// A toast-style message for the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub variant: NoticeVariant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn new(title: impl Into<String>, description: impl Into<String>, variant: NoticeVariant) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant,
            alert: None,
            at: Utc::now(),
        }
    }
}

/// Fan-out of notices to every live subscriber. Publishing with no subscribers is not an error.
#[derive(Clone)]
pub struct NotificationCenter {
    tx: broadcast::Sender<Notice>,
}

impl NotificationCenter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn publish(&self, notice: Notice) {
        match notice.variant {
            NoticeVariant::Destructive => {
                tracing::warn!(title = %notice.title, "{}", notice.description)
            }
            NoticeVariant::Default => {
                tracing::info!(title = %notice.title, "{}", notice.description)
            }
        }
        let _ = self.tx.send(notice);
    }

    pub fn alert_created(&self, alert: &Alert) {
        let mut notice = Notice::new("Nueva alerta", alert.mensaje.clone(), NoticeVariant::Destructive);
        notice.alert = Some(alert.clone());
        self.publish(notice);
    }

    pub fn error(&self, description: impl Into<String>) {
        self.publish(Notice::new("Error", description, NoticeVariant::Destructive));
    }

    pub fn info(&self, title: impl Into<String>, description: impl Into<String>) {
        self.publish(Notice::new(title, description, NoticeVariant::Default));
    }
}

/// Reverse-chronological alert history with vat names resolved
#[derive(Clone)]
pub struct AlertHistory {
    repository: Arc<dyn MonitorRepository>,
    notifications: NotificationCenter,
    page_size: usize,
}

impl AlertHistory {
    pub fn new(
        repository: Arc<dyn MonitorRepository>,
        notifications: NotificationCenter,
        page_size: usize,
    ) -> Self {
        Self {
            repository,
            notifications,
            page_size,
        }
    }

    pub async fn list(&self, limit: Option<usize>) -> ServiceResult<Vec<AlertView>> {
        let limit = limit.unwrap_or(self.page_size);

        let rows = match self.repository.list_alerts(limit).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("Error fetching alerts: {:#}", e);
                self.notifications.error("No se pudieron cargar las alertas.");
                return Err(e.into());
            }
        };

        let mut views: Vec<AlertView> = rows
            .into_iter()
            .map(|row| {
                let tina_nombre = row.tina_nombre.unwrap_or_else(|| {
                    tracing::debug!(
                        "Alert {} references unknown vat {}",
                        row.alert.id,
                        row.alert.tina_id
                    );
                    UNKNOWN_VAT_NAME.to_string()
                });
                AlertView {
                    alert: row.alert,
                    tina_nombre,
                }
            })
            .collect();

        // The backend orders already; keep the contract even if an adapter does not
        views.sort_by(|a, b| b.alert.created_at.cmp(&a.alert.created_at));
        views.truncate(limit);
        Ok(views)
    }
}
