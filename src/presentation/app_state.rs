// Application state for HTTP handlers
use crate::application::alert_sink::AlertSink;
use crate::application::ingest::ReadingIngest;
use crate::application::notification::{AlertHistory, NotificationCenter};
use crate::application::report_service::ReportService;
use crate::application::vat_config::VatConfigService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub alert_history: AlertHistory,
    pub alert_sink: Arc<AlertSink>,
    pub vat_config: VatConfigService,
    pub report_service: ReportService,
    pub ingest: Arc<ReadingIngest>,
    pub notifications: NotificationCenter,
}
