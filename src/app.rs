use crate::config::Config;
use crate::export;
use crate::pipeline::Pipeline;
use crate::services::manager::ServiceManager;
use crate::services::renewal::RenewalService;
use crate::services::signals::{handle_shutdown_signals, shutdown_signal};
use crate::services::web::WebService;
use crate::session::{RenewalLoop, SessionStore};
use crate::state::AppState;
use anyhow::{Context, anyhow};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Arc<Config>,
    pipeline: Arc<Pipeline>,
    app_state: AppState,
    service_manager: ServiceManager,
}

impl App {
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let config = Arc::new(config);
        let store = SessionStore::new(config.identity_capacity);
        let pipeline =
            Arc::new(Pipeline::new(&config, store).context("Failed to create pipeline")?);

        info!(
            portal = %config.portal_subdomain,
            guardian = config.guardian,
            calendar_source = ?config.calendar_source,
            timezone = %config.timezone,
            identity_capacity = config.identity_capacity,
            "pipeline configured"
        );

        let app_state = AppState::new(config.clone(), pipeline.clone());
        let service_manager = ServiceManager::new(app_state.service_statuses.clone());
        Ok(App {
            config,
            pipeline,
            app_state,
            service_manager,
        })
    }

    /// Register the web server and the session renewal loop.
    pub fn setup_services(&mut self) {
        self.service_manager.register_service(Box::new(WebService::new(
            self.config.port,
            self.app_state.clone(),
        )));

        let renewal = RenewalLoop::new(
            self.pipeline.store().clone(),
            self.pipeline.clone(),
            self.config.renewal_interval,
        );
        self.service_manager
            .register_service(Box::new(RenewalService::new(renewal)));
    }

    pub fn start_services(&mut self) {
        self.service_manager.spawn_all();
    }

    /// Run the application and handle shutdown signals
    pub async fn run(self) -> ExitCode {
        if !self.service_manager.has_services() {
            warn!("no services registered");
            return ExitCode::FAILURE;
        }
        handle_shutdown_signals(self.service_manager, self.config.shutdown_timeout).await
    }

    fn default_credentials(&self) -> anyhow::Result<(String, String)> {
        self.config
            .default_credentials()
            .ok_or_else(|| anyhow!("PS_USERNAME and PS_PASSWORD must be set"))
    }

    /// Export today's schedule, optionally repeating until Ctrl-C.
    pub async fn export(&self, output: Option<PathBuf>, every: Option<String>) -> anyhow::Result<()> {
        let (username, password) = self.default_credentials()?;
        let output = output.unwrap_or_else(|| self.config.schedule_output_path.clone());
        let every = every
            .map(|raw| crate::config::parse_duration(&raw).map_err(|e| anyhow!(e)))
            .transpose()?;

        let cancel = CancellationToken::new();
        let signal = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                shutdown_signal().await;
                cancel.cancel();
            }
        });

        let result = export::run_export(
            &self.pipeline,
            (&username, &password),
            &output,
            every,
            cancel,
        )
        .await;
        signal.abort();
        result
    }

    pub async fn show(&self) -> anyhow::Result<()> {
        let (username, password) = self.default_credentials()?;
        export::show(&self.pipeline, &username, &password).await
    }
}
