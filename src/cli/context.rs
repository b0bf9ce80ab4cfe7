//! State shared by every command: configuration, the subprocess layer and
//! the interrupt flag

use crate::app::{AppConfig, InterruptFlag};
use crate::config::PilotConfig;
use crate::consolidate::OutputConsolidator;
use crate::generators::{GeneratorContext, GeneratorPipeline};
use crate::grid::GridClient;
use crate::notify::Notifications;
use crate::subprocess::SubprocessManager;
use crate::template::{TemplateManifest, TemplateSet};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub struct CommandContext {
    pub app: AppConfig,
    pub config: PilotConfig,
    pub subprocess: SubprocessManager,
    pub interrupt: InterruptFlag,
    pub email: bool,
    pub ntfy: bool,
}

impl CommandContext {
    pub fn new(
        app: AppConfig,
        config: PilotConfig,
        subprocess: SubprocessManager,
        interrupt: InterruptFlag,
    ) -> Self {
        Self {
            app,
            config,
            subprocess,
            interrupt,
            email: false,
            ntfy: false,
        }
    }

    pub fn with_notifications(mut self, email: bool, ntfy: bool) -> Self {
        self.email = email;
        self.ntfy = ntfy;
        self
    }

    pub fn run_dir(&self) -> &Path {
        &self.app.run_dir
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.config.paths.resolve(path)
    }

    /// Grid client running from the run directory
    pub fn grid(&self) -> Result<GridClient> {
        Ok(
            GridClient::new(self.subprocess.clone(), self.config.grid.clone())?
                .with_working_dir(Some(self.app.run_dir.clone())),
        )
    }

    pub fn pipeline(&self) -> Result<GeneratorPipeline> {
        let context = GeneratorContext::from_config(&self.config)?;
        Ok(GeneratorPipeline::from_names(&self.config.generators, &context)?)
    }

    /// Templates from the manifest, live copies going to the run directory
    pub fn templates(&self) -> Result<TemplateSet> {
        let paths = &self.config.paths;
        let manifest_path = self.resolve(&paths.template_manifest);
        let manifest = TemplateManifest::load(&manifest_path)
            .with_context(|| format!("Failed to load template manifest {}", manifest_path.display()))?;
        Ok(manifest.bind(&self.resolve(&paths.template_dir), &self.app.run_dir)?)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.resolve(&self.config.paths.archive_dir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.resolve(&self.config.paths.cache_dir)
    }

    pub fn consolidator(&self) -> OutputConsolidator {
        OutputConsolidator::new(self.subprocess.clone(), &self.config, self.interrupt.clone())
    }

    pub fn notifications(&self) -> Notifications {
        Notifications::from_config(&self.config.notify, &self.subprocess, self.email, self.ntfy)
    }

    /// Broadcast to the channels enabled on the command line
    pub async fn notify(&self, subject: &str, body: &str) {
        if !self.email && !self.ntfy {
            return;
        }
        let notifications = self.notifications();
        if !notifications.is_empty() {
            notifications.broadcast(subject, body).await;
        }
    }
}
