//! Shared services for one process.
//!
//! The LUT registry and the learning store are opened once and handed to
//! every consumer by handle.

use std::sync::Arc;

use tracing::info;

use clipgrade_luts::{load_rules, AutoMapper, JsonFileStore, LearningStore, LutRegistry};
use clipgrade_models::LearnedMapping;

use crate::backend::{FfmpegBackend, MediaBackend};
use crate::batch::{BatchRunner, ClipStore};
use crate::config::ExportConfig;
use crate::error::ExportResult;
use crate::executor::ExportExecutor;

/// Process-wide services built from an [`ExportConfig`].
#[derive(Clone)]
pub struct AppContext {
    pub config: ExportConfig,
    pub registry: LutRegistry,
    pub learning: LearningStore,
    pub automapper: AutoMapper,
}

impl AppContext {
    /// Open the registry, learning store and auto-mapper.
    pub async fn open(config: ExportConfig) -> ExportResult<Self> {
        let registry = LutRegistry::open(config.bundled_lut_dir.clone(), config.user_lut_dir.clone()).await?;

        let mappings: JsonFileStore<LearnedMapping> = JsonFileStore::new(config.learned_mappings_file());
        let learning = LearningStore::load(Arc::new(mappings)).await?;

        let automapper = match &config.automap_rules {
            Some(path) => AutoMapper::with_rules(load_rules(path).await?, learning.clone()),
            None => AutoMapper::new(learning.clone()),
        };

        info!(
            user_luts = %config.user_lut_dir.display(),
            rules = automapper.rules().len(),
            "Services ready"
        );

        Ok(Self {
            config,
            registry,
            learning,
            automapper,
        })
    }

    /// Executor on the FFmpeg backend.
    pub fn executor(&self) -> ExportExecutor {
        let backend: Arc<dyn MediaBackend> = Arc::new(FfmpegBackend::new(self.config.export_timeout));
        self.executor_with(backend)
    }

    pub fn executor_with(&self, backend: Arc<dyn MediaBackend>) -> ExportExecutor {
        ExportExecutor::new(backend, self.registry.clone(), self.config.clone())
    }

    /// Batch runner with auto-mapping enabled.
    pub fn batch_runner(&self, executor: ExportExecutor, store: Arc<dyn ClipStore>) -> BatchRunner {
        BatchRunner::new(executor, store).with_automapper(self.automapper.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipgrade_models::MetadataKey;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> ExportConfig {
        ExportConfig {
            data_dir: dir.path().join("data"),
            user_lut_dir: dir.path().join("data/luts"),
            work_dir: dir.path().join("work"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_open_empty_installation() {
        let dir = TempDir::new().unwrap();
        let ctx = AppContext::open(config(&dir)).await.unwrap();
        assert!(ctx.registry.list().await.is_empty());
        assert!(ctx.learning.all().await.is_empty());
        assert!(!ctx.automapper.rules().is_empty());
    }

    #[tokio::test]
    async fn test_learned_mappings_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let ctx = AppContext::open(config(&dir)).await.unwrap();
        let key = MetadataKey::new("S-Log3", "S-Gamut3.Cine");
        ctx.learning
            .learn(&key, clipgrade_models::LutId::from_string("look"), "Look")
            .await
            .unwrap();

        let reopened = AppContext::open(config(&dir)).await.unwrap();
        let mapping = reopened.learning.lookup(&key).await.unwrap();
        assert_eq!(mapping.lut_name, "Look");
    }

    #[tokio::test]
    async fn test_rules_file_replaces_builtin_rules() {
        let dir = TempDir::new().unwrap();
        let rules = dir.path().join("rules.json");
        tokio::fs::write(
            &rules,
            r#"[{"gamma": "vlog", "colorSpace": "", "target": "vlog", "priority": 10}]"#,
        )
        .await
        .unwrap();

        let ctx = AppContext::open(ExportConfig {
            automap_rules: Some(rules),
            ..config(&dir)
        })
        .await
        .unwrap();
        assert_eq!(ctx.automapper.rules().len(), 1);
    }
}
