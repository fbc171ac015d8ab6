//! Pick a LUT for a clip from its camera metadata.
//!
//! Resolution order:
//! 1. A learned mapping for the exact normalized signature, unconditionally.
//! 2. The rule catalog: every matching rule offers the candidates whose file
//!    name contains its target; the highest priority wins and ties keep the
//!    earliest rule, then the earliest candidate.

use serde::Serialize;
use tracing::debug;

use clipgrade_models::{AutoMapRule, LearnedMapping, LutDescriptor, LutId, MetadataKey};

use crate::error::LutResult;
use crate::learning::LearningStore;
use crate::rules::default_rules;

/// How a mapping was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingSource {
    Learned,
    Rule { priority: i32 },
}

/// A resolved LUT suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoMapResult {
    pub lut_id: LutId,
    pub lut_name: String,
    pub source: MappingSource,
}

/// Auto-mapper over a rule catalog and a learning store.
#[derive(Debug, Clone)]
pub struct AutoMapper {
    rules: Vec<AutoMapRule>,
    learning: LearningStore,
}

impl AutoMapper {
    /// Mapper with the built-in rules.
    pub fn new(learning: LearningStore) -> Self {
        Self::with_rules(default_rules(), learning)
    }

    pub fn with_rules(rules: Vec<AutoMapRule>, learning: LearningStore) -> Self {
        Self { rules, learning }
    }

    pub fn rules(&self) -> &[AutoMapRule] {
        &self.rules
    }

    pub fn learning(&self) -> &LearningStore {
        &self.learning
    }

    /// Resolve raw metadata strings against the available LUTs.
    pub async fn resolve(&self, gamma: &str, color_space: &str, candidates: &[LutDescriptor]) -> Option<AutoMapResult> {
        let key = MetadataKey::new(gamma, color_space);
        if key.is_empty() {
            return None;
        }

        if let Some(learned) = self.learning.lookup(&key).await {
            debug!(key = %key, lut_id = %learned.lut_id, "Auto-map hit learned mapping");
            return Some(AutoMapResult {
                lut_id: learned.lut_id,
                lut_name: learned.lut_name,
                source: MappingSource::Learned,
            });
        }

        let result = self.resolve_by_rules(&key, candidates);
        debug!(key = %key, found = result.is_some(), "Auto-map rule scan");
        result
    }

    /// Rule-catalog resolution alone, ignoring learned mappings.
    pub fn resolve_by_rules(&self, key: &MetadataKey, candidates: &[LutDescriptor]) -> Option<AutoMapResult> {
        let mut best: Option<(&AutoMapRule, &LutDescriptor)> = None;

        for rule in self.rules.iter().filter(|r| r.matches(key)) {
            let Some(candidate) = candidates.iter().find(|c| rule.accepts_file(&c.file_name)) else {
                continue;
            };
            // Strictly greater keeps the earlier rule on ties
            if best.map_or(true, |(b, _)| rule.priority > b.priority) {
                best = Some((rule, candidate));
            }
        }

        best.map(|(rule, lut)| AutoMapResult {
            lut_id: lut.id.clone(),
            lut_name: lut.name.clone(),
            source: MappingSource::Rule {
                priority: rule.priority,
            },
        })
    }

    /// Remember a user's LUT choice for a signature.
    pub async fn learn(&self, gamma: &str, color_space: &str, lut: &LutDescriptor) -> LutResult<LearnedMapping> {
        let key = MetadataKey::new(gamma, color_space);
        self.learning.learn(&key, lut.id.clone(), lut.name.clone()).await
    }

    /// Drop a learned choice so the signature falls back to the rules.
    pub async fn forget(&self, gamma: &str, color_space: &str) -> LutResult<bool> {
        self.learning.forget(&MetadataKey::new(gamma, color_space)).await
    }

    /// Record a manual assignment made on a clip.
    ///
    /// The choice becomes a learned mapping only when the signature had no
    /// default yet: no learned mapping and no rule result. Returns the new
    /// mapping when one was stored.
    pub async fn record_manual_choice(
        &self,
        gamma: &str,
        color_space: &str,
        chosen: &LutDescriptor,
        candidates: &[LutDescriptor],
    ) -> LutResult<Option<LearnedMapping>> {
        let key = MetadataKey::new(gamma, color_space);
        if key.is_empty() || self.resolve(gamma, color_space, candidates).await.is_some() {
            return Ok(None);
        }
        let mapping = self
            .learning
            .learn(&key, chosen.id.clone(), chosen.name.clone())
            .await?;
        Ok(Some(mapping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use clipgrade_models::LutSource;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn lut(id: &str, file_name: &str) -> LutDescriptor {
        LutDescriptor {
            id: LutId::from_string(id),
            name: file_name.trim_end_matches(".cube").to_string(),
            file_name: file_name.to_string(),
            path: PathBuf::from(format!("/luts/{}", file_name)),
            source: LutSource::Bundled,
        }
    }

    fn catalog() -> Vec<LutDescriptor> {
        vec![
            lut("slog3", "SLog3SGamut3ToLC-709.cube"),
            lut("cine", "SLog3SGamut3.CineToLC-709.cube"),
            lut("vlog", "VLog_to_V709.cube"),
        ]
    }

    async fn mapper(rules: Vec<AutoMapRule>) -> AutoMapper {
        let store = Arc::new(MemoryStore::<LearnedMapping>::new());
        AutoMapper::with_rules(rules, LearningStore::load(store).await.unwrap())
    }

    #[tokio::test]
    async fn test_slog3_cine_resolves_by_rule() {
        let mapper = mapper(default_rules()).await;
        let result = mapper.resolve("S-Log3", "S-Gamut3.Cine", &catalog()).await.unwrap();
        assert_eq!(result.lut_id, LutId::from_string("cine"));
        assert_eq!(result.source, MappingSource::Rule { priority: 100 });
    }

    #[tokio::test]
    async fn test_spelling_variants_resolve_identically() {
        let mapper = mapper(default_rules()).await;
        let a = mapper.resolve("S-Log3", "S-Gamut3", &catalog()).await;
        let b = mapper.resolve("SLOG3", "s-gamut3", &catalog()).await;
        assert_eq!(a, b);
        assert_eq!(a.unwrap().lut_id, LutId::from_string("slog3"));
    }

    #[tokio::test]
    async fn test_learned_mapping_wins_then_forget_reverts() {
        let mapper = mapper(default_rules()).await;
        let vlog = lut("vlog", "VLog_to_V709.cube");

        mapper.learn("S-Log3", "S-Gamut3.Cine", &vlog).await.unwrap();
        let learned = mapper.resolve("s-log3", "sgamut3.cine", &catalog()).await.unwrap();
        assert_eq!(learned.lut_id, LutId::from_string("vlog"));
        assert_eq!(learned.source, MappingSource::Learned);

        assert!(mapper.forget("S-Log3", "S-Gamut3.Cine").await.unwrap());
        let reverted = mapper.resolve("S-Log3", "S-Gamut3.Cine", &catalog()).await.unwrap();
        assert_eq!(reverted.lut_id, LutId::from_string("cine"));
    }

    #[tokio::test]
    async fn test_ties_keep_catalog_order() {
        let rules = vec![
            AutoMapRule::new("slog3", "", "cine", 50),
            AutoMapRule::new("slog3", "", "sgamut3", 50),
        ];
        let mapper = mapper(rules).await;
        let result = mapper.resolve("S-Log3", "", &catalog()).await.unwrap();
        assert_eq!(result.lut_id, LutId::from_string("cine"));
    }

    #[tokio::test]
    async fn test_rule_without_candidate_is_skipped() {
        let rules = vec![
            AutoMapRule::new("slog3", "", "missinglut", 100),
            AutoMapRule::new("slog3", "", "slog3", 10),
        ];
        let mapper = mapper(rules).await;
        let result = mapper.resolve("S-Log3", "S-Gamut3", &catalog()).await.unwrap();
        assert_eq!(result.source, MappingSource::Rule { priority: 10 });
    }

    #[tokio::test]
    async fn test_no_match() {
        let mapper = mapper(default_rules()).await;
        assert!(mapper.resolve("Rec709", "Rec709", &catalog()).await.is_none());
        assert!(mapper.resolve("", "", &catalog()).await.is_none());
    }

    #[tokio::test]
    async fn test_manual_choice_learns_only_without_default() {
        let mapper = mapper(default_rules()).await;
        let vlog = lut("vlog", "VLog_to_V709.cube");

        // Rule default exists: nothing learned
        let stored = mapper
            .record_manual_choice("S-Log3", "S-Gamut3.Cine", &vlog, &catalog())
            .await
            .unwrap();
        assert!(stored.is_none());

        // No default for this signature: choice is learned
        let stored = mapper
            .record_manual_choice("Cine-D", "Rec709", &vlog, &catalog())
            .await
            .unwrap();
        assert!(stored.is_some());
        let result = mapper.resolve("cined", "rec 709", &catalog()).await.unwrap();
        assert_eq!(result.source, MappingSource::Learned);
    }
}
