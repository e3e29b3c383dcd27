//! Behavior catalog: loads definitions from a source, validates them and
//! publishes an immutable snapshot.
//!
//! Readers always work against one `Arc<CatalogSnapshot>`; a reload builds a
//! complete new snapshot off to the side and swaps the pointer, so a lookup
//! sees either the old index or the new one, never a mix.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use familiar_anim::{AnimationDefinition, AnimationLibrary};
use familiar_api::{DefinitionDocument, DefinitionSource};
use serde::Serialize;
use tracing::{info, warn};

use crate::behavior::BehaviorDefinition;
use crate::error::DefinitionError;

// ─── Parsing seam ────────────────────────────────────────────────────────────

/// Everything one document declared. Each item succeeds or fails on its own.
#[derive(Default)]
pub struct ParsedDocument {
    pub behaviors: Vec<Result<BehaviorDefinition, DefinitionError>>,
    pub animations: Vec<Result<AnimationDefinition, DefinitionError>>,
}

/// Turns a raw document into definitions. A document-level error (syntax
/// error, script crash) discards the whole document.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, document: &DefinitionDocument) -> Result<ParsedDocument, DefinitionError>;
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RejectedDefinition {
    pub document: String,
    pub message: String,
    pub error: DefinitionError,
}

/// Outcome of one load.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub source: String,
    pub generation: u64,
    pub documents: usize,
    pub documents_failed: usize,
    pub behaviors: usize,
    pub animations: usize,
    pub rejected: Vec<RejectedDefinition>,
    /// Set when the source could not be read at all.
    pub source_error: Option<String>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.source_error.is_none()
    }

    fn reject(&mut self, document: &str, error: DefinitionError) {
        warn!("Rejected definition in {document}: {error}");
        self.rejected.push(RejectedDefinition {
            document: document.to_string(),
            message: error.to_string(),
            error,
        });
    }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// One published, immutable index of behaviors and animations.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    behaviors: HashMap<String, Arc<BehaviorDefinition>>,
    animations: Arc<AnimationLibrary>,
    report: LoadReport,
}

impl CatalogSnapshot {
    /// Case-insensitive lookup.
    pub fn find(&self, id: &str) -> Option<Arc<BehaviorDefinition>> {
        self.behaviors.get(&id.trim().to_lowercase()).cloned()
    }

    /// Identifiers as declared, sorted case-insensitively.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.behaviors.values().map(|b| b.id.clone()).collect();
        ids.sort_by_key(|id| id.to_lowercase());
        ids
    }

    pub fn animations(&self) -> &Arc<AnimationLibrary> {
        &self.animations
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn generation(&self) -> u64 {
        self.report.generation
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

pub struct BehaviorCatalog {
    source: Box<dyn DefinitionSource>,
    parser: Box<dyn DocumentParser>,
    default_id: String,
    fallback: Arc<BehaviorDefinition>,
    published: RwLock<Arc<CatalogSnapshot>>,
    /// Serializes loads; holds the last generation number.
    loads: Mutex<u64>,
}

impl BehaviorCatalog {
    /// An empty catalog. Nothing is read until [`load`](Self::load).
    pub fn new(
        source: Box<dyn DefinitionSource>,
        parser: Box<dyn DocumentParser>,
        default_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            parser,
            default_id: default_id.into(),
            fallback: Arc::new(BehaviorDefinition::fallback()),
            published: RwLock::new(Arc::new(CatalogSnapshot::default())),
            loads: Mutex::new(0),
        }
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Read every document, validate, and publish the result.
    ///
    /// Invalid documents and definitions are skipped and listed in the report.
    /// An unreadable source publishes an empty index.
    pub fn load(&self) -> LoadReport {
        let mut generation = self.loads.lock().unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        let snapshot = self.build(*generation);
        let report = snapshot.report.clone();
        info!(
            "Loaded {} behaviors and {} animations from {} documents ({} rejected, {} documents failed) [{}]",
            report.behaviors,
            report.animations,
            report.documents,
            report.rejected.len(),
            report.documents_failed,
            report.source
        );
        *self.published.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        report
    }

    /// Re-run [`load`](Self::load) and swap the published index.
    pub fn reload(&self) -> LoadReport {
        info!("Reloading behavior definitions from {}", self.source.describe());
        self.load()
    }

    /// The currently published index.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.published.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn find(&self, id: &str) -> Option<Arc<BehaviorDefinition>> {
        self.snapshot().find(id)
    }

    /// `id`, else the configured default, else the built-in inert behavior.
    pub fn resolve(&self, id: &str) -> Arc<BehaviorDefinition> {
        let snapshot = self.snapshot();
        snapshot
            .find(id)
            .or_else(|| snapshot.find(&self.default_id))
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub fn available_ids(&self) -> Vec<String> {
        self.snapshot().ids()
    }

    pub fn animations(&self) -> Arc<AnimationLibrary> {
        Arc::clone(self.snapshot().animations())
    }

    fn build(&self, generation: u64) -> CatalogSnapshot {
        let mut report = LoadReport {
            source: self.source.describe(),
            generation,
            ..LoadReport::default()
        };
        let mut behaviors: HashMap<String, Arc<BehaviorDefinition>> = HashMap::new();
        let mut animations = AnimationLibrary::new();

        let documents = match self.source.documents() {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Failed to read definitions from {}: {e}", report.source);
                report.source_error = Some(e.to_string());
                Vec::new()
            }
        };

        for document in &documents {
            report.documents += 1;
            let parsed = match self.parser.parse(document) {
                Ok(parsed) => parsed,
                Err(e) => {
                    report.documents_failed += 1;
                    report.reject(&document.name, e);
                    continue;
                }
            };

            for item in parsed.animations {
                let definition = match item.and_then(|a| a.validate().map(|_| a).map_err(DefinitionError::from)) {
                    Ok(definition) => definition,
                    Err(e) => {
                        report.reject(&document.name, e);
                        continue;
                    }
                };
                let label = format!("{} '{}'", definition.kind_label(), definition.name());
                if animations.insert(definition) {
                    warn!("{} in {} replaces an earlier definition", label, document.name);
                }
            }

            for item in parsed.behaviors {
                let mut behavior = match item.and_then(|b| b.validate().map(|_| b)) {
                    Ok(behavior) => behavior,
                    Err(e) => {
                        report.reject(&document.name, e);
                        continue;
                    }
                };
                if behavior.origin.is_none() {
                    behavior.origin = Some(document.name.clone());
                }
                let key = behavior.key();
                if behaviors.insert(key, Arc::new(behavior)).is_some() {
                    warn!("Behavior in {} replaces an earlier definition with the same id", document.name);
                }
            }
        }

        report.behaviors = behaviors.len();
        report.animations = animations.len();
        CatalogSnapshot {
            behaviors,
            animations: Arc::new(animations),
            report,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use familiar_anim::Raycast;
    use familiar_api::{MemorySource, SourceError};

    use super::*;
    use crate::behavior::{MoveDefinition, FALLBACK_BEHAVIOR_ID};

    /// Line format:
    /// `behavior <id|-> <followSpeed> <move> <cooldown>`, `raycast <name> <step>`, `broken`.
    struct LineParser;

    impl DocumentParser for LineParser {
        fn parse(&self, document: &DefinitionDocument) -> Result<ParsedDocument, DefinitionError> {
            let mut parsed = ParsedDocument::default();
            for line in document.contents.lines() {
                let parts: Vec<&str> = line.split_whitespace().collect();
                match parts.as_slice() {
                    ["behavior", id, speed, name, cooldown] => {
                        let id = if *id == "-" { "" } else { *id };
                        let mut behavior = BehaviorDefinition::new(id)
                            .with_move(MoveDefinition::new(*name, cooldown.parse().unwrap(), 5.0, |_, _| Ok(())));
                        behavior.profile.follow_speed = speed.parse().unwrap();
                        parsed.behaviors.push(Ok(behavior));
                    }
                    ["raycast", name, step] => {
                        let mut ray = Raycast::new(*name);
                        ray.step = step.parse().unwrap();
                        parsed.animations.push(Ok(AnimationDefinition::Raycast(ray)));
                    }
                    ["particle", name] => parsed.animations.push(Err(DefinitionError::UnknownParticle {
                        definition: "spark".into(),
                        name: name.to_string(),
                    })),
                    ["broken"] => return Err(DefinitionError::Script("unexpected symbol".into())),
                    _ => {}
                }
            }
            Ok(parsed)
        }
    }

    fn doc(name: &str, contents: &str) -> DefinitionDocument {
        DefinitionDocument::new(name, contents)
    }

    fn catalog_with(documents: Vec<DefinitionDocument>, default_id: &str) -> (Arc<MemorySource>, BehaviorCatalog) {
        let source = Arc::new(MemorySource::new(documents));
        let catalog = BehaviorCatalog::new(Box::new(source.clone()), Box::new(LineParser), default_id);
        (source, catalog)
    }

    #[test]
    fn load_counts_and_skips_failures() {
        let (_, catalog) = catalog_with(
            vec![
                doc("a.lua", "behavior Wisp 1.0 Strike 40\nraycast bolt 0.5"),
                doc("b.lua", "behavior imp 1.0 Jab 0\nbehavior - 1.0 Jab 5\nraycast beam 0\nparticle sparkle"),
                doc("c.lua", "behavior golem 1.0 Slam 20\nbroken"),
                doc("d.lua", "behavior sprite 1.0 Zap 10"),
            ],
            "default",
        );
        let report = catalog.load();
        assert_eq!(report.documents, 4);
        assert_eq!(report.documents_failed, 1);
        assert_eq!(report.behaviors, 2);
        assert_eq!(report.animations, 1);
        // cooldown 0, blank id, zero step, unknown particle, broken document
        assert_eq!(report.rejected.len(), 5);
        assert!(!report.is_clean());
        assert_eq!(catalog.available_ids(), vec!["sprite", "Wisp"]);
        assert!(catalog.animations().raycast("BOLT").is_some());
        assert_eq!(catalog.find("wisp").unwrap().origin.as_deref(), Some("a.lua"));
    }

    #[test]
    fn find_is_case_insensitive() {
        let (_, catalog) = catalog_with(vec![doc("a.lua", "behavior Wisp 1.0 Strike 40")], "default");
        catalog.load();
        assert!(catalog.find("WISP").is_some());
        assert!(catalog.find(" wisp ").is_some());
        assert!(catalog.find("imp").is_none());
    }

    #[test]
    fn later_documents_override_duplicates() {
        let (_, catalog) = catalog_with(
            vec![
                doc("a.lua", "behavior wisp 1.0 Strike 40"),
                doc("b.lua", "behavior WISP 2.0 Strike 40"),
            ],
            "default",
        );
        let report = catalog.load();
        assert_eq!(report.behaviors, 1);
        let wisp = catalog.find("wisp").unwrap();
        assert_eq!(wisp.profile.follow_speed, 2.0);
        assert_eq!(wisp.id, "WISP");
    }

    #[test]
    fn resolve_falls_back_in_order() {
        let (source, catalog) = catalog_with(
            vec![doc("a.lua", "behavior wisp 1.0 Strike 40\nbehavior guardian 1.0 Ward 40")],
            "guardian",
        );
        catalog.load();
        assert_eq!(catalog.resolve("wisp").id, "wisp");
        assert_eq!(catalog.resolve("missing").id, "guardian");

        source.replace(vec![doc("a.lua", "behavior wisp 1.0 Strike 40")]);
        catalog.reload();
        assert_eq!(catalog.resolve("wisp").id, "wisp");
        let fallback = catalog.resolve("missing");
        assert_eq!(fallback.id, FALLBACK_BEHAVIOR_ID);
        assert!(fallback.is_inert());
    }

    #[test]
    fn resolve_before_any_load_is_fallback() {
        let (_, catalog) = catalog_with(Vec::new(), "default");
        assert!(catalog.resolve("anything").is_inert());
        assert!(catalog.available_ids().is_empty());
        assert_eq!(catalog.snapshot().generation(), 0);
    }

    struct FailingSource;

    impl DefinitionSource for FailingSource {
        fn describe(&self) -> String {
            "nowhere".into()
        }
        fn documents(&self) -> Result<Vec<DefinitionDocument>, SourceError> {
            Err(SourceError::Unavailable("disk on fire".into()))
        }
    }

    #[test]
    fn unreadable_source_publishes_empty_index() {
        let catalog = BehaviorCatalog::new(Box::new(FailingSource), Box::new(LineParser), "default");
        let report = catalog.load();
        assert_eq!(report.documents, 0);
        assert!(report.source_error.unwrap().contains("disk on fire"));
        assert!(catalog.resolve("wisp").is_inert());
    }

    #[test]
    fn held_snapshot_survives_reload() {
        let (source, catalog) = catalog_with(vec![doc("a.lua", "behavior wisp 1.0 Strike 40")], "default");
        catalog.load();
        let before = catalog.snapshot();
        source.replace(vec![doc("a.lua", "behavior imp 1.0 Jab 40")]);
        catalog.reload();
        assert!(before.find("wisp").is_some());
        assert!(catalog.find("wisp").is_none());
        assert!(catalog.find("imp").is_some());
        assert_eq!(catalog.snapshot().generation(), before.generation() + 1);
    }

    #[test]
    fn concurrent_lookups_see_whole_snapshots() {
        let old = vec![
            doc("a.lua", "behavior wisp 1.0 Old 40\nbehavior imp 1.0 Old 40\nraycast old 0.5"),
        ];
        let new = vec![
            doc("a.lua", "behavior wisp 2.0 New 40\nbehavior imp 2.0 New 40\nraycast new 0.5"),
        ];
        let (source, catalog) = catalog_with(old.clone(), "default");
        catalog.load();
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for round in 0..200 {
                    source.replace(if round % 2 == 0 { new.clone() } else { old.clone() });
                    catalog.reload();
                }
                done.store(true, Ordering::SeqCst);
            });
            for _ in 0..3 {
                scope.spawn(|| {
                    while !done.load(Ordering::SeqCst) {
                        let snapshot = catalog.snapshot();
                        let wisp = snapshot.find("wisp").unwrap();
                        let imp = snapshot.find("imp").unwrap();
                        assert_eq!(wisp.profile.follow_speed, imp.profile.follow_speed);
                        let marker = if wisp.profile.follow_speed == 1.0 { "old" } else { "new" };
                        assert_eq!(wisp.moves[0].name.to_lowercase(), marker);
                        assert!(snapshot.animations().raycast(marker).is_some());
                        assert_eq!(catalog.resolve("wisp").moves.len(), 1);
                    }
                });
            }
        });
        assert_eq!(catalog.snapshot().generation(), 201);
    }
}
