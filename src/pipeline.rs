use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::corpus::{Corpus, GraphExtractor};
use crate::layout::{LayoutConfig, settle, settle_pinned};
use crate::model::GraphData;
use crate::publish::PublishedGraph;
use crate::stability::{PivotSet, PositionStore, StabilityStats, stabilize, write_atomically};

#[derive(Clone, Debug)]
pub struct BuildOptions {
    pub store: PathBuf,
    pub pivots: PathBuf,
    pub out: PathBuf,
    pub link_prefix: String,
    pub drift_warn: f64,
}

#[derive(Clone, Debug)]
pub struct RelayoutOptions {
    pub build: BuildOptions,
    pub iterations: Option<usize>,
    pub layout: LayoutConfig,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BuildReport {
    pub nodes: usize,
    pub edges: usize,
    pub stats: StabilityStats,
}

fn extractor(link_prefix: &str) -> Result<GraphExtractor> {
    GraphExtractor::new(link_prefix).with_context(|| format!("invalid link prefix {link_prefix:?}"))
}

fn extract_graph(corpus: &dyn Corpus, link_prefix: &str) -> Result<GraphData> {
    let loaded = corpus.load()?;
    Ok(extractor(link_prefix)?.extract(&loaded.documents))
}

fn warn_on_drift(stats: &StabilityStats, threshold: f64) {
    if stats.avg_movement > threshold {
        warn!(
            avg_movement = stats.avg_movement,
            threshold, "layout drift above threshold"
        );
    }
}

/// corpus → extract → stabilize → publish. The store is written last so a failure anywhere
/// earlier leaves the previous store untouched.
pub fn run_build(corpus: &dyn Corpus, options: &BuildOptions) -> Result<BuildReport> {
    let graph = extract_graph(corpus, &options.link_prefix)?;
    let store = PositionStore::load(&options.store);
    let pivots = PivotSet::load(&options.pivots)?;
    debug!(pivots = pivots.len(), stored = store.len(), "build inputs loaded");

    let stabilized = stabilize(&graph.nodes, &store, &pivots);
    warn_on_drift(&stabilized.stats, options.drift_warn);

    let report = BuildReport {
        nodes: stabilized.nodes.len(),
        edges: graph.edges.len(),
        stats: stabilized.stats,
    };
    PublishedGraph::new(stabilized.nodes, graph.edges, stabilized.stats)?.write(&options.out)?;
    stabilized.store.save(&options.store)?;

    info!(
        nodes = report.nodes,
        edges = report.edges,
        pivots_locked = report.stats.pivots_locked,
        new_nodes = report.stats.new_nodes,
        avg_movement = report.stats.avg_movement,
        "build finished"
    );
    Ok(report)
}

pub fn run_relayout(corpus: &dyn Corpus, options: &RelayoutOptions) -> Result<BuildReport> {
    let build = &options.build;
    let graph = extract_graph(corpus, &build.link_prefix)?;
    let store = PositionStore::load(&build.store);
    let pivots = PivotSet::load(&build.pivots)?;

    let iterations = options.iterations.unwrap_or(options.layout.iterations);
    let stabilized = stabilize(&graph.nodes, &store, &pivots);
    let held = pivots
        .iter()
        .filter(|id| store.get(id).is_some())
        .map(str::to_string)
        .collect::<HashSet<_>>();

    let relaxed = settle_pinned(
        &stabilized.nodes,
        &graph.edges,
        &options.layout.centered_on_origin(),
        iterations,
        &held,
    )?;

    let mut updated = stabilized.store;
    let mut total_movement = 0.0;
    let mut moved = 0usize;
    let nodes = relaxed
        .into_iter()
        .zip(&stabilized.nodes)
        .map(|(mut node, before)| {
            node.vx = None;
            node.vy = None;
            if !held.contains(&node.id)
                && let (Some(after), Some(start)) = (node.position(), before.position())
            {
                total_movement += after.distance(start);
                moved += 1;
                updated.insert(node.id.clone(), after);
            }
            node
        })
        .collect::<Vec<_>>();

    let stats = StabilityStats {
        avg_movement: total_movement / moved.max(1) as f64,
        ..stabilized.stats
    };
    warn_on_drift(&stats, build.drift_warn);

    let report = BuildReport {
        nodes: nodes.len(),
        edges: graph.edges.len(),
        stats,
    };
    PublishedGraph::new(nodes, graph.edges, stats)?.write(&build.out)?;
    updated.save(&build.store)?;

    info!(
        nodes = report.nodes,
        held = held.len(),
        iterations,
        avg_movement = stats.avg_movement,
        "relayout finished"
    );
    Ok(report)
}

/// Drops stored positions for ids that left the corpus. Pivot entries always stay.
///
/// Refuses to run while any document is unreadable or the corpus yields no nodes, since
/// the ids of those documents would be pruned and later reseeded elsewhere.
pub fn run_prune(
    corpus: &dyn Corpus,
    store_path: &Path,
    pivots_path: &Path,
    link_prefix: &str,
) -> Result<usize> {
    let loaded = corpus.load()?;
    let extraction = extractor(link_prefix)?.extract_reporting(&loaded.documents);
    let skipped = loaded.unreadable + extraction.skipped;
    if skipped > 0 {
        bail!("{skipped} document(s) could not be read; fix them before pruning the position store");
    }
    let graph = extraction.graph;
    if graph.nodes.is_empty() {
        bail!("the corpus produced no nodes; refusing to prune every stored position");
    }

    let pivots = PivotSet::load(pivots_path)?;
    let live = graph
        .nodes
        .iter()
        .map(|node| node.id.as_str())
        .collect::<HashSet<_>>();

    let mut store = PositionStore::load(store_path);
    if store.is_empty() {
        info!(path = %store_path.display(), "position store is empty, nothing to prune");
        return Ok(0);
    }
    let before = store.len();
    store.retain(|id| live.contains(id) || pivots.contains(id));
    let removed = before - store.len();
    store.save(store_path)?;

    info!(removed, kept = store.len(), "position store pruned");
    Ok(removed)
}

pub fn run_extract(
    corpus: &dyn Corpus,
    out: &Path,
    link_prefix: &str,
    layout: Option<&LayoutConfig>,
) -> Result<GraphData> {
    let mut graph = extract_graph(corpus, link_prefix)?;
    if let Some(layout) = layout {
        graph.nodes = settle(&graph.nodes, &graph.edges, layout, layout.iterations)?;
        for node in &mut graph.nodes {
            node.vx = None;
            node.vy = None;
        }
    }
    let json = serde_json::to_string_pretty(&graph).context("failed to serialize graph")?;
    write_atomically(out, json.as_bytes())
        .with_context(|| format!("failed to write graph to {}", out.display()))?;
    info!(
        path = %out.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "graph extracted"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::corpus::{DEFAULT_LINK_PREFIX, DirectoryCorpus, Document, LoadedCorpus};
    use crate::model::Position;
    use crate::publish::read_graph_document;

    struct Fixed(Vec<Document>);

    impl Corpus for Fixed {
        fn load(&self) -> Result<LoadedCorpus> {
            Ok(LoadedCorpus {
                documents: self.0.clone(),
                unreadable: 0,
            })
        }
    }

    fn options(dir: &Path) -> BuildOptions {
        BuildOptions {
            store: dir.join("positions.json"),
            pivots: dir.join("pivots.json"),
            out: dir.join("graph.json"),
            link_prefix: DEFAULT_LINK_PREFIX.to_string(),
            drift_warn: 25.0,
        }
    }

    fn chain() -> Fixed {
        Fixed(vec![
            Document::new("a", Some("Alpha"), "[[b]]"),
            Document::new("b", Some("Beta"), "[[c]]"),
            Document::new("c", Some("Gamma"), ""),
        ])
    }

    #[test]
    fn second_build_on_unchanged_corpus_is_stable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = options(dir.path());

        let first = run_build(&chain(), &options).expect("first build");
        assert_eq!(first.stats.new_nodes, 3);
        let store_after_first = fs::read_to_string(&options.store).expect("store written");

        let second = run_build(&chain(), &options).expect("second build");
        assert_eq!(second.stats.new_nodes, 0);
        assert_eq!(second.stats.avg_movement, 0.0);
        assert_eq!(
            fs::read_to_string(&options.store).expect("store written"),
            store_after_first
        );

        let published = read_graph_document(&options.out).expect("published");
        assert!(!published.needs_layout());
        assert_eq!(published.graph.edge_count(), 2);
    }

    #[test]
    fn relayout_holds_pivots_and_moves_the_rest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = options(dir.path());
        fs::write(&options.pivots, r#"{ "pivots": ["b"] }"#).expect("pivots");
        run_build(&chain(), &options).expect("build");

        let stored_b = PositionStore::load(&options.store).get("b");
        let stored_a = PositionStore::load(&options.store).get("a");

        let report = run_relayout(
            &chain(),
            &RelayoutOptions {
                build: options.clone(),
                iterations: Some(100),
                layout: LayoutConfig::default(),
            },
        )
        .expect("relayout");

        let store = PositionStore::load(&options.store);
        assert_eq!(store.get("b"), stored_b);
        assert_ne!(store.get("a"), stored_a);
        assert_eq!(report.stats.pivots_locked, 1);
        assert!(report.stats.avg_movement > 0.0);
    }

    #[test]
    fn relayout_takes_its_iteration_count_from_the_layout_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = options(dir.path());
        run_build(&chain(), &options).expect("build");
        let config_path = dir.path().join("layout.json");
        fs::write(&config_path, r#"{ "iterations": 0 }"#).expect("layout config");

        let idle = run_relayout(
            &chain(),
            &RelayoutOptions {
                build: options.clone(),
                iterations: None,
                layout: LayoutConfig::load(&config_path).expect("loads"),
            },
        )
        .expect("relayout");
        assert!(idle.stats.avg_movement < 1e-3);

        let busy = run_relayout(
            &chain(),
            &RelayoutOptions {
                build: options.clone(),
                iterations: Some(50),
                layout: LayoutConfig::default(),
            },
        )
        .expect("relayout");
        assert!(busy.stats.avg_movement > 1.0);
    }

    #[test]
    fn prune_removes_departed_ids_but_keeps_pivots() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = options(dir.path());
        fs::write(&options.pivots, r#"{ "pivots": ["retired-landmark"] }"#).expect("pivots");

        let mut store = PositionStore::default();
        store.insert("a", Position::new(0.0, 0.0));
        store.insert("gone", Position::new(1.0, 1.0));
        store.insert("retired-landmark", Position::new(2.0, 2.0));
        store.save(&options.store).expect("save");

        let removed = run_prune(&chain(), &options.store, &options.pivots, DEFAULT_LINK_PREFIX)
            .expect("prune");

        let store = PositionStore::load(&options.store);
        assert_eq!(removed, 1);
        assert!(store.get("gone").is_none());
        assert!(store.get("retired-landmark").is_some());
        assert!(store.get("a").is_some());
    }

    #[test]
    fn prune_refuses_to_run_on_a_broken_or_empty_corpus() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = options(dir.path());
        let mut store = PositionStore::default();
        store.insert("a", Position::new(0.0, 0.0));
        store.insert("b", Position::new(5.0, 5.0));
        store.save(&options.store).expect("save");
        let saved = fs::read_to_string(&options.store).expect("store written");

        let broken = Fixed(vec![
            Document::new("a", None, "[[c]]"),
            Document::new("b", None, "half a marker [[c"),
        ]);
        assert!(run_prune(&broken, &options.store, &options.pivots, DEFAULT_LINK_PREFIX).is_err());

        let empty = Fixed(Vec::new());
        assert!(run_prune(&empty, &options.store, &options.pivots, DEFAULT_LINK_PREFIX).is_err());

        let corpus_dir = dir.path().join("billets");
        fs::create_dir_all(&corpus_dir).expect("corpus dir");
        fs::write(corpus_dir.join("a.md"), "---\ntitle: [\n---\n").expect("write");
        fs::write(corpus_dir.join("b.md"), "fine").expect("write");
        let unreadable = DirectoryCorpus::new(&corpus_dir);
        assert!(
            run_prune(&unreadable, &options.store, &options.pivots, DEFAULT_LINK_PREFIX).is_err()
        );

        assert_eq!(fs::read_to_string(&options.store).expect("store kept"), saved);
    }

    #[test]
    fn directory_corpus_feeds_extract() {
        let dir = tempfile::tempdir().expect("tempdir");
        let corpus_dir = dir.path().join("billets");
        fs::create_dir_all(&corpus_dir).expect("corpus dir");
        fs::write(
            corpus_dir.join("one.md"),
            "---\ntitle: One\ntags: [feu]\n---\nSee [two](/billets/two).",
        )
        .expect("write");
        fs::write(corpus_dir.join("two.md"), "Back to [[one]].").expect("write");

        let out = dir.path().join("adhoc.json");
        let graph = run_extract(
            &DirectoryCorpus::new(&corpus_dir),
            &out,
            DEFAULT_LINK_PREFIX,
            None,
        )
        .expect("extract");

        assert_eq!(graph.node_count(), 3);
        let loaded = read_graph_document(&out).expect("readable");
        assert!(loaded.needs_layout());
        assert_eq!(loaded.graph.edges, graph.edges);
        assert_eq!(loaded.graph.node_count(), graph.node_count());
    }

    #[test]
    fn settled_extract_opens_without_a_live_layout_and_leaves_the_store_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = options(dir.path());
        let out = dir.path().join("settled.json");

        let graph = run_extract(
            &chain(),
            &out,
            DEFAULT_LINK_PREFIX,
            Some(&LayoutConfig::default()),
        )
        .expect("extract");

        assert!(graph.nodes.iter().all(|node| node.position().is_some()));
        assert!(graph.nodes.iter().all(|node| node.vx.is_none()));
        assert!(!read_graph_document(&out).expect("readable").needs_layout());
        assert!(!options.store.exists());
    }

    #[test]
    fn malformed_pivot_file_fails_the_build() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = options(dir.path());
        fs::write(&options.pivots, "{ pivots: nope").expect("pivots");

        assert!(run_build(&chain(), &options).is_err());
        assert!(!options.store.exists());
    }
}
