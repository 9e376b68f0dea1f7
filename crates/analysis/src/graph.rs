use std::collections::{BTreeSet, HashSet};

use tracelens_core::ids::ComponentId;
use tracelens_core::model::component::Edge;
use tracelens_core::model::flow::DependencyGraph;
use tracelens_core::repo::EdgeStore;

/// Restricts the project's dependency graph to edges with both endpoints
/// in `ids`. Store failures degrade to an empty graph.
pub fn subgraph<E>(store: &E, ids: &BTreeSet<ComponentId>, project_id: &str) -> DependencyGraph
where
    E: EdgeStore + ?Sized,
{
    if ids.is_empty() {
        return DependencyGraph::default();
    }

    let id_list = ids.iter().copied().collect::<Vec<_>>();
    let stored = match store.edges_within(project_id, &id_list) {
        Ok(edges) => edges,
        Err(e) => {
            tracing::warn!(project_id, components = ids.len(), error = ?e, "dependency edge lookup failed");
            return DependencyGraph::default();
        }
    };

    let mut seen = HashSet::new();
    let edges = stored
        .into_iter()
        .filter(|e| ids.contains(&e.from) && ids.contains(&e.to))
        .map(|e| Edge {
            from: e.from,
            to: e.to,
        })
        .filter(|e| seen.insert(*e))
        .collect();

    DependencyGraph { edges }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracelens_core::error::{Result, TracelensError};
    use tracelens_core::model::component::DependencyEdge;
    use tracelens_store::Store;

    use super::*;

    fn edge(from: i64, to: i64) -> Edge {
        Edge {
            from: ComponentId(from),
            to: ComponentId(to),
        }
    }

    fn ids(raw: &[i64]) -> BTreeSet<ComponentId> {
        raw.iter().copied().map(ComponentId).collect()
    }

    #[derive(Default)]
    struct SpyEdges {
        calls: AtomicUsize,
        fail: bool,
        edges: Vec<Edge>,
    }

    impl EdgeStore for SpyEdges {
        fn edges_within(&self, project_id: &str, _: &[ComponentId]) -> Result<Vec<DependencyEdge>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TracelensError::Store("edge store offline".into()));
            }
            // Ignores the id filter.
            Ok(self
                .edges
                .iter()
                .map(|e| DependencyEdge {
                    project_id: project_id.into(),
                    from: e.from,
                    to: e.to,
                })
                .collect())
        }

        fn replace_graph(&self, _: &str, _: &[Edge], _: &[String]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn empty_id_set_skips_the_store() {
        let spy = SpyEdges::default();
        let graph = subgraph(&spy, &BTreeSet::new(), "p1");
        assert!(graph.edges.is_empty());
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn store_failure_yields_empty_graph() {
        let spy = SpyEdges {
            fail: true,
            ..SpyEdges::default()
        };
        let graph = subgraph(&spy, &ids(&[1, 2]), "p1");
        assert!(graph.edges.is_empty());
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn edges_are_contained_and_deduplicated() {
        let spy = SpyEdges {
            edges: vec![edge(1, 2), edge(2, 3), edge(1, 2), edge(3, 9), edge(2, 3)],
            ..SpyEdges::default()
        };
        let graph = subgraph(&spy, &ids(&[1, 2, 3]), "p1");
        assert_eq!(graph.edges, vec![edge(1, 2), edge(2, 3)]);
    }

    #[test]
    fn subset_graph_is_contained_in_full_graph() {
        let store = Store::open_in_memory().unwrap();
        store
            .replace_graph("p1", &[edge(1, 2), edge(2, 3), edge(3, 1), edge(2, 3), edge(4, 1)], &[])
            .unwrap();

        let full = subgraph(&store, &ids(&[1, 2, 3, 4]), "p1");
        assert_eq!(full.edges.len(), 4);

        let subset = ids(&[1, 2]);
        let partial = subgraph(&store, &subset, "p1");
        assert_eq!(partial.edges, vec![edge(1, 2)]);
        for e in &partial.edges {
            assert!(subset.contains(&e.from) && subset.contains(&e.to));
            assert!(full.edges.contains(e));
        }
    }
}
