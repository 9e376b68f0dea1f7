use std::collections::{HashMap, HashSet};

use tracelens_core::error::{Result, TracelensError};
use tracelens_core::ids::ComponentId;
use tracelens_core::model::component::{Edge, NamedRelation};
use tracelens_core::query::BatchReport;
use tracelens_core::repo::{ComponentRegistry, EdgeStore};

/// Full-replace loader for the dependency relations reported by an
/// external collector.
#[derive(Clone)]
pub struct DependencyLoader<S> {
    store: S,
}

impl<S> DependencyLoader<S>
where
    S: ComponentRegistry + EdgeStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Replaces every edge and database tag of `project_id` with the
    /// resolvable part of this batch. Relations naming an unknown component
    /// are skipped and counted.
    pub fn load_batch(
        &self,
        project_id: &str,
        relations: &[NamedRelation],
        databases: &[String],
    ) -> Result<BatchReport> {
        if project_id.trim().is_empty() {
            return Err(TracelensError::InvalidArgument(
                "project id must not be empty".to_string(),
            ));
        }

        let mut ids: HashMap<&str, Option<ComponentId>> = HashMap::new();
        let mut edges = Vec::with_capacity(relations.len());
        let mut skipped = 0;

        for relation in relations {
            let from = self.lookup(&mut ids, project_id, &relation.from_name);
            let to = self.lookup(&mut ids, project_id, &relation.to_name);
            match (from, to) {
                (Some(from), Some(to)) => edges.push(Edge { from, to }),
                _ => {
                    tracing::debug!(
                        project_id,
                        from = %relation.from_name,
                        to = %relation.to_name,
                        "skipping unresolved dependency relation"
                    );
                    skipped += 1;
                }
            }
        }

        let databases = normalize_databases(databases);
        self.store.replace_graph(project_id, &edges, &databases)?;

        let report = BatchReport {
            inserted: edges.len(),
            skipped,
            databases: databases.len(),
        };
        tracing::info!(
            project_id,
            inserted = report.inserted,
            skipped = report.skipped,
            databases = report.databases,
            "dependency batch loaded"
        );
        Ok(report)
    }

    fn lookup<'a>(
        &self,
        cache: &mut HashMap<&'a str, Option<ComponentId>>,
        project_id: &str,
        name: &'a str,
    ) -> Option<ComponentId> {
        *cache.entry(name).or_insert_with(|| {
            match self.store.find_by_name(project_id, name.trim()) {
                Ok(found) => found.map(|c| c.id),
                Err(e) => {
                    tracing::warn!(project_id, name, error = ?e, "component name lookup failed");
                    None
                }
            }
        })
    }
}

/// Trimmed, non-blank, first occurrence wins.
fn normalize_databases(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .filter(|d| seen.insert(d.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use tracelens_core::model::component::{Layer, NewComponent};
    use tracelens_store::Store;

    use super::*;

    fn rel(from: &str, to: &str) -> NamedRelation {
        NamedRelation {
            from_name: from.into(),
            to_name: to.into(),
        }
    }

    fn seeded() -> (Store, HashMap<String, ComponentId>) {
        let store = Store::open_in_memory().unwrap();
        let registered = store
            .register_components(
                &["A", "B", "C", "D"]
                    .iter()
                    .map(|name| NewComponent {
                        project_id: "p1".into(),
                        name: name.to_string(),
                        package_name: "com.acme".into(),
                        layer: Layer::Service,
                    })
                    .collect::<Vec<_>>(),
            )
            .unwrap();
        let ids = registered.into_iter().map(|c| (c.name, c.id)).collect();
        (store, ids)
    }

    #[test]
    fn second_batch_replaces_first() {
        let (store, ids) = seeded();
        let loader = DependencyLoader::new(store.clone());

        loader.load_batch("p1", &[rel("A", "B")], &[]).unwrap();
        loader.load_batch("p1", &[rel("C", "D")], &[]).unwrap();

        assert_eq!(
            store.project_edges("p1").unwrap(),
            vec![Edge {
                from: ids["C"],
                to: ids["D"]
            }]
        );
    }

    #[test]
    fn loading_twice_is_idempotent() {
        let (store, _) = seeded();
        let loader = DependencyLoader::new(store.clone());
        let batch = [rel("A", "B"), rel("B", "C")];
        let dbs = ["postgres".to_string()];

        let first = loader.load_batch("p1", &batch, &dbs).unwrap();
        let state = store.project_edges("p1").unwrap();
        let second = loader.load_batch("p1", &batch, &dbs).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.project_edges("p1").unwrap(), state);
        assert_eq!(store.project_databases("p1").unwrap(), vec!["postgres".to_string()]);
    }

    #[test]
    fn unresolvable_relations_are_counted_not_fatal() {
        let (store, _) = seeded();
        let loader = DependencyLoader::new(store.clone());

        let report = loader
            .load_batch("p1", &[rel("A", "B"), rel("A", "Ghost"), rel("Nobody", "C")], &[])
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(store.project_edges("p1").unwrap().len(), 1);
    }

    #[test]
    fn databases_are_trimmed_and_deduplicated() {
        let (store, _) = seeded();
        let loader = DependencyLoader::new(store.clone());
        let dbs = ["redis", " postgres ", "redis", "", "postgres"].map(String::from);

        let report = loader.load_batch("p1", &[], &dbs).unwrap();

        assert_eq!(report.databases, 2);
        assert_eq!(
            store.project_databases("p1").unwrap(),
            vec!["postgres".to_string(), "redis".to_string()]
        );
    }

    #[test]
    fn blank_project_is_rejected() {
        let (store, _) = seeded();
        let loader = DependencyLoader::new(store);
        assert!(matches!(
            loader.load_batch(" ", &[], &[]),
            Err(TracelensError::InvalidArgument(_))
        ));
    }
}
