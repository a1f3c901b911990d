//! Compiling include trees into ordered fetch steps.
//!
//! The plan is built and fully validated before any I/O: every include node
//! is resolved against the [`Registry`], so an unknown or ambiguous include
//! fails with zero storage round-trips.
//!
//! Steps are ordered by depth (root's direct includes first). Within one
//! depth they keep the depth-first order of the include tree, and each step
//! records its parent step, so the include tree's shape is preserved even
//! though the list is flat.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::ResolverConfig;
use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::schema::EntityType;

use super::include::IncludeSpec;
use super::registry::Registry;
use super::spec::Association;

/// Index of a step within its plan.
pub type StepId = usize;

/// One compiled unit of work: fetch one association for every instance of
/// the parent step (or of the root result set).
#[derive(Debug, Clone)]
pub struct PlannedStep {
    /// Position in [`IncludePlan::steps`].
    pub id: StepId,
    /// Parent step; `None` when the step hangs off the root.
    pub parent: Option<StepId>,
    /// Depth in the include tree, starting at 1.
    pub depth: usize,
    /// Resolved association.
    pub association: Arc<Association>,
    /// Filter on the target rows (already without the key predicate).
    pub filter: Filter,
    /// Drop parents for which nothing matched.
    pub required: bool,
    /// Dotted slot path from the root (e.g., `user.group`).
    pub path: String,
}

impl PlannedStep {
    /// Slot written on parent instances.
    pub fn slot(&self) -> &str {
        &self.association.name
    }
}

/// An ordered, validated list of fetch steps.
#[derive(Debug, Clone)]
pub struct IncludePlan {
    root: Arc<EntityType>,
    steps: Vec<PlannedStep>,
}

impl IncludePlan {
    /// Validate `includes` against `registry` and compile them.
    pub fn build(
        registry: &Registry,
        root: &str,
        includes: &[IncludeSpec],
        config: &ResolverConfig,
    ) -> QueryResult<Self> {
        let root = registry.type_of(root)?.clone();
        let mut steps = Vec::new();
        Self::visit(registry, &root, includes, None, 1, "", config, &mut steps)?;

        // Stable sort by depth keeps depth-first order within a level and
        // keeps every parent ahead of its children.
        let mut order: Vec<StepId> = (0..steps.len()).collect();
        order.sort_by_key(|&i| steps[i].depth);
        let mut remap = vec![0; steps.len()];
        for (new, &old) in order.iter().enumerate() {
            remap[old] = new;
        }

        let mut slots: Vec<Option<PlannedStep>> = steps.into_iter().map(Some).collect();
        let steps = order
            .iter()
            .enumerate()
            .filter_map(|(new, &old)| {
                slots[old].take().map(|mut step| {
                    step.id = new;
                    step.parent = step.parent.map(|p| remap[p]);
                    step
                })
            })
            .collect();

        Ok(Self { root, steps })
    }

    #[allow(clippy::too_many_arguments)]
    fn visit(
        registry: &Registry,
        source: &Arc<EntityType>,
        specs: &[IncludeSpec],
        parent: Option<StepId>,
        depth: usize,
        prefix: &str,
        config: &ResolverConfig,
        out: &mut Vec<PlannedStep>,
    ) -> QueryResult<()> {
        let mut seen = HashSet::new();

        for spec in specs {
            let label = spec.label();
            let path = if prefix.is_empty() {
                label.clone()
            } else {
                format!("{}.{}", prefix, label)
            };

            if depth > config.max_include_depth {
                return Err(QueryError::invalid_include(format!(
                    "Include {} is {} levels deep; the limit is {}",
                    path, depth, config.max_include_depth
                ))
                .with_help("Raise max_include_depth or flatten the include tree"));
            }

            let target = spec.target().map_err(|e| e.with_model(source.name()))?;
            let association = registry
                .resolve(source.name(), &target)
                .map_err(|e| e.with_context(format!("planning include {}", path)))?
                .clone();

            if let (Some(_), Some(model)) = (&spec.alias, &spec.model) {
                if association.target_name() != model {
                    return Err(QueryError::invalid_include(format!(
                        "Include {} on {} targets {}, not {}",
                        association.name,
                        source.name(),
                        association.target_name(),
                        model
                    ))
                    .with_model(source.name())
                    .with_association(association.name.as_str()));
                }
            }

            if !seen.insert(association.name.clone()) {
                return Err(QueryError::invalid_include(format!(
                    "{} is included twice on {}",
                    association.name,
                    source.name()
                ))
                .with_model(source.name())
                .with_association(association.name.as_str())
                .with_suggestion("Merge the nested includes into a single include node"));
            }

            let id = out.len();
            let path = if prefix.is_empty() {
                association.name.clone()
            } else {
                format!("{}.{}", prefix, association.name)
            };
            out.push(PlannedStep {
                id,
                parent,
                depth,
                association: association.clone(),
                filter: spec.filter.clone().unwrap_or_default(),
                required: spec.required,
                path: path.clone(),
            });

            Self::visit(
                registry,
                &association.target,
                &spec.nested,
                Some(id),
                depth + 1,
                &path,
                config,
                out,
            )?;
        }
        Ok(())
    }

    /// Root entity type.
    pub fn root(&self) -> &Arc<EntityType> {
        &self.root
    }

    /// All steps, depth-ordered.
    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }

    /// Look up a step.
    pub fn step(&self, id: StepId) -> Option<&PlannedStep> {
        self.steps.get(id)
    }

    /// Steps grouped by depth, shallowest first.
    pub fn levels(&self) -> impl Iterator<Item = &[PlannedStep]> {
        self.steps.chunk_by(|a, b| a.depth == b.depth)
    }

    /// Direct children of a step (or of the root for `None`).
    pub fn children(&self, parent: Option<StepId>) -> impl Iterator<Item = &PlannedStep> {
        self.steps.iter().filter(move |s| s.parent == parent)
    }

    /// Depth of the deepest step; zero for an empty plan.
    pub fn depth(&self) -> usize {
        self.steps.last().map(|s| s.depth).unwrap_or(0)
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Upper bound on include round-trips: one per step, two per
    /// many-to-many step. Steps whose parent set turns out empty issue none.
    pub fn max_round_trips(&self) -> usize {
        self.steps
            .iter()
            .map(|s| s.association.kind.round_trips())
            .sum()
    }
}
