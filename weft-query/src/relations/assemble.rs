//! Stitching fetched rows into an owned instance graph.
//!
//! The assembler keeps one arena level per plan step. [`GraphAssembler::attach`]
//! turns a step's fetched rows into instances and records, for every parent
//! instance, the indices of its matching children. Attaching runs top-down in
//! plan order, so a step's parents are always real instances of an already
//! attached step.
//!
//! [`GraphAssembler::finish`] then materializes the tree bottom-up: each
//! child is moved into its last parent and cloned into any earlier ones, so
//! no instance is ever shared between two parents.

use std::collections::HashMap;

use tracing::warn;

use crate::config::SingleMatchPolicy;
use crate::error::{QueryError, QueryResult};
use crate::instance::{Instance, Slot};
use crate::value::{Key, Row, Value};

use super::loader::Fetched;
use super::plan::{IncludePlan, PlannedStep, StepId};
use super::spec::AssociationKind;

/// Lifecycle of a step during one resolution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepState {
    /// Not fetched yet.
    #[default]
    Planned,
    /// Rows fetched, not yet linked to parents.
    Fetched,
    /// Linked to every parent instance.
    Attached,
}

#[derive(Debug, Default)]
struct Level {
    instances: Vec<Instance>,
    /// Child indices per parent instance, in slot order.
    edges: Vec<Vec<usize>>,
    pruned: Vec<bool>,
    state: StepState,
}

impl Level {
    fn with_instances(instances: Vec<Instance>, state: StepState) -> Self {
        Self {
            pruned: vec![false; instances.len()],
            instances,
            edges: Vec::new(),
            state,
        }
    }
}

/// Builds the result graph of one resolution run.
#[derive(Debug)]
pub struct GraphAssembler<'p> {
    plan: &'p IncludePlan,
    policy: SingleMatchPolicy,
    root: Level,
    levels: Vec<Level>,
}

impl<'p> GraphAssembler<'p> {
    /// Start assembling from the root rows.
    pub fn new(plan: &'p IncludePlan, root_rows: Vec<Row>, policy: SingleMatchPolicy) -> Self {
        let root = plan.root();
        let instances = root_rows
            .into_iter()
            .map(|row| Instance::from_row(root.name(), root.primary_key_name(), row))
            .collect();
        Self {
            plan,
            policy,
            root: Level::with_instances(instances, StepState::Attached),
            levels: plan.steps().iter().map(|_| Level::default()).collect(),
        }
    }

    fn level(&self, parent: Option<StepId>) -> &Level {
        match parent {
            Some(id) => &self.levels[id],
            None => &self.root,
        }
    }

    fn level_mut(&mut self, parent: Option<StepId>) -> &mut Level {
        match parent {
            Some(id) => &mut self.levels[id],
            None => &mut self.root,
        }
    }

    /// Number of root instances.
    pub fn root_len(&self) -> usize {
        self.root.instances.len()
    }

    /// Current state of a step.
    pub fn state(&self, step: StepId) -> StepState {
        self.levels.get(step).map(|l| l.state).unwrap_or_default()
    }

    /// Attribute rows of the instances a step attaches to.
    pub fn parent_rows(&self, step: &PlannedStep) -> impl Iterator<Item = &Row> {
        self.level(step.parent).instances.iter().map(Instance::attributes)
    }

    /// Link a step's fetched rows to its parent instances.
    ///
    /// Many-valued slots keep storage order (join row order for
    /// many-to-many). A single-valued slot with several candidates keeps the
    /// first or fails, according to the [`SingleMatchPolicy`].
    pub fn attach(&mut self, step: &PlannedStep, fetched: Fetched) -> QueryResult<()> {
        debug_assert_eq!(self.level(step.parent).state, StepState::Attached);
        debug_assert_eq!(self.levels[step.id].state, StepState::Planned);

        let association = &step.association;
        let target = &association.target;
        let children: Vec<Instance> = fetched
            .rows
            .into_iter()
            .map(|row| Instance::from_row(target.name(), target.primary_key_name(), row))
            .collect();
        self.levels[step.id].state = StepState::Fetched;

        let child_key = match association.kind {
            AssociationKind::ManyToMany => target.primary_key_name(),
            _ => association.child_key(),
        };
        let mut index: HashMap<Key, Vec<usize>> = HashMap::with_capacity(children.len());
        for (i, child) in children.iter().enumerate() {
            if let Some(key) = child.get(child_key).key() {
                index.entry(key).or_default().push(i);
            }
        }

        let pairs: Option<HashMap<Key, Vec<Key>>> = association.through.as_ref().map(|through| {
            let mut pairs: HashMap<Key, Vec<Key>> = HashMap::new();
            for row in &fetched.through {
                let source = row.get(&through.source_key).and_then(Value::key);
                let dest = row.get(&through.target_key).and_then(Value::key);
                if let (Some(source), Some(dest)) = (source, dest) {
                    pairs.entry(source).or_default().push(dest);
                }
            }
            pairs
        });

        let parent_key = association.parent_key();
        let parents = &self.level(step.parent).instances;
        let mut edges = Vec::with_capacity(parents.len());
        for parent in parents {
            let mut matched: Vec<usize> = match (parent.get(parent_key).key(), &pairs) {
                (None, _) => Vec::new(),
                (Some(key), Some(pairs)) => pairs
                    .get(&key)
                    .map(|dests| {
                        dests
                            .iter()
                            .filter_map(|d| index.get(d).and_then(|c| c.first().copied()))
                            .collect()
                    })
                    .unwrap_or_default(),
                (Some(key), None) => index.get(&key).cloned().unwrap_or_default(),
            };

            if association.kind.is_one() && matched.len() > 1 {
                match self.policy {
                    SingleMatchPolicy::First => {
                        warn!(
                            path = %step.path,
                            parent = %parent.id(),
                            candidates = matched.len(),
                            "single-valued include matched several rows, keeping the first"
                        );
                        matched.truncate(1);
                    }
                    SingleMatchPolicy::Error => {
                        return Err(QueryError::ambiguous_match(
                            association.source_name(),
                            association.name.as_str(),
                            matched.len(),
                        )
                        .with_context(format!("attaching include {}", step.path)));
                    }
                }
            }
            edges.push(matched);
        }

        // Reserve the slot now so slots keep include order on every parent.
        let empty = if association.kind.is_many() {
            Slot::Many(Vec::new())
        } else {
            Slot::One(None)
        };
        for parent in &mut self.level_mut(step.parent).instances {
            parent.set_slot(step.slot(), empty.clone());
        }

        let mut level = Level::with_instances(children, StepState::Attached);
        level.edges = edges;
        self.levels[step.id] = level;
        Ok(())
    }

    /// Materialize the owned graph and return the root instances.
    ///
    /// Parents whose required include matched nothing are dropped, at the
    /// root or from their own parent's slot.
    pub fn finish(mut self) -> Vec<Instance> {
        let plan = self.plan;
        for step in plan.steps().iter().rev() {
            let Level {
                instances,
                edges,
                pruned,
                ..
            } = std::mem::take(&mut self.levels[step.id]);

            let edges: Vec<Vec<usize>> = edges
                .into_iter()
                .map(|e| e.into_iter().filter(|&c| !pruned[c]).collect())
                .collect();
            let mut uses = vec![0usize; instances.len()];
            for &child in edges.iter().flatten() {
                uses[child] += 1;
            }
            let mut pool: Vec<Option<Instance>> = instances.into_iter().map(Some).collect();

            let many = step.association.kind.is_many();
            let parent = self.level_mut(step.parent);
            for (i, matched) in edges.into_iter().enumerate() {
                if step.required && matched.is_empty() {
                    parent.pruned[i] = true;
                }
                let mut children = matched.into_iter().filter_map(|c| {
                    uses[c] -= 1;
                    if uses[c] == 0 {
                        pool[c].take()
                    } else {
                        pool[c].clone()
                    }
                });
                let slot = if many {
                    Slot::Many(children.collect())
                } else {
                    Slot::One(children.next().map(Box::new))
                };
                parent.instances[i].set_slot(step.slot(), slot);
            }
        }

        let root = std::mem::take(&mut self.root);
        root.instances
            .into_iter()
            .zip(root.pruned)
            .filter(|(_, pruned)| !pruned)
            .map(|(instance, _)| instance)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::relations::include::{include, IncludeSpec};
    use crate::relations::registry::Registry;
    use crate::row;
    use crate::schema::EntityType;
    use pretty_assertions::assert_eq;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        for name in ["User", "Task", "Group", "Product", "Tag"] {
            registry.register(EntityType::new(name)).unwrap();
        }
        registry.belongs_to("Task", "User").unwrap();
        registry.belongs_to("User", "Group").unwrap();
        registry.has_many("User", "Task").unwrap();
        registry.belongs_to_many("Product", "Tag").unwrap();
        registry
    }

    fn plan(root: &str, includes: &[IncludeSpec]) -> IncludePlan {
        IncludePlan::build(&registry(), root, includes, &ResolverConfig::default()).unwrap()
    }

    fn fetched(rows: Vec<Row>) -> Fetched {
        Fetched {
            rows,
            through: Vec::new(),
        }
    }

    fn ids(instances: &[Instance]) -> Vec<Value> {
        instances.iter().map(|i| i.id().clone()).collect()
    }

    #[test]
    fn test_many_to_one_shared_target_is_copied() {
        let plan = plan("Task", &[include("User")]);
        let mut assembler = GraphAssembler::new(
            &plan,
            vec![
                row! { "id" => 1, "UserId" => 7 },
                row! { "id" => 2, "UserId" => 7 },
                row! { "id" => 3, "UserId" => Value::Null },
            ],
            SingleMatchPolicy::First,
        );
        let step = &plan.steps()[0];
        assembler.attach(step, fetched(vec![row! { "id" => 7 }])).unwrap();
        assert_eq!(assembler.state(0), StepState::Attached);

        let tasks = assembler.finish();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].one("user").map(|u| u.id().clone()), Some(Value::Int(7)));
        assert_eq!(tasks[1].one("user"), tasks[0].one("user"));
        assert_eq!(tasks[2].slot("user"), Some(&Slot::One(None)));
    }

    #[test]
    fn test_one_to_many_keeps_storage_order() {
        let plan = plan("User", &[include("Task")]);
        let mut assembler = GraphAssembler::new(
            &plan,
            vec![row! { "id" => 1 }, row! { "id" => 2 }],
            SingleMatchPolicy::First,
        );
        assembler
            .attach(
                &plan.steps()[0],
                fetched(vec![
                    row! { "id" => 12, "UserId" => 1 },
                    row! { "id" => 10, "UserId" => 1 },
                    row! { "id" => 11, "UserId" => 1 },
                ]),
            )
            .unwrap();

        let users = assembler.finish();
        assert_eq!(
            ids(users[0].many("tasks")),
            vec![Value::Int(12), Value::Int(10), Value::Int(11)]
        );
        assert_eq!(users[1].slot("tasks"), Some(&Slot::Many(vec![])));
    }

    #[test]
    fn test_many_to_many_expands_join_rows() {
        let plan = plan("Product", &[include("Tag")]);
        let mut assembler = GraphAssembler::new(
            &plan,
            vec![row! { "id" => 1 }, row! { "id" => 2 }, row! { "id" => 3 }],
            SingleMatchPolicy::First,
        );
        let result = Fetched {
            rows: vec![row! { "id" => 10 }, row! { "id" => 11 }],
            through: vec![
                row! { "ProductId" => 1, "TagId" => 11 },
                row! { "ProductId" => 1, "TagId" => 10 },
                row! { "ProductId" => 2, "TagId" => 10 },
            ],
        };
        assembler.attach(&plan.steps()[0], result).unwrap();

        let products = assembler.finish();
        assert_eq!(ids(products[0].many("tags")), vec![Value::Int(11), Value::Int(10)]);
        assert_eq!(ids(products[1].many("tags")), vec![Value::Int(10)]);
        assert!(products[2].many("tags").is_empty());
    }

    #[test]
    fn test_many_to_many_keeps_duplicate_join_rows() {
        let plan = plan("Product", &[include("Tag")]);
        let mut assembler =
            GraphAssembler::new(&plan, vec![row! { "id" => 1 }], SingleMatchPolicy::First);
        let result = Fetched {
            rows: vec![row! { "id" => 10 }],
            through: vec![
                row! { "ProductId" => 1, "TagId" => 10 },
                row! { "ProductId" => 1, "TagId" => 10 },
            ],
        };
        assembler.attach(&plan.steps()[0], result).unwrap();

        let products = assembler.finish();
        assert_eq!(ids(products[0].many("tags")), vec![Value::Int(10), Value::Int(10)]);
    }

    #[test]
    fn test_duplicate_single_match_policy() {
        let plan = plan("Task", &[include("User")]);
        let rows = vec![row! { "id" => 7, "name" => "a" }, row! { "id" => 7, "name" => "b" }];

        let task = || vec![row! { "id" => 1, "UserId" => 7 }];

        let mut first = GraphAssembler::new(&plan, task(), SingleMatchPolicy::First);
        first.attach(&plan.steps()[0], fetched(rows.clone())).unwrap();
        let tasks = first.finish();
        assert_eq!(tasks[0].one("user").unwrap().get("name").as_str(), Some("a"));

        let mut strict = GraphAssembler::new(&plan, task(), SingleMatchPolicy::Error);
        let err = strict.attach(&plan.steps()[0], fetched(rows)).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::AmbiguousMatch);
    }

    #[test]
    fn test_nested_attach_and_slot_order() {
        let plan = plan(
            "Task",
            &[include("User").include(include("Group")).include(include("Task"))],
        );
        let mut assembler = GraphAssembler::new(
            &plan,
            vec![row! { "id" => 1, "UserId" => 7 }],
            SingleMatchPolicy::First,
        );
        assembler
            .attach(&plan.steps()[0], fetched(vec![row! { "id" => 7, "GroupId" => 3 }]))
            .unwrap();
        assert_eq!(
            assembler.parent_rows(&plan.steps()[1]).count(),
            1,
            "grandchildren attach to fetched users"
        );
        assembler
            .attach(&plan.steps()[1], fetched(vec![row! { "id" => 3 }]))
            .unwrap();
        assembler
            .attach(&plan.steps()[2], fetched(vec![row! { "id" => 1, "UserId" => 7 }]))
            .unwrap();

        let tasks = assembler.finish();
        let user = tasks[0].one("user").unwrap();
        assert_eq!(user.one("group").map(|g| g.id().clone()), Some(Value::Int(3)));
        assert_eq!(ids(user.many("tasks")), vec![Value::Int(1)]);
        let slots: Vec<_> = user.slots().keys().map(String::as_str).collect();
        assert_eq!(slots, vec!["group", "tasks"]);
    }

    #[test]
    fn test_required_prunes_root_and_nested() {
        let plan = plan(
            "Task",
            &[include("User")
                .required(true)
                .include(include("Group").required(true))],
        );
        let mut assembler = GraphAssembler::new(
            &plan,
            vec![
                row! { "id" => 1, "UserId" => 7 },
                row! { "id" => 2, "UserId" => 8 },
                row! { "id" => 3 },
            ],
            SingleMatchPolicy::First,
        );
        assembler
            .attach(
                &plan.steps()[0],
                fetched(vec![row! { "id" => 7, "GroupId" => 3 }, row! { "id" => 8 }]),
            )
            .unwrap();
        assembler
            .attach(&plan.steps()[1], fetched(vec![row! { "id" => 3 }]))
            .unwrap();

        let tasks = assembler.finish();
        assert_eq!(ids(&tasks), vec![Value::Int(1)]);
    }
}
