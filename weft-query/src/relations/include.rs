//! Include specifications for eager loading associations.

use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;

/// How an include node names its association.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IncludeTarget {
    /// By target entity type; must be unambiguous on the source.
    ByType(String),
    /// By role name.
    ByAlias(String),
}

impl std::fmt::Display for IncludeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ByType(name) => write!(f, "model {}", name),
            Self::ByAlias(name) => write!(f, "alias {}", name),
        }
    }
}

/// Specification for including an association in a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeSpec {
    /// Target entity type.
    pub model: Option<String>,
    /// Role name.
    pub alias: Option<String>,
    /// Nested includes, in order.
    pub nested: Vec<IncludeSpec>,
    /// Filter applied to the included rows.
    pub filter: Option<Filter>,
    /// Drop parents for which this include matched nothing.
    pub required: bool,
}

impl IncludeSpec {
    /// Include the association to the given entity type.
    pub fn model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }

    /// Include the association with the given role name.
    pub fn alias(alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..Self::default()
        }
    }

    /// Set the role name on a spec created with [`IncludeSpec::model`].
    pub fn r#as(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Add a filter to the included association.
    pub fn r#where(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Mark the include as required (inner join semantics).
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Include a nested association.
    pub fn include(mut self, nested: IncludeSpec) -> Self {
        self.nested.push(nested);
        self
    }

    /// Check if there are nested includes.
    pub fn has_nested(&self) -> bool {
        !self.nested.is_empty()
    }

    /// Resolve how this node names its association. An alias wins over the
    /// model; the model is then checked against the resolved target.
    pub fn target(&self) -> QueryResult<IncludeTarget> {
        match (&self.alias, &self.model) {
            (Some(alias), _) => Ok(IncludeTarget::ByAlias(alias.clone())),
            (None, Some(model)) => Ok(IncludeTarget::ByType(model.clone())),
            (None, None) => Err(QueryError::invalid_include(
                "Include node has neither a model nor an alias",
            )
            .with_code_suggestion(
                "Name the association to include",
                "IncludeSpec::model(\"User\")",
            )),
        }
    }

    /// Human readable label used in logs and paths.
    pub fn label(&self) -> String {
        match (&self.alias, &self.model) {
            (Some(alias), _) => alias.clone(),
            (None, Some(model)) => model.clone(),
            (None, None) => "?".to_string(),
        }
    }
}

/// Helper function to include by model.
pub fn include(model: impl Into<String>) -> IncludeSpec {
    IncludeSpec::model(model)
}
