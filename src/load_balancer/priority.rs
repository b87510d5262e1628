//! Node priorities and the evaluators producing them.
//!
//! # Responsibilities
//! - Define the ordered `Priority` scale
//! - Evaluate a request into a priority per node
//! - Select the winning node (maximum priority, first registered on ties)
//!
//! # Design Decisions
//! - Evaluators are synchronous and side-effect free
//! - Any `Fn(&Request<Body>) -> Priority` is an evaluator, a `Priority` is a constant one
//! - Declarative rules reuse the routing matchers

use std::fmt;

use axum::body::Body;
use axum::http::Request;
use serde::Deserialize;

use crate::routing::Matcher;

/// Ordered priority scale, `Lowest < Low < Medium < High < Highest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Lowest,
    Low,
    #[default]
    Medium,
    High,
    Highest,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Lowest => "lowest",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Highest => "highest",
        };
        f.write_str(name)
    }
}

/// Ranks a node for a given request.
pub trait PriorityEvaluator: Send + Sync {
    fn evaluate(&self, request: &Request<Body>) -> Priority;
}

impl<F> PriorityEvaluator for F
where
    F: Fn(&Request<Body>) -> Priority + Send + Sync,
{
    fn evaluate(&self, request: &Request<Body>) -> Priority {
        self(request)
    }
}

/// A bare priority is a constant evaluator.
impl PriorityEvaluator for Priority {
    fn evaluate(&self, _request: &Request<Body>) -> Priority {
        *self
    }
}

/// Yields `matched` when the matcher accepts the request, `otherwise` if not.
#[derive(Debug)]
pub struct PriorityRule {
    when: Box<dyn Matcher>,
    matched: Priority,
    otherwise: Priority,
}

impl PriorityRule {
    pub fn new(when: Box<dyn Matcher>, matched: Priority, otherwise: Priority) -> Self {
        Self {
            when,
            matched,
            otherwise,
        }
    }
}

impl PriorityEvaluator for PriorityRule {
    fn evaluate(&self, request: &Request<Body>) -> Priority {
        if self.when.matches(request) {
            self.matched
        } else {
            self.otherwise
        }
    }
}

/// Index of the maximal priority; the earliest wins ties. `None` when empty.
pub fn select(priorities: impl IntoIterator<Item = Priority>) -> Option<(usize, Priority)> {
    priorities
        .into_iter()
        .enumerate()
        .fold(None, |best, (index, priority)| match best {
            Some((_, current)) if current >= priority => best,
            _ => Some((index, priority)),
        })
}
