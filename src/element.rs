//! The coverage element taxonomy: the levels a coverage tree is built from.
//!
//! Kinds are totally ordered. A smaller order sits higher in the hierarchy,
//! so a node may only hold children whose kind has a strictly larger order.
//! `Line` and `Branch` are counters: they are tallied on their enclosing node
//! and never become nodes themselves.

use std::borrow::Cow;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{CovgateError, Result};

/// One level of the coverage hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKind {
    order: i32,
    name: Cow<'static, str>,
}

impl ElementKind {
    /// Root of a merged result spanning several reports.
    pub const AGGREGATED_REPORT: ElementKind = ElementKind::builtin(-10, "Aggregated Report");
    pub const REPORT: ElementKind = ElementKind::builtin(0, "Report");
    pub const GROUP: ElementKind = ElementKind::builtin(10, "Group");
    pub const PACKAGE: ElementKind = ElementKind::builtin(20, "Package");
    pub const FILE: ElementKind = ElementKind::builtin(30, "File");
    pub const CLASS: ElementKind = ElementKind::builtin(40, "Class");
    pub const METHOD: ElementKind = ElementKind::builtin(50, "Method");
    pub const LINE: ElementKind = ElementKind::builtin(60, "Line");
    pub const BRANCH: ElementKind = ElementKind::builtin(70, "Branch");

    const fn builtin(order: i32, name: &'static str) -> Self {
        Self {
            order,
            name: Cow::Borrowed(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    /// Line and Branch are leaf counters, not tree nodes.
    #[must_use]
    pub fn is_counter(&self) -> bool {
        self.order >= Self::LINE.order
    }

    /// Kinds at File level and below describe a single source file, so line
    /// numbers inside them identify a unique source line.
    #[must_use]
    pub fn is_source_scoped(&self) -> bool {
        !self.is_counter() && self.order >= Self::FILE.order
    }

    /// Whether a node of kind `child` may be attached below a node of this kind.
    #[must_use]
    pub fn can_contain(&self, child: &ElementKind) -> bool {
        !child.is_counter() && child.order > self.order
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for ElementKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// Resolves kind names used by dialects and configuration to canonical kinds.
///
/// Starts with the built-in hierarchy; extra kinds can be registered as long
/// as they fit strictly between Report and the leaf counters.
#[derive(Debug, Clone)]
pub struct ElementRegistry {
    kinds: Vec<ElementKind>,
}

impl Default for ElementRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ElementRegistry {
    pub fn builtin() -> Self {
        Self {
            kinds: vec![
                ElementKind::AGGREGATED_REPORT,
                ElementKind::REPORT,
                ElementKind::GROUP,
                ElementKind::PACKAGE,
                ElementKind::FILE,
                ElementKind::CLASS,
                ElementKind::METHOD,
                ElementKind::LINE,
                ElementKind::BRANCH,
            ],
        }
    }

    /// Look up a kind by name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Result<ElementKind> {
        self.kinds
            .iter()
            .find(|k| k.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| CovgateError::UnknownElementKind(name.to_string()))
    }

    /// Register a new kind. Its order must lie strictly between Report and
    /// Line so the built-in ordering stays intact.
    pub fn register(&mut self, name: impl Into<String>, order: i32) -> Result<ElementKind> {
        let name = name.into();
        if self.get(&name).is_ok() {
            return Err(CovgateError::DuplicateElementKind(name));
        }
        if order <= ElementKind::REPORT.order || order >= ElementKind::LINE.order {
            return Err(CovgateError::Config(format!(
                "element kind '{}' has order {}, expected a value between {} and {}",
                name,
                order,
                ElementKind::REPORT.order,
                ElementKind::LINE.order
            )));
        }

        let kind = ElementKind {
            order,
            name: Cow::Owned(name),
        };
        self.kinds.push(kind.clone());
        self.kinds.sort();
        Ok(kind)
    }

    /// All registered kinds, top of the hierarchy first.
    pub fn kinds(&self) -> impl Iterator<Item = &ElementKind> {
        self.kinds.iter()
    }
}
