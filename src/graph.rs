//! Read-only relationship queries over individuals and families.
//!
//! The GEDCOM layer that produces these records lives outside this crate;
//! the layout engine only sees the trait below. Queries are lenient:
//! an unknown id yields empty relations, never an error.

use crate::model::{FamilyId, IndividualId, Sex};
use std::collections::BTreeMap;

/// One family in which a given individual is a parent: the other parent
/// (if any) and the children, as produced by "split by family" grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyUnit {
    pub family_id: FamilyId,
    pub spouse: Option<IndividualId>,
    pub children: Vec<IndividualId>,
}

/// Query interface the layout engine needs from the domain model.
pub trait RelationshipGraph {
    fn spouses(&self, id: &str) -> Vec<IndividualId>;
    fn children(&self, id: &str) -> Vec<IndividualId>;
    fn parents(&self, id: &str) -> Vec<IndividualId>;
    fn siblings(&self, id: &str) -> Vec<IndividualId>;
    fn sex(&self, id: &str) -> Sex;
    /// Partition `id`'s spouses and children into one unit per family.
    /// Order follows the family record order the graph was built from.
    fn family_units(&self, id: &str) -> Vec<FamilyUnit>;

    fn is_spouse_of(&self, a: &str, b: &str) -> bool {
        self.spouses(a).iter().any(|s| s == b)
    }
}

/// An individual as handed over by the domain layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndividualRecord {
    pub id: IndividualId,
    pub sex: Sex,
    pub name: Option<String>,
}

/// A family union: parent ids and child ids, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyRecord {
    pub id: FamilyId,
    pub parents: Vec<IndividualId>,
    pub children: Vec<IndividualId>,
}

/// In-memory relationship graph built from individual and family records.
#[derive(Debug, Clone, Default)]
pub struct FamilyGraph {
    indis: BTreeMap<IndividualId, IndividualRecord>,
    families: Vec<FamilyRecord>,
    by_parent: BTreeMap<IndividualId, Vec<usize>>,
    by_child: BTreeMap<IndividualId, Vec<usize>>,
}

impl FamilyGraph {
    pub fn new(indis: Vec<IndividualRecord>, families: Vec<FamilyRecord>) -> Self {
        let mut by_parent: BTreeMap<IndividualId, Vec<usize>> = BTreeMap::new();
        let mut by_child: BTreeMap<IndividualId, Vec<usize>> = BTreeMap::new();

        for (idx, fam) in families.iter().enumerate() {
            for parent in &fam.parents {
                by_parent.entry(parent.clone()).or_default().push(idx);
            }
            for child in &fam.children {
                by_child.entry(child.clone()).or_default().push(idx);
            }
        }

        Self {
            indis: indis.into_iter().map(|i| (i.id.clone(), i)).collect(),
            families,
            by_parent,
            by_child,
        }
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.indis.get(id).and_then(|i| i.name.as_deref())
    }

    fn parent_families(&self, id: &str) -> impl Iterator<Item = &FamilyRecord> {
        self.by_parent
            .get(id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.families[idx])
    }

    fn child_families(&self, id: &str) -> impl Iterator<Item = &FamilyRecord> {
        self.by_child
            .get(id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.families[idx])
    }
}

fn push_unique(out: &mut Vec<IndividualId>, id: &str) {
    if !out.iter().any(|existing| existing == id) {
        out.push(id.to_string());
    }
}

impl RelationshipGraph for FamilyGraph {
    fn spouses(&self, id: &str) -> Vec<IndividualId> {
        let mut out = Vec::new();
        for fam in self.parent_families(id) {
            for parent in &fam.parents {
                if parent != id {
                    push_unique(&mut out, parent);
                }
            }
        }
        out
    }

    fn children(&self, id: &str) -> Vec<IndividualId> {
        let mut out = Vec::new();
        for fam in self.parent_families(id) {
            for child in &fam.children {
                push_unique(&mut out, child);
            }
        }
        out
    }

    fn parents(&self, id: &str) -> Vec<IndividualId> {
        let mut out = Vec::new();
        for fam in self.child_families(id) {
            for parent in &fam.parents {
                push_unique(&mut out, parent);
            }
        }
        out
    }

    fn siblings(&self, id: &str) -> Vec<IndividualId> {
        let mut out = Vec::new();
        for fam in self.child_families(id) {
            for child in &fam.children {
                if child != id {
                    push_unique(&mut out, child);
                }
            }
        }
        out
    }

    fn sex(&self, id: &str) -> Sex {
        self.indis.get(id).map(|i| i.sex).unwrap_or(Sex::Unknown)
    }

    fn family_units(&self, id: &str) -> Vec<FamilyUnit> {
        self.parent_families(id)
            .map(|fam| FamilyUnit {
                family_id: fam.id.clone(),
                spouse: fam.parents.iter().find(|p| *p != id).cloned(),
                children: fam.children.clone(),
            })
            .collect()
    }
}
