//! crates/cookstack_core/src/ordering.rs
//!
//! Planning for position-ordered child collections (sections under a recipe,
//! ingredients and instructions under a section). A client submits the full,
//! ordered list; the planner assigns ids to new items, resolves positions and
//! flattens translations so a store can apply the whole thing in one batch.

use crate::domain::Translation;
use std::collections::HashSet;
use uuid::Uuid;

/// The three ordered collections. They share one replace algorithm and differ
/// only in where their rows live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Sections,
    Ingredients,
    Instructions,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Sections => "sections",
            CollectionKind::Ingredients => "ingredients",
            CollectionKind::Instructions => "instructions",
        }
    }

    /// Ingredients and instructions hang off a section; sections off a recipe.
    pub fn parent_is_section(&self) -> bool {
        !matches!(self, CollectionKind::Sections)
    }
}

/// One submitted item. A missing `id` means the item is created by this call;
/// missing `translations` keep whatever the item already has.
#[derive(Debug, Clone, Default)]
pub struct ItemInput {
    pub id: Option<Uuid>,
    pub position: Option<i64>,
    pub translations: Option<Vec<Translation>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRow {
    pub id: Uuid,
    pub position: i64,
    /// The row's stored translations are replaced by the planned ones.
    pub replaces_translations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("item {0} was submitted more than once")]
    DuplicateId(Uuid),
}

/// The fully resolved replacement of a collection.
#[derive(Debug, Clone, Default)]
pub struct ReplacePlan {
    pub rows: Vec<PlannedRow>,
    /// Translations of every row, keyed by the owning row id.
    pub translations: Vec<(Uuid, Translation)>,
}

impl ReplacePlan {
    /// Resolves ids and positions for a submitted list.
    ///
    /// An item without a position takes its index in the submission, so a list
    /// submitted without positions becomes `0..n`. Explicit positions are kept
    /// as given, collisions included: uniqueness is the store's to enforce, and
    /// a collision must fail the whole batch.
    pub fn build(items: Vec<ItemInput>) -> Result<Self, PlanError> {
        let mut plan = ReplacePlan {
            rows: Vec::with_capacity(items.len()),
            translations: Vec::new(),
        };
        let mut seen = HashSet::with_capacity(items.len());

        for (index, item) in items.into_iter().enumerate() {
            let id = item.id.unwrap_or_else(Uuid::new_v4);
            if !seen.insert(id) {
                return Err(PlanError::DuplicateId(id));
            }
            let position = item.position.unwrap_or(index as i64);
            plan.rows.push(PlannedRow {
                id,
                position,
                replaces_translations: item.translations.is_some(),
            });
            plan.translations.extend(
                item.translations
                    .into_iter()
                    .flatten()
                    .map(|t| (id, t)),
            );
        }

        Ok(plan)
    }

    /// Ids of every row in the plan, existing and new.
    pub fn ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.rows.iter().map(|row| row.id)
    }
}
