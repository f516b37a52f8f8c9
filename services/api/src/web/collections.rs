//! services/api/src/web/collections.rs
//!
//! The ordered collections under a recipe: its sections, and the ingredients
//! and instructions of each section. The three share one set of handlers,
//! specialized by a marker type naming the collection.
//!
//! A `PUT` replaces the whole collection with the submitted, ordered list.
//! Items that carry an `id` are kept (and keep their own children), items
//! without one are created, and existing items missing from the list are
//! deleted. The whole replacement is applied atomically.

use crate::error::{AppError, AppResult};
use crate::web::context::CurrentUser;
use crate::web::extract::{AppJson, AppPath};
use crate::web::recipes::find_recipe;
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use cookstack_core::authz::{is_admin, require_role, verify_author, CONTENT_EDITORS};
use cookstack_core::{
    CollectionKind, ItemInput, OrderedItem, PlanError, PortError, ReplacePlan, Translation, User,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

pub const MAX_TEXT_LENGTH: usize = 2000;

/// Names the collection a handler instance serves.
pub trait Collection: Send + Sync + 'static {
    const KIND: CollectionKind;
}

pub struct Sections;
pub struct Ingredients;
pub struct Instructions;

impl Collection for Sections {
    const KIND: CollectionKind = CollectionKind::Sections;
}

impl Collection for Ingredients {
    const KIND: CollectionKind = CollectionKind::Ingredients;
}

impl Collection for Instructions {
    const KIND: CollectionKind = CollectionKind::Instructions;
}

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// Route parameters. `section_id` is absent on the section collection
/// routes; on the single-section route it names the section itself.
#[derive(Debug, Deserialize)]
pub struct CollectionPath {
    pub recipe_id: Uuid,
    pub section_id: Option<Uuid>,
    pub id: Option<Uuid>,
}

impl CollectionPath {
    fn item_id(&self, kind: CollectionKind) -> Option<Uuid> {
        if kind.parent_is_section() {
            self.id
        } else {
            self.section_id
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TranslationBody {
    pub locale: String,
    pub text: String,
}

impl From<Translation> for TranslationBody {
    fn from(t: Translation) -> Self {
        Self {
            locale: t.locale,
            text: t.text,
        }
    }
}

/// One element of a replacement list.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ItemPayload {
    /// Keeps an existing item; omitted for new ones.
    pub id: Option<Uuid>,
    /// Defaults to the element's index in the list.
    pub position: Option<i64>,
    /// Omitted to keep the item's current translations.
    pub translations: Option<Vec<TranslationBody>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AppendPayload {
    pub translations: Vec<TranslationBody>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub position: i64,
    pub translations: Vec<TranslationBody>,
}

impl From<OrderedItem> for ItemResponse {
    fn from(item: OrderedItem) -> Self {
        Self {
            id: item.id,
            parent_id: item.parent_id,
            position: item.position,
            translations: item.translations.into_iter().map(Into::into).collect(),
        }
    }
}

fn responses(items: Vec<OrderedItem>) -> Vec<ItemResponse> {
    items.into_iter().map(Into::into).collect()
}

//=========================================================================================
// Validation
//=========================================================================================

fn check_translations(
    translations: &[TranslationBody],
    locales: &[String],
    field: &str,
    errors: &mut BTreeMap<String, String>,
) -> Vec<Translation> {
    let mut seen = HashSet::new();
    let mut checked = Vec::with_capacity(translations.len());

    for t in translations {
        let text = t.text.trim();
        let problem = if !locales.contains(&t.locale) {
            Some("unsupportedLocale")
        } else if !seen.insert(t.locale.as_str()) {
            Some("duplicateLocale")
        } else if text.is_empty() {
            Some("required")
        } else if text.chars().count() > MAX_TEXT_LENGTH {
            Some("tooLong")
        } else {
            None
        };

        match problem {
            Some(key) => {
                errors
                    .entry(field.to_string())
                    .or_insert_with(|| key.to_string());
            }
            None => checked.push(Translation {
                locale: t.locale.clone(),
                text: text.to_string(),
            }),
        }
    }
    checked
}

/// Validates a replacement list, reporting problems per element
/// (`"0.position"`, `"2.translations"`).
pub fn to_inputs(items: Vec<ItemPayload>, locales: &[String]) -> AppResult<Vec<ItemInput>> {
    let mut errors = BTreeMap::new();
    let mut inputs = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        if item.position.is_some_and(|p| p < 0) {
            errors.insert(format!("{index}.position"), "invalidPosition".to_string());
        }
        let translations = item.translations.map(|ts| {
            check_translations(&ts, locales, &format!("{index}.translations"), &mut errors)
        });
        inputs.push(ItemInput {
            id: item.id,
            position: item.position,
            translations,
        });
    }

    if errors.is_empty() {
        Ok(inputs)
    } else {
        Err(AppError::Validation(errors))
    }
}

fn replace_conflict(err: PortError) -> AppError {
    match err {
        PortError::UniqueViolation { constraint } if constraint.contains("position") => {
            AppError::Conflict("positionConflict")
        }
        e => e.into(),
    }
}

//=========================================================================================
// Parent Resolution
//=========================================================================================

/// Finds the parent of the collection: the recipe for sections, otherwise
/// the section, which must belong to the recipe. Returns the recipe's owner
/// and the parent id.
async fn resolve_parent(
    state: &AppState,
    kind: CollectionKind,
    path: &CollectionPath,
) -> AppResult<(Option<Uuid>, Uuid)> {
    let recipe = find_recipe(state, path.recipe_id).await?;
    if !kind.parent_is_section() {
        return Ok((recipe.owner_id, recipe.id));
    }

    let section_id = path.section_id.ok_or(AppError::NotFound)?;
    match state
        .content
        .find_item(CollectionKind::Sections, section_id)
        .await?
    {
        Some(section) if section.parent_id == recipe.id => Ok((recipe.owner_id, section.id)),
        _ => Err(AppError::NotFound),
    }
}

async fn editable_parent(
    state: &AppState,
    user: &User,
    kind: CollectionKind,
    path: &CollectionPath,
) -> AppResult<Uuid> {
    require_role(Some(user), CONTENT_EDITORS)?;
    let (owner_id, parent_id) = resolve_parent(state, kind, path).await?;
    verify_author(Some(user), owner_id, &[is_admin])?;
    Ok(parent_id)
}

//=========================================================================================
// Handlers
//=========================================================================================

pub async fn list<C: Collection>(
    State(state): State<Arc<AppState>>,
    AppPath(path): AppPath<CollectionPath>,
) -> AppResult<Json<Vec<ItemResponse>>> {
    let (_, parent_id) = resolve_parent(&state, C::KIND, &path).await?;
    let items = state.content.list_items(C::KIND, parent_id).await?;
    Ok(Json(responses(items)))
}

pub async fn replace<C: Collection>(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppPath(path): AppPath<CollectionPath>,
    AppJson(items): AppJson<Vec<ItemPayload>>,
) -> AppResult<Json<Vec<ItemResponse>>> {
    let parent_id = editable_parent(&state, &user, C::KIND, &path).await?;
    let inputs = to_inputs(items, &state.config.supported_locales)?;
    let plan = ReplacePlan::build(inputs).map_err(|e| match e {
        PlanError::DuplicateId(_) => AppError::field("id", "duplicateId"),
    })?;

    let items = state
        .content
        .replace_items(C::KIND, parent_id, &plan)
        .await
        .map_err(replace_conflict)?;
    info!(
        user_id = %user.id,
        parent_id = %parent_id,
        collection = C::KIND.as_str(),
        count = items.len(),
        "Collection replaced"
    );
    Ok(Json(responses(items)))
}

pub async fn append<C: Collection>(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppPath(path): AppPath<CollectionPath>,
    AppJson(payload): AppJson<AppendPayload>,
) -> AppResult<(StatusCode, Json<ItemResponse>)> {
    let parent_id = editable_parent(&state, &user, C::KIND, &path).await?;

    let mut errors = BTreeMap::new();
    let translations = check_translations(
        &payload.translations,
        &state.config.supported_locales,
        "translations",
        &mut errors,
    );
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let item = state
        .content
        .append_item(C::KIND, parent_id, &translations)
        .await
        .map_err(replace_conflict)?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

pub async fn remove<C: Collection>(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    AppPath(path): AppPath<CollectionPath>,
) -> AppResult<StatusCode> {
    let parent_id = editable_parent(&state, &user, C::KIND, &path).await?;
    let item_id = path.item_id(C::KIND).ok_or(AppError::NotFound)?;

    if state.content.delete_item(C::KIND, parent_id, item_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
