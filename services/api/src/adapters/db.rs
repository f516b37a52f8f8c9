//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! `CredentialStore` and `ContentStore` ports from the `core` crate. It handles
//! all interactions with the SQLite database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cookstack_core::domain::{
    AuthSession, Category, EmailVerificationCode, NewRecipe, OAuthAccount, OrderedItem,
    PasswordResetToken, ProfileUpdate, Recipe, RecipeQuery, RecipeUpdate, Role, RoleRequest,
    RoleRequestStatus, SectionDetail, Translation, User,
};
use cookstack_core::ordering::{CollectionKind, ReplacePlan};
use cookstack_core::ports::{
    CategoryDeletion, ContentStore, CredentialStore, PortError, PortResult,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, SqliteConnection};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `database_url` with foreign keys enforced.
    ///
    /// An in-memory database lives as long as its connection, so it gets a
    /// single connection that is never recycled.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps driver errors onto the port error vocabulary.
fn db_error(err: sqlx::Error) -> PortError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            // SQLite reports "UNIQUE constraint failed: table.column[, ...]".
            let constraint = db
                .message()
                .split_once(": ")
                .map(|(_, columns)| columns.to_string())
                .unwrap_or_else(|| db.message().to_string());
            return PortError::UniqueViolation { constraint };
        }
        if db.is_foreign_key_violation() {
            return PortError::ForeignKeyViolation;
        }
    }
    PortError::Unexpected(err.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str =
    "id, email, name, image_url, hashed_password, email_verified, role, created_at, updated_at";

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    name: Option<String>,
    image_url: Option<String>,
    hashed_password: Option<String>,
    email_verified: bool,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(User {
            id: self.id,
            email: self.email,
            name: self.name,
            image_url: self.image_url,
            hashed_password: self.hashed_password,
            email_verified: self.email_verified,
            role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            id: self.id,
            user_id: self.user_id,
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct VerificationCodeRecord {
    user_id: Uuid,
    email: String,
    code: String,
    expires_at: DateTime<Utc>,
}
impl VerificationCodeRecord {
    fn to_domain(self) -> EmailVerificationCode {
        EmailVerificationCode {
            user_id: self.user_id,
            email: self.email,
            code: self.code,
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct ResetTokenRecord {
    token_hash: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}
impl ResetTokenRecord {
    fn to_domain(self) -> PasswordResetToken {
        PasswordResetToken {
            token_hash: self.token_hash,
            user_id: self.user_id,
            expires_at: self.expires_at,
        }
    }
}

#[derive(FromRow)]
struct RoleRequestRecord {
    id: Uuid,
    user_id: Uuid,
    role: String,
    status: String,
    created_at: DateTime<Utc>,
}
impl RoleRequestRecord {
    fn to_domain(self) -> PortResult<RoleRequest> {
        Ok(RoleRequest {
            id: self.id,
            user_id: self.user_id,
            role: self
                .role
                .parse::<Role>()
                .map_err(|e| PortError::Unexpected(e.to_string()))?,
            status: self
                .status
                .parse::<RoleRequestStatus>()
                .map_err(PortError::Unexpected)?,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CategoryRecord {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}
impl CategoryRecord {
    fn to_domain(self) -> Category {
        Category {
            id: self.id,
            name: self.name,
            created_at: self.created_at,
        }
    }
}

const RECIPE_COLUMNS: &str =
    "id, category_id, owner_id, title, description, image_url, created_at, updated_at";

#[derive(FromRow)]
struct RecipeRecord {
    id: Uuid,
    category_id: Uuid,
    owner_id: Option<Uuid>,
    title: String,
    description: Option<String>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl RecipeRecord {
    fn to_domain(self) -> Recipe {
        Recipe {
            id: self.id,
            category_id: self.category_id,
            owner_id: self.owner_id,
            title: self.title,
            description: self.description,
            image_url: self.image_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ItemRecord {
    id: Uuid,
    parent_id: Uuid,
    position: i64,
}

#[derive(FromRow)]
struct TranslationRecord {
    item_id: Uuid,
    locale: String,
    text: String,
}

/// Where one ordered collection lives.
struct CollectionTables {
    items: &'static str,
    parent: &'static str,
    translations: &'static str,
}

fn tables(kind: CollectionKind) -> CollectionTables {
    match kind {
        CollectionKind::Sections => CollectionTables {
            items: "sections",
            parent: "recipe_id",
            translations: "section_translations",
        },
        CollectionKind::Ingredients => CollectionTables {
            items: "ingredients",
            parent: "section_id",
            translations: "ingredient_translations",
        },
        CollectionKind::Instructions => CollectionTables {
            items: "instructions",
            parent: "section_id",
            translations: "instruction_translations",
        },
    }
}

/// Joins item rows with their translations, keeping the row order.
fn assemble(items: Vec<ItemRecord>, translations: Vec<TranslationRecord>) -> Vec<OrderedItem> {
    let mut by_item: HashMap<Uuid, Vec<Translation>> = HashMap::new();
    for t in translations {
        by_item.entry(t.item_id).or_default().push(Translation {
            locale: t.locale,
            text: t.text,
        });
    }
    items
        .into_iter()
        .map(|item| OrderedItem {
            translations: by_item.remove(&item.id).unwrap_or_default(),
            id: item.id,
            parent_id: item.parent_id,
            position: item.position,
        })
        .collect()
}

//=========================================================================================
// Connection-Level Helpers (shared by pooled and transactional paths)
//=========================================================================================

async fn insert_user(conn: &mut SqliteConnection, user: &User) -> PortResult<()> {
    let sql = format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)");
    sqlx::query(&sql)
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.image_url)
        .bind(&user.hashed_password)
        .bind(user.email_verified)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    Ok(())
}

async fn delete_sessions_of(conn: &mut SqliteConnection, user_id: Uuid) -> PortResult<()> {
    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    Ok(())
}

async fn set_role(conn: &mut SqliteConnection, user_id: Uuid, role: Role) -> PortResult<User> {
    let sql = format!(
        "UPDATE users SET role = ?, updated_at = ? WHERE id = ? RETURNING {USER_COLUMNS}"
    );
    let record = sqlx::query_as::<_, UserRecord>(&sql)
        .bind(role.as_str())
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?
        .ok_or_else(|| PortError::NotFound(format!("user {}", user_id)))?;
    delete_sessions_of(conn, user_id).await?;
    record.to_domain()
}

async fn load_items(
    conn: &mut SqliteConnection,
    kind: CollectionKind,
    parent_id: Uuid,
) -> PortResult<Vec<OrderedItem>> {
    let t = tables(kind);
    let sql = format!(
        "SELECT id, {parent} AS parent_id, position FROM {items} WHERE {parent} = ? ORDER BY position",
        parent = t.parent,
        items = t.items,
    );
    let items = sqlx::query_as::<_, ItemRecord>(&sql)
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?;

    let sql = format!(
        "SELECT t.item_id, t.locale, t.text FROM {translations} t \
         JOIN {items} i ON i.id = t.item_id WHERE i.{parent} = ? ORDER BY t.locale",
        translations = t.translations,
        items = t.items,
        parent = t.parent,
    );
    let translations = sqlx::query_as::<_, TranslationRecord>(&sql)
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?;

    Ok(assemble(items, translations))
}

async fn load_item(
    conn: &mut SqliteConnection,
    kind: CollectionKind,
    item_id: Uuid,
) -> PortResult<Option<OrderedItem>> {
    let t = tables(kind);
    let sql = format!(
        "SELECT id, {parent} AS parent_id, position FROM {items} WHERE id = ?",
        parent = t.parent,
        items = t.items,
    );
    let Some(item) = sqlx::query_as::<_, ItemRecord>(&sql)
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?
    else {
        return Ok(None);
    };

    let sql = format!(
        "SELECT item_id, locale, text FROM {} WHERE item_id = ? ORDER BY locale",
        t.translations
    );
    let translations = sqlx::query_as::<_, TranslationRecord>(&sql)
        .bind(item_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?;

    Ok(assemble(vec![item], translations).pop())
}

async fn insert_translations(
    conn: &mut SqliteConnection,
    kind: CollectionKind,
    rows: &[(Uuid, Translation)],
) -> PortResult<()> {
    let sql = format!(
        "INSERT INTO {} (item_id, locale, text) VALUES (?, ?, ?)",
        tables(kind).translations
    );
    for (item_id, translation) in rows {
        sqlx::query(&sql)
            .bind(item_id)
            .bind(&translation.locale)
            .bind(&translation.text)
            .execute(&mut *conn)
            .await
            .map_err(db_error)?;
    }
    Ok(())
}

//=========================================================================================
// `CredentialStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CredentialStore for DbAdapter {
    async fn create_user_with_verification(
        &self,
        user: &User,
        code: &EmailVerificationCode,
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        insert_user(&mut tx, user).await?;
        sqlx::query(
            "INSERT INTO email_verification_codes (user_id, email, code, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(code.user_id)
        .bind(&code.email)
        .bind(&code.code)
        .bind(code.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> PortResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(UserRecord::to_domain)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(UserRecord::to_domain)
            .transpose()
    }

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> PortResult<User> {
        let sql = format!(
            "UPDATE users SET name = COALESCE(?, name), image_url = COALESCE(?, image_url), \
             updated_at = ? WHERE id = ? RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(&update.name)
            .bind(&update.image_url)
            .bind(Utc::now())
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| PortError::NotFound(format!("user {}", user_id)))?
            .to_domain()
    }

    async fn create_session(&self, session: &AuthSession) -> PortResult<()> {
        sqlx::query("INSERT INTO sessions (id, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&session.id)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn find_session(&self, session_id: &str) -> PortResult<Option<AuthSession>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, user_id, expires_at FROM sessions WHERE id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(record.map(SessionRecord::to_domain))
    }

    async fn extend_session(&self, session_id: &str, expires_at: DateTime<Utc>) -> PortResult<()> {
        sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
            .bind(expires_at)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> PortResult<()> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        delete_sessions_of(&mut conn, user_id).await
    }

    async fn find_oauth_user(
        &self,
        provider_id: &str,
        provider_user_id: &str,
    ) -> PortResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = \
             (SELECT user_id FROM oauth_accounts WHERE provider_id = ? AND provider_user_id = ?)"
        );
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(provider_id)
            .bind(provider_user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(UserRecord::to_domain)
            .transpose()
    }

    async fn create_oauth_user(&self, user: &User, account: &OAuthAccount) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        insert_user(&mut tx, user).await?;
        sqlx::query(
            "INSERT INTO oauth_accounts (provider_id, provider_user_id, user_id) VALUES (?, ?, ?)",
        )
        .bind(&account.provider_id)
        .bind(&account.provider_user_id)
        .bind(account.user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)
    }

    async fn link_oauth_account(
        &self,
        account: &OAuthAccount,
        backfill: &ProfileUpdate,
        mark_verified: bool,
    ) -> PortResult<User> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(
            "INSERT INTO oauth_accounts (provider_id, provider_user_id, user_id) VALUES (?, ?, ?)",
        )
        .bind(&account.provider_id)
        .bind(&account.provider_user_id)
        .bind(account.user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        let sql = format!(
            "UPDATE users SET name = COALESCE(name, ?), image_url = COALESCE(image_url, ?), \
             email_verified = (email_verified OR ?), updated_at = ? WHERE id = ? \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(&backfill.name)
            .bind(&backfill.image_url)
            .bind(mark_verified)
            .bind(Utc::now())
            .bind(account.user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .ok_or_else(|| PortError::NotFound(format!("user {}", account.user_id)))?
            .to_domain()?;

        tx.commit().await.map_err(db_error)?;
        Ok(user)
    }

    async fn find_verification_code(
        &self,
        user_id: Uuid,
    ) -> PortResult<Option<EmailVerificationCode>> {
        let record = sqlx::query_as::<_, VerificationCodeRecord>(
            "SELECT user_id, email, code, expires_at FROM email_verification_codes WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(record.map(VerificationCodeRecord::to_domain))
    }

    async fn replace_verification_code(&self, code: &EmailVerificationCode) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO email_verification_codes (user_id, email, code, expires_at) \
             VALUES (?, ?, ?, ?) ON CONFLICT (user_id) DO UPDATE SET \
             email = excluded.email, code = excluded.code, expires_at = excluded.expires_at",
        )
        .bind(code.user_id)
        .bind(&code.email)
        .bind(&code.code)
        .bind(code.expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn complete_email_verification(&self, user_id: Uuid) -> PortResult<User> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query("DELETE FROM email_verification_codes WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        delete_sessions_of(&mut tx, user_id).await?;

        let sql = format!(
            "UPDATE users SET email_verified = TRUE, updated_at = ? WHERE id = ? RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Utc::now())
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .ok_or_else(|| PortError::NotFound(format!("user {}", user_id)))?
            .to_domain()?;

        tx.commit().await.map_err(db_error)?;
        Ok(user)
    }

    async fn replace_password_reset_token(&self, token: &PasswordResetToken) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = ?")
            .bind(token.user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        sqlx::query(
            "INSERT INTO password_reset_tokens (token_hash, user_id, expires_at) VALUES (?, ?, ?)",
        )
        .bind(&token.token_hash)
        .bind(token.user_id)
        .bind(token.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)
    }

    async fn take_password_reset_token(
        &self,
        token_hash: &str,
    ) -> PortResult<Option<PasswordResetToken>> {
        let record = sqlx::query_as::<_, ResetTokenRecord>(
            "DELETE FROM password_reset_tokens WHERE token_hash = ? \
             RETURNING token_hash, user_id, expires_at",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(record.map(ResetTokenRecord::to_domain))
    }

    async fn reset_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<User> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        delete_sessions_of(&mut tx, user_id).await?;
        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let sql = format!(
            "UPDATE users SET hashed_password = ?, updated_at = ? WHERE id = ? RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(hashed_password)
            .bind(Utc::now())
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .ok_or_else(|| PortError::NotFound(format!("user {}", user_id)))?
            .to_domain()?;

        tx.commit().await.map_err(db_error)?;
        Ok(user)
    }

    async fn create_role_request(&self, request: &RoleRequest) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO role_requests (id, user_id, role, status, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(request.id)
        .bind(request.user_id)
        .bind(request.role.as_str())
        .bind(request.status.as_str())
        .bind(request.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_role_request(&self, request_id: Uuid) -> PortResult<Option<RoleRequest>> {
        sqlx::query_as::<_, RoleRequestRecord>(
            "SELECT id, user_id, role, status, created_at FROM role_requests WHERE id = ?",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(RoleRequestRecord::to_domain)
        .transpose()
    }

    async fn list_pending_role_requests(&self) -> PortResult<Vec<RoleRequest>> {
        sqlx::query_as::<_, RoleRequestRecord>(
            "SELECT id, user_id, role, status, created_at FROM role_requests \
             WHERE status = 'pending' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(RoleRequestRecord::to_domain)
        .collect()
    }

    async fn decide_role_request(
        &self,
        request_id: Uuid,
        approve: bool,
    ) -> PortResult<RoleRequest> {
        let status = if approve {
            RoleRequestStatus::Approved
        } else {
            RoleRequestStatus::Rejected
        };

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let request = sqlx::query_as::<_, RoleRequestRecord>(
            "UPDATE role_requests SET status = ? WHERE id = ? AND status = 'pending' \
             RETURNING id, user_id, role, status, created_at",
        )
        .bind(status.as_str())
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?
        .ok_or_else(|| PortError::NotFound(format!("pending role request {}", request_id)))?
        .to_domain()?;

        if approve {
            set_role(&mut tx, request.user_id, request.role).await?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(request)
    }
}

//=========================================================================================
// `ContentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentStore for DbAdapter {
    async fn list_categories(&self) -> PortResult<Vec<Category>> {
        let records = sqlx::query_as::<_, CategoryRecord>(
            "SELECT id, name, created_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(records.into_iter().map(CategoryRecord::to_domain).collect())
    }

    async fn find_category(&self, category_id: Uuid) -> PortResult<Option<Category>> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            "SELECT id, name, created_at FROM categories WHERE id = ?",
        )
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(record.map(CategoryRecord::to_domain))
    }

    async fn create_category(&self, category: &Category) -> PortResult<()> {
        sqlx::query("INSERT INTO categories (id, name, created_at) VALUES (?, ?, ?)")
            .bind(category.id)
            .bind(&category.name)
            .bind(category.created_at)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn rename_category(&self, category_id: Uuid, name: &str) -> PortResult<Category> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            "UPDATE categories SET name = ? WHERE id = ? RETURNING id, name, created_at",
        )
        .bind(name)
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| PortError::NotFound(format!("category {}", category_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_category(&self, category_id: Uuid) -> PortResult<CategoryDeletion> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM categories WHERE id = ?")
            .bind(category_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?;
        if exists.is_none() {
            return Ok(CategoryDeletion::NotFound);
        }

        let recipes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes WHERE category_id = ?")
            .bind(category_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error)?;
        if recipes > 0 {
            return Ok(CategoryDeletion::ContainsRecipes);
        }

        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(category_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        Ok(CategoryDeletion::Deleted)
    }

    async fn find_recipes(&self, query: &RecipeQuery) -> PortResult<Vec<Recipe>> {
        let records = match query {
            RecipeQuery::ById(recipe_id) => {
                let sql = format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?");
                sqlx::query_as::<_, RecipeRecord>(&sql)
                    .bind(*recipe_id)
                    .fetch_all(&self.pool)
                    .await
            }
            RecipeQuery::List {
                category_id,
                page,
                per_page,
            } => {
                let sql = format!(
                    "SELECT {RECIPE_COLUMNS} FROM recipes WHERE (? IS NULL OR category_id = ?) \
                     ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
                );
                let offset = i64::from(page.saturating_sub(1)) * i64::from(*per_page);
                sqlx::query_as::<_, RecipeRecord>(&sql)
                    .bind(*category_id)
                    .bind(*category_id)
                    .bind(i64::from(*per_page))
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(db_error)?;

        Ok(records.into_iter().map(RecipeRecord::to_domain).collect())
    }

    async fn create_recipe(&self, recipe: &NewRecipe) -> PortResult<Recipe> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO recipes ({RECIPE_COLUMNS}) VALUES (?, ?, ?, ?, ?, NULL, ?, ?) \
             RETURNING {RECIPE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, RecipeRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(recipe.category_id)
            .bind(recipe.owner_id)
            .bind(&recipe.title)
            .bind(&recipe.description)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(record.to_domain())
    }

    async fn update_recipe(&self, recipe_id: Uuid, update: &RecipeUpdate) -> PortResult<Recipe> {
        let sql = format!(
            "UPDATE recipes SET category_id = COALESCE(?, category_id), \
             title = COALESCE(?, title), description = COALESCE(?, description), \
             image_url = COALESCE(?, image_url), updated_at = ? \
             WHERE id = ? RETURNING {RECIPE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, RecipeRecord>(&sql)
            .bind(update.category_id)
            .bind(&update.title)
            .bind(&update.description)
            .bind(&update.image_url)
            .bind(Utc::now())
            .bind(recipe_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| PortError::NotFound(format!("recipe {}", recipe_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_recipe(&self, recipe_id: Uuid) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = ?")
            .bind(recipe_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn recipe_sections(&self, recipe_id: Uuid) -> PortResult<Vec<SectionDetail>> {
        // One read transaction so the tree is a consistent snapshot.
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let sections = load_items(&mut tx, CollectionKind::Sections, recipe_id).await?;

        let mut details = Vec::with_capacity(sections.len());
        for section in sections {
            let ingredients = load_items(&mut tx, CollectionKind::Ingredients, section.id).await?;
            let instructions =
                load_items(&mut tx, CollectionKind::Instructions, section.id).await?;
            details.push(SectionDetail {
                section,
                ingredients,
                instructions,
            });
        }

        tx.commit().await.map_err(db_error)?;
        Ok(details)
    }

    async fn find_item(
        &self,
        kind: CollectionKind,
        item_id: Uuid,
    ) -> PortResult<Option<OrderedItem>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        load_item(&mut conn, kind, item_id).await
    }

    async fn list_items(
        &self,
        kind: CollectionKind,
        parent_id: Uuid,
    ) -> PortResult<Vec<OrderedItem>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        load_items(&mut conn, kind, parent_id).await
    }

    /// Rows of the parent missing from the plan are deleted. Rows that stay are
    /// updated in place so that anything hanging off them survives; they are
    /// first parked on negative positions so a reorder never trips the
    /// `(parent, position)` unique index half way through.
    async fn replace_items(
        &self,
        kind: CollectionKind,
        parent_id: Uuid,
        plan: &ReplacePlan,
    ) -> PortResult<Vec<OrderedItem>> {
        let t = tables(kind);
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let sql = format!("SELECT id FROM {} WHERE {} = ?", t.items, t.parent);
        let existing: HashSet<Uuid> = sqlx::query_scalar::<_, Uuid>(&sql)
            .bind(parent_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_error)?
            .into_iter()
            .collect();
        let kept: HashSet<Uuid> = plan.ids().filter(|id| existing.contains(id)).collect();

        let delete_sql = format!("DELETE FROM {} WHERE id = ?", t.items);
        for id in existing.difference(&kept) {
            sqlx::query(&delete_sql)
                .bind(*id)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        let move_sql = format!("UPDATE {} SET position = ? WHERE id = ?", t.items);
        for (index, row) in plan.rows.iter().enumerate() {
            if kept.contains(&row.id) {
                sqlx::query(&move_sql)
                    .bind(-1 - index as i64)
                    .bind(row.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error)?;
            }
        }

        let insert_sql = format!(
            "INSERT INTO {} (id, {}, position) VALUES (?, ?, ?)",
            t.items, t.parent
        );
        for row in &plan.rows {
            if kept.contains(&row.id) {
                sqlx::query(&move_sql)
                    .bind(row.position)
                    .bind(row.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error)?;
            } else {
                sqlx::query(&insert_sql)
                    .bind(row.id)
                    .bind(parent_id)
                    .bind(row.position)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error)?;
            }
        }

        let clear_sql = format!("DELETE FROM {} WHERE item_id = ?", t.translations);
        for row in plan.rows.iter().filter(|r| r.replaces_translations) {
            if kept.contains(&row.id) {
                sqlx::query(&clear_sql)
                    .bind(row.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error)?;
            }
        }
        insert_translations(&mut tx, kind, &plan.translations).await?;

        let items = load_items(&mut tx, kind, parent_id).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(items)
    }

    async fn append_item(
        &self,
        kind: CollectionKind,
        parent_id: Uuid,
        translations: &[Translation],
    ) -> PortResult<OrderedItem> {
        let t = tables(kind);
        let item_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let sql = format!(
            "INSERT INTO {items} (id, {parent}, position) \
             SELECT ?, ?, COALESCE(MAX(position) + 1, 0) FROM {items} WHERE {parent} = ?",
            items = t.items,
            parent = t.parent,
        );
        sqlx::query(&sql)
            .bind(item_id)
            .bind(parent_id)
            .bind(parent_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        let rows: Vec<(Uuid, Translation)> = translations
            .iter()
            .map(|t| (item_id, t.clone()))
            .collect();
        insert_translations(&mut tx, kind, &rows).await?;

        let item = load_item(&mut tx, kind, item_id)
            .await?
            .ok_or_else(|| PortError::Unexpected(format!("{} {} vanished", kind.as_str(), item_id)))?;
        tx.commit().await.map_err(db_error)?;
        Ok(item)
    }

    async fn delete_item(
        &self,
        kind: CollectionKind,
        parent_id: Uuid,
        item_id: Uuid,
    ) -> PortResult<bool> {
        let t = tables(kind);
        let sql = format!("DELETE FROM {} WHERE id = ? AND {} = ?", t.items, t.parent);
        let result = sqlx::query(&sql)
            .bind(item_id)
            .bind(parent_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}
