pub mod authz;
pub mod domain;
pub mod ordering;
pub mod ports;
pub mod session;

pub use authz::AccessError;
pub use domain::{
    AuthSession, Category, EmailVerificationCode, OAuthAccount, OAuthProfile, OrderedItem,
    PasswordResetToken, Recipe, RecipeQuery, Role, RoleRequest, RoleRequestStatus, Translation,
    User,
};
pub use ordering::{CollectionKind, ItemInput, PlanError, ReplacePlan};
pub use ports::{
    ContentStore, CredentialStore, ImageStore, Mailer, OAuthProvider, PortError, PortResult,
    ResponseCache, Translator,
};
pub use session::{SessionPolicy, SessionStatus};
