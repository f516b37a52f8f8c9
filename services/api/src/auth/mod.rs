pub mod cookies;
pub mod flows;
pub mod password;
pub mod redirect;
pub mod sessions;
pub mod tokens;

pub use flows::AuthFlows;
pub use sessions::SessionManager;
