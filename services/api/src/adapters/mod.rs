pub mod cache;
pub mod catalog;
pub mod db;
pub mod google;
pub mod images;
pub mod mailer;

pub use cache::MemoryCache;
pub use catalog::Catalog;
pub use db::DbAdapter;
pub use google::GoogleOAuth;
pub use images::DiskImageStore;
pub use mailer::{LogMailer, ResendMailer};
