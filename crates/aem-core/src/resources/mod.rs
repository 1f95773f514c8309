//! Resource handles: thin, borrowed views over an [`AemClient`](crate::AemClient)
//! that fill in call parameters for one remote entity.

mod aem;
mod flush_agent;
mod package;
mod path;
mod repository;
mod user;

pub use aem::Aem;
pub use flush_agent::FlushAgent;
pub use package::{Package, PackageIdentity};
pub use path::Path;
pub use repository::Repository;
pub use user::User;
