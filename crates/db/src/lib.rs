//! MongoDB provisioning target.
//!
//! [`MongoConnector`] turns [`DatabaseSettings`](dbseed_kernel::settings::DatabaseSettings)
//! into driver options and opens [`MongoSession`]s that implement the
//! kernel's ensure primitives with server commands.

mod connector;
mod error;
mod session;

pub use connector::{client_options, MongoConnector};
pub use session::MongoSession;
