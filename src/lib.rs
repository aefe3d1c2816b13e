pub mod config;
pub mod error;
pub mod management;
pub mod methods;
pub mod model;
pub mod policy;
pub mod schema;
pub mod store;

pub use error::{AclError, AclResult};
pub use management::{ManagementApi, ManagementCall, ManagementResponse};
pub use methods::MethodSet;
pub use policy::{AccessPolicy, AclLookup, Decision, InboundEvent};
pub use store::{AclStore, KindVerdict, ListCounts};
