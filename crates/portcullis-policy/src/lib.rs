pub mod config;
pub mod error;
pub mod gate;
pub mod matcher;
pub mod rules;
pub mod size;
pub mod store;

pub use config::{BodySizeLimit, PolicyConfig, PolicyFile, RemotePatternSpec};
pub use error::PolicyError;
pub use gate::{ActionRequest, Decision, ImageRequest, PolicyGate, RejectReason};
pub use matcher::{wildcard_label_match, HostPattern, PathPattern};
pub use rules::{ActionOriginRule, Protocol, RemotePatternRule};
pub use size::{parse_byte_size, UnitBase};
pub use store::PolicyStore;
