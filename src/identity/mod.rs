//! Central identity resolution and authorization for echogate.
//! Keep the public surface thin and split implementation across sub-modules.

mod gate;
mod principal;
mod resolver;
mod session_id;

pub use gate::{admit, authorize, reason, ConnInfo, RequestIdentity};
pub use principal::{Capability, DisplayFields, Principal, Role};
pub use resolver::{
    extract_candidates, CredentialCandidates, ResolutionError, Resolver, ELEVATED_MODE_HEADER,
    ELEVATED_TOKEN_HEADER,
};
pub use session_id::{derive_session_id, SessionIdentifier};
