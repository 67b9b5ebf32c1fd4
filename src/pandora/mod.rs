pub mod device;
pub mod session;
pub mod source;
pub mod transport;
pub mod types;

use crate::core::config::PandoraCredentials;
use crate::core::errors::SourceError;
use crate::core::kernel::ReqwestRest;
use std::sync::Arc;

// Re-export main types for easier importing
pub use device::DeviceKey;
pub use session::{PartnerAuth, Session, SessionManager};
pub use source::PandoraSource;
pub use transport::{CallTokens, JsonTransport};

/// Create a session manager for the android device identity.
pub fn build_session_manager(
    credentials: PandoraCredentials,
) -> Result<SessionManager<ReqwestRest>, SourceError> {
    SessionManager::new(device::ANDROID, credentials)
}

/// Create the radio backend source on top of an existing session manager.
pub fn build_source(
    session: Arc<SessionManager<ReqwestRest>>,
) -> PandoraSource<ReqwestRest> {
    PandoraSource::new(session)
}
