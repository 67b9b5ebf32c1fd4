use crate::core::config::PandoraCredentials;
use crate::core::errors::SourceError;
use crate::core::kernel::{BlowfishCodec, ReqwestRest, RestClient};
use crate::pandora::device::DeviceKey;
use crate::pandora::transport::{CallTokens, JsonTransport};
use crate::pandora::types::{PartnerLoginResponse, UserLoginResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

/// The server prepends four garbage characters to the decrypted sync time.
const SYNC_TIME_PREFIX_LEN: usize = 4;

/// An established protocol session. Immutable: a refresh replaces the whole
/// value, callers only ever hold an `Arc` handle.
#[derive(Debug, Clone)]
pub struct Session {
    /// Difference between the server clock and the local clock, in seconds.
    /// `local_now + sync_time_offset` reproduces the server's time.
    pub sync_time_offset: i64,
    pub partner_id: String,
    pub partner_auth_token: String,
    pub user_auth_token: String,
    pub user_id: String,
}

impl Session {
    /// Synchronized timestamp for an authenticated request.
    pub fn synced_time(&self, local_now: i64) -> i64 {
        local_now + self.sync_time_offset
    }
}

/// Intermediate state after the partner (device) handshake step.
#[derive(Debug, Clone)]
pub struct PartnerAuth {
    pub partner_id: String,
    pub partner_auth_token: String,
    pub sync_time_offset: i64,
}

type ClockFn = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Drives the two-step login handshake and owns the current [`Session`].
///
/// State machine: unauthenticated -> partner-authenticated ->
/// user-authenticated; a token-expiry signal (protocol code 1001) moves the
/// manager back through a single-flight re-login.
pub struct SessionManager<R: RestClient> {
    transport: JsonTransport<R>,
    device: DeviceKey,
    credentials: PandoraCredentials,
    decoder: BlowfishCodec,
    clock: ClockFn,
    current: RwLock<Option<Arc<Session>>>,
    /// Serializes re-authentication so racing callers coalesce into one
    /// in-flight login.
    refresh_gate: Mutex<()>,
}

impl SessionManager<ReqwestRest> {
    /// Create a manager for `device` against the production endpoint.
    pub fn new(device: DeviceKey, credentials: PandoraCredentials) -> Result<Self, SourceError> {
        let transport = JsonTransport::new(&device)?;
        Self::from_parts(transport, device, credentials)
    }

    /// Create a manager against a custom endpoint (tests, proxies).
    pub fn with_endpoint(
        device: DeviceKey,
        credentials: PandoraCredentials,
        endpoint: String,
    ) -> Result<Self, SourceError> {
        let transport = JsonTransport::with_endpoint(&device, endpoint)?;
        Self::from_parts(transport, device, credentials)
    }
}

impl<R: RestClient> SessionManager<R> {
    /// Assemble a manager from an existing transport (dependency injection
    /// for tests).
    pub fn from_parts(
        transport: JsonTransport<R>,
        device: DeviceKey,
        credentials: PandoraCredentials,
    ) -> Result<Self, SourceError> {
        let decoder = BlowfishCodec::new(device.decrypt_key)?;
        Ok(Self {
            transport,
            device,
            credentials,
            decoder,
            clock: Arc::new(system_clock),
            current: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        })
    }

    /// Replace the local-clock source (deterministic offsets in tests).
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    /// Step one of the handshake: authenticate the device identity and
    /// compute the clock offset from the encrypted server time.
    #[instrument(skip(self))]
    pub async fn partner_login(&self) -> Result<PartnerAuth, SourceError> {
        let payload = json!({
            "username": self.device.username,
            "password": self.device.password,
            "deviceModel": self.device.device_model,
            "version": "5",
        });

        let result = self
            .transport
            .call("auth.partnerLogin", &CallTokens::anonymous(), payload, false)
            .await
            .map_err(|e| SourceError::PartnerLogin(e.to_string()))?;

        let response: PartnerLoginResponse = serde_json::from_value(result)
            .map_err(|e| SourceError::PartnerLogin(format!("malformed response: {}", e)))?;

        let sync_time_offset = self.decode_sync_offset(&response.sync_time)?;
        debug!(sync_time_offset, "partner login complete");

        Ok(PartnerAuth {
            partner_id: response.partner_id,
            partner_auth_token: response.partner_auth_token,
            sync_time_offset,
        })
    }

    /// Decrypt the server's `syncTime`, strip the garbage prefix, and derive
    /// the clock offset. Recomputed fresh on every login - the offset is not
    /// assumed stable across process restarts.
    fn decode_sync_offset(&self, sync_time_ciphertext: &str) -> Result<i64, SourceError> {
        let clear = self
            .decoder
            .decrypt_hex(sync_time_ciphertext)
            .map_err(|e| SourceError::PartnerLogin(format!("sync time: {}", e)))?;

        let digits = clear.get(SYNC_TIME_PREFIX_LEN..).ok_or_else(|| {
            SourceError::PartnerLogin(format!("sync time too short: {} chars", clear.len()))
        })?;
        let server_time: i64 = digits.trim().parse().map_err(|e| {
            SourceError::PartnerLogin(format!("sync time is not numeric: {}", e))
        })?;

        Ok(server_time - self.now())
    }

    /// Step two of the handshake: authenticate the user over the encrypted
    /// channel established by the partner step.
    #[instrument(skip(self, partner))]
    pub async fn user_login(&self, partner: &PartnerAuth) -> Result<Arc<Session>, SourceError> {
        let payload = json!({
            "loginType": "user",
            "username": self.credentials.username,
            "password": self.credentials.password(),
            "partnerAuthToken": partner.partner_auth_token,
            "syncTime": self.now() + partner.sync_time_offset,
        });

        let tokens = CallTokens::partner(&partner.partner_id, &partner.partner_auth_token);
        let result = self
            .transport
            .call("auth.userLogin", &tokens, payload, true)
            .await
            .map_err(|e| SourceError::UserLogin(e.to_string()))?;

        let response: UserLoginResponse = serde_json::from_value(result)
            .map_err(|e| SourceError::UserLogin(format!("malformed response: {}", e)))?;

        let session = Arc::new(Session {
            sync_time_offset: partner.sync_time_offset,
            partner_id: partner.partner_id.clone(),
            partner_auth_token: partner.partner_auth_token.clone(),
            user_auth_token: response.user_auth_token,
            user_id: response.user_id,
        });

        *self.current.write().await = Some(session.clone());
        info!(user_id = %session.user_id, "user login complete");
        Ok(session)
    }

    /// Run the full two-step handshake and store the resulting session.
    pub async fn login(&self) -> Result<Arc<Session>, SourceError> {
        let partner = self.partner_login().await?;
        self.user_login(&partner).await
    }

    /// Current session handle, or a session error when unauthenticated.
    pub async fn session(&self) -> Result<Arc<Session>, SourceError> {
        self.current
            .read()
            .await
            .clone()
            .ok_or_else(|| SourceError::Session("not authenticated, call login first".to_string()))
    }

    /// Seed the manager from a persisted session without a handshake
    /// (credential-store collaborator hook). The session is trusted until the
    /// backend rejects its token.
    pub async fn restore(&self, session: Session) {
        *self.current.write().await = Some(Arc::new(session));
    }

    /// Drop the current session.
    pub async fn logout(&self) {
        *self.current.write().await = None;
    }

    /// Re-authenticate after `stale` was rejected. Concurrent callers
    /// coalesce: whoever enters first runs the login, the rest observe the
    /// already-replaced session and return it untouched.
    pub async fn refresh(&self, stale: &Arc<Session>) -> Result<Arc<Session>, SourceError> {
        let _gate = self.refresh_gate.lock().await;

        if let Some(current) = self.current.read().await.as_ref() {
            if !Arc::ptr_eq(current, stale) {
                debug!("session already refreshed by a concurrent caller");
                return Ok(current.clone());
            }
        }

        info!("session expired, re-authenticating");
        self.login().await
    }

    /// Issue one protocol call under `session`.
    pub async fn call_with(
        &self,
        session: &Session,
        method: &str,
        payload: Value,
        encrypted: bool,
    ) -> Result<Value, SourceError> {
        let tokens = CallTokens {
            partner_id: Some(&session.partner_id),
            auth_token: Some(&session.user_auth_token),
            user_id: Some(&session.user_id),
            user_auth_token: Some(&session.user_auth_token),
            sync_time: Some(session.synced_time(self.now())),
        };
        self.transport.call(method, &tokens, payload, encrypted).await
    }

    /// Session-aware call wrapper: on the well-known invalid-auth-token code
    /// it performs exactly one coalesced re-login and one retry of the
    /// original call. Every other error - and a second expiry - propagates
    /// unchanged, so persistently invalid credentials cannot loop.
    #[instrument(skip(self, payload), fields(method = %method))]
    pub async fn call_with_reauth(
        &self,
        method: &str,
        payload: Value,
        encrypted: bool,
    ) -> Result<Value, SourceError> {
        let session = self.session().await?;
        match self.call_with(&session, method, payload.clone(), encrypted).await {
            Err(e) if e.is_invalid_auth_token() => {
                let fresh = self.refresh(&session).await?;
                self.call_with(&fresh, method, payload, encrypted).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pandora::device;

    fn manager() -> SessionManager<ReqwestRest> {
        SessionManager::new(
            device::ANDROID,
            PandoraCredentials::new("user@example.com".into(), "pw".into()),
        )
        .unwrap()
        .with_clock(|| 1_000_000)
    }

    #[test]
    fn sync_offset_is_deterministic_for_fixed_inputs() {
        let mgr = manager();
        // Build the fixture the way the server would: garbage prefix plus the
        // server unix time, encrypted with the device decrypt key.
        let encoder = BlowfishCodec::new(device::ANDROID.decrypt_key).unwrap();
        let ciphertext = encoder.encrypt_hex("ABCD1000042").unwrap();

        let offset = mgr.decode_sync_offset(&ciphertext).unwrap();
        assert_eq!(offset, 42);
        // Re-running yields the identical offset.
        assert_eq!(mgr.decode_sync_offset(&ciphertext).unwrap(), 42);
    }

    #[test]
    fn sync_offset_rejects_garbage() {
        let mgr = manager();
        assert!(matches!(
            mgr.decode_sync_offset("not-hex"),
            Err(SourceError::PartnerLogin(_))
        ));

        let encoder = BlowfishCodec::new(device::ANDROID.decrypt_key).unwrap();
        let too_short = encoder.encrypt_hex("AB").unwrap();
        assert!(matches!(
            mgr.decode_sync_offset(&too_short),
            Err(SourceError::PartnerLogin(_))
        ));

        let not_numeric = encoder.encrypt_hex("ABCDxyz").unwrap();
        assert!(matches!(
            mgr.decode_sync_offset(&not_numeric),
            Err(SourceError::PartnerLogin(_))
        ));
    }

    #[tokio::test]
    async fn session_accessor_requires_login() {
        let mgr = manager();
        assert!(matches!(
            mgr.session().await,
            Err(SourceError::Session(_))
        ));

        mgr.restore(Session {
            sync_time_offset: 7,
            partner_id: "42".into(),
            partner_auth_token: "PAT".into(),
            user_auth_token: "UAT".into(),
            user_id: "u1".into(),
        })
        .await;

        let session = mgr.session().await.unwrap();
        assert_eq!(session.synced_time(100), 107);

        mgr.logout().await;
        assert!(mgr.session().await.is_err());
    }
}
