/// Static credential bundle identifying the client device type.
///
/// The backend authenticates the *partner* (device model) before any
/// user-specific call. The two Blowfish keys are asymmetric in purpose:
/// `encrypt_key` signs outbound payloads, `decrypt_key` decodes the server's
/// `syncTime` value.
#[derive(Debug, Clone, Copy)]
pub struct DeviceKey {
    pub username: &'static str,
    pub password: &'static str,
    pub device_model: &'static str,
    pub encrypt_key: &'static [u8],
    pub decrypt_key: &'static [u8],
}

/// The public android partner identity.
pub const ANDROID: DeviceKey = DeviceKey {
    username: "android",
    password: "AC7IBG09A3DTSYM4R41UJWL07VLN8JI7",
    device_model: "android-generic",
    encrypt_key: b"6#26FRL$ZWD",
    decrypt_key: b"R=U!LH$O2B#",
};
