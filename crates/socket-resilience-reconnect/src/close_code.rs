//! Close status codes shared with the underlying transport protocol.
//!
//! Values follow RFC 6455 section 7.4 bit for bit.

/// Normal, intentional closure. Never triggers a reconnect.
pub const NORMAL: u16 = 1000;

/// Reported when a close frame carried no status code.
pub const NO_STATUS: u16 = 1005;

/// Reported when the connection dropped without a close frame.
pub const ABNORMAL: u16 = 1006;

/// Used by the supervisor to force-close a stalled connection attempt.
///
/// Taken from the 4000-4999 range reserved for private application use, so it
/// cannot collide with protocol-defined codes.
pub const CONNECT_TIMEOUT: u16 = 4000;

/// Returns true if an application may pass `code` to a close call.
///
/// Mirrors the browser rule: 1000, or anything in 3000..=4999.
pub fn is_valid_application_code(code: u16) -> bool {
    code == NORMAL || (3000..=4999).contains(&code)
}

/// Returns true if `code` signals an intentional closure.
pub fn is_normal(code: u16) -> bool {
    code == NORMAL
}
