/// Constant-time operations to prevent timing attacks
///
/// MACs, tokens and password hashes must never be compared with `==`.
use subtle::ConstantTimeEq;

/// Constant-time comparison of byte slices
///
/// # Example
///
/// ```rust
/// use crypto::constant_time::ct_eq;
///
/// assert!(ct_eq(b"mac-bytes", b"mac-bytes"));
/// assert!(!ct_eq(b"mac-bytes", b"mac-bytez"));
/// ```
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    // Length is not secret
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
