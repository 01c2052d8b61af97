//! Access token and device id generation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;

/// Length of generated device ids.
const DEVICE_ID_LEN: usize = 10;

/// Generate an opaque random token with the given prefix.
pub fn generate_opaque_token(prefix: &str, bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(&buf))
}

pub fn generate_access_token() -> String {
    generate_opaque_token("syt", 32)
}

/// Device id for clients that log in without naming their device.
pub fn generate_device_id() -> String {
    let mut rng = rand::thread_rng();
    (0..DEVICE_ID_LEN)
        .map(|_| rng.gen_range(b'A'..=b'Z') as char)
        .collect()
}
