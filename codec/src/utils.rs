// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

#[derive(Debug)]
pub enum StringError {
    InvalidUtf8,
    ContainsNul,
}

/// Validates and converts a byte slice into a `String`, rejecting embedded
/// NUL (U+0000), which MQTT forbids in all UTF-8 encoded strings [MQTT-1.5.4-2].
pub fn to_utf8_string(bytes: &[u8]) -> Result<String, StringError> {
    let s = String::from_utf8(bytes.to_vec()).map_err(|_| StringError::InvalidUtf8)?;
    if s.contains('\u{0000}') {
        return Err(StringError::ContainsNul);
    }
    Ok(s)
}

/// Generates a random client id, used when a client connects with an empty
/// id and `cleanStart=true` and asks the server to assign one.
pub fn random_client_id() -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(22)
        .map(char::from)
        .collect();
    format!("mqttd-{}", suffix)
}
