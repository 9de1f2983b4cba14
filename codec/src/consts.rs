// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

/// Largest `Remaining Length` a variable-byte integer can express in four bytes.
pub const MAX_PACKET_LEN: usize = 268_435_455;

/// MQTT 3.1.1 client identifiers longer than this MUST be rejected unless the
/// server documents support for longer ids; this implementation accepts longer
/// ids but callers map this constant into `AssignedClientIdentifier` decisions.
pub const DEFAULT_CLIENT_ID_LEN: usize = 23;
