// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::fmt;

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    IoError,
    EncodeError,
    DecodeError,
    SendError,
    ConfigError,
    SessionNotFound,
    ChannelError,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::IoError, &e.to_string())
    }
}

impl From<codec::DecodeError> for Error {
    fn from(e: codec::DecodeError) -> Self {
        Self::new(ErrorKind::DecodeError, &format!("{:?}", e))
    }
}

impl From<codec::EncodeError> for Error {
    fn from(e: codec::EncodeError) -> Self {
        Self::new(ErrorKind::EncodeError, &format!("{:?}", e))
    }
}

/// Generates a `From<mpsc::error::SendError<$cmd_type>>` impl for a command
/// enum routed over a `tokio::sync::mpsc` channel, so `?` can propagate
/// channel-closed conditions the same way I/O errors do.
macro_rules! convert_send_error {
    ($cmd_type:ty) => {
        impl From<mpsc::error::SendError<$cmd_type>> for Error {
            fn from(e: mpsc::error::SendError<$cmd_type>) -> Self {
                Self::new(ErrorKind::SendError, &e.to_string())
            }
        }
    };
}

pub(crate) use convert_send_error;
