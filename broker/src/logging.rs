// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Logging initialization.
//!
//! A console-only `log4rs` pipeline driven by the `loglevel` config
//! directive. Unlike the rolling-file setup this crate's ancestor used,
//! there is no log file path in this broker's configuration surface, so
//! only the console appender survives here.

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config as Log4rsConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::error::{Error, ErrorKind};

pub fn init(level: &str) -> Result<(), Error> {
    let level_filter = parse_level(level);

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{d} {h({l})} - {m}{n}")))
        .build();

    let config = Log4rsConfig::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level_filter))
        .map_err(|err| Error::new(ErrorKind::ConfigError, &err.to_string()))?;

    log4rs::init_config(config).map_err(|err| Error::new(ErrorKind::ConfigError, &err.to_string()))?;
    Ok(())
}

fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_uppercase().as_str() {
        "OFF" => LevelFilter::Off,
        "ERROR" => LevelFilter::Error,
        "WARN" => LevelFilter::Warn,
        "DEBUG" => LevelFilter::Debug,
        "TRACE" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}
