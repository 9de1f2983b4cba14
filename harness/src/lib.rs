// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Model-based conformance test harness for the broker: a trace tree that
//! avoids repeating already-explored action sequences, an action/observation
//! model of the MQTT wire surface, a minimal real-socket test client, and
//! per-conformance-clause coverage accounting.

pub mod client;
pub mod coverage;
pub mod executor;
pub mod explorer;
pub mod minimizer;
pub mod model;
pub mod trace;

pub use client::MqttTestClient;
pub use coverage::CoverageTracker;
pub use executor::Executor;
pub use model::{Action, Observation};
pub use trace::Traces;
