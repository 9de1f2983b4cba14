// Copyright (c) 2024 mqttd contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Spawns the actual broker binary as a subprocess so the conformance
//! scenarios run against a real listener instead of the in-process
//! plumbing `broker/tests` uses. `mqttd` has no remote stop command, so
//! unlike a config-driven graceful shutdown this just kills the process
//! on drop.

use std::path::PathBuf;
use std::process::{Child, Command};
use std::thread::sleep;
use std::time::Duration;

pub struct Server {
    child: Child,
}

impl Server {
    /// Starts `mqttd` listening on `port` and gives it a moment to bind
    /// before returning.
    pub fn start(port: u16) -> Self {
        let exec_file = Self::get_exec_file();
        let child = Command::new(exec_file)
            .args(["--port", &port.to_string()])
            .spawn()
            .expect("failed to spawn mqttd");
        sleep(Duration::from_millis(200));
        Self { child }
    }

    fn get_exec_file() -> PathBuf {
        const IN_CURR_DIR: &str = "./target/debug/mqttd";
        const IN_PARENT_DIR: &str = "../target/debug/mqttd";
        let path = PathBuf::from(IN_CURR_DIR);
        if path.exists() {
            return path;
        }
        let path = PathBuf::from(IN_PARENT_DIR);
        if path.exists() {
            return path;
        }
        panic!("mqttd binary not found; make sure the broker crate is built first");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
