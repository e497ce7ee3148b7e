// ABOUTME: Compile-fail test verifying states of different state sets cannot be compared.
// ABOUTME: Both sets declare "terminated", yet the states are distinct types.

use hangar::resources::{AppServerStatus, ServerStatus};

fn main() {
    // ERROR: can't compare `AppServerStatus` with `ServerStatus`
    let _ = AppServerStatus::Terminated == ServerStatus::Terminated;
}
