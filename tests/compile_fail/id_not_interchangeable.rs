// ABOUTME: Compile-fail test verifying AppServerId and InstanceId are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use hangar::types::{AppServerId, InstanceId};

fn takes_instance_id(_id: InstanceId) {}

fn main() {
    let appserver_id = AppServerId::new(7);
    takes_instance_id(appserver_id); // ERROR: expected InstanceId, found AppServerId
}
