// ABOUTME: Compile-fail test verifying configure() is unavailable before the server is ready.
// ABOUTME: This test should fail to compile, validating the provisioning type states.

use hangar::lifecycle::Provisioning;
use hangar::lifecycle::stage::ServerLaunched;

async fn skip_waiting(provisioning: Provisioning<'_, ServerLaunched>) {
    // ERROR: no method named `configure` found for `Provisioning<'_, ServerLaunched>`
    let _ = provisioning.configure().await;
}

fn main() {
    let _ = skip_waiting;
}
