// ABOUTME: External collaborators the orchestration core depends on.
// ABOUTME: One async trait per capability, injected through Platform.

mod capability;
mod compute;
mod dns;
mod events;
mod lock;
mod outcome;
mod playbook;
mod probe;

pub use capability::{CapabilityError, InstanceCapability, MonitoringController};
pub use compute::{ComputeError, ComputeProvider, VmState};
pub use dns::{DnsError, DnsProvider, DnsRecord, RecordType};
pub use events::{EventSink, LifecycleEvent, TracingEventSink};
pub use lock::{LockError, LockInfo, LockProvider, LockToken, MemoryLockProvider};
pub use outcome::DeleteOutcome;
pub use playbook::{
    CommandPlaybookRunner, PlaybookError, PlaybookResult, PlaybookRun, PlaybookRunner,
};
pub use probe::{ServerProbe, TcpProbe};
