use crate::pipeline::FpsSnapshot;
use crate::registry::LinkState;

/// Notifications broadcast to the host
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Started,
    Stopped,
    DeviceDiscovered { id: String },
    DeviceStale { id: String },
    DeviceForgotten { id: String },
    LinkStateChanged(LinkState),
    Fps(FpsSnapshot),
    /// The link was lost while capturing, the host should restart the process
    RestartRequested,
    ConfigReloaded,
}
