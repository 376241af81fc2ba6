//! Boundary to the glasses service
//!
//! Everything the core needs from the native service goes through
//! [`HardwareService`]. Calls are blocking and may be made from any context;
//! callers serialise access per slot.

pub mod sim;
pub mod types;

use std::time::Duration;
use thiserror::Error;

pub use types::*;

/// Result codes the service can report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkError {
    #[error("service is not running")]
    NoService,

    #[error("I/O failure talking to the service")]
    IoFailure,

    #[error("target is not ready, try again")]
    TryAgain,

    #[error("service version is incompatible, upgrade required")]
    ServiceIncompatible,

    #[error("more results available than buffer space")]
    Overflow,

    #[error("timed out")]
    Timeout,

    #[error("invalid arguments")]
    InvalidArgs,

    #[error("target is unavailable")]
    Unavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl SdkError {
    /// Whether the error only means "not now" and should be retried silently
    pub fn is_transient(&self) -> bool {
        matches!(self, SdkError::NoService | SdkError::IoFailure | SdkError::TryAgain)
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

/// Operations offered by the glasses service
pub trait HardwareService: Send + Sync {
    /// Identifiers of all glasses currently visible to the service
    fn list_glasses(&self) -> SdkResult<Vec<String>>;

    fn create_glasses(&self, id: &str) -> SdkResult<GlassesHandle>;

    /// Request an exclusive reservation under the given application name
    fn reserve_glasses(&self, glasses: GlassesHandle, display_name: &str) -> SdkResult<()>;

    fn release_glasses(&self, glasses: GlassesHandle) -> SdkResult<()>;

    fn destroy_glasses(&self, glasses: GlassesHandle);

    fn connection_state(&self, glasses: GlassesHandle) -> SdkResult<ConnectionState>;

    /// Ask the service to make reserved glasses ready; `TryAgain` while waking up
    fn ensure_ready(&self, glasses: GlassesHandle) -> SdkResult<()>;

    fn float_param(&self, glasses: GlassesHandle, param: GlassesParam) -> SdkResult<f64>;

    fn glasses_pose(&self, glasses: GlassesHandle, usage: PoseUsage) -> SdkResult<GlassesPose>;

    fn configure_wand_stream(&self, glasses: GlassesHandle, config: WandStreamConfig) -> SdkResult<()>;

    /// Read one event; `Timeout` when the queue stays empty for `timeout`
    fn read_wand_stream(&self, glasses: GlassesHandle, timeout: Duration) -> SdkResult<WandStreamEvent>;

    /// Wands paired with the glasses
    ///
    /// At most [`MAX_WANDS_PER_GLASSES`] handles are returned; when more wands
    /// are paired the list is truncated instead of failing with `Overflow`.
    fn list_wands(&self, glasses: GlassesHandle) -> SdkResult<Vec<WandHandle>>;

    fn send_impulse(
        &self,
        glasses: GlassesHandle,
        wand: WandHandle,
        amplitude: f32,
        frequency: f32,
    ) -> SdkResult<()>;

    fn init_graphics_context(
        &self,
        glasses: GlassesHandle,
        api: GraphicsApi,
        device: Option<NativeDevice>,
    ) -> SdkResult<()>;

    fn send_frame(&self, glasses: GlassesHandle, frame: &FrameInfo) -> SdkResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SdkError::NoService.is_transient());
        assert!(SdkError::IoFailure.is_transient());
        assert!(SdkError::TryAgain.is_transient());
        assert!(!SdkError::ServiceIncompatible.is_transient());
        assert!(!SdkError::Timeout.is_transient());
        assert!(!SdkError::Internal("boom".into()).is_transient());
    }
}
