//! Built-in pipeline stages.
//!
//! The standard pipeline a network controller builds:
//! ```text
//! Request → [TracingStage] → [NetworkShortcuts] → [RetryStage] → BlockNotFoundRewrite → gateway
//! ```

pub mod normalize;
pub mod retry;
pub mod trace;

pub use normalize::{BlockNotFoundRewrite, NetworkShortcuts};
pub use retry::RetryStage;
pub use trace::TracingStage;
