//! Test support utilities for eyestate.
//!
//! Provides mocks for every port, synthetic eyes and frames, and zero-weight
//! model files for exercising the capture pipeline without a camera.
//!
//! # Example
//!
//! ```
//! use eyestate_test_support::{DeviceBuilder, MockCameraProvider, SyntheticEyes};
//!
//! let provider = MockCameraProvider::new(DeviceBuilder::phone());
//! let bundle = SyntheticEyes::bundle(5);
//! assert_eq!(bundle.len(), 5);
//! ```

mod builders;
mod mocks;

pub use builders::{DeviceBuilder, SyntheticEyes, ZeroModel};
pub use mocks::{
    CallLog, ExtractorMode, MockBehavior, MockCameraProvider, MockDevice, MockDisplay,
    MockExtractor, MockFrameReader, MockHost, MockListener, MockNavigator, MockStateSink,
    MockStreamingSession,
};
