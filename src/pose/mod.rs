pub mod keypoint;

pub use keypoint::{average_confidence, Keypoint, KeypointId};
