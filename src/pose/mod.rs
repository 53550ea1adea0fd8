pub mod frame;
pub mod keypoint;
pub mod landmark;

pub use frame::{FrameInput, Side};
pub use keypoint::{ArmIndices, PoseFrame, PoseKeypoint, PoseKeypointIndex};
pub use landmark::{HandFrame, HandLandmarkIndex, Landmark};
