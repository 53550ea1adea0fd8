pub mod aggregate;
pub mod finger;
pub mod geometry;
pub mod laterality;
pub mod session;
pub mod temporal;
pub mod wrist;

pub use aggregate::{FrameOutcome, FrameStats, SessionAggregator, SessionRomReport, SkipReason, WristReport};
pub use finger::{compute_finger_angles, Finger, FingerAngles, FingerJoint};
pub use laterality::{decide_side, Laterality, LateralityState, LockedArm, SideDecision};
pub use session::{JointKey, Session};
pub use temporal::{JointHistory, JointSummary, TemporalValidator, Verdict};
pub use wrist::{WristAngles, WristCalculator};
