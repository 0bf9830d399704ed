pub mod joint;

pub use joint::{Frame, Joint, JointIndex, PoseFrame};
