use serde::{Deserialize, Serialize};

/// BlazePose の 33 ランドマークインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum JointIndex {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl JointIndex {
    pub const COUNT: usize = 33;

    /// Joints every exercise metric is computed from
    pub const REQUIRED: [JointIndex; 12] = [
        JointIndex::LeftShoulder,
        JointIndex::RightShoulder,
        JointIndex::LeftElbow,
        JointIndex::RightElbow,
        JointIndex::LeftWrist,
        JointIndex::RightWrist,
        JointIndex::LeftHip,
        JointIndex::RightHip,
        JointIndex::LeftKnee,
        JointIndex::RightKnee,
        JointIndex::LeftAnkle,
        JointIndex::RightAnkle,
    ];
}

/// 単一ジョイント
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Joint {
    /// 正規化されたX座標 (0.0〜1.0)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0, 下が正)
    pub y: f32,
    /// 腰中心を基準とした相対深度
    #[serde(default)]
    pub z: f32,
}

impl Joint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// 2D座標 (x, y)
    pub fn xy(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// 1フレーム分の検出済み姿勢
///
/// The estimator always hands over the full landmark set, but frames coming
/// off the wire are not trusted: short sets and non-finite coordinates read
/// as missing joints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseFrame {
    joints: Vec<Joint>,
}

/// One captured image: a pose, or `None` when nothing was detected
pub type Frame = Option<PoseFrame>;

impl PoseFrame {
    pub fn new(joints: [Joint; JointIndex::COUNT]) -> Self {
        Self {
            joints: joints.to_vec(),
        }
    }

    pub fn from_joints(joints: Vec<Joint>) -> Self {
        Self { joints }
    }

    /// インデックスでジョイントを取得
    pub fn get(&self, index: JointIndex) -> Option<&Joint> {
        self.joints
            .get(index as usize)
            .filter(|joint| joint.is_finite())
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// 必須ジョイントがすべて揃っているか
    pub fn has_required_joints(&self) -> bool {
        JointIndex::REQUIRED.iter().all(|&idx| self.get(idx).is_some())
    }

    /// 左右ヒップ中点の高さ (正規化Y)
    pub fn hip_height(&self) -> Option<f32> {
        let left = self.get(JointIndex::LeftHip)?;
        let right = self.get(JointIndex::RightHip)?;
        Some((left.y + right.y) / 2.0)
    }

    /// Resolve three joints at once, e.g. shoulder-elbow-wrist
    pub fn triple(
        &self,
        a: JointIndex,
        b: JointIndex,
        c: JointIndex,
    ) -> Option<(&Joint, &Joint, &Joint)> {
        Some((self.get(a)?, self.get(b)?, self.get(c)?))
    }
}

impl Default for PoseFrame {
    fn default() -> Self {
        Self::new([Joint::default(); JointIndex::COUNT])
    }
}
