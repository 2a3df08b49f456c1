//! Blendshape naming - ARKit-style labels for expression components
//!
//! The expression network emits 52 unnamed weights. Their order follows the
//! ARKit face-tracking convention so downstream consumers can address them by
//! name and group them by facial region.

use aria_core::EXPRESSION_DIM;

/// Blendshape labels in network output order
pub const BLENDSHAPE_NAMES: [&str; EXPRESSION_DIM] = [
    "eyeBlinkLeft",
    "eyeLookDownLeft",
    "eyeLookInLeft",
    "eyeLookOutLeft",
    "eyeLookUpLeft",
    "eyeSquintLeft",
    "eyeWideLeft",
    "eyeBlinkRight",
    "eyeLookDownRight",
    "eyeLookInRight",
    "eyeLookOutRight",
    "eyeLookUpRight",
    "eyeSquintRight",
    "eyeWideRight",
    "jawForward",
    "jawLeft",
    "jawRight",
    "jawOpen",
    "mouthClose",
    "mouthFunnel",
    "mouthPucker",
    "mouthLeft",
    "mouthRight",
    "mouthSmileLeft",
    "mouthSmileRight",
    "mouthFrownLeft",
    "mouthFrownRight",
    "mouthDimpleLeft",
    "mouthDimpleRight",
    "mouthStretchLeft",
    "mouthStretchRight",
    "mouthRollLower",
    "mouthRollUpper",
    "mouthShrugLower",
    "mouthShrugUpper",
    "mouthPressLeft",
    "mouthPressRight",
    "mouthLowerDownLeft",
    "mouthLowerDownRight",
    "mouthUpperUpLeft",
    "mouthUpperUpRight",
    "browDownLeft",
    "browDownRight",
    "browInnerUp",
    "browOuterUpLeft",
    "browOuterUpRight",
    "cheekPuff",
    "cheekSquintLeft",
    "cheekSquintRight",
    "noseSneerLeft",
    "noseSneerRight",
    "tongueOut",
];

/// Coarse facial region a blendshape drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacialRegion {
    LeftEye,
    RightEye,
    Jaw,
    Mouth,
    Brow,
    Cheek,
    Nose,
    Tongue,
}

/// Index of a blendshape by name
pub fn blendshape_index(name: &str) -> Option<usize> {
    BLENDSHAPE_NAMES.iter().position(|n| *n == name)
}

/// Region driven by the blendshape at `index`
pub fn region_of(index: usize) -> Option<FacialRegion> {
    let region = match index {
        0..=6 => FacialRegion::LeftEye,
        7..=13 => FacialRegion::RightEye,
        14..=17 => FacialRegion::Jaw,
        18..=40 => FacialRegion::Mouth,
        41..=45 => FacialRegion::Brow,
        46..=48 => FacialRegion::Cheek,
        49..=50 => FacialRegion::Nose,
        51 => FacialRegion::Tongue,
        _ => return None,
    };
    Some(region)
}
