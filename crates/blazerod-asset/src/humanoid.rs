/// Standard humanoid bones that a node can be tagged as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HumanoidTag {
    Center,
    Hips,
    Spine,
    Chest,
    Neck,
    Head,
    LeftEye,
    RightEye,
    LeftShoulder,
    LeftUpperArm,
    LeftLowerArm,
    LeftHand,
    RightShoulder,
    RightUpperArm,
    RightLowerArm,
    RightHand,
    LeftUpperLeg,
    LeftLowerLeg,
    LeftFoot,
    LeftToes,
    RightUpperLeg,
    RightLowerLeg,
    RightFoot,
    RightToes,
}

// Bone names used by the standard MMD skeleton.
const PMX_BONE_NAMES: &[(&str, HumanoidTag)] = &[
    ("センター", HumanoidTag::Center),
    ("下半身", HumanoidTag::Hips),
    ("上半身", HumanoidTag::Spine),
    ("上半身2", HumanoidTag::Chest),
    ("首", HumanoidTag::Neck),
    ("頭", HumanoidTag::Head),
    ("左目", HumanoidTag::LeftEye),
    ("右目", HumanoidTag::RightEye),
    ("左肩", HumanoidTag::LeftShoulder),
    ("左腕", HumanoidTag::LeftUpperArm),
    ("左ひじ", HumanoidTag::LeftLowerArm),
    ("左手首", HumanoidTag::LeftHand),
    ("右肩", HumanoidTag::RightShoulder),
    ("右腕", HumanoidTag::RightUpperArm),
    ("右ひじ", HumanoidTag::RightLowerArm),
    ("右手首", HumanoidTag::RightHand),
    ("左足", HumanoidTag::LeftUpperLeg),
    ("左ひざ", HumanoidTag::LeftLowerLeg),
    ("左足首", HumanoidTag::LeftFoot),
    ("左つま先", HumanoidTag::LeftToes),
    ("右足", HumanoidTag::RightUpperLeg),
    ("右ひざ", HumanoidTag::RightLowerLeg),
    ("右足首", HumanoidTag::RightFoot),
    ("右つま先", HumanoidTag::RightToes),
];

impl HumanoidTag {
    pub fn from_pmx_bone_name(name: &str) -> Option<Self> {
        PMX_BONE_NAMES
            .iter()
            .find(|(bone_name, _)| *bone_name == name)
            .map(|(_, tag)| *tag)
    }
}

#[cfg(test)]
mod test {
    use super::HumanoidTag;

    #[test]
    fn test_bone_names() {
        assert_eq!(HumanoidTag::from_pmx_bone_name("頭"), Some(HumanoidTag::Head));
        assert_eq!(
            HumanoidTag::from_pmx_bone_name("左ひざ"),
            Some(HumanoidTag::LeftLowerLeg)
        );
        assert_eq!(HumanoidTag::from_pmx_bone_name("髪1"), None);
    }
}
