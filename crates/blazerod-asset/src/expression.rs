/// Well-known expressions a morph can be recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionTag {
    Blink,
    BlinkLeft,
    BlinkRight,
    Aa,
    Ih,
    Ou,
    Ee,
    Oh,
    Happy,
    Angry,
    Sad,
    Surprised,
}

const EXPRESSION_NAMES: &[(ExpressionTag, &[&str])] = &[
    (ExpressionTag::Blink, &["まばたき", "blink"]),
    (ExpressionTag::BlinkLeft, &["ウィンク", "wink", "blink_l"]),
    (ExpressionTag::BlinkRight, &["ウィンク右", "wink_r", "blink_r"]),
    (ExpressionTag::Aa, &["あ", "a"]),
    (ExpressionTag::Ih, &["い", "i"]),
    (ExpressionTag::Ou, &["う", "u"]),
    (ExpressionTag::Ee, &["え", "e"]),
    (ExpressionTag::Oh, &["お", "o"]),
    (ExpressionTag::Happy, &["笑い", "smile", "happy"]),
    (ExpressionTag::Angry, &["怒り", "angry"]),
    (ExpressionTag::Sad, &["困る", "sad"]),
    (ExpressionTag::Surprised, &["びっくり", "surprised"]),
];

impl ExpressionTag {
    pub fn from_name(name: &str) -> Option<Self> {
        EXPRESSION_NAMES
            .iter()
            .find(|(_, names)| names.contains(&name))
            .map(|(tag, _)| *tag)
    }

    /// Match the local name first, then the universal one.
    pub fn from_names(local: &str, universal: &str) -> Option<Self> {
        Self::from_name(local).or_else(|| Self::from_name(universal))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MorphTargetBinding {
    pub primitive_index: usize,
    pub target_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupTarget {
    pub expression_index: usize,
    pub influence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionAsset {
    /// Drives morph targets of one or more primitives directly.
    Target {
        name: Option<String>,
        tag: Option<ExpressionTag>,
        bindings: Vec<MorphTargetBinding>,
    },
    /// Drives previously defined expressions, each scaled by its influence.
    Group {
        name: Option<String>,
        tag: Option<ExpressionTag>,
        targets: Vec<GroupTarget>,
    },
}

impl ExpressionAsset {
    pub fn name(&self) -> Option<&str> {
        match self {
            ExpressionAsset::Target { name, .. } | ExpressionAsset::Group { name, .. } => {
                name.as_deref()
            }
        }
    }

    pub fn tag(&self) -> Option<ExpressionTag> {
        match self {
            ExpressionAsset::Target { tag, .. } | ExpressionAsset::Group { tag, .. } => *tag,
        }
    }
}
