use std::fmt::{self, Display, Formatter};

use glam::Mat4;

use crate::{humanoid::HumanoidTag, node::NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinLengthMismatch {
    pub joints: usize,
    pub inverse_bind_matrices: usize,
    pub humanoid_tags: usize,
}

impl Display for SkinLengthMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Skin has {} joints, {} inverse bind matrices and {} humanoid tags",
            self.joints, self.inverse_bind_matrices, self.humanoid_tags
        )
    }
}

impl std::error::Error for SkinLengthMismatch {}

#[derive(Debug, Clone)]
pub struct SkinAsset {
    name: Option<String>,
    joints: Vec<NodeId>,
    inverse_bind_matrices: Vec<Mat4>,
    humanoid_tags: Vec<Option<HumanoidTag>>,
}

impl SkinAsset {
    pub fn new(
        name: Option<String>,
        joints: Vec<NodeId>,
        inverse_bind_matrices: Vec<Mat4>,
        humanoid_tags: Vec<Option<HumanoidTag>>,
    ) -> Result<Self, SkinLengthMismatch> {
        if joints.len() != inverse_bind_matrices.len() || joints.len() != humanoid_tags.len() {
            return Err(SkinLengthMismatch {
                joints: joints.len(),
                inverse_bind_matrices: inverse_bind_matrices.len(),
                humanoid_tags: humanoid_tags.len(),
            });
        }
        Ok(Self {
            name,
            joints,
            inverse_bind_matrices,
            humanoid_tags,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn joints(&self) -> &[NodeId] {
        &self.joints
    }

    pub fn inverse_bind_matrices(&self) -> &[Mat4] {
        &self.inverse_bind_matrices
    }

    pub fn humanoid_tags(&self) -> &[Option<HumanoidTag>] {
        &self.humanoid_tags
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_skin_length_mismatch() {
        let result = SkinAsset::new(
            None,
            vec![NodeId(0), NodeId(1)],
            vec![Mat4::IDENTITY],
            vec![None, None],
        );
        assert_eq!(
            result.unwrap_err(),
            SkinLengthMismatch {
                joints: 2,
                inverse_bind_matrices: 1,
                humanoid_tags: 2,
            }
        );
    }
}
