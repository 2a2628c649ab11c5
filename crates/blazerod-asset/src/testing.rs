//! Writer for small PMX files.
//!
//! Every field maps directly to what ends up in the file, so tests can
//! produce malformed input as easily as valid input.

#[derive(Debug, Clone)]
pub enum TestDeform {
    Bdef1(i64),
    Bdef2(i64, i64, f32),
    Bdef4([i64; 4], [f32; 4]),
    Sdef(i64, i64, f32),
    Qdef([i64; 4], [f32; 4]),
}

#[derive(Debug, Clone)]
pub struct TestVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub deform: TestDeform,
}

impl TestVertex {
    pub fn new(position: [f32; 3], deform: TestDeform) -> Self {
        Self {
            position,
            normal: [0.0, 0.0, -1.0],
            uv: [0.0, 0.0],
            deform,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestMaterial {
    pub name: String,
    pub flags: u8,
    pub texture: i64,
    pub toon_internal: u8,
    pub surface_count: i32,
}

impl TestMaterial {
    pub fn new(name: &str, surface_count: i32) -> Self {
        Self {
            name: name.to_string(),
            flags: 0b0001_1001,
            texture: -1,
            toon_internal: 0,
            surface_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestIk {
    pub target: i64,
    pub loop_count: i32,
    pub limit_radian: f32,
    /// Link bone and optional (min, max) rotation limit.
    pub links: Vec<(i64, Option<([f32; 3], [f32; 3])>)>,
}

#[derive(Debug, Clone)]
pub struct TestInherit {
    pub parent: i64,
    pub influence: f32,
    pub rotation: bool,
    pub translation: bool,
    pub local: bool,
}

#[derive(Debug, Clone)]
pub struct TestBone {
    pub name: String,
    pub position: [f32; 3],
    pub parent: i64,
    pub ik: Option<TestIk>,
    pub inherit: Option<TestInherit>,
}

impl TestBone {
    pub fn new(name: &str, position: [f32; 3], parent: i64) -> Self {
        Self {
            name: name.to_string(),
            position,
            parent,
            ik: None,
            inherit: None,
        }
    }

    fn flags(&self) -> u16 {
        // rotatable, visible, enabled
        let mut flags = 0x0002 | 0x0008 | 0x0010;
        if self.ik.is_some() {
            flags |= 0x0020;
        }
        if let Some(inherit) = &self.inherit {
            if inherit.local {
                flags |= 0x0080;
            }
            if inherit.rotation {
                flags |= 0x0100;
            }
            if inherit.translation {
                flags |= 0x0200;
            }
        }
        flags
    }
}

#[derive(Debug, Clone)]
pub enum TestMorphKind {
    Group(Vec<(i64, f32)>),
    Vertex(Vec<(i64, [f32; 3])>),
    /// Offset count.
    Bone(usize),
    /// Extra UV channel (0 for the base UV) and offset count.
    Uv(u8, usize),
    Material(usize),
    Flip(usize),
    Impulse(usize),
}

#[derive(Debug, Clone)]
pub struct TestMorph {
    pub name: String,
    pub kind: TestMorphKind,
}

impl TestMorph {
    pub fn new(name: &str, kind: TestMorphKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestRigidBody {
    pub name: String,
    pub bone: i64,
    pub group: u8,
    pub no_collision: u16,
    pub shape: u8,
    pub size: [f32; 3],
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub mass: f32,
    pub physics_mode: u8,
}

impl TestRigidBody {
    pub fn new(name: &str, bone: i64, position: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            bone,
            group: 0,
            no_collision: 0,
            shape: 0,
            size: [1.0, 1.0, 1.0],
            position,
            rotation: [0.0; 3],
            mass: 1.0,
            physics_mode: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestJoint {
    pub name: String,
    pub joint_type: u8,
    pub body_a: i64,
    pub body_b: i64,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub position_min: [f32; 3],
    pub position_max: [f32; 3],
    pub rotation_min: [f32; 3],
    pub rotation_max: [f32; 3],
    pub position_spring: [f32; 3],
    pub rotation_spring: [f32; 3],
}

impl TestJoint {
    pub fn new(name: &str, body_a: i64, body_b: i64) -> Self {
        Self {
            name: name.to_string(),
            joint_type: 0,
            body_a,
            body_b,
            position: [0.0; 3],
            rotation: [0.0; 3],
            position_min: [0.0; 3],
            position_max: [0.0; 3],
            rotation_min: [-0.5; 3],
            rotation_max: [0.5; 3],
            position_spring: [0.0; 3],
            rotation_spring: [0.0; 3],
        }
    }
}

#[derive(Debug, Clone)]
pub struct PmxBuilder {
    pub version: f32,
    pub utf8: bool,
    pub vertex_index_size: u8,
    pub texture_index_size: u8,
    pub material_index_size: u8,
    pub bone_index_size: u8,
    pub morph_index_size: u8,
    pub rigid_body_index_size: u8,
    pub name: String,
    pub vertices: Vec<TestVertex>,
    pub triangles: Vec<[i64; 3]>,
    pub textures: Vec<String>,
    pub materials: Vec<TestMaterial>,
    pub bones: Vec<TestBone>,
    pub morphs: Vec<TestMorph>,
    pub rigid_bodies: Vec<TestRigidBody>,
    pub joints: Vec<TestJoint>,
}

impl Default for PmxBuilder {
    fn default() -> Self {
        Self {
            version: 2.0,
            utf8: false,
            vertex_index_size: 2,
            texture_index_size: 1,
            material_index_size: 1,
            bone_index_size: 2,
            morph_index_size: 2,
            rigid_body_index_size: 2,
            name: String::from("model"),
            vertices: Vec::new(),
            triangles: Vec::new(),
            textures: Vec::new(),
            materials: Vec::new(),
            bones: Vec::new(),
            morphs: Vec::new(),
            rigid_bodies: Vec::new(),
            joints: Vec::new(),
        }
    }
}

impl PmxBuilder {
    /// One vertex, one triangle, one material and one bone.
    pub fn minimal() -> Self {
        Self {
            vertices: vec![TestVertex::new([1.0, 2.0, 3.0], TestDeform::Bdef1(0))],
            triangles: vec![[0, 0, 0]],
            materials: vec![TestMaterial::new("material", 3)],
            bones: vec![TestBone::new("root", [0.0, 0.0, 0.0], -1)],
            ..Default::default()
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut writer = Writer {
            buffer: Vec::new(),
            utf8: self.utf8,
        };
        let w = &mut writer;

        w.bytes(b"PMX ");
        w.f32(self.version);
        w.u8(8);
        w.u8(self.utf8 as u8);
        w.u8(0);
        for size in [
            self.vertex_index_size,
            self.texture_index_size,
            self.material_index_size,
            self.bone_index_size,
            self.morph_index_size,
            self.rigid_body_index_size,
        ] {
            w.u8(size);
        }
        w.text(&self.name);
        w.text(&self.name);
        w.text("");
        w.text("");

        w.i32(self.vertices.len() as i32);
        for vertex in &self.vertices {
            w.vec(&vertex.position);
            w.vec(&vertex.normal);
            w.vec(&vertex.uv);
            let bone = self.bone_index_size;
            match &vertex.deform {
                TestDeform::Bdef1(index) => {
                    w.u8(0);
                    w.index(bone, *index);
                }
                TestDeform::Bdef2(a, b, weight) => {
                    w.u8(1);
                    w.index(bone, *a);
                    w.index(bone, *b);
                    w.f32(*weight);
                }
                TestDeform::Bdef4(indices, weights) | TestDeform::Qdef(indices, weights) => {
                    w.u8(if matches!(vertex.deform, TestDeform::Bdef4(..)) {
                        2
                    } else {
                        4
                    });
                    for index in indices {
                        w.index(bone, *index);
                    }
                    w.vec(weights);
                }
                TestDeform::Sdef(a, b, weight) => {
                    w.u8(3);
                    w.index(bone, *a);
                    w.index(bone, *b);
                    w.f32(*weight);
                    w.vec(&[0.0; 9]);
                }
            }
            w.f32(1.0);
        }

        w.i32(self.triangles.len() as i32 * 3);
        for triangle in &self.triangles {
            for index in triangle {
                w.index(self.vertex_index_size, *index);
            }
        }

        w.i32(self.textures.len() as i32);
        for texture in &self.textures {
            w.text(texture);
        }

        w.i32(self.materials.len() as i32);
        for material in &self.materials {
            w.text(&material.name);
            w.text(&material.name);
            w.vec(&[1.0, 1.0, 1.0, 1.0]);
            w.vec(&[0.5, 0.5, 0.5]);
            w.f32(5.0);
            w.vec(&[0.2, 0.2, 0.2]);
            w.u8(material.flags);
            w.vec(&[0.0, 0.0, 0.0, 1.0]);
            w.f32(1.0);
            w.index(self.texture_index_size, material.texture);
            w.index(self.texture_index_size, -1);
            w.u8(0);
            w.u8(1);
            w.u8(material.toon_internal);
            w.text("");
            w.i32(material.surface_count);
        }

        w.i32(self.bones.len() as i32);
        for bone in &self.bones {
            let size = self.bone_index_size;
            w.text(&bone.name);
            w.text(&bone.name);
            w.vec(&bone.position);
            w.index(size, bone.parent);
            w.i32(0);
            w.u16(bone.flags());
            w.vec(&[0.0, 1.0, 0.0]);
            if let Some(inherit) = &bone.inherit {
                if inherit.rotation || inherit.translation {
                    w.index(size, inherit.parent);
                    w.f32(inherit.influence);
                }
            }
            if let Some(ik) = &bone.ik {
                w.index(size, ik.target);
                w.i32(ik.loop_count);
                w.f32(ik.limit_radian);
                w.i32(ik.links.len() as i32);
                for (link, limit) in &ik.links {
                    w.index(size, *link);
                    match limit {
                        Some((min, max)) => {
                            w.u8(1);
                            w.vec(min);
                            w.vec(max);
                        }
                        None => w.u8(0),
                    }
                }
            }
        }

        w.i32(self.morphs.len() as i32);
        for morph in &self.morphs {
            w.text(&morph.name);
            w.text(&morph.name);
            w.u8(4);
            match &morph.kind {
                TestMorphKind::Group(offsets) => {
                    w.u8(0);
                    w.i32(offsets.len() as i32);
                    for (index, influence) in offsets {
                        w.index(self.morph_index_size, *index);
                        w.f32(*influence);
                    }
                }
                TestMorphKind::Vertex(offsets) => {
                    w.u8(1);
                    w.i32(offsets.len() as i32);
                    for (index, translation) in offsets {
                        w.index(self.vertex_index_size, *index);
                        w.vec(translation);
                    }
                }
                TestMorphKind::Bone(count) => {
                    w.u8(2);
                    w.i32(*count as i32);
                    for _ in 0..*count {
                        w.index(self.bone_index_size, 0);
                        w.vec(&[0.0; 3]);
                        w.vec(&[0.0, 0.0, 0.0, 1.0]);
                    }
                }
                TestMorphKind::Uv(channel, count) => {
                    w.u8(3 + channel);
                    w.i32(*count as i32);
                    for _ in 0..*count {
                        w.index(self.vertex_index_size, 0);
                        w.vec(&[0.0; 4]);
                    }
                }
                TestMorphKind::Material(count) => {
                    w.u8(8);
                    w.i32(*count as i32);
                    for _ in 0..*count {
                        w.index(self.material_index_size, 0);
                        w.u8(0);
                        w.vec(&[0.0; 28]);
                    }
                }
                TestMorphKind::Flip(count) => {
                    w.u8(9);
                    w.i32(*count as i32);
                    for _ in 0..*count {
                        w.index(self.morph_index_size, 0);
                        w.f32(1.0);
                    }
                }
                TestMorphKind::Impulse(count) => {
                    w.u8(10);
                    w.i32(*count as i32);
                    for _ in 0..*count {
                        w.index(self.rigid_body_index_size, 0);
                        w.u8(0);
                        w.vec(&[0.0; 6]);
                    }
                }
            }
        }

        if self.bones.is_empty() {
            w.i32(0);
        } else {
            w.i32(1);
            w.text("Root");
            w.text("Root");
            w.u8(1);
            w.i32(1);
            w.u8(0);
            w.index(self.bone_index_size, 0);
        }

        w.i32(self.rigid_bodies.len() as i32);
        for body in &self.rigid_bodies {
            w.text(&body.name);
            w.text(&body.name);
            w.index(self.bone_index_size, body.bone);
            w.u8(body.group);
            w.u16(body.no_collision);
            w.u8(body.shape);
            w.vec(&body.size);
            w.vec(&body.position);
            w.vec(&body.rotation);
            w.f32(body.mass);
            w.vec(&[0.5, 0.5, 0.0, 0.5]);
            w.u8(body.physics_mode);
        }

        w.i32(self.joints.len() as i32);
        for joint in &self.joints {
            w.text(&joint.name);
            w.text(&joint.name);
            w.u8(joint.joint_type);
            w.index(self.rigid_body_index_size, joint.body_a);
            w.index(self.rigid_body_index_size, joint.body_b);
            for field in [
                &joint.position,
                &joint.rotation,
                &joint.position_min,
                &joint.position_max,
                &joint.rotation_min,
                &joint.rotation_max,
                &joint.position_spring,
                &joint.rotation_spring,
            ] {
                w.vec(field);
            }
        }

        writer.buffer
    }
}

struct Writer {
    buffer: Vec<u8>,
    utf8: bool,
}

impl Writer {
    fn bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.bytes(&value.to_le_bytes());
    }

    fn i32(&mut self, value: i32) {
        self.bytes(&value.to_le_bytes());
    }

    fn f32(&mut self, value: f32) {
        self.bytes(&value.to_le_bytes());
    }

    fn vec(&mut self, values: &[f32]) {
        for value in values {
            self.f32(*value);
        }
    }

    /// Write the low `size` bytes of `value`, so -1 becomes all ones.
    fn index(&mut self, size: u8, value: i64) {
        match size {
            1 => self.u8(value as u8),
            2 => self.u16(value as u16),
            _ => self.i32(value as i32),
        }
    }

    fn text(&mut self, text: &str) {
        let encoded: Vec<u8> = if self.utf8 {
            text.as_bytes().to_vec()
        } else {
            text.encode_utf16().flat_map(u16::to_le_bytes).collect()
        };
        self.i32(encoded.len() as i32);
        self.bytes(&encoded);
    }
}
