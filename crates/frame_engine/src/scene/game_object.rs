use std::collections::BTreeMap;
use std::sync::Arc;

use slotmap::{new_key_type, SlotMap};

use crate::foundation::math::{Mat3, Mat4, Vec3, YxzRotation};
use crate::render::api::GpuDevice;
use crate::render::mesh::Mesh;

new_key_type! {
    /// Generational key of a game object
    pub struct GameObjectId;
}

/// Translation, Tait-Bryan rotation (applied Y, X, Z) and per-axis scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformComponent {
    /// Position offset
    pub translation: Vec3,
    /// Per-axis scale
    pub scale: Vec3,
    /// Rotation angles in radians around X, Y and Z
    pub rotation: Vec3,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            rotation: Vec3::zeros(),
        }
    }
}

impl TransformComponent {
    /// Model matrix: translate * Ry * Rx * Rz * scale
    pub fn mat4(&self) -> Mat4 {
        let rotation = YxzRotation::new(self.rotation);
        let columns = [
            rotation.u() * self.scale.x,
            rotation.v() * self.scale.y,
            rotation.w() * self.scale.z,
            self.translation,
        ];

        let mut matrix = Mat4::identity();
        for (col, column) in columns.iter().enumerate() {
            matrix.fixed_view_mut::<3, 1>(0, col).copy_from(column);
        }
        matrix
    }

    /// Inverse transpose of the model matrix's upper 3x3: the rotation with inverse scale
    pub fn normal_matrix(&self) -> Mat3 {
        let rotation = YxzRotation::new(self.rotation);
        let inverse_scale = self.scale.map(|s| 1.0 / s);
        Mat3::from_columns(&[
            rotation.u() * inverse_scale.x,
            rotation.v() * inverse_scale.y,
            rotation.w() * inverse_scale.z,
        ])
    }
}

/// A drawable object
pub struct GameObject<D: GpuDevice> {
    id: u64,
    /// Placement in the world
    pub transform: TransformComponent,
    /// Flat color, used by shaders that do not read vertex colors
    pub color: Vec3,
    /// Mesh to draw; objects without one are skipped by the render systems
    pub model: Option<Arc<Mesh<D>>>,
}

impl<D: GpuDevice> GameObject<D> {
    /// Creation sequence number, unique within its store
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Arena of game objects
pub struct GameObjectStore<D: GpuDevice> {
    objects: SlotMap<GameObjectId, GameObject<D>>,
    creation_order: BTreeMap<u64, GameObjectId>,
    next_id: u64,
}

impl<D: GpuDevice> Default for GameObjectStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: GpuDevice> GameObjectStore<D> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            objects: SlotMap::with_key(),
            creation_order: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Add an object with a default transform, black color and no mesh
    pub fn create(&mut self) -> GameObjectId {
        self.create_with(TransformComponent::default(), Vec3::zeros(), None)
    }

    /// Add a fully specified object
    pub fn create_with(
        &mut self,
        transform: TransformComponent,
        color: Vec3,
        model: Option<Arc<Mesh<D>>>,
    ) -> GameObjectId {
        let id = self.next_id;
        self.next_id += 1;
        let key = self.objects.insert(GameObject {
            id,
            transform,
            color,
            model,
        });
        self.creation_order.insert(id, key);
        key
    }

    /// Remove an object; its mesh is released once no other object shares it
    pub fn remove(&mut self, key: GameObjectId) -> Option<GameObject<D>> {
        let object = self.objects.remove(key)?;
        self.creation_order.remove(&object.id);
        Some(object)
    }

    /// Look up an object
    pub fn get(&self, key: GameObjectId) -> Option<&GameObject<D>> {
        self.objects.get(key)
    }

    /// Look up an object mutably
    pub fn get_mut(&mut self, key: GameObjectId) -> Option<&mut GameObject<D>> {
        self.objects.get_mut(key)
    }

    /// Objects in creation order
    pub fn iter(&self) -> impl Iterator<Item = (GameObjectId, &GameObject<D>)> + '_ {
        self.creation_order
            .values()
            .filter_map(move |&key| self.objects.get(key).map(|object| (key, object)))
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
