//! Bake static transforms into geometry.
//!
//! After the pass no static `Transform` remains below the root: each one is
//! turned into a plain group and its accumulated matrix is applied to the
//! vertices of every drawable beneath it. Dynamic transforms stop the bake;
//! whatever was accumulated above them is folded into their own matrix.

use std::sync::Arc;

use glam::Mat4;

use super::node::{DataVariance, Node, NodeKind};

/// Flatten every static transform below `root`. The root itself is left in place.
pub fn flatten_static_transforms(root: &mut Node) {
    bake_children(root, Mat4::IDENTITY);
}

fn bake_children(node: &mut Node, acc: Mat4) {
    match &mut node.kind {
        NodeKind::Group { children } | NodeKind::Transform { children, .. } => {
            for child in children {
                bake(child, acc);
            }
        }
        NodeKind::Switch { children } => {
            for child in children {
                bake(&mut child.node, acc);
            }
        }
        NodeKind::Lod { children } => {
            for child in children {
                bake(&mut child.node, acc);
            }
        }
        _ => {}
    }
}

fn bake(node: &mut Arc<Node>, acc: Mat4) {
    match &node.kind {
        NodeKind::Transform { .. } if node.data_variance == DataVariance::Static => {
            let inner = Arc::make_mut(node);
            if let NodeKind::Transform { matrix, children } = &mut inner.kind {
                let acc = acc * *matrix;
                let mut children = std::mem::take(children);
                for child in &mut children {
                    bake(child, acc);
                }
                inner.kind = NodeKind::Group { children };
            }
        }
        NodeKind::Transform { .. } => {
            let inner = Arc::make_mut(node);
            if let NodeKind::Transform { matrix, .. } = &mut inner.kind {
                *matrix = acc * *matrix;
            }
            bake_children(inner, Mat4::IDENTITY);
        }
        NodeKind::Drawable(geometry) => {
            if acc != Mat4::IDENTITY {
                let baked = Arc::new(geometry.transformed(&acc));
                Arc::make_mut(node).kind = NodeKind::Drawable(baked);
            }
        }
        NodeKind::Group { .. } | NodeKind::Switch { .. } | NodeKind::Lod { .. } => {
            bake_children(Arc::make_mut(node), acc);
        }
        NodeKind::RigGeometry { .. } | NodeKind::MorphGeometry { .. } | NodeKind::Particle(_) => {
            if acc != Mat4::IDENTITY {
                *node = Arc::new(Node::transform(acc, vec![Arc::clone(node)]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::scene::node::Geometry;

    fn point(p: Vec3) -> Arc<Node> {
        Node::drawable(Geometry::new(vec![p], vec![])).into_arc()
    }

    fn static_transform(matrix: Mat4, children: Vec<Arc<Node>>) -> Arc<Node> {
        let mut node = Node::transform(matrix, children);
        node.data_variance = DataVariance::Static;
        node.into_arc()
    }

    #[test]
    fn test_nested_static_transforms_are_baked() {
        let inner = static_transform(Mat4::from_scale(Vec3::splat(2.0)), vec![point(Vec3::X)]);
        let outer =
            static_transform(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)), vec![inner]);
        let mut root = Node::group(vec![outer]);

        flatten_static_transforms(&mut root);

        let outer = root.children()[0];
        assert!(matches!(outer.kind, NodeKind::Group { .. }));
        let inner = outer.children()[0];
        assert!(matches!(inner.kind, NodeKind::Group { .. }));
        let leaf = inner.children()[0];
        assert_eq!(leaf.geometry().unwrap().vertices, vec![Vec3::new(12.0, 0.0, 0.0)]);
    }

    #[test]
    fn test_dynamic_transform_absorbs_accumulated_matrix() {
        let dynamic =
            Node::transform(Mat4::from_translation(Vec3::Y), vec![point(Vec3::ZERO)]).into_arc();
        let outer = static_transform(Mat4::from_translation(Vec3::X), vec![dynamic]);
        let mut root = Node::group(vec![outer]);

        flatten_static_transforms(&mut root);

        let dynamic = root.children()[0].children()[0];
        match &dynamic.kind {
            NodeKind::Transform { matrix, children } => {
                let origin = matrix.transform_point3(Vec3::ZERO);
                assert!((origin - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
                assert_eq!(children[0].geometry().unwrap().vertices, vec![Vec3::ZERO]);
            }
            other => panic!("expected transform, got {other:?}"),
        }
    }

    #[test]
    fn test_rotation_is_applied_to_vertices() {
        let rot = Mat4::from_quat(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let mut root = Node::group(vec![static_transform(rot, vec![point(Vec3::X)])]);
        flatten_static_transforms(&mut root);
        let v = root.children()[0].children()[0].geometry().unwrap().vertices[0];
        assert!((v - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_shared_template_geometry_is_untouched() {
        let leaf = point(Vec3::X);
        let mut root = Node::group(vec![static_transform(
            Mat4::from_translation(Vec3::Z),
            vec![leaf.clone()],
        )]);
        flatten_static_transforms(&mut root);
        assert_eq!(leaf.geometry().unwrap().vertices, vec![Vec3::X]);
    }
}
