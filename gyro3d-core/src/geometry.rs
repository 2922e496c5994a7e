/// Geometry primitives for 3D rendering
use nalgebra::{Point3, Vector3};

/// A 3D vertex with position and normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32, nx: f32, ny: f32, nz: f32) -> Self {
        Self {
            position: Point3::new(x, y, z),
            normal: Vector3::new(nx, ny, nz),
        }
    }

    pub fn at(position: Point3<f32>, normal: Vector3<f32>) -> Self {
        Self { position, normal }
    }
}

/// A triangle face defined by three vertices
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// Build a triangle from bare positions, deriving the face normal
    pub fn from_positions(p0: Point3<f32>, p1: Point3<f32>, p2: Point3<f32>) -> Self {
        let normal = (p1 - p0)
            .cross(&(p2 - p0))
            .try_normalize(1e-12)
            .unwrap_or_else(Vector3::zeros);
        Self::new(
            Vertex::at(p0, normal),
            Vertex::at(p1, normal),
            Vertex::at(p2, normal),
        )
    }

    /// Face normal from the winding order; zero for degenerate faces
    pub fn calculate_normal(&self) -> Vector3<f32> {
        let v0 = self.vertices[0].position;
        let v1 = self.vertices[1].position;
        let v2 = self.vertices[2].position;

        (v1 - v0)
            .cross(&(v2 - v0))
            .try_normalize(1e-12)
            .unwrap_or_else(Vector3::zeros)
    }
}

/// A 3D mesh composed of triangles
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            triangles: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            triangles: Vec::with_capacity(capacity),
        }
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Axis-aligned bounds as (min, max), `None` for an empty mesh
    pub fn bounds(&self) -> Option<(Point3<f32>, Point3<f32>)> {
        let mut points = self
            .triangles
            .iter()
            .flat_map(|t| t.vertices.iter().map(|v| v.position));
        let first = points.next()?;
        Some(points.fold((first, first), |(min, max), p| {
            (min.inf(&p), max.sup(&p))
        }))
    }

    /// Recentre on the origin and scale into a sphere of radius `radius`.
    ///
    /// Uploaded models come in arbitrary units; the camera expects the default
    /// cube's extent.
    pub fn fit_to_sphere(&mut self, radius: f32) {
        let Some((min, max)) = self.bounds() else {
            return;
        };
        let center = nalgebra::center(&min, &max);
        let extent = self
            .triangles
            .iter()
            .flat_map(|t| t.vertices.iter())
            .map(|v| (v.position - center).norm())
            .fold(0.0_f32, f32::max);
        let factor = if extent > f32::EPSILON { radius / extent } else { 1.0 };

        for triangle in &mut self.triangles {
            for vertex in &mut triangle.vertices {
                vertex.position = Point3::from((vertex.position - center) * factor);
            }
        }
    }

    /// Axis-aligned cube of edge `size` centred on the origin
    pub fn cube(size: f32) -> Self {
        let h = size / 2.0;
        // Outward normal plus four corners in counter-clockwise order
        let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
            ([0.0, 0.0, 1.0], [[-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h]]),
            ([0.0, 0.0, -1.0], [[h, -h, -h], [-h, -h, -h], [-h, h, -h], [h, h, -h]]),
            ([0.0, 1.0, 0.0], [[-h, h, h], [h, h, h], [h, h, -h], [-h, h, -h]]),
            ([0.0, -1.0, 0.0], [[-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h]]),
            ([1.0, 0.0, 0.0], [[h, -h, h], [h, -h, -h], [h, h, -h], [h, h, h]]),
            ([-1.0, 0.0, 0.0], [[-h, -h, -h], [-h, -h, h], [-h, h, h], [-h, h, -h]]),
        ];

        let mut mesh = Self::with_capacity(12);
        for (n, corners) in faces {
            let v = |c: [f32; 3]| Vertex::new(c[0], c[1], c[2], n[0], n[1], n[2]);
            mesh.add_triangle(Triangle::new(v(corners[0]), v(corners[1]), v(corners[2])));
            mesh.add_triangle(Triangle::new(v(corners[0]), v(corners[2]), v(corners[3])));
        }
        mesh
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_has_outward_faces() {
        let cube = Mesh::cube(1.0);
        assert_eq!(cube.triangles.len(), 12);
        for triangle in &cube.triangles {
            let winding = triangle.calculate_normal();
            let declared = triangle.vertices[0].normal;
            assert!((winding - declared).norm() < 1e-6);
        }
    }

    #[test]
    fn test_unit_cube_bounds() {
        let (min, max) = Mesh::cube(1.0).bounds().unwrap();
        assert_eq!(min, Point3::new(-0.5, -0.5, -0.5));
        assert_eq!(max, Point3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        assert!(Mesh::new().bounds().is_none());
    }

    #[test]
    fn test_fit_to_sphere() {
        let mut mesh = Mesh::new();
        mesh.add_triangle(Triangle::from_positions(
            Point3::new(10.0, 10.0, 10.0),
            Point3::new(14.0, 10.0, 10.0),
            Point3::new(10.0, 14.0, 10.0),
        ));
        mesh.fit_to_sphere(1.0);

        let (min, max) = mesh.bounds().unwrap();
        let center = nalgebra::center(&min, &max);
        assert!(center.coords.norm() < 1e-5);
        let extent = mesh
            .triangles
            .iter()
            .flat_map(|t| t.vertices.iter())
            .map(|v| v.position.coords.norm())
            .fold(0.0_f32, f32::max);
        assert!((extent - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_degenerate_normal_is_zero() {
        let p = Point3::new(1.0, 1.0, 1.0);
        let triangle = Triangle::from_positions(p, p, p);
        assert_eq!(triangle.calculate_normal(), Vector3::zeros());
    }
}
