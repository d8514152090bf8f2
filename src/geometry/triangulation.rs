//! Direct linear (DLT) stereo triangulation.

use nalgebra::{Matrix3x4, Matrix4, Point2, Vector3};

use crate::error::TriangulationError;

/// Homogeneous coordinate below which the point is treated as lying at infinity.
const MIN_HOMOGENEOUS_W: f64 = 1e-10;

/// Triangulate a single point from a synchronized stereo pixel pair.
///
/// Both projection matrices map the same (camera-optical) frame to pixels, so
/// the result is expressed in that frame. The homogeneous system `A X = 0` is
/// built from `u * P[2] - P[0]` and `v * P[2] - P[1]` for each camera and
/// solved via SVD.
pub fn triangulate(
    pixel_l: &Point2<f64>,
    pixel_r: &Point2<f64>,
    p_l: &Matrix3x4<f64>,
    p_r: &Matrix3x4<f64>,
) -> Result<Vector3<f64>, TriangulationError> {
    let mut a = Matrix4::<f64>::zeros();

    for j in 0..4 {
        a[(0, j)] = pixel_l.x * p_l[(2, j)] - p_l[(0, j)];
        a[(1, j)] = pixel_l.y * p_l[(2, j)] - p_l[(1, j)];
        a[(2, j)] = pixel_r.x * p_r[(2, j)] - p_r[(0, j)];
        a[(3, j)] = pixel_r.y * p_r[(2, j)] - p_r[(1, j)];
    }

    // SVD does not terminate on NaN input.
    if a.iter().any(|v| !v.is_finite()) {
        return Err(TriangulationError::NonFiniteInput);
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(TriangulationError::SvdFailed)?;
    let x_h = v_t.row(svd.singular_values.imin()).transpose();
    let x_h = x_h / x_h.norm();

    let w = x_h[3];
    if !w.is_finite() || w.abs() < MIN_HOMOGENEOUS_W {
        return Err(TriangulationError::DegenerateGeometry { w });
    }

    let point = Vector3::new(x_h[0] / w, x_h[1] / w, x_h[2] / w);
    if point.iter().any(|v| !v.is_finite()) {
        return Err(TriangulationError::DegenerateGeometry { w });
    }
    Ok(point)
}

/// `R_cam * point_camera + p_cam`.
pub fn transform_to_world(
    point_camera: &Vector3<f64>,
    rotation_cam: &nalgebra::Matrix3<f64>,
    position_cam: &Vector3<f64>,
) -> Vector3<f64> {
    rotation_cam * point_camera + position_cam
}
