use crate::{
    floating_type_mod::{FT, PI},
    V3,
};

/**
 * Poly6 kernel used for the density estimation.
 *
 * `W(r, h) = 315 / (64 PI h^9) * (h^2 - |r|^2)^3`
 *
 * The kernel is not clamped to its support: for `|r| > h` the value is negative. Callers only
 * accumulate values above a small tolerance which removes those particles.
 */
pub fn poly6(r: V3, h: FT) -> FT {
    let diff = h * h - r.norm_squared();
    let norm_factor = 315. / (64. * PI * h.powi(9));
    norm_factor * diff * diff * diff
}

/**
 * Gradient of the spiky kernel for the pressure force.
 *
 * `grad W(r, h) = r * (-45 / (PI h^6) * (h - |r|)^2 / |r|)` for `0 < |r| < h`
 *
 * Gives a strong repulsion at short distances which avoids clustering. The gradient is
 * singular at `|r| = 0`, we return zero there instead of NaN.
 *
 * The gradient is clamped to zero outside of the support (the unclamped formula grows again
 * for `|r| > h`). The support test is done on `|r|^2` so it agrees bit for bit with the
 * radius test of the neighborhood search; a NaN displacement counts as outside.
 */
pub fn spiky_gradient(r: V3, h: FT) -> V3 {
    let r_sq = r.norm_squared();
    if r_sq < h * h && r_sq > 1.0e-12 {
        let r_len = r_sq.sqrt();
        let diff = h - r_len;
        let coefficient = -45. * diff * diff / (PI * h.powi(6) * r_len);
        r * coefficient
    } else {
        V3::zeros()
    }
}

/**
 * Laplacian of the viscosity kernel.
 *
 * `lap W(r, h) = 45 / (PI h^6) * (h - |r|)` for `|r| < h`
 *
 * Unlike the poly6 laplacian this stays positive inside the support. Clamped to zero outside
 * of it, where the plain formula would turn negative.
 */
pub fn viscosity_laplacian(r: V3, h: FT) -> FT {
    let r_sq = r.norm_squared();
    if r_sq < h * h {
        45. * (h - r_sq.sqrt()) / (PI * h.powi(6))
    } else {
        0.
    }
}
