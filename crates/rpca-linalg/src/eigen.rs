use rpca_core::{Float, Tensor, TensorError};
use rpca_core::error::TensorResult;

/// Eigendecomposition of a real symmetric matrix, any sign of eigenvalue,
/// via cyclic Jacobi rotations (the same rotation step `svd::svd` applies to
/// `AᵀA`, generalized here to operate directly on a symmetric input instead
/// of assuming positive-semidefiniteness).
///
/// Returns `(eigenvalues, eigenvectors)` with eigenvalues sorted descending
/// and `eigenvectors` columns matching that order.
pub fn eigh<T: Float>(a: &Tensor<T>) -> TensorResult<(Vec<f64>, Tensor<T>)> {
    let n = a.shape().dim(0)?;
    if n != a.shape().dim(1)? {
        return Err(TensorError::InvalidOperation("eigh requires a square matrix".into()));
    }

    let mut m = vec![0.0f64; n * n];
    for i in 0..n {
        for j in 0..n {
            m[i * n + j] = a.get(&[i, j])?.to_f64();
        }
    }

    let mut vecs = vec![0.0f64; n * n];
    for i in 0..n {
        vecs[i * n + i] = 1.0;
    }

    for _ in 0..100 {
        let mut max_off = 0.0;
        let mut pi = 0;
        let mut pj = 1;
        for i in 0..n {
            for j in (i + 1)..n {
                if m[i * n + j].abs() > max_off {
                    max_off = m[i * n + j].abs();
                    pi = i;
                    pj = j;
                }
            }
        }
        if max_off < 1e-12 {
            break;
        }

        let aij = m[pi * n + pj];
        let aii = m[pi * n + pi];
        let ajj = m[pj * n + pj];
        let theta = if (aii - ajj).abs() < 1e-15 {
            std::f64::consts::FRAC_PI_4
        } else {
            0.5 * (2.0 * aij / (aii - ajj)).atan()
        };
        let c = theta.cos();
        let s = theta.sin();

        let mut new_m = m.clone();
        for l in 0..n {
            if l == pi || l == pj {
                continue;
            }
            new_m[pi * n + l] = c * m[pi * n + l] + s * m[pj * n + l];
            new_m[l * n + pi] = new_m[pi * n + l];
            new_m[pj * n + l] = -s * m[pi * n + l] + c * m[pj * n + l];
            new_m[l * n + pj] = new_m[pj * n + l];
        }
        new_m[pi * n + pi] = c * c * aii + 2.0 * c * s * aij + s * s * ajj;
        new_m[pj * n + pj] = s * s * aii - 2.0 * c * s * aij + c * c * ajj;
        new_m[pi * n + pj] = 0.0;
        new_m[pj * n + pi] = 0.0;
        m = new_m;

        for l in 0..n {
            let vli = vecs[l * n + pi];
            let vlj = vecs[l * n + pj];
            vecs[l * n + pi] = c * vli + s * vlj;
            vecs[l * n + pj] = -s * vli + c * vlj;
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| m[b * n + b].partial_cmp(&m[a * n + a]).unwrap());

    let eigenvalues: Vec<f64> = order.iter().map(|&idx| m[idx * n + idx]).collect();

    let mut vec_data = Vec::with_capacity(n * n);
    for i in 0..n {
        for &idx in &order {
            vec_data.push(T::from_f64(vecs[i * n + idx]));
        }
    }
    let eigenvectors = Tensor::new(vec_data, vec![n, n])?;

    Ok((eigenvalues, eigenvectors))
}

/// Eigendecomposition of a symmetric 2×2 matrix in closed form, used for
/// confidence-ellipse axes where a full Jacobi sweep would be overkill.
pub fn eigh_2x2(a00: f64, a01: f64, a11: f64) -> ([f64; 2], [[f64; 2]; 2]) {
    let trace = a00 + a11;
    let det = a00 * a11 - a01 * a01;
    let disc = ((trace * trace) / 4.0 - det).max(0.0).sqrt();
    let l1 = trace / 2.0 + disc;
    let l2 = trace / 2.0 - disc;

    let eigenvector_for = |lambda: f64| -> [f64; 2] {
        if a01.abs() > 1e-15 {
            let vx = lambda - a11;
            let vy = a01;
            let norm = (vx * vx + vy * vy).sqrt();
            if norm < 1e-15 {
                [1.0, 0.0]
            } else {
                [vx / norm, vy / norm]
            }
        } else if a00 >= a11 {
            [1.0, 0.0]
        } else {
            [0.0, 1.0]
        }
    };

    ([l1, l2], [eigenvector_for(l1), eigenvector_for(l2)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn eigh_diagonal_matrix() {
        let a: Tensor<f64> = Tensor::from_vec2d(&[
            vec![3.0, 0.0, 0.0],
            vec![0.0, -1.0, 0.0],
            vec![0.0, 0.0, 5.0],
        ])
        .unwrap();
        let (vals, _vecs) = eigh(&a).unwrap();
        assert_relative_eq!(vals[0], 5.0, epsilon = 1e-8);
        assert_relative_eq!(vals[1], 3.0, epsilon = 1e-8);
        assert_relative_eq!(vals[2], -1.0, epsilon = 1e-8);
    }

    #[test]
    fn eigh_reconstructs_symmetric_matrix() {
        let a: Tensor<f64> = Tensor::from_vec2d(&[
            vec![2.0, 1.0, 0.0],
            vec![1.0, 2.0, 1.0],
            vec![0.0, 1.0, 2.0],
        ])
        .unwrap();
        let (vals, vecs) = eigh(&a).unwrap();
        // Reconstruct A = V diag(lambda) V^T and compare.
        let n = 3;
        for i in 0..n {
            for j in 0..n {
                let mut sum = 0.0;
                for k in 0..n {
                    sum += vecs.get(&[i, k]).unwrap() * vals[k] * vecs.get(&[j, k]).unwrap();
                }
                let orig = a.get(&[i, j]).unwrap();
                assert!((sum - orig).abs() < 1e-8, "mismatch at ({i},{j}): {sum} vs {orig}");
            }
        }
    }

    #[test]
    fn eigh_2x2_orders_axes() {
        let (vals, _) = eigh_2x2(4.0, 1.0, 1.0);
        assert!(vals[0] >= vals[1]);
    }
}
