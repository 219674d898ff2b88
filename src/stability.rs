//! Advisory limit on the explicit step size.
//!
//! Forward Euler on the five-point Laplacian is stable while
//! `dt <= h^2 / (4 * D_max)`. Nothing in the stepper checks this; callers pick
//! `dt` and own the consequences of exceeding it.

use diffusion_common::LigandConfig;

/// Largest stable step for the given resolution and diffusion coefficients.
///
/// Returns `f64::INFINITY` when no ligand diffuses.
pub fn stable_timestep<I>(resolution: f64, diffusion_coefficients: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let largest = diffusion_coefficients.into_iter().fold(0.0f64, f64::max);
    if largest > 0.0 {
        resolution * resolution / (4.0 * largest)
    } else {
        f64::INFINITY
    }
}

/// [`stable_timestep`] over a ligand list.
pub fn stable_timestep_for(resolution: f64, ligands: &[LigandConfig]) -> f64 {
    stable_timestep(resolution, ligands.iter().map(|l| l.diffusion_coefficient))
}

/// Whether `dt` stays within the stable bound.
pub fn is_stable(dt: f64, resolution: f64, ligands: &[LigandConfig]) -> bool {
    dt <= stable_timestep_for(resolution, ligands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_largest_coefficient() {
        let ligands = [
            LigandConfig::new(0, "slow", 0.0, 0.5),
            LigandConfig::new(1, "fast", 0.0, 2.0),
        ];
        assert_eq!(stable_timestep_for(0.5, &ligands), 0.25 / 8.0);
        assert!(is_stable(0.25 / 8.0, 0.5, &ligands));
        assert!(!is_stable(0.04, 0.5, &ligands));
    }

    #[test]
    fn no_diffusion_is_unbounded() {
        assert_eq!(stable_timestep(1.0, [0.0, 0.0]), f64::INFINITY);
        assert_eq!(stable_timestep(1.0, std::iter::empty()), f64::INFINITY);
    }
}
