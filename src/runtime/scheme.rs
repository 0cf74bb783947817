//! Explicit Runge-Kutta schemes.

use std::fmt::Display;

/// Time integration scheme, named by its order.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum RungeKutta {
    /// Explicit Euler
    #[default]
    Euler,
    /// Explicit midpoint rule
    Midpoint,
    /// Kutta's third order scheme
    Kutta3,
    /// Classical fourth order scheme
    Classic4,
}

/// Butcher tableau of an explicit scheme.
#[derive(Clone, Debug, PartialEq)]
pub struct Tableau {
    /// Stage coefficients; row `i` has `i` entries.
    pub a: Vec<Vec<f64>>,
    /// Update weights.
    pub b: Vec<f64>,
}

impl RungeKutta {
    /// All schemes by increasing order.
    pub const ALL: [RungeKutta; 4] = [
        RungeKutta::Euler,
        RungeKutta::Midpoint,
        RungeKutta::Kutta3,
        RungeKutta::Classic4,
    ];

    /// Scheme of the given order.
    pub fn from_order(order: u32) -> Option<Self> {
        match order {
            1 => Some(RungeKutta::Euler),
            2 => Some(RungeKutta::Midpoint),
            3 => Some(RungeKutta::Kutta3),
            4 => Some(RungeKutta::Classic4),
            _ => None,
        }
    }

    /// Order of accuracy, which is also the number of stages.
    pub fn order(&self) -> u32 {
        match self {
            RungeKutta::Euler => 1,
            RungeKutta::Midpoint => 2,
            RungeKutta::Kutta3 => 3,
            RungeKutta::Classic4 => 4,
        }
    }

    /// Coefficients of the scheme.
    pub fn tableau(&self) -> Tableau {
        match self {
            RungeKutta::Euler => Tableau {
                a: vec![vec![]],
                b: vec![1.0],
            },
            RungeKutta::Midpoint => Tableau {
                a: vec![vec![], vec![0.5]],
                b: vec![0.0, 1.0],
            },
            RungeKutta::Kutta3 => Tableau {
                a: vec![vec![], vec![0.5], vec![-1.0, 2.0]],
                b: vec![1.0 / 6.0, 4.0 / 6.0, 1.0 / 6.0],
            },
            RungeKutta::Classic4 => Tableau {
                a: vec![vec![], vec![0.5], vec![0.0, 0.5], vec![0.0, 0.0, 1.0]],
                b: vec![1.0 / 6.0, 2.0 / 6.0, 2.0 / 6.0, 1.0 / 6.0],
            },
        }
    }

    /// Advance `y` by one step of size `dt`, given per component.
    ///
    /// Only uses `y + dt * sum(c * k)`, so the same steps can be emitted as
    /// plain vector additions and scalings.
    pub fn step<E, F>(&self, y: &[f64], dt: &[f64], mut f: F) -> Result<Vec<f64>, E>
    where
        F: FnMut(&[f64]) -> Result<Vec<f64>, E>,
    {
        let tableau = self.tableau();
        let mut k: Vec<Vec<f64>> = Vec::with_capacity(tableau.b.len());
        for row in &tableau.a {
            let stage = combine(y, dt, row, &k);
            k.push(f(&stage)?);
        }
        Ok(combine(y, dt, &tableau.b, &k))
    }
}

fn combine(y: &[f64], dt: &[f64], weights: &[f64], k: &[Vec<f64>]) -> Vec<f64> {
    let mut sum = y.to_vec();
    for (weight, stage) in weights.iter().zip(k) {
        if *weight == 0.0 {
            continue;
        }
        for ((value, h), slope) in sum.iter_mut().zip(dt).zip(stage) {
            *value += h * weight * slope;
        }
    }
    sum
}

impl Display for RungeKutta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RungeKutta::Euler => "explicit Euler",
            RungeKutta::Midpoint => "explicit midpoint",
            RungeKutta::Kutta3 => "Kutta's third order",
            RungeKutta::Classic4 => "classical fourth order",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn decay(y: &[f64]) -> Result<Vec<f64>, Infallible> {
        Ok(y.iter().map(|v| -v).collect())
    }

    #[test]
    fn tableaux_are_consistent() {
        for scheme in RungeKutta::ALL {
            let tableau = scheme.tableau();
            assert_eq!(tableau.a.len(), scheme.order() as usize);
            assert_eq!(tableau.b.len(), scheme.order() as usize);
            let total: f64 = tableau.b.iter().sum();
            assert!((total - 1.0).abs() < 1e-12, "{scheme}");
            for (i, row) in tableau.a.iter().enumerate() {
                assert_eq!(row.len(), i);
            }
        }
    }

    #[test]
    fn euler_step() {
        let y = RungeKutta::Euler.step(&[1.0], &[0.1], decay).unwrap();
        assert!((y[0] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn orders_converge_on_decay() {
        let exact = (-1.0f64).exp();
        let mut previous_error = f64::INFINITY;
        for scheme in RungeKutta::ALL {
            let mut y = vec![1.0];
            for _ in 0..10 {
                y = scheme.step(&y, &[0.1], decay).unwrap();
            }
            let error = (y[0] - exact).abs();
            assert!(error < previous_error, "{scheme}: {error}");
            previous_error = error;
        }
        assert!(previous_error < 1e-6);
    }

    #[test]
    fn per_component_step_sizes() {
        let y = RungeKutta::Euler
            .step(&[1.0, 1.0], &[0.1, 0.5], decay)
            .unwrap();
        assert!((y[0] - 0.9).abs() < 1e-12);
        assert!((y[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn orders() {
        assert_eq!(RungeKutta::from_order(3), Some(RungeKutta::Kutta3));
        assert_eq!(RungeKutta::from_order(5), None);
        assert_eq!(RungeKutta::default().order(), 1);
    }
}
