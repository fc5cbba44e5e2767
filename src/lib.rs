//! Eigenfluid - basis-flow fluid simulation library
//!
//! 2D incompressible velocity fields assembled as a weighted sum of
//! precomputed divergence-free basis flows, with:
//! - Canonical-form coefficient cache (pairwise interactions become lookups)
//! - Orthogonal-group Gauss-Seidel inversion of the implicit BB matrix
//! - Uniform-grid spatial acceleration for particles and basis supports
//! - Passively advected tracer particles with obstacle projection
//!
//! This crate is framework-agnostic - it handles simulation only.
//! Rendering, windowing, and GPU work belong to the embedding application.

pub mod accel;
pub mod basis;
pub mod coeffs;
pub mod config;
pub mod error;
pub mod field;
pub mod obstacle;
pub mod particles;
pub mod sim;
pub mod solver;
pub mod template;

pub use basis::{BasisFlags, BasisFlow, BasisSupport};
pub use coeffs::{average_basis_on_support, integrate_basis_basis, CoeffKey, CoefficientCache};
pub use config::SimulationConfig;
pub use error::EigenfluidError;
pub use field::VectorField2D;
pub use obstacle::{Disk, HalfPlane, Obstacle};
pub use particles::ParticleBuffer;
pub use sim::Simulation;
pub use template::{eigen_laplace, flow_basis_hat, BasisTemplates};
