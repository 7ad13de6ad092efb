pub mod decomposition;
pub mod eigen;
pub mod solve;
pub mod svd;

pub use decomposition::*;
pub use eigen::*;
pub use solve::*;
pub use svd::*;
