pub mod constant;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use constant::ConstantDepth;

#[cfg(feature = "backend-tract")]
pub use tract::TractDepthModel;
