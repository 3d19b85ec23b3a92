//! Scene graph: shared immutable nodes plus the passes that turn template
//! instances into static chunk geometry.

pub mod analyze;
pub mod clone;
pub mod flatten;
pub mod node;
pub mod optimizer;

pub use analyze::{analyze, AnalyzeResult, StateUsage};
pub use clone::CopyOp;
pub use node::{
    DataVariance, Geometry, LocalTransform, LodChild, Node, NodeCallback, NodeKind, ParticleKind,
    StateKey, StateSet, SwitchChild, UserData, MASK_ALL, MASK_STATIC,
};
pub use optimizer::{OptimizeStats, Optimizer, OptimizerOptions};
