pub mod errors;
pub mod manifest;
pub mod node;

pub use errors::{Diagnostic, DiagnosticBag, DiagnosticSink, Location, Severity};
pub use manifest::{AnalyzerConfig, CheckGroup, TernaryPolicy};
pub use node::{
    AggregateId, AntiCorruptionId, AttributeId, Callable, ContextId, ContextMapId, ExprId,
    Feature, ModuleId, NodeRef, ObjectId, ReferenceId, RelationshipId,
};
