//! Shared resources the paging core draws on: mesh templates and GPU compilation.

pub mod compile;
pub mod template;

pub use compile::{CompileQueue, IncrementalCompileQueue};
pub use template::{Template, TemplateCache, TemplateSource};
