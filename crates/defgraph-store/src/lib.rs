pub mod graph_file;
pub mod source;

pub use graph_file::{GraphFile, GRAPH_FORMAT_VERSION};
pub use source::DefinitionSource;
