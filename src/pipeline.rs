//! Pipeline interfaces and their input and output schemas

/// Read pipeline interface files and render commands
pub mod interface;

/// Validate samples against a pipeline's input schema
pub mod schema;

/// Output paths declared by a pipeline's output schema
pub mod outputs;
