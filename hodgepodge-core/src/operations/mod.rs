pub mod resolve_connection;
pub mod update_spec;

pub use resolve_connection::{
    ConnectionParams, resolve_superuser_connection, superuser_connection_params,
};
pub use update_spec::{
    SpecUpdateMode, UpdateSpecOperation, UpdateSpecOperationRequest, UpdateSpecOperationResult,
};
