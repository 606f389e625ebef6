//! Strategic merge of partial configuration documents

pub mod merge;

pub use merge::{
    ListStrategy, MergeSchema, StrategicMerge, decode_value, merge_documents, patch_typed,
    strategic_merge,
};
