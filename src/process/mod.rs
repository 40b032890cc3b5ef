// src/process/mod.rs
pub mod convert;
pub mod date_parser;
pub mod final_domain;
pub mod infer;
pub mod maczt;
pub mod net_position;
pub mod records;
pub mod subject;
pub mod utility_tool;
pub mod xml_tree;

pub use final_domain::parse_final_domain;
pub use infer::{infer_column, ColumnKind, TypedColumn};
pub use maczt::derive_maczt;
pub use net_position::parse_net_positions;
pub use records::{build_from_records, FieldValue, Record};
pub use subject::ParseDataSubject;
pub use utility_tool::parse_utility_tool_xml;
