// Detection stages: filter → match → graph → groups.
//
// Each stage is a pure transformation over the previous stage's output and
// can be unit tested in isolation. The pipeline module wires them together.

pub mod edge;
pub mod filter;
pub mod graph;
pub mod groups;
pub mod louvain;
pub mod matcher;
