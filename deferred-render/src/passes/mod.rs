//! The three pipeline stages plus the ambient-occlusion collaborator.

pub mod bloom;
pub mod gbuffer;
pub mod lighting;
pub mod ssao;
