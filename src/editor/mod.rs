pub mod editor_types;
pub mod geometry;
pub mod session;
pub mod view_transform;
