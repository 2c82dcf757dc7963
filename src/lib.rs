#[cfg(feature = "cli")]
pub mod cli;
pub mod collision;
pub mod config;
pub mod converter;
pub mod geometry;
pub mod layout;
pub mod marker;
pub mod params;
pub mod render;
pub mod scene;
pub mod style;
pub mod symbolizer;
pub mod text_metrics;
pub mod transform;

#[cfg(feature = "cli")]
pub use cli::run;
pub use collision::{CollisionDetector, CollisionKeys, LabelCollisionDetector};
pub use geometry::{BoundingBox, Geometry, Point, Polygon};
pub use params::PlacementParams;
pub use scene::{PlacementReport, Scene, SceneError, load_scene, parse_scene};
pub use style::{LabelPlacement, PropertyKey, StyleMap, StyleProperties};
pub use symbolizer::{group_placements, process_collision, shield_placements, text_placements};
